//! Migration of Service Catalog resources to the SAP BTP service operator
//!
//! Moves `servicecatalog.k8s.io` instances and bindings to their
//! `services.cloud.sap.com` counterparts while keeping Service Manager, the
//! broker-side system of record, consistent with both.
//!
//! ## Flow
//!
//! ```text
//! Catalog read ──► Match by external ID ──► Validate (dry-run) ──► Execute
//!  (SM + svcat)      (drop unmatched)        (all-or-nothing)      (per resource)
//!
//! Per instance:  relabel in SM ─► create operator resource ─► [delete it if
//!                svcat was deleting] ─► clear svcat finalizers ─► delete svcat
//! Per binding:   read secret ─► relabel in SM with credentials ─► label secret
//!                ─► create operator resource ─► re-own secret ─► [delete if
//!                deleting] ─► clear svcat finalizers ─► delete svcat
//! ```
//!
//! Resources are processed one at a time, instances before bindings. A failed
//! resource never stops the next one; only a failed validation pass stops the
//! whole run before anything is mutated.

pub mod builder;
pub mod catalog;
pub mod clients;
pub mod crd;
mod error;
pub mod executor;
pub mod gate;
pub mod matcher;
pub mod orchestrator;
pub mod sm;
#[cfg(test)]
mod testing;

pub use error::{Error, TransitionError};
pub use executor::{ExecutionMode, TransitionExecutor};
pub use gate::ValidationReport;
pub use orchestrator::{
    MigrationMode, MigrationOutcome, MigrationSummary, Migrator, MigratorConfig,
};

/// Result type for collaborator calls
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Label added to every operator resource created by the migration
pub const MIGRATED_LABEL: &str = "migrated";

/// Label added to a binding secret, naming the binding that owns it
pub const BINDING_LABEL: &str = "binding";

/// Annotation preserving the svcat creation time
pub const ORIGINAL_CREATION_TIMESTAMP_ANNOTATION: &str = "original_creation_timestamp";

/// Annotation preserving the svcat acting-user identity
pub const ORIGINAL_USER_INFO_ANNOTATION: &str = "original_user_info";

/// The two kinds of resource being migrated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A provisioned service instance
    Instance,
    /// A credentials binding to an instance
    Binding,
}

impl ResourceKind {
    /// Kubernetes kind, identical in both API groups
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Instance => "ServiceInstance",
            Self::Binding => "ServiceBinding",
        }
    }

    /// Plural resource name, identical in both API groups
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Instance => "serviceinstances",
            Self::Binding => "servicebindings",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instance => write!(f, "instance"),
            Self::Binding => write!(f, "binding"),
        }
    }
}
