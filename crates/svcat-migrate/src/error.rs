//! Error types for svcat migration
//!
//! [`Error`] covers failures of the collaborators (Kubernetes API, Service
//! Manager API, serialization). [`TransitionError`] names the step of a
//! single resource migration that failed; its display text is the line that
//! ends up in the run's failure summary.

use thiserror::Error;

use crate::ResourceKind;

/// Errors raised by collaborators and bootstrap
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    /// Transport error talking to Service Manager
    #[error("service manager request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service Manager answered with a non-success status
    #[error("service manager returned {status} for {path}: {message}")]
    Broker {
        /// HTTP status code
        status: u16,
        /// Request path
        path: String,
        /// Response body or description
        message: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A legacy object could not be interpreted
    #[error("invalid resource: {0}")]
    InvalidResource(String),
}

impl Error {
    /// Check if this error is a Kubernetes "not found" response
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

/// Failure of one step while migrating a single instance or binding.
///
/// Any of these aborts the remaining steps for that resource only; the run
/// continues with the next resource.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The Service Manager relabel call failed or returned a non-2xx status
    #[error("failed to add k8s label to service {kind} name: {name}, ID: {id} ({reason})")]
    Relabel {
        kind: ResourceKind,
        /// Service Manager record name
        name: String,
        /// Service Manager record ID
        id: String,
        reason: String,
    },

    /// Creating the operator resource failed
    #[error("failed to create service {kind} '{name}': {source}")]
    Create {
        kind: ResourceKind,
        name: String,
        source: Error,
    },

    /// Reading the binding secret failed for a reason other than absence
    #[error("failed to get secret '{secret}' of binding '{binding}', skipping binding migration: {source}")]
    SecretFetch {
        binding: String,
        secret: String,
        source: Error,
    },

    /// The relabel payload could not be built
    #[error("failed to build request body for migrating {kind} '{name}': {source}")]
    Payload {
        kind: ResourceKind,
        name: String,
        source: serde_json::Error,
    },

    /// Adding the `binding` label to the secret failed
    #[error("failed to add label to secret '{secret}' of binding '{binding}': {source}")]
    SecretLabel {
        binding: String,
        secret: String,
        source: Error,
    },

    /// Pointing the secret's owner reference at the new binding failed
    #[error("failed to set new binding '{binding}' as owner of secret '{secret}': {source}")]
    SecretOwner {
        binding: String,
        secret: String,
        source: Error,
    },

    /// Clearing finalizers from the svcat resource failed
    #[error("failed to delete finalizer from {kind} '{name}': {source}")]
    Finalizers {
        kind: ResourceKind,
        name: String,
        source: Error,
    },

    /// Deleting the svcat resource after migration failed
    #[error("failed to delete svcat {kind} '{name}': {source}")]
    LegacyDelete {
        kind: ResourceKind,
        name: String,
        source: Error,
    },

    /// Dry-run admission of the operator resource was rejected
    #[error("{kind} '{name}' in namespace '{namespace}' failed: '{source}'")]
    Validation {
        kind: ResourceKind,
        name: String,
        namespace: String,
        source: Error,
    },
}
