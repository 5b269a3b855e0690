//! Sequencing of one migration run
//!
//! [`Migrator::migrate`] reads the catalog, matches, optionally validates and
//! then executes every pair, instances before bindings. A pair that fails is
//! recorded in the [`MigrationSummary`] and the run moves on.

use std::fmt;

use tracing::{error, info};

use crate::catalog::{read_catalog, PlanCatalog};
use crate::clients::Clients;
use crate::executor::{ExecutionMode, TransitionExecutor};
use crate::gate::{validate, ValidationReport};
use crate::matcher::{match_bindings, match_instances, BindingPair, InstancePair};
use crate::Result;

/// Explicit configuration of the core
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigratorConfig {
    /// Cluster identity the Service Manager records were created from
    pub cluster_id: String,
}

/// What a run does after matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationMode {
    /// Validate everything, then migrate only if validation was clean
    Run,
    /// Migrate without a validation pass
    RunWithoutValidation,
    /// Validate only
    DryRun,
}

/// Result of a real execution pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Instance pairs attempted
    pub instances: usize,
    /// Binding pairs attempted
    pub bindings: usize,
    /// One line per failed pair
    pub failures: Vec<String>,
}

impl MigrationSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return write!(f, "*** Migration completed successfully");
        }
        write!(f, "*** Migration failures summary:")?;
        for failure in &self.failures {
            write!(f, "\n{}", failure)?;
        }
        Ok(())
    }
}

/// How a run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No svcat resource had a Service Manager counterpart
    NothingToMigrate,
    /// Validation rejected at least one pair; nothing was mutated
    ValidationFailed(ValidationReport),
    /// Dry run finished without rejections
    Validated,
    /// Real execution ran over every pair
    Completed(MigrationSummary),
}

impl MigrationOutcome {
    /// True when the run should be reported as successful
    pub fn is_success(&self) -> bool {
        match self {
            Self::NothingToMigrate | Self::Validated => true,
            Self::ValidationFailed(_) => false,
            Self::Completed(summary) => summary.is_success(),
        }
    }
}

/// Drives catalog read, matching, validation and execution
pub struct Migrator {
    clients: Clients,
    config: MigratorConfig,
    plans: PlanCatalog,
}

impl Migrator {
    /// Create a migrator, loading the plan and offering reference data once
    pub async fn new(clients: Clients, config: MigratorConfig) -> Result<Self> {
        let plans = PlanCatalog::load(clients.broker.as_ref()).await?;
        info!("Migrator initialized with cluster ID '{}'", config.cluster_id);
        Ok(Self {
            clients,
            config,
            plans,
        })
    }

    /// Perform one run in the given mode.
    ///
    /// Errors are reserved for the catalog read; per-pair failures end up in
    /// the returned outcome.
    pub async fn migrate(&self, mode: MigrationMode) -> Result<MigrationOutcome> {
        let catalog = read_catalog(&self.clients, &self.config.cluster_id).await?;

        let instances = match_instances(catalog.svcat_instances, &catalog.sm_instances);
        let bindings = match_bindings(catalog.svcat_bindings, &catalog.sm_bindings);

        if instances.is_empty() && bindings.is_empty() {
            info!("no svcat instances or bindings found for migration");
            return Ok(MigrationOutcome::NothingToMigrate);
        }
        info!(
            "*** found {} instances and {} bindings to migrate",
            instances.len(),
            bindings.len()
        );

        let executor = TransitionExecutor::new(&self.clients, &self.plans);

        match mode {
            MigrationMode::Run | MigrationMode::DryRun => {
                let report = validate(&executor, &instances, &bindings).await;
                if !report.is_clean() {
                    return Ok(MigrationOutcome::ValidationFailed(report));
                }
                if mode == MigrationMode::DryRun {
                    return Ok(MigrationOutcome::Validated);
                }
            }
            MigrationMode::RunWithoutValidation => {
                info!("*** Validation is skipped, migrating without validation");
            }
        }

        Ok(MigrationOutcome::Completed(
            execute(&executor, &instances, &bindings).await,
        ))
    }
}

async fn execute(
    executor: &TransitionExecutor<'_>,
    instances: &[InstancePair],
    bindings: &[BindingPair],
) -> MigrationSummary {
    let mut summary = MigrationSummary {
        instances: instances.len(),
        bindings: bindings.len(),
        failures: Vec::new(),
    };

    for pair in instances {
        if let Err(e) = executor.migrate_instance(pair, ExecutionMode::Real).await {
            error!(name = %pair.legacy.name(), namespace = %pair.legacy.namespace(), "{}", e);
            summary.failures.push(e.to_string());
        }
    }
    for pair in bindings {
        if let Err(e) = executor.migrate_binding(pair, ExecutionMode::Real).await {
            error!(name = %pair.legacy.name(), namespace = %pair.legacy.namespace(), "{}", e);
            summary.failures.push(e.to_string());
        }
    }

    summary
}
