//! Pre-flight validation of every matched pair
//!
//! Each pair goes through the executor in [`ExecutionMode::Validate`], which
//! submits the built operator resource with a server-side dry run and makes
//! no other call. Rejections are collected rather than returned early so the
//! operator sees every problem at once.

use std::fmt;

use tracing::{error, info};

use crate::executor::{ExecutionMode, TransitionExecutor};
use crate::matcher::{BindingPair, InstancePair};

/// Failures gathered during a validation pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Number of rejected pairs
    pub failures: usize,
    /// One line per rejected pair
    pub messages: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }

    fn record(&mut self, message: String) {
        error!("{}", message);
        self.failures += 1;
        self.messages.push(message);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed got {} validation errors:", self.failures)?;
        for message in &self.messages {
            write!(f, "\n{}", message)?;
        }
        Ok(())
    }
}

/// Dry-run every instance, then every binding
pub async fn validate(
    executor: &TransitionExecutor<'_>,
    instances: &[InstancePair],
    bindings: &[BindingPair],
) -> ValidationReport {
    info!("*** Validating");
    let mut report = ValidationReport::default();

    for pair in instances {
        if let Err(e) = executor.migrate_instance(pair, ExecutionMode::Validate).await {
            report.record(e.to_string());
        }
    }
    for pair in bindings {
        if let Err(e) = executor.migrate_binding(pair, ExecutionMode::Validate).await {
            report.record(e.to_string());
        }
    }

    if report.is_clean() {
        info!("*** Validation completed successfully");
    }
    report
}
