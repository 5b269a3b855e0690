//! `svcat-migrate dry-run`: validate without migrating.

use svcat_migrate::MigrationMode;

use crate::{GlobalArgs, Result};

/// Run the dry-run command.
pub async fn run(global: &GlobalArgs) -> Result<()> {
    super::execute(global, MigrationMode::DryRun).await
}
