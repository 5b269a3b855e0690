//! `svcat-migrate run`: migrate every matched resource.

use clap::Args;

use svcat_migrate::MigrationMode;

use crate::{GlobalArgs, Result};

/// Run the migration
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Migrate without running the validation pass first
    #[arg(long)]
    pub skip_validation: bool,
}

impl RunArgs {
    fn mode(&self) -> MigrationMode {
        if self.skip_validation {
            MigrationMode::RunWithoutValidation
        } else {
            MigrationMode::Run
        }
    }
}

/// Run the migrate command.
pub async fn run(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    super::execute(global, args.mode()).await
}
