//! svcat-migrate CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Migrate Service Catalog resources to the SAP BTP service operator
#[derive(Parser, Debug)]
#[command(name = "svcat-migrate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default is $HOME/.migrate/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Absolute path to the kubeconfig file (default is $HOME/.kube/config)
    #[arg(short, long, global = true)]
    pub kubeconfig: Option<String>,

    /// Namespace of the SAP BTP service operator (default is sap-btp-operator)
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the migration
    Run(commands::run::RunArgs),

    /// Run only the validations, resources are not migrated
    #[command(visible_alias = "d")]
    DryRun,
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => commands::run::run(args, &self.global).await,
            Commands::DryRun => commands::dry_run::run(&self.global).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "svcat-migrate",
            "run",
            "--skip-validation",
            "-n",
            "operators",
            "--kubeconfig",
            "/tmp/kc",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.skip_validation);
        assert_eq!(cli.global.namespace.as_deref(), Some("operators"));
        assert_eq!(cli.global.kubeconfig.as_deref(), Some("/tmp/kc"));
        assert!(cli.global.config.is_none());
    }

    #[test]
    fn dry_run_alias() {
        let cli = Cli::try_parse_from(["svcat-migrate", "d"]).unwrap();
        assert!(matches!(cli.command, Commands::DryRun));

        let cli = Cli::try_parse_from(["svcat-migrate", "dry-run", "-c", "/tmp/c.json"]).unwrap();
        assert!(matches!(cli.command, Commands::DryRun));
        assert_eq!(cli.global.config, Some(PathBuf::from("/tmp/c.json")));
    }

    #[test]
    fn run_validates_by_default() {
        let cli = Cli::try_parse_from(["svcat-migrate", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(!args.skip_validation);
    }
}
