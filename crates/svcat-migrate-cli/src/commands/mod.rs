//! CLI commands
//!
//! Both commands share the same bootstrap: resolve the configuration, build
//! the collaborators from the cluster's operator settings and hand them to a
//! [`Migrator`]. They differ only in the [`MigrationMode`] they run.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info};

use svcat_migrate::clients::{Clients, KubeResourceClient, KubeSecretStore};
use svcat_migrate::crd::{OPERATOR_GROUP, OPERATOR_VERSION, SVCAT_GROUP, SVCAT_VERSION};
use svcat_migrate::sm::{ServiceManagerClient, SmClientConfig};
use svcat_migrate::{MigrationMode, MigrationOutcome, Migrator, MigratorConfig};

use crate::config::{default_config_path, default_kubeconfig, resolve_config, MigrateConfig};
use crate::{Error, GlobalArgs, Result};

pub mod dry_run;
pub mod run;

/// Secret holding the operator's Service Manager credentials
const ACCESS_SECRET_NAME: &str = "sap-btp-service-operator";
/// Config map holding the operator's cluster identity
const OPERATOR_CONFIG_MAP_NAME: &str = "sap-btp-operator-config";
const CLUSTER_ID_KEY: &str = "CLUSTER_ID";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve the persisted configuration against the global flags
pub fn load_settings(global: &GlobalArgs) -> Result<MigrateConfig> {
    let path = match &global.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = resolve_config(
        &path,
        global.kubeconfig.as_deref(),
        global.namespace.as_deref(),
        &default_kubeconfig()?,
    )?;
    debug!(
        config = %path.display(),
        kubeconfig = %config.kubeconfig,
        namespace = %config.managed_namespace,
        "resolved configuration"
    );
    Ok(config)
}

/// Create a kube client from a kubeconfig path with connect/read timeouts
pub async fn create_client(kubeconfig: &str) -> Result<Client> {
    let kc = Kubeconfig::read_from(kubeconfig).map_err(|e| {
        Error::command_failed(format!("failed to read kubeconfig {}: {}", kubeconfig, e))
    })?;
    let mut config = Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::command_failed(format!("failed to load kubeconfig: {}", e)))?;
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = Some(READ_TIMEOUT);
    Client::try_from(config)
        .map_err(|e| Error::command_failed(format!("failed to create client: {}", e)))
}

/// Service Manager settings from the operator access secret
async fn read_access_secret(client: &Client, namespace: &str) -> Result<SmClientConfig> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api.get(ACCESS_SECRET_NAME).await.map_err(|e| {
        Error::command_failed(format!(
            "failed to get secret '{}' in namespace '{}': {}",
            ACCESS_SECRET_NAME, namespace, e
        ))
    })?;
    Ok(SmClientConfig::from_secret_data(
        &secret.data.unwrap_or_default(),
    )?)
}

/// Cluster identity from the operator config map
async fn read_cluster_id(client: &Client, namespace: &str) -> Result<String> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let config_map = api.get(OPERATOR_CONFIG_MAP_NAME).await.map_err(|e| {
        Error::command_failed(format!(
            "failed to get config map '{}' in namespace '{}': {}",
            OPERATOR_CONFIG_MAP_NAME, namespace, e
        ))
    })?;
    config_map
        .data
        .and_then(|mut data| data.remove(CLUSTER_ID_KEY))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            Error::validation(format!(
                "config map '{}' has no {}",
                OPERATOR_CONFIG_MAP_NAME, CLUSTER_ID_KEY
            ))
        })
}

/// Build every collaborator and the migrator
pub async fn bootstrap(settings: &MigrateConfig) -> Result<Migrator> {
    let client = create_client(&settings.kubeconfig).await?;
    let namespace = settings.managed_namespace.as_str();

    let sm_config = read_access_secret(&client, namespace).await?;
    let cluster_id = read_cluster_id(&client, namespace).await?;
    info!(sm_url = %sm_config.url, namespace = %namespace, "connecting to Service Manager");

    let clients = Clients {
        broker: Arc::new(ServiceManagerClient::new(sm_config)?),
        legacy: Arc::new(KubeResourceClient::new(
            client.clone(),
            SVCAT_GROUP,
            SVCAT_VERSION,
        )),
        target: Arc::new(KubeResourceClient::new(
            client.clone(),
            OPERATOR_GROUP,
            OPERATOR_VERSION,
        )),
        secrets: Arc::new(KubeSecretStore::new(client)),
    };

    Ok(Migrator::new(clients, MigratorConfig { cluster_id }).await?)
}

/// Shared body of the commands: bootstrap, migrate, report
pub async fn execute(global: &GlobalArgs, mode: MigrationMode) -> Result<()> {
    let settings = load_settings(global)?;
    let migrator = bootstrap(&settings).await?;
    let outcome = migrator.migrate(mode).await?;
    report(&outcome)
}

/// Print the final block and turn failures into a non-zero exit
pub fn report(outcome: &MigrationOutcome) -> Result<()> {
    match outcome {
        MigrationOutcome::NothingToMigrate => Ok(()),
        MigrationOutcome::ValidationFailed(report) => {
            println!("{}", report);
            Err(Error::validation(format!(
                "{} resources failed validation, nothing was migrated",
                report.failures
            )))
        }
        MigrationOutcome::Validated => {
            println!("*** Validation completed successfully, no resources were migrated");
            Ok(())
        }
        MigrationOutcome::Completed(summary) => {
            println!("{}", summary);
            if summary.is_success() {
                Ok(())
            } else {
                Err(Error::command_failed(format!(
                    "{} of {} resources failed to migrate",
                    summary.failures.len(),
                    summary.instances + summary.bindings
                )))
            }
        }
    }
}
