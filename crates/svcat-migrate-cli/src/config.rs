//! CLI configuration stored at `~/.migrate/config.json`.
//!
//! The file remembers which kubeconfig and operator namespace the previous
//! run used. Resolution:
//! - file present and no `--kubeconfig`/`--namespace` flag: use the file
//! - otherwise: take the flags, default the rest, and rewrite the file

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const CONFIG_DIR_NAME: &str = ".migrate";
const CONFIG_FILE_NAME: &str = "config.json";

/// Namespace the operator is installed in unless told otherwise
pub const DEFAULT_MANAGED_NAMESPACE: &str = "sap-btp-operator";

/// Persistent CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrateConfig {
    /// Path to the kubeconfig of the cluster being migrated.
    pub kubeconfig: String,
    /// Namespace holding the operator access secret and config map.
    pub managed_namespace: String,
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| Error::command_failed("could not determine home directory"))
}

/// Path to `~/.migrate/config.json`.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Path to `~/.kube/config`.
pub fn default_kubeconfig() -> Result<String> {
    Ok(home_dir()?
        .join(".kube")
        .join("config")
        .to_string_lossy()
        .into_owned())
}

/// Load config from `path`, returning `None` if the file does not exist.
pub fn load_config(path: &Path) -> Result<Option<MigrateConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::command_failed(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|e| Error::command_failed(format!("failed to parse {}: {}", path.display(), e)))
}

/// Save config to `path`, creating its directory (mode 0700) if needed.
pub fn save_config(path: &Path, config: &MigrateConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            create_private_dir(dir).map_err(|e| {
                Error::command_failed(format!("failed to create {}: {}", dir.display(), e))
            })?;
        }
    }
    let data = serde_json::to_string_pretty(config)?;
    std::fs::write(path, data)
        .map_err(|e| Error::command_failed(format!("failed to write {}: {}", path.display(), e)))
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Resolve the effective configuration for this run.
///
/// `default_kubeconfig` is used when the file has to be (re)written and no
/// `--kubeconfig` flag was given.
pub fn resolve_config(
    path: &Path,
    kubeconfig: Option<&str>,
    namespace: Option<&str>,
    default_kubeconfig: &str,
) -> Result<MigrateConfig> {
    if kubeconfig.is_none() && namespace.is_none() {
        if let Some(config) = load_config(path)? {
            return Ok(config);
        }
    }

    let config = MigrateConfig {
        kubeconfig: kubeconfig.unwrap_or(default_kubeconfig).to_string(),
        managed_namespace: namespace.unwrap_or(DEFAULT_MANAGED_NAMESPACE).to_string(),
    };
    save_config(path, &config)?;
    Ok(config)
}
