//! Per-resource transition from svcat to the operator
//!
//! One executor serves both the validation pass and the real run, selected
//! by [`ExecutionMode`], so the two paths build exactly the same resource.
//!
//! In [`ExecutionMode::Validate`] the only call made is a dry-run create of
//! the operator resource. In [`ExecutionMode::Real`] the ordered steps are:
//!
//! ```text
//! instance                               binding
//! ────────                               ───────
//!                                        1. get secret (absent is fine)
//!                                        2. build relabel payload
//! 1. relabel in SM             (fatal)   3. relabel in SM            (fatal)
//!                                        4. label secret             (fatal)
//! 2. create operator resource  (fatal)   5. create operator resource (fatal)
//!                                        6. re-own secret            (fatal)
//! 3. delete it if svcat was deleting     7. delete it if svcat was deleting
//!                              (logged)                              (logged)
//! 4. clear svcat finalizers    (fatal)   8. clear svcat finalizers   (fatal)
//! 5. get operator resource,              9. get operator resource,
//!    delete svcat              (logged)     delete svcat             (fatal)
//! ```
//!
//! There is no rollback. A failure after the relabel leaves the Service
//! Manager record relabeled without an operator resource; the relabel call
//! is idempotent so a later run repeats it safely.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::Resource;
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::builder::{build_binding, build_instance};
use crate::catalog::PlanCatalog;
use crate::clients::{Clients, WriteMode};
use crate::crd::{to_dynamic, BtpServiceBinding, Legacy};
use crate::matcher::{BindingPair, InstancePair};
use crate::sm::Parameters;
use crate::{Error, ResourceKind, TransitionError, BINDING_LABEL};

/// How a transition is executed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Perform every step
    Real,
    /// Only submit the operator resource with a server-side dry run
    Validate,
}

/// Relabel body for an instance: `{"k8sname": "<name>"}`
pub fn instance_relabel_body(k8s_name: &str) -> Result<Vec<u8>, serde_json::Error> {
    Ok(format!(r#"{{"k8sname": {}}}"#, serde_json::to_string(k8s_name)?).into_bytes())
}

/// Relabel body for a binding: `{"k8sname": "<name>", "credentials": {...}}`.
///
/// Credentials map each secret key to its value as a string; `{}` when the
/// secret is absent.
pub fn binding_relabel_body(
    k8s_name: &str,
    secret: Option<&Secret>,
) -> Result<Vec<u8>, serde_json::Error> {
    let credentials: BTreeMap<&str, String> = secret
        .and_then(|s| s.data.as_ref())
        .map(|data| {
            data.iter()
                .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(&v.0).into_owned()))
                .collect()
        })
        .unwrap_or_default();

    Ok(format!(
        r#"{{"k8sname": {}, "credentials": {}}}"#,
        serde_json::to_string(k8s_name)?,
        serde_json::to_string(&credentials)?
    )
    .into_bytes())
}

fn relabel_path(kind: ResourceKind, sm_id: &str) -> String {
    let collection = match kind {
        ResourceKind::Instance => "service_instances",
        ResourceKind::Binding => "service_bindings",
    };
    format!("/v1/migrate/{}/{}", collection, sm_id)
}

/// Owner reference making the created binding the controller of a secret
fn controller_reference(created: &DynamicObject) -> OwnerReference {
    let (api_version, kind) = match &created.types {
        Some(t) => (t.api_version.clone(), t.kind.clone()),
        None => (
            BtpServiceBinding::api_version(&()).to_string(),
            BtpServiceBinding::kind(&()).to_string(),
        ),
    };
    OwnerReference {
        api_version,
        kind,
        name: created.metadata.name.clone().unwrap_or_default(),
        uid: created.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// A built resource that cannot be turned into an API object is reported the
/// way the current pass reports its failures
fn conversion_error<S>(
    kind: ResourceKind,
    legacy: &Legacy<S>,
    mode: ExecutionMode,
    source: Error,
) -> TransitionError {
    match mode {
        ExecutionMode::Validate => TransitionError::Validation {
            kind,
            name: legacy.name().to_string(),
            namespace: legacy.namespace().to_string(),
            source,
        },
        ExecutionMode::Real => TransitionError::Create {
            kind,
            name: legacy.name().to_string(),
            source,
        },
    }
}

/// Applies the transition of one matched pair
pub struct TransitionExecutor<'a> {
    clients: &'a Clients,
    plans: &'a PlanCatalog,
}

impl<'a> TransitionExecutor<'a> {
    pub fn new(clients: &'a Clients, plans: &'a PlanCatalog) -> Self {
        Self { clients, plans }
    }

    /// Migrate (or validate) one service instance
    pub async fn migrate_instance(
        &self,
        pair: &InstancePair,
        mode: ExecutionMode,
    ) -> Result<(), TransitionError> {
        let kind = ResourceKind::Instance;
        let legacy = &pair.legacy;
        let target = to_dynamic(&build_instance(pair, self.plans))
            .map_err(|source| conversion_error(kind, legacy, mode, source))?;

        if mode == ExecutionMode::Validate {
            return self.validate(kind, legacy, &target).await;
        }

        info!(
            name = %legacy.name(),
            namespace = %legacy.namespace(),
            sm_id = %legacy.external_id(),
            "migrating service instance"
        );

        let body =
            instance_relabel_body(legacy.name()).map_err(|source| TransitionError::Payload {
                kind,
                name: legacy.name().to_string(),
                source,
            })?;
        self.relabel(kind, &pair.record.id, &pair.record.name, body).await?;

        let created = self.create(kind, legacy, &target).await?;
        self.delete_target_if_deleting(kind, legacy, &created).await;
        self.clear_finalizers(kind, legacy).await?;

        if let Err(e) = self.delete_legacy(kind, legacy).await {
            warn!(name = %legacy.name(), error = %e, "failed to delete svcat instance");
        }

        info!(
            name = %legacy.name(),
            namespace = %legacy.namespace(),
            "instance migrated successfully"
        );
        Ok(())
    }

    /// Migrate (or validate) one service binding
    pub async fn migrate_binding(
        &self,
        pair: &BindingPair,
        mode: ExecutionMode,
    ) -> Result<(), TransitionError> {
        let kind = ResourceKind::Binding;
        let legacy = &pair.legacy;
        let name = legacy.name();
        let target = to_dynamic(&build_binding(pair))
            .map_err(|source| conversion_error(kind, legacy, mode, source))?;

        if mode == ExecutionMode::Validate {
            return self.validate(kind, legacy, &target).await;
        }

        info!(
            name = %name,
            namespace = %legacy.namespace(),
            sm_id = %legacy.external_id(),
            "migrating service binding"
        );

        let secret_name = legacy.spec.secret_name.as_str();
        let mut secret = self
            .binding_secret(legacy.namespace(), name, secret_name)
            .await?;

        let body =
            binding_relabel_body(name, secret.as_ref()).map_err(|source| TransitionError::Payload {
                kind,
                name: name.to_string(),
                source,
            })?;
        self.relabel(kind, &pair.record.id, &pair.record.name, body).await?;

        if let Some(s) = secret.as_mut() {
            s.metadata
                .labels
                .get_or_insert_with(BTreeMap::new)
                .insert(BINDING_LABEL.to_string(), name.to_string());
            *s = self.clients.secrets.update(s).await.map_err(|source| {
                TransitionError::SecretLabel {
                    binding: name.to_string(),
                    secret: secret_name.to_string(),
                    source,
                }
            })?;
        }

        let created = self.create(kind, legacy, &target).await?;

        if let Some(mut s) = secret {
            s.metadata.owner_references = Some(vec![controller_reference(&created)]);
            self.clients.secrets.update(&s).await.map_err(|source| {
                TransitionError::SecretOwner {
                    binding: name.to_string(),
                    secret: secret_name.to_string(),
                    source,
                }
            })?;
        }

        self.delete_target_if_deleting(kind, legacy, &created).await;
        self.clear_finalizers(kind, legacy).await?;

        self.delete_legacy(kind, legacy)
            .await
            .map_err(|source| TransitionError::LegacyDelete {
                kind,
                name: name.to_string(),
                source,
            })?;

        info!(name = %name, namespace = %legacy.namespace(), "binding migrated successfully");
        Ok(())
    }

    async fn validate<S>(
        &self,
        kind: ResourceKind,
        legacy: &Legacy<S>,
        target: &DynamicObject,
    ) -> Result<(), TransitionError> {
        self.clients
            .target
            .create(kind, legacy.namespace(), target, WriteMode::DryRun)
            .await
            .map_err(|source| TransitionError::Validation {
                kind,
                name: legacy.name().to_string(),
                namespace: legacy.namespace().to_string(),
                source,
            })?;
        info!(
            "svcat {} '{}' in namespace '{}' was validated successfully",
            kind,
            legacy.name(),
            legacy.namespace()
        );
        Ok(())
    }

    /// Read the binding secret; absence is not an error
    async fn binding_secret(
        &self,
        namespace: &str,
        binding: &str,
        secret_name: &str,
    ) -> Result<Option<Secret>, TransitionError> {
        if secret_name.is_empty() {
            info!(binding = %binding, "binding has no secret name");
            return Ok(None);
        }
        match self.clients.secrets.get(namespace, secret_name).await {
            Ok(Some(secret)) => Ok(Some(secret)),
            Ok(None) => {
                info!("secret named '{}' not found for binding", secret_name);
                Ok(None)
            }
            Err(e) if e.is_not_found() => {
                info!("secret named '{}' not found for binding", secret_name);
                Ok(None)
            }
            Err(source) => Err(TransitionError::SecretFetch {
                binding: binding.to_string(),
                secret: secret_name.to_string(),
                source,
            }),
        }
    }

    async fn relabel(
        &self,
        kind: ResourceKind,
        sm_id: &str,
        sm_name: &str,
        body: Vec<u8>,
    ) -> Result<(), TransitionError> {
        let path = relabel_path(kind, sm_id);
        let reason = match self
            .clients
            .broker
            .call(Method::PUT, &path, body, &Parameters::default())
            .await
        {
            Ok(status) if status.is_success() => {
                debug!(path = %path, "relabeled SM record");
                return Ok(());
            }
            Ok(status) => format!("status {}", status.as_u16()),
            Err(e) => e.to_string(),
        };
        Err(TransitionError::Relabel {
            kind,
            name: sm_name.to_string(),
            id: sm_id.to_string(),
            reason,
        })
    }

    async fn create<S>(
        &self,
        kind: ResourceKind,
        legacy: &Legacy<S>,
        target: &DynamicObject,
    ) -> Result<DynamicObject, TransitionError> {
        self.clients
            .target
            .create(kind, legacy.namespace(), target, WriteMode::Persist)
            .await
            .map_err(|source| TransitionError::Create {
                kind,
                name: legacy.name().to_string(),
                source,
            })
    }

    /// A svcat resource that was already being deleted must not live on in
    /// the operator. Failure is logged; the svcat side is cleaned up anyway.
    async fn delete_target_if_deleting<S>(
        &self,
        kind: ResourceKind,
        legacy: &Legacy<S>,
        created: &DynamicObject,
    ) {
        if !legacy.is_marked_for_deletion() {
            return;
        }
        info!(
            "svcat {} '{}' is marked for deletion, deleting it from operator",
            kind,
            legacy.name()
        );
        let name = created.metadata.name.as_deref().unwrap_or(legacy.name());
        if let Err(e) = self
            .clients
            .target
            .delete(kind, legacy.namespace(), name)
            .await
        {
            warn!(name = %name, error = %e, "failed to delete {} from operator", kind);
        }
    }

    async fn clear_finalizers<S>(
        &self,
        kind: ResourceKind,
        legacy: &Legacy<S>,
    ) -> Result<(), TransitionError> {
        self.clients
            .legacy
            .replace(
                kind,
                legacy.namespace(),
                legacy.name(),
                &legacy.without_finalizers(),
                WriteMode::Persist,
            )
            .await
            .map_err(|source| TransitionError::Finalizers {
                kind,
                name: legacy.name().to_string(),
                source,
            })?;
        Ok(())
    }

    /// Delete the svcat resource once its operator counterpart is readable
    async fn delete_legacy<S>(&self, kind: ResourceKind, legacy: &Legacy<S>) -> Result<(), Error> {
        if let Err(e) = self
            .clients
            .target
            .get(kind, legacy.namespace(), legacy.name())
            .await
        {
            warn!(
                "failed to get the migrated {} '{}', corresponding svcat resource will not be deleted: {}",
                kind,
                legacy.name(),
                e
            );
            return Err(e);
        }
        self.clients
            .legacy
            .delete(kind, legacy.namespace(), legacy.name())
            .await
    }
}
