//! Shared fixtures for executor, gate and orchestrator tests
//!
//! [`Fixture`] wires mock collaborators that record every call they receive,
//! in order, so tests can assert on the exact sequence of side effects.

use std::sync::{Arc, Mutex};

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{DynamicObject, ObjectMeta};
use reqwest::StatusCode;

use crate::catalog::PlanCatalog;
use crate::clients::{
    Clients, MockBrokerClient, MockClusterResourceClient, MockSecretStore, WriteMode,
};
use crate::crd::{SvcatBinding, SvcatInstance};
use crate::matcher::{BindingPair, InstancePair};
use crate::sm::{self, ServiceOffering, ServicePlan};
use crate::{Error, ResourceKind, BINDING_LABEL};

/// Which cluster API a call went to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Api {
    Legacy,
    Target,
}

/// A recorded collaborator call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Relabel {
        path: String,
        body: String,
    },
    Create {
        kind: ResourceKind,
        name: String,
        mode: WriteMode,
    },
    ClearFinalizers {
        kind: ResourceKind,
        name: String,
    },
    Get {
        api: Api,
        kind: ResourceKind,
        name: String,
    },
    Delete {
        api: Api,
        kind: ResourceKind,
        name: String,
    },
    SecretGet {
        name: String,
    },
    SecretUpdate {
        name: String,
        binding_label: Option<String>,
        owner: Option<String>,
    },
}

impl Call {
    /// True for calls that change state somewhere
    pub fn is_mutation(&self) -> bool {
        match self {
            Call::Relabel { .. } | Call::ClearFinalizers { .. } | Call::SecretUpdate { .. } => true,
            Call::Create { mode, .. } => *mode == WriteMode::Persist,
            Call::Delete { .. } => true,
            Call::Get { .. } | Call::SecretGet { .. } => false,
        }
    }
}

/// Configurable set of collaborators
pub struct Fixture {
    pub calls: Arc<Mutex<Vec<Call>>>,
    /// Status returned by every relabel call
    pub relabel_status: u16,
    /// SM IDs whose relabel returns 500
    pub fail_relabel_ids: Vec<String>,
    /// Names rejected by dry-run admission
    pub reject_dry_run: Vec<String>,
    /// Names whose persisted create fails
    pub fail_create: Vec<String>,
    pub fail_target_get: bool,
    pub fail_target_delete: bool,
    pub fail_legacy_delete: bool,
    pub fail_finalizers: bool,
    pub fail_secret_get: bool,
    /// Fail the secret write that adds the binding label
    pub fail_secret_label_update: bool,
    /// Fail the secret write that sets the owner reference
    pub fail_secret_owner_update: bool,
    pub secrets: Vec<Secret>,
    pub sm_instances: Vec<sm::ServiceInstance>,
    pub sm_bindings: Vec<sm::ServiceBinding>,
    pub svcat_instances: Vec<DynamicObject>,
    pub svcat_bindings: Vec<DynamicObject>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            relabel_status: 200,
            fail_relabel_ids: Vec::new(),
            reject_dry_run: Vec::new(),
            fail_create: Vec::new(),
            fail_target_get: false,
            fail_target_delete: false,
            fail_legacy_delete: false,
            fail_finalizers: false,
            fail_secret_get: false,
            fail_secret_label_update: false,
            fail_secret_owner_update: false,
            secrets: Vec::new(),
            sm_instances: Vec::new(),
            sm_bindings: Vec::new(),
            svcat_instances: Vec::new(),
            svcat_bindings: Vec::new(),
        }
    }
}

impl Fixture {
    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn plans(&self) -> PlanCatalog {
        PlanCatalog::new(plans(), offerings())
    }

    pub fn clients(&self) -> Clients {
        Clients {
            broker: Arc::new(self.broker()),
            legacy: Arc::new(self.legacy()),
            target: Arc::new(self.target()),
            secrets: Arc::new(self.secret_store()),
        }
    }

    fn broker(&self) -> MockBrokerClient {
        let mut broker = MockBrokerClient::new();

        let instances = self.sm_instances.clone();
        broker
            .expect_list_instances()
            .returning(move |_| Ok(instances.clone()));
        let bindings = self.sm_bindings.clone();
        broker
            .expect_list_bindings()
            .returning(move |_| Ok(bindings.clone()));
        broker.expect_list_plans().returning(|| Ok(plans()));
        broker.expect_list_offerings().returning(|| Ok(offerings()));

        let calls = self.calls.clone();
        let status = self.relabel_status;
        let failing = self.fail_relabel_ids.clone();
        broker
            .expect_call()
            .returning(move |_method, path, body, _params| {
                calls.lock().unwrap().push(Call::Relabel {
                    path: path.to_string(),
                    body: String::from_utf8(body).unwrap(),
                });
                let status = if failing.iter().any(|id| path.ends_with(&format!("/{id}"))) {
                    500
                } else {
                    status
                };
                Ok(StatusCode::from_u16(status).unwrap())
            });
        broker
    }

    fn legacy(&self) -> MockClusterResourceClient {
        let mut legacy = MockClusterResourceClient::new();

        let instances = self.svcat_instances.clone();
        let bindings = self.svcat_bindings.clone();
        legacy.expect_list().returning(move |kind| {
            Ok(match kind {
                ResourceKind::Instance => instances.clone(),
                ResourceKind::Binding => bindings.clone(),
            })
        });

        let calls = self.calls.clone();
        let fail = self.fail_finalizers;
        legacy
            .expect_replace()
            .returning(move |kind, _ns, name, object, _mode| {
                calls.lock().unwrap().push(Call::ClearFinalizers {
                    kind,
                    name: name.to_string(),
                });
                if fail {
                    return Err(api_error(409, "Conflict"));
                }
                Ok(object.clone())
            });

        let calls = self.calls.clone();
        let fail = self.fail_legacy_delete;
        legacy.expect_delete().returning(move |kind, _ns, name| {
            calls.lock().unwrap().push(Call::Delete {
                api: Api::Legacy,
                kind,
                name: name.to_string(),
            });
            if fail {
                return Err(api_error(500, "InternalError"));
            }
            Ok(())
        });
        legacy
    }

    fn target(&self) -> MockClusterResourceClient {
        let mut target = MockClusterResourceClient::new();

        let calls = self.calls.clone();
        let rejected = self.reject_dry_run.clone();
        let failing = self.fail_create.clone();
        target
            .expect_create()
            .returning(move |kind, _ns, object, mode| {
                let name = object.metadata.name.clone().unwrap_or_default();
                calls.lock().unwrap().push(Call::Create {
                    kind,
                    name: name.clone(),
                    mode,
                });
                let refused = match mode {
                    WriteMode::DryRun => rejected.contains(&name),
                    WriteMode::Persist => failing.contains(&name),
                };
                if refused {
                    return Err(api_error(422, "Invalid"));
                }
                let mut created = object.clone();
                created.metadata.uid = Some(format!("uid-{name}"));
                Ok(created)
            });

        let calls = self.calls.clone();
        let fail = self.fail_target_get;
        target.expect_get().returning(move |kind, ns, name| {
            calls.lock().unwrap().push(Call::Get {
                api: Api::Target,
                kind,
                name: name.to_string(),
            });
            if fail {
                return Err(api_error(404, "NotFound"));
            }
            Ok(DynamicObject {
                types: None,
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(ns.to_string()),
                    ..Default::default()
                },
                data: serde_json::json!({}),
            })
        });

        let calls = self.calls.clone();
        let fail = self.fail_target_delete;
        target.expect_delete().returning(move |kind, _ns, name| {
            calls.lock().unwrap().push(Call::Delete {
                api: Api::Target,
                kind,
                name: name.to_string(),
            });
            if fail {
                return Err(api_error(500, "InternalError"));
            }
            Ok(())
        });
        target
    }

    fn secret_store(&self) -> MockSecretStore {
        let mut store = MockSecretStore::new();

        let calls = self.calls.clone();
        let secrets = self.secrets.clone();
        let fail = self.fail_secret_get;
        store.expect_get().returning(move |_ns, name| {
            calls.lock().unwrap().push(Call::SecretGet {
                name: name.to_string(),
            });
            if fail {
                return Err(api_error(500, "InternalError"));
            }
            Ok(secrets
                .iter()
                .find(|s| s.metadata.name.as_deref() == Some(name))
                .cloned())
        });

        let calls = self.calls.clone();
        let fail_label = self.fail_secret_label_update;
        let fail_owner = self.fail_secret_owner_update;
        store.expect_update().returning(move |secret| {
            let owner = secret
                .metadata
                .owner_references
                .as_ref()
                .and_then(|refs| refs.first())
                .map(|r| r.name.clone());
            calls.lock().unwrap().push(Call::SecretUpdate {
                name: secret.metadata.name.clone().unwrap_or_default(),
                binding_label: secret
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(BINDING_LABEL))
                    .cloned(),
                owner: owner.clone(),
            });
            if fail_label && owner.is_none() {
                return Err(api_error(409, "Conflict"));
            }
            if fail_owner && owner.is_some() {
                return Err(api_error(409, "Conflict"));
            }
            Ok(secret.clone())
        });
        store
    }
}

pub fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} (test)"),
        reason: reason.to_string(),
        code,
    }))
}

fn plans() -> Vec<ServicePlan> {
    vec![ServicePlan {
        id: "p1".to_string(),
        name: "standard".to_string(),
        service_offering_id: "o1".to_string(),
    }]
}

fn offerings() -> Vec<ServiceOffering> {
    vec![ServiceOffering {
        id: "o1".to_string(),
        name: "postgresql".to_string(),
    }]
}

fn deletion_fields(deleting: bool) -> serde_json::Value {
    if deleting {
        serde_json::json!({
            "deletionTimestamp": "2021-05-02T10:00:00Z",
            "finalizers": ["kubernetes-incubator/service-catalog"]
        })
    } else {
        serde_json::json!({ "finalizers": ["kubernetes-incubator/service-catalog"] })
    }
}

fn object(kind: &str, name: &str, deleting: bool, spec: serde_json::Value) -> DynamicObject {
    let mut metadata = deletion_fields(deleting);
    metadata["name"] = name.into();
    metadata["namespace"] = "dev".into();
    metadata["creationTimestamp"] = "2021-05-01T10:00:00Z".into();
    serde_json::from_value(serde_json::json!({
        "apiVersion": "servicecatalog.k8s.io/v1beta1",
        "kind": kind,
        "metadata": metadata,
        "spec": spec
    }))
    .unwrap()
}

pub fn svcat_instance_object(name: &str, external_id: &str, deleting: bool) -> DynamicObject {
    object(
        "ServiceInstance",
        name,
        deleting,
        serde_json::json!({ "externalID": external_id }),
    )
}

pub fn svcat_binding_object(
    name: &str,
    external_id: &str,
    secret_name: &str,
    deleting: bool,
) -> DynamicObject {
    object(
        "ServiceBinding",
        name,
        deleting,
        serde_json::json!({
            "externalID": external_id,
            "instanceRef": { "name": "svc-a" },
            "secretName": secret_name
        }),
    )
}

pub fn sm_instance(id: &str, name: &str) -> sm::ServiceInstance {
    sm::ServiceInstance {
        id: id.to_string(),
        name: name.to_string(),
        service_plan_id: "p1".to_string(),
    }
}

pub fn sm_binding(id: &str, name: &str) -> sm::ServiceBinding {
    sm::ServiceBinding {
        id: id.to_string(),
        name: name.to_string(),
        service_instance_id: "abc".to_string(),
    }
}

pub fn instance_pair(name: &str, sm_id: &str, deleting: bool) -> InstancePair {
    InstancePair {
        legacy: SvcatInstance::parse(svcat_instance_object(name, sm_id, deleting)).unwrap(),
        record: sm_instance(sm_id, &format!("{name}-sm")),
    }
}

pub fn binding_pair(name: &str, sm_id: &str, secret_name: &str, deleting: bool) -> BindingPair {
    BindingPair {
        legacy: SvcatBinding::parse(svcat_binding_object(name, sm_id, secret_name, deleting))
            .unwrap(),
        record: sm_binding(sm_id, &format!("{name}-sm")),
    }
}

pub fn secret(name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("dev".to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}
