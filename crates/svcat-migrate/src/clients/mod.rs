//! Collaborator interfaces consumed by the migration core
//!
//! The core never talks to an API directly. Everything goes through these
//! traits so that execution can be exercised against mocks, and so that the
//! legacy and target API groups are just two instances of the same
//! [`ClusterResourceClient`].

mod kube_client;

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::DynamicObject;
use reqwest::{Method, StatusCode};

#[cfg(test)]
use mockall::automock;

use crate::sm::{Parameters, ServiceBinding, ServiceInstance, ServiceOffering, ServicePlan};
use crate::{ResourceKind, Result};

pub use kube_client::{KubeResourceClient, KubeSecretStore};

/// Whether a write is persisted or only run through admission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Normal write
    Persist,
    /// Server-side dry run (`dryRun=All`)
    DryRun,
}

/// Service Manager operations used by the migration
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// List service instances matching the parameters
    async fn list_instances(&self, params: &Parameters) -> Result<Vec<ServiceInstance>>;

    /// List service bindings matching the parameters
    async fn list_bindings(&self, params: &Parameters) -> Result<Vec<ServiceBinding>>;

    /// List all service plans
    async fn list_plans(&self) -> Result<Vec<ServicePlan>>;

    /// List all service offerings
    async fn list_offerings(&self) -> Result<Vec<ServiceOffering>>;

    /// Issue a raw request and return the response status
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        params: &Parameters,
    ) -> Result<StatusCode>;
}

/// Access to `serviceinstances` / `servicebindings` of one API group
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterResourceClient: Send + Sync {
    /// List objects of a kind across all namespaces
    async fn list(&self, kind: ResourceKind) -> Result<Vec<DynamicObject>>;

    /// Get an object by name
    async fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<DynamicObject>;

    /// Create an object
    async fn create(
        &self,
        kind: ResourceKind,
        namespace: &str,
        object: &DynamicObject,
        mode: WriteMode,
    ) -> Result<DynamicObject>;

    /// Replace an existing object
    async fn replace(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        object: &DynamicObject,
        mode: WriteMode,
    ) -> Result<DynamicObject>;

    /// Request deletion of an object
    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()>;
}

/// Access to binding credential secrets
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get a secret, `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Persist changes to a secret
    async fn update(&self, secret: &Secret) -> Result<Secret>;
}

/// The collaborators of one migration run
#[derive(Clone)]
pub struct Clients {
    /// Service Manager
    pub broker: Arc<dyn BrokerClient>,
    /// `servicecatalog.k8s.io` resources
    pub legacy: Arc<dyn ClusterResourceClient>,
    /// `services.cloud.sap.com` resources
    pub target: Arc<dyn ClusterResourceClient>,
    /// Binding secrets
    pub secrets: Arc<dyn SecretStore>,
}
