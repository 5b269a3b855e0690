//! kube-rs backed implementations of the cluster collaborators

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::debug;

use super::{ClusterResourceClient, SecretStore, WriteMode};
use crate::{Error, ResourceKind, Result};

/// Build the ApiResource for a kind in the given group/version
fn api_resource(group: &str, version: &str, kind: ResourceKind) -> ApiResource {
    ApiResource {
        group: group.to_string(),
        version: version.to_string(),
        api_version: format!("{}/{}", group, version),
        kind: kind.kind().to_string(),
        plural: kind.plural().to_string(),
    }
}

fn post_params(mode: WriteMode) -> PostParams {
    PostParams {
        dry_run: mode == WriteMode::DryRun,
        ..Default::default()
    }
}

/// Dynamic client scoped to one API group/version
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
    group: String,
    version: String,
}

impl KubeResourceClient {
    pub fn new(client: Client, group: &str, version: &str) -> Self {
        Self {
            client,
            group: group.to_string(),
            version: version.to_string(),
        }
    }

    fn all(&self, kind: ResourceKind) -> Api<DynamicObject> {
        let ar = api_resource(&self.group, &self.version, kind);
        Api::all_with(self.client.clone(), &ar)
    }

    fn namespaced(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        let ar = api_resource(&self.group, &self.version, kind);
        Api::namespaced_with(self.client.clone(), namespace, &ar)
    }
}

#[async_trait]
impl ClusterResourceClient for KubeResourceClient {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<DynamicObject>> {
        let list = self.all(kind).list(&ListParams::default()).await?;
        debug!(
            group = %self.group,
            kind = %kind.kind(),
            count = list.items.len(),
            "Listed resources"
        );
        Ok(list.items)
    }

    async fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<DynamicObject> {
        Ok(self.namespaced(kind, namespace).get(name).await?)
    }

    async fn create(
        &self,
        kind: ResourceKind,
        namespace: &str,
        object: &DynamicObject,
        mode: WriteMode,
    ) -> Result<DynamicObject> {
        Ok(self
            .namespaced(kind, namespace)
            .create(&post_params(mode), object)
            .await?)
    }

    async fn replace(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        object: &DynamicObject,
        mode: WriteMode,
    ) -> Result<DynamicObject> {
        Ok(self
            .namespaced(kind, namespace)
            .replace(name, &post_params(mode), object)
            .await?)
    }

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()> {
        self.namespaced(kind, namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}

/// Secret access through the core v1 API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret.metadata.namespace.as_deref().unwrap_or_default();
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("secret has no name".to_string()))?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.replace(name, &PostParams::default(), secret).await?)
    }
}
