//! Views over Service Catalog (`servicecatalog.k8s.io/v1beta1`) objects
//!
//! Only the fields the migration reads are modelled. The complete object is
//! kept in [`Legacy::object`] and is what gets written back when finalizers
//! are cleared.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ParametersFromSource;
use crate::{Error, Result};

/// API group of the Service Catalog
pub const SVCAT_GROUP: &str = "servicecatalog.k8s.io";

/// API version of the Service Catalog
pub const SVCAT_VERSION: &str = "v1beta1";

/// Identity of the user that last acted on a svcat resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}

/// Fields of a svcat ServiceInstance spec used by the migration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SvcatInstanceSpec {
    /// ID of the instance in Service Manager
    #[serde(default, rename = "externalID")]
    pub external_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters_from: Vec<ParametersFromSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

/// Reference to an object in the same namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct LocalObjectReference {
    #[serde(default)]
    pub name: String,
}

/// Fields of a svcat ServiceBinding spec used by the migration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SvcatBindingSpec {
    /// ID of the binding in Service Manager
    #[serde(default, rename = "externalID")]
    pub external_id: String,

    /// Instance the binding belongs to
    #[serde(default)]
    pub instance_ref: LocalObjectReference,

    /// Secret the credentials were written to
    #[serde(default)]
    pub secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters_from: Vec<ParametersFromSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

/// Specs that point at a Service Manager record
pub trait ExternalRef {
    /// Service Manager ID this resource was provisioned as
    fn external_id(&self) -> &str;
}

impl ExternalRef for SvcatInstanceSpec {
    fn external_id(&self) -> &str {
        &self.external_id
    }
}

impl ExternalRef for SvcatBindingSpec {
    fn external_id(&self) -> &str {
        &self.external_id
    }
}

/// A svcat object: the raw object as listed plus its parsed spec
#[derive(Clone, Debug)]
pub struct Legacy<S> {
    pub object: DynamicObject,
    pub spec: S,
}

pub type SvcatInstance = Legacy<SvcatInstanceSpec>;
pub type SvcatBinding = Legacy<SvcatBindingSpec>;

impl<S: DeserializeOwned> Legacy<S> {
    /// Parse the spec out of a listed object
    pub fn parse(object: DynamicObject) -> Result<Self> {
        let spec = object
            .data
            .get("spec")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        let spec = serde_json::from_value(spec).map_err(|e| {
            Error::InvalidResource(format!(
                "{}/{}: {}",
                object.metadata.namespace.as_deref().unwrap_or_default(),
                object.metadata.name.as_deref().unwrap_or_default(),
                e
            ))
        })?;
        Ok(Self { object, spec })
    }
}

impl<S> Legacy<S> {
    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.object.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// True when the object carries a deletion timestamp
    pub fn is_marked_for_deletion(&self) -> bool {
        self.object.metadata.deletion_timestamp.is_some()
    }

    pub fn creation_timestamp(&self) -> Option<&Time> {
        self.object.metadata.creation_timestamp.as_ref()
    }

    /// The complete object with its finalizer list emptied
    pub fn without_finalizers(&self) -> DynamicObject {
        let mut object = self.object.clone();
        object.metadata.finalizers = Some(Vec::new());
        object
    }
}

impl<S: ExternalRef> Legacy<S> {
    pub fn external_id(&self) -> &str {
        self.spec.external_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svcat_object(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_instance_spec() {
        let obj = svcat_object(serde_json::json!({
            "apiVersion": "servicecatalog.k8s.io/v1beta1",
            "kind": "ServiceInstance",
            "metadata": {
                "name": "svc-a",
                "namespace": "dev",
                "finalizers": ["kubernetes-incubator/service-catalog"]
            },
            "spec": {
                "externalID": "abc",
                "clusterServicePlanExternalName": "standard",
                "parameters": { "size": 3 },
                "parametersFrom": [{ "secretKeyRef": { "name": "params", "key": "json" } }],
                "userInfo": { "username": "alice", "uid": "42" }
            }
        }));

        let instance = SvcatInstance::parse(obj).unwrap();
        assert_eq!(instance.name(), "svc-a");
        assert_eq!(instance.namespace(), "dev");
        assert_eq!(instance.external_id(), "abc");
        assert_eq!(instance.spec.parameters, Some(serde_json::json!({ "size": 3 })));
        assert_eq!(instance.spec.parameters_from.len(), 1);
        assert_eq!(
            instance.spec.user_info.as_ref().map(|u| u.username.as_str()),
            Some("alice")
        );
        assert!(!instance.is_marked_for_deletion());
    }

    #[test]
    fn without_finalizers_keeps_unmodelled_fields() {
        let obj = svcat_object(serde_json::json!({
            "apiVersion": "servicecatalog.k8s.io/v1beta1",
            "kind": "ServiceBinding",
            "metadata": {
                "name": "b1",
                "namespace": "dev",
                "finalizers": ["kubernetes-incubator/service-catalog"],
                "deletionTimestamp": "2021-05-01T10:00:00Z"
            },
            "spec": {
                "externalID": "bid",
                "instanceRef": { "name": "svc-a" },
                "secretName": "b1-creds"
            },
            "status": { "asyncOpInProgress": false }
        }));

        let binding = SvcatBinding::parse(obj).unwrap();
        assert!(binding.is_marked_for_deletion());
        assert_eq!(binding.spec.instance_ref.name, "svc-a");

        let cleared = binding.without_finalizers();
        assert_eq!(cleared.metadata.finalizers, Some(vec![]));
        assert_eq!(cleared.data["status"]["asyncOpInProgress"], false);
        assert_eq!(cleared.data["spec"]["secretName"], "b1-creds");
        // The parsed view is untouched
        assert_eq!(binding.object.metadata.finalizers.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn parse_rejects_malformed_spec() {
        let obj = svcat_object(serde_json::json!({
            "apiVersion": "servicecatalog.k8s.io/v1beta1",
            "kind": "ServiceInstance",
            "metadata": { "name": "broken", "namespace": "dev" },
            "spec": { "externalID": 17 }
        }));

        let err = SvcatInstance::parse(obj).unwrap_err();
        assert!(err.to_string().contains("dev/broken"));
    }
}
