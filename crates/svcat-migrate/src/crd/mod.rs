//! Resource types on both sides of the migration
//!
//! - [`svcat`]: read-only views over `servicecatalog.k8s.io/v1beta1` objects.
//!   The raw object is kept alongside the parsed spec so that writes back to
//!   the legacy API never drop fields this crate does not model.
//! - [`operator`]: `services.cloud.sap.com/v1alpha1` custom resources built
//!   by the migration.

pub mod operator;
pub mod svcat;

use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use operator::{
    BtpServiceBinding, BtpServiceBindingSpec, BtpServiceInstance, BtpServiceInstanceSpec,
    OPERATOR_GROUP, OPERATOR_VERSION,
};
pub use svcat::{
    ExternalRef, Legacy, SvcatBinding, SvcatBindingSpec, SvcatInstance, SvcatInstanceSpec,
    UserInfo, SVCAT_GROUP, SVCAT_VERSION,
};

/// Reference to a key inside a secret in the resource's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct SecretKeyReference {
    /// Secret name
    pub name: String,
    /// Key within the secret
    pub key: String,
}

/// Source of parameters read from a secret key
#[derive(Clone, Debug, Default, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParametersFromSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeyReference>,
}

/// Convert a typed resource into the dynamic form the cluster clients accept
pub fn to_dynamic<K: Serialize>(resource: &K) -> Result<DynamicObject> {
    let value = serde_json::to_value(resource)?;
    Ok(serde_json::from_value(value)?)
}
