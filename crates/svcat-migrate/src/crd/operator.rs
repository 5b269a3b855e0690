//! SAP BTP service operator custom resources (`services.cloud.sap.com/v1alpha1`)

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ParametersFromSource;

/// API group served by the operator
pub const OPERATOR_GROUP: &str = "services.cloud.sap.com";

/// API version served by the operator
pub const OPERATOR_VERSION: &str = "v1alpha1";

/// Desired state of an operator-managed service instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "services.cloud.sap.com",
    version = "v1alpha1",
    kind = "ServiceInstance",
    root = "BtpServiceInstance",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BtpServiceInstanceSpec {
    /// Name of the service offering
    pub service_offering_name: String,

    /// Name of the plan within the offering
    pub service_plan_name: String,

    /// Name of the instance in Service Manager
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_name: String,

    /// Provisioning parameters, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    /// Provisioning parameters sourced from secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters_from: Vec<ParametersFromSource>,
}

/// Desired state of an operator-managed service binding
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "services.cloud.sap.com",
    version = "v1alpha1",
    kind = "ServiceBinding",
    root = "BtpServiceBinding",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BtpServiceBindingSpec {
    /// Name of the operator service instance this binding belongs to
    pub service_instance_name: String,

    /// Name of the binding in Service Manager
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_name: String,

    /// Secret holding the binding credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Binding parameters, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    /// Binding parameters sourced from secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters_from: Vec<ParametersFromSource>,
}
