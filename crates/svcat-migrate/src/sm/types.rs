//! Service Manager API records

use serde::{Deserialize, Serialize};

/// A record that can be correlated with a svcat resource by ID
pub trait BrokerRecord {
    fn id(&self) -> &str;
}

/// Service instance as tracked by Service Manager
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceInstance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_plan_id: String,
}

/// Service binding as tracked by Service Manager
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceBinding {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_instance_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ServicePlan {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_offering_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceOffering {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

macro_rules! impl_broker_record {
    ($($ty:ty),*) => {
        $(impl BrokerRecord for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_broker_record!(ServiceInstance, ServiceBinding);

/// One page of a Service Manager list response
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Continuation token, empty on the last page
    #[serde(default)]
    pub token: String,
}

/// Query parameters for Service Manager list calls
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    /// Field queries, e.g. `context/clusterid eq 'abc'`
    pub field_query: Vec<String>,
    /// Label queries
    pub label_query: Vec<String>,
    /// Additional `key=value` parameters
    pub general_params: Vec<String>,
}

impl Parameters {
    /// Restrict a listing to records created from the given cluster
    pub fn for_cluster(cluster_id: &str) -> Self {
        Self {
            field_query: vec![format!("context/clusterid eq '{}'", cluster_id)],
            ..Default::default()
        }
    }

    /// Render as URL query pairs
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if !self.field_query.is_empty() {
            query.push(("fieldQuery".to_string(), self.field_query.join(" and ")));
        }
        if !self.label_query.is_empty() {
            query.push(("labelQuery".to_string(), self.label_query.join(" and ")));
        }
        for param in &self.general_params {
            if let Some((key, value)) = param.split_once('=') {
                query.push((key.to_string(), value.to_string()));
            }
        }
        query
    }
}
