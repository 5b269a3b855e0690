//! Service Manager: the broker-side system of record
//!
//! [`types`] holds the records returned by the Service Manager REST API and
//! [`client`] an OAuth2-authenticated client for it.

pub mod client;
pub mod types;

pub use client::{ServiceManagerClient, SmClientConfig};
pub use types::{
    BrokerRecord, Parameters, ServiceBinding, ServiceInstance, ServiceOffering, ServicePlan,
};
