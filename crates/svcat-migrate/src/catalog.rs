//! Reading the three systems of record
//!
//! [`read_catalog`] fetches every svcat instance and binding in the cluster
//! and every Service Manager record created from this cluster. There is no
//! partial mode: any failing list call fails the read.
//!
//! [`PlanCatalog`] is the plan/offering reference data used to name the
//! plan and offering of a built operator instance.

use std::collections::HashMap;

use tracing::info;

use crate::clients::{BrokerClient, Clients};
use crate::crd::{SvcatBinding, SvcatInstance};
use crate::sm::{self, Parameters, ServiceOffering, ServicePlan};
use crate::{ResourceKind, Result};

/// Snapshot of all resources relevant to one migration pass
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub sm_instances: Vec<sm::ServiceInstance>,
    pub sm_bindings: Vec<sm::ServiceBinding>,
    pub svcat_instances: Vec<SvcatInstance>,
    pub svcat_bindings: Vec<SvcatBinding>,
}

/// Read the svcat resources and the Service Manager records of a cluster.
pub async fn read_catalog(clients: &Clients, cluster_id: &str) -> Result<Catalog> {
    let params = Parameters::for_cluster(cluster_id);

    let sm_instances = clients.broker.list_instances(&params).await?;
    info!("*** Fetched {} instances from SM", sm_instances.len());

    let sm_bindings = clients.broker.list_bindings(&params).await?;
    info!("*** Fetched {} bindings from SM", sm_bindings.len());

    let svcat_instances = clients
        .legacy
        .list(ResourceKind::Instance)
        .await?
        .into_iter()
        .map(SvcatInstance::parse)
        .collect::<Result<Vec<_>>>()?;
    info!("*** Fetched {} svcat instances from cluster", svcat_instances.len());

    let svcat_bindings = clients
        .legacy
        .list(ResourceKind::Binding)
        .await?
        .into_iter()
        .map(SvcatBinding::parse)
        .collect::<Result<Vec<_>>>()?;
    info!("*** Fetched {} svcat bindings from cluster", svcat_bindings.len());

    Ok(Catalog {
        sm_instances,
        sm_bindings,
        svcat_instances,
        svcat_bindings,
    })
}

/// Plans and offerings by ID
#[derive(Clone, Debug, Default)]
pub struct PlanCatalog {
    plans: HashMap<String, ServicePlan>,
    offerings: HashMap<String, ServiceOffering>,
}

impl PlanCatalog {
    /// Load every plan and offering from Service Manager
    pub async fn load(broker: &dyn BrokerClient) -> Result<Self> {
        let plans = broker.list_plans().await?;
        let offerings = broker.list_offerings().await?;
        Ok(Self::new(plans, offerings))
    }

    pub fn new(plans: Vec<ServicePlan>, offerings: Vec<ServiceOffering>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
            offerings: offerings.into_iter().map(|o| (o.id.clone(), o)).collect(),
        }
    }

    pub fn plan(&self, plan_id: &str) -> Option<&ServicePlan> {
        self.plans.get(plan_id)
    }

    /// Offering the given plan belongs to
    pub fn offering_of(&self, plan: &ServicePlan) -> Option<&ServiceOffering> {
        self.offerings.get(&plan.service_offering_id)
    }
}
