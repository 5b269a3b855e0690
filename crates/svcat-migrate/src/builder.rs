//! Projection of matched pairs into operator resources
//!
//! Pure functions: no I/O, and a failure to serialize the user identity
//! only drops that annotation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::api::ObjectMeta;
use tracing::warn;

use crate::catalog::PlanCatalog;
use crate::crd::{
    BtpServiceBinding, BtpServiceBindingSpec, BtpServiceInstance, BtpServiceInstanceSpec, Legacy,
    ParametersFromSource, SecretKeyReference, UserInfo,
};
use crate::matcher::{BindingPair, InstancePair};
use crate::{MIGRATED_LABEL, ORIGINAL_CREATION_TIMESTAMP_ANNOTATION, ORIGINAL_USER_INFO_ANNOTATION};

/// Build the operator instance for a matched svcat instance
pub fn build_instance(pair: &InstancePair, plans: &PlanCatalog) -> BtpServiceInstance {
    let plan = plans.plan(&pair.record.service_plan_id);
    let offering = plan.and_then(|p| plans.offering_of(p));

    let legacy = &pair.legacy;
    BtpServiceInstance {
        metadata: metadata(legacy, legacy.spec.user_info.as_ref()),
        spec: BtpServiceInstanceSpec {
            service_offering_name: offering.map(|o| o.name.clone()).unwrap_or_default(),
            service_plan_name: plan.map(|p| p.name.clone()).unwrap_or_default(),
            external_name: pair.record.name.clone(),
            parameters: legacy.spec.parameters.clone(),
            parameters_from: copy_parameters_from(&legacy.spec.parameters_from),
        },
    }
}

/// Build the operator binding for a matched svcat binding
pub fn build_binding(pair: &BindingPair) -> BtpServiceBinding {
    let legacy = &pair.legacy;
    BtpServiceBinding {
        metadata: metadata(legacy, legacy.spec.user_info.as_ref()),
        spec: BtpServiceBindingSpec {
            service_instance_name: legacy.spec.instance_ref.name.clone(),
            external_name: pair.record.name.clone(),
            secret_name: Some(legacy.spec.secret_name.clone()).filter(|s| !s.is_empty()),
            parameters: legacy.spec.parameters.clone(),
            parameters_from: copy_parameters_from(&legacy.spec.parameters_from),
        },
    }
}

fn metadata<S>(legacy: &Legacy<S>, user_info: Option<&UserInfo>) -> ObjectMeta {
    let mut annotations = BTreeMap::new();
    if let Some(created) = legacy.creation_timestamp() {
        annotations.insert(
            ORIGINAL_CREATION_TIMESTAMP_ANNOTATION.to_string(),
            format_timestamp(&created.0),
        );
    }
    if let Some(user_info) = user_info {
        match serde_json::to_string(user_info) {
            Ok(json) => {
                annotations.insert(ORIGINAL_USER_INFO_ANNOTATION.to_string(), json);
            }
            Err(e) => warn!(
                name = %legacy.name(),
                error = %e,
                "failed to serialize user info, omitting annotation"
            ),
        }
    }

    ObjectMeta {
        name: Some(legacy.name().to_string()),
        namespace: Some(legacy.namespace().to_string()),
        labels: Some(BTreeMap::from([(
            MIGRATED_LABEL.to_string(),
            "true".to_string(),
        )])),
        annotations: Some(annotations),
        ..Default::default()
    }
}

/// `2021-05-01 10:00:00 +0000 UTC`
fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S %z UTC").to_string()
}

fn copy_parameters_from(sources: &[ParametersFromSource]) -> Vec<ParametersFromSource> {
    sources
        .iter()
        .filter_map(|source| source.secret_key_ref.as_ref())
        .map(|r| ParametersFromSource {
            secret_key_ref: Some(SecretKeyReference {
                name: r.name.clone(),
                key: r.key.clone(),
            }),
        })
        .collect()
}
