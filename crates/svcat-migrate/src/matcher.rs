//! Correlating svcat resources with Service Manager records

use tracing::info;

use crate::crd::{ExternalRef, Legacy, SvcatBindingSpec, SvcatInstanceSpec};
use crate::sm::{self, BrokerRecord};

/// A svcat resource together with its Service Manager record.
///
/// `record.id() == legacy.external_id()` always holds.
#[derive(Clone, Debug)]
pub struct MatchedPair<S, R> {
    pub legacy: Legacy<S>,
    pub record: R,
}

pub type InstancePair = MatchedPair<SvcatInstanceSpec, sm::ServiceInstance>;
pub type BindingPair = MatchedPair<SvcatBindingSpec, sm::ServiceBinding>;

/// Pair each svcat resource with the first record whose ID equals its
/// external ID. Resources without a record are logged and dropped.
///
/// Output order is the order of `legacy`. Linear scan per resource; catalogs
/// are per cluster and small.
pub fn match_pairs<S, R>(
    legacy: Vec<Legacy<S>>,
    records: &[R],
    label: &str,
) -> Vec<MatchedPair<S, R>>
where
    S: ExternalRef,
    R: BrokerRecord + Clone,
{
    let mut pairs = Vec::with_capacity(legacy.len());
    for resource in legacy {
        let Some(record) = records.iter().find(|r| r.id() == resource.external_id()) else {
            info!(
                name = %resource.name(),
                namespace = %resource.namespace(),
                sm_id = %resource.external_id(),
                "svcat {} not found in SM, skipping it...",
                label
            );
            continue;
        };
        pairs.push(MatchedPair {
            record: record.clone(),
            legacy: resource,
        });
    }
    pairs
}

pub fn match_instances(
    legacy: Vec<Legacy<SvcatInstanceSpec>>,
    records: &[sm::ServiceInstance],
) -> Vec<InstancePair> {
    match_pairs(legacy, records, "instance")
}

pub fn match_bindings(
    legacy: Vec<Legacy<SvcatBindingSpec>>,
    records: &[sm::ServiceBinding],
) -> Vec<BindingPair> {
    match_pairs(legacy, records, "binding")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SvcatInstance;

    fn svcat_instance(name: &str, external_id: &str) -> SvcatInstance {
        SvcatInstance::parse(
            serde_json::from_value(serde_json::json!({
                "apiVersion": "servicecatalog.k8s.io/v1beta1",
                "kind": "ServiceInstance",
                "metadata": { "name": name, "namespace": "dev" },
                "spec": { "externalID": external_id }
            }))
            .unwrap(),
        )
        .unwrap()
    }

    fn sm_instance(id: &str, name: &str) -> sm::ServiceInstance {
        sm::ServiceInstance {
            id: id.to_string(),
            name: name.to_string(),
            service_plan_id: "p1".to_string(),
        }
    }

    #[test]
    fn pairs_by_external_id_and_drops_unmatched() {
        let legacy = vec![svcat_instance("svc-a", "abc"), svcat_instance("svc-b", "xyz")];
        let records = vec![sm_instance("other", "o"), sm_instance("abc", "db")];

        let pairs = match_instances(legacy, &records);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].legacy.name(), "svc-a");
        assert_eq!(pairs[0].record.id, "abc");
        assert_eq!(pairs[0].record.name, "db");
    }

    #[test]
    fn first_record_wins() {
        let legacy = vec![svcat_instance("svc-a", "abc")];
        let records = vec![sm_instance("abc", "first"), sm_instance("abc", "second")];

        let pairs = match_instances(legacy, &records);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].record.name, "first");
    }

    #[test]
    fn keeps_listing_order() {
        let legacy = vec![
            svcat_instance("c", "3"),
            svcat_instance("a", "1"),
            svcat_instance("b", "2"),
        ];
        let records = vec![sm_instance("1", "x"), sm_instance("2", "y"), sm_instance("3", "z")];

        let names: Vec<_> = match_instances(legacy, &records)
            .iter()
            .map(|p| p.legacy.name().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn every_pair_satisfies_id_equality() {
        let legacy: Vec<_> = (0..20)
            .map(|i| svcat_instance(&format!("svc-{i}"), &format!("id-{}", i % 7)))
            .collect();
        let records: Vec<_> = (0..5).map(|i| sm_instance(&format!("id-{i}"), "n")).collect();

        let pairs = match_instances(legacy, &records);

        // id-5 and id-6 have no record: svc-5, svc-6, svc-12, svc-13, svc-19
        assert_eq!(pairs.len(), 15);
        for pair in &pairs {
            assert_eq!(pair.record.id, pair.legacy.external_id());
        }
    }
}
