//! Three-way comparison of current and desired federation relationships.

use crate::federation_relationship::FederationRelationship;
use spiffe::spiffe_id::TrustDomain;
use std::collections::BTreeMap;

/// Work needed to turn the current relationships into the desired ones.
///
/// Each list is ordered by trust domain and no trust domain appears in more
/// than one list.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Diff {
    /// Current relationships whose trust domain is no longer desired.
    pub to_delete: Vec<FederationRelationship>,
    /// Desired relationships whose trust domain does not exist yet.
    pub to_create: Vec<FederationRelationship>,
    /// Desired relationships that differ from the current one for their trust domain.
    pub to_update: Vec<FederationRelationship>,
}

impl Diff {
    /// Compares `current` against `desired`.
    ///
    /// A trust domain present in both maps with equal relationships needs no work.
    pub fn compute(
        current: &BTreeMap<TrustDomain, FederationRelationship>,
        desired: &BTreeMap<TrustDomain, FederationRelationship>,
    ) -> Self {
        let mut diff = Self::default();

        for (trust_domain, federation_relationship) in current {
            if !desired.contains_key(trust_domain) {
                diff.to_delete.push(federation_relationship.clone());
            }
        }

        for (trust_domain, federation_relationship) in desired {
            match current.get(trust_domain) {
                None => diff.to_create.push(federation_relationship.clone()),
                Some(existing) if existing != federation_relationship => {
                    diff.to_update.push(federation_relationship.clone())
                }
                Some(_) => {}
            }
        }

        diff
    }

    /// Returns `true` if there is nothing to delete, create or update.
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty() && self.to_update.is_empty()
    }
}

#[cfg(test)]
mod diff_tests {
    use super::*;
    use crate::federation_relationship::{BundleEndpointProfile, BundleEndpointUrl};

    fn relationship(trust_domain: &str, version: u32) -> FederationRelationship {
        FederationRelationship {
            trust_domain: TrustDomain::new(trust_domain).unwrap(),
            bundle_endpoint_url: BundleEndpointUrl::parse(&format!(
                "https://{trust_domain}/v{version}"
            ))
            .unwrap(),
            bundle_endpoint_profile: BundleEndpointProfile::HttpsWeb,
            trust_domain_bundle: None,
        }
    }

    fn map(entries: &[(&str, u32)]) -> BTreeMap<TrustDomain, FederationRelationship> {
        entries
            .iter()
            .map(|&(td, version)| {
                let fr = relationship(td, version);
                (fr.trust_domain.clone(), fr)
            })
            .collect()
    }

    fn trust_domains(relationships: &[FederationRelationship]) -> Vec<String> {
        relationships
            .iter()
            .map(|fr| fr.trust_domain.to_string())
            .collect()
    }

    #[test]
    fn test_delete_create_update() {
        let current = map(&[("a.test", 1), ("b.test", 1), ("c.test", 1)]);
        let desired = map(&[("b.test", 1), ("c.test", 2), ("d.test", 1)]);

        let diff = Diff::compute(&current, &desired);

        assert_eq!(trust_domains(&diff.to_delete), ["a.test"]);
        assert_eq!(trust_domains(&diff.to_create), ["d.test"]);
        assert_eq!(trust_domains(&diff.to_update), ["c.test"]);
        assert_eq!(diff.to_update[0], relationship("c.test", 2));
    }

    #[test]
    fn test_equal_states_need_no_work() {
        let current = map(&[("a.test", 1), ("b.test", 3)]);
        let diff = Diff::compute(&current, &current.clone());

        assert!(diff.is_empty());
        assert_eq!(diff, Diff::default());
    }

    #[test]
    fn test_empty_desired_deletes_everything_in_order() {
        let current = map(&[("c.test", 1), ("a.test", 1), ("b.test", 1)]);
        let diff = Diff::compute(&current, &BTreeMap::new());

        assert_eq!(trust_domains(&diff.to_delete), ["a.test", "b.test", "c.test"]);
        assert!(diff.to_create.is_empty());
        assert!(diff.to_update.is_empty());
    }

    #[test]
    fn test_empty_current_creates_everything_in_order() {
        let desired = map(&[("z.test", 1), ("m.test", 1)]);
        let diff = Diff::compute(&BTreeMap::new(), &desired);

        assert_eq!(trust_domains(&diff.to_create), ["m.test", "z.test"]);
        assert!(diff.to_delete.is_empty());
        assert!(diff.to_update.is_empty());
    }

    #[test]
    fn test_profile_change_is_an_update() {
        let current = map(&[("a.test", 1)]);
        let mut desired = current.clone();
        let fr = desired.values_mut().next().unwrap();
        fr.bundle_endpoint_profile = BundleEndpointProfile::HttpsSpiffe {
            endpoint_spiffe_id: spiffe::spiffe_id::SpiffeId::new("spiffe://a.test/server")
                .unwrap(),
        };

        let diff = Diff::compute(&current, &desired);
        assert_eq!(trust_domains(&diff.to_update), ["a.test"]);
    }
}
