//! Desired state: declared resources parsed and keyed by trust domain.

use crate::cluster_federated_trust_domain::{
    parse_cluster_federated_trust_domain_spec, ClusterFederatedTrustDomain,
    ClusterFederatedTrustDomainStatus, SpecError,
};
use crate::federation_relationship::FederationRelationship;
use crate::prelude::error;
use spiffe::spiffe_id::TrustDomain;
use std::collections::BTreeMap;

/// A declared resource that won its trust domain, with its parsed relationship.
#[derive(Debug, Clone)]
pub struct ClusterFederatedTrustDomainState {
    /// The resource as listed from the store.
    pub cluster_federated_trust_domain: ClusterFederatedTrustDomain,
    /// The relationship parsed from the resource spec.
    pub federation_relationship: FederationRelationship,
    /// Status to report back onto the resource.
    pub next_status: ClusterFederatedTrustDomainStatus,
}

/// A declared resource left out of the desired state.
#[derive(Debug)]
#[non_exhaustive]
pub enum IgnoredResource {
    /// The resource spec does not parse.
    Invalid {
        /// Name of the resource.
        name: String,
        /// Why the spec was rejected.
        error: SpecError,
    },
    /// Another resource listed earlier declares the same trust domain.
    Conflicting {
        /// Name of the resource.
        name: String,
        /// The trust domain both resources declare.
        trust_domain: TrustDomain,
        /// Name of the resource that was kept.
        conflicts_with: String,
    },
}

impl IgnoredResource {
    /// Returns the name of the ignored resource.
    pub fn name(&self) -> &str {
        match self {
            Self::Invalid { name, .. } | Self::Conflicting { name, .. } => name,
        }
    }
}

/// The conflict-resolved set of declared relationships.
#[derive(Debug, Default)]
pub struct DesiredState {
    states: BTreeMap<TrustDomain, ClusterFederatedTrustDomainState>,
    ignored: Vec<IgnoredResource>,
}

impl DesiredState {
    /// Builds the desired state from resources in store listing order.
    ///
    /// Resources whose spec does not parse are skipped. When several resources
    /// declare the same trust domain, the first one listed is kept and the
    /// others are skipped. Every skipped resource is logged.
    pub fn collect(cluster_federated_trust_domains: Vec<ClusterFederatedTrustDomain>) -> Self {
        let mut out = Self::default();

        for cluster_federated_trust_domain in cluster_federated_trust_domains {
            let name = cluster_federated_trust_domain.metadata.name.clone();

            let federation_relationship =
                match parse_cluster_federated_trust_domain_spec(&cluster_federated_trust_domain.spec)
                {
                    Ok(federation_relationship) => federation_relationship,
                    Err(err) => {
                        error!(
                            "Ignoring invalid ClusterFederatedTrustDomain: cluster_federated_trust_domain={name}: {err}"
                        );
                        out.ignored.push(IgnoredResource::Invalid { name, error: err });
                        continue;
                    }
                };

            let trust_domain = federation_relationship.trust_domain.clone();
            if let Some(existing) = out.states.get(&trust_domain) {
                let conflicts_with = existing.cluster_federated_trust_domain.metadata.name.clone();
                error!(
                    "Ignoring ClusterFederatedTrustDomain with conflicting trust domain: cluster_federated_trust_domain={name} trust_domain={trust_domain} conflict_with={conflicts_with}"
                );
                out.ignored.push(IgnoredResource::Conflicting {
                    name,
                    trust_domain,
                    conflicts_with,
                });
                continue;
            }

            out.states.insert(
                trust_domain,
                ClusterFederatedTrustDomainState {
                    cluster_federated_trust_domain,
                    federation_relationship,
                    next_status: ClusterFederatedTrustDomainStatus::default(),
                },
            );
        }

        out
    }

    /// Returns the winning state for `trust_domain`.
    pub fn get(&self, trust_domain: &TrustDomain) -> Option<&ClusterFederatedTrustDomainState> {
        self.states.get(trust_domain)
    }

    /// Returns the winning states, ordered by trust domain.
    pub fn states(&self) -> impl Iterator<Item = &ClusterFederatedTrustDomainState> {
        self.states.values()
    }

    /// Returns the declared relationships keyed by trust domain.
    pub fn federation_relationships(&self) -> BTreeMap<TrustDomain, FederationRelationship> {
        self.states
            .iter()
            .map(|(trust_domain, state)| {
                (trust_domain.clone(), state.federation_relationship.clone())
            })
            .collect()
    }

    /// Returns the resources left out, in listing order.
    pub fn ignored(&self) -> &[IgnoredResource] {
        &self.ignored
    }

    /// Consumes the state, returning the resources left out.
    pub fn into_ignored(self) -> Vec<IgnoredResource> {
        self.ignored
    }

    /// Returns the number of trust domains in the desired state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no trust domain is desired.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod desired_state_tests {
    use super::*;
    use crate::cluster_federated_trust_domain::{
        BundleEndpointProfileSpec, ClusterFederatedTrustDomainSpec, ObjectMeta,
    };

    fn resource(name: &str, trust_domain: &str, url: &str) -> ClusterFederatedTrustDomain {
        ClusterFederatedTrustDomain {
            metadata: ObjectMeta {
                name: name.to_string(),
            },
            spec: ClusterFederatedTrustDomainSpec {
                trust_domain: trust_domain.to_string(),
                bundle_endpoint_url: url.to_string(),
                bundle_endpoint_profile: BundleEndpointProfileSpec {
                    profile_type: "https_web".to_string(),
                    endpoint_spiffe_id: String::new(),
                },
                trust_domain_bundle: String::new(),
            },
            status: ClusterFederatedTrustDomainStatus::default(),
        }
    }

    fn td(s: &str) -> TrustDomain {
        TrustDomain::new(s).unwrap()
    }

    #[test]
    fn test_collect_keys_by_trust_domain() {
        let desired = DesiredState::collect(vec![
            resource("b", "b.test", "https://b.test"),
            resource("a", "a.test", "https://a.test"),
        ]);

        assert_eq!(desired.len(), 2);
        assert!(desired.ignored().is_empty());
        let names: Vec<&str> = desired
            .states()
            .map(|s| s.cluster_federated_trust_domain.metadata.name.as_str())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_first_listed_resource_wins_conflict() {
        let desired = DesiredState::collect(vec![
            resource("first", "x.test", "https://first.x.test"),
            resource("second", "x.test", "https://second.x.test"),
        ]);

        assert_eq!(desired.len(), 1);
        let state = desired.get(&td("x.test")).unwrap();
        assert_eq!(state.cluster_federated_trust_domain.metadata.name, "first");
        assert_eq!(
            state.federation_relationship.bundle_endpoint_url.as_str(),
            "https://first.x.test/"
        );

        match desired.ignored() {
            [IgnoredResource::Conflicting {
                name,
                trust_domain,
                conflicts_with,
            }] => {
                assert_eq!(name, "second");
                assert_eq!(trust_domain, &td("x.test"));
                assert_eq!(conflicts_with, "first");
            }
            other => panic!("unexpected ignored resources: {other:?}"),
        }
    }

    #[test]
    fn test_conflict_detected_across_equivalent_spellings() {
        let desired = DesiredState::collect(vec![
            resource("name", "x.test", "https://x.test"),
            resource("id", "spiffe://x.test", "https://x.test"),
        ]);

        assert_eq!(desired.len(), 1);
        assert_eq!(desired.ignored().len(), 1);
        assert_eq!(desired.ignored()[0].name(), "id");
    }

    #[test]
    fn test_invalid_resource_is_skipped() {
        let desired = DesiredState::collect(vec![
            resource("bad", "x.test", "http://x.test"),
            resource("good", "x.test", "https://x.test"),
        ]);

        assert_eq!(desired.len(), 1);
        assert_eq!(
            desired
                .get(&td("x.test"))
                .unwrap()
                .cluster_federated_trust_domain
                .metadata
                .name,
            "good"
        );
        assert!(matches!(
            desired.ignored(),
            [IgnoredResource::Invalid {
                error: SpecError::BundleEndpointUrl(_),
                ..
            }]
        ));
    }

    #[test]
    fn test_federation_relationships_map() {
        let desired = DesiredState::collect(vec![resource("a", "a.test", "https://a.test")]);

        let relationships = desired.federation_relationships();
        assert_eq!(relationships.len(), 1);
        assert_eq!(
            relationships[&td("a.test")],
            desired.get(&td("a.test")).unwrap().federation_relationship
        );
    }

    #[test]
    fn test_collect_empty() {
        let desired = DesiredState::collect(Vec::new());
        assert!(desired.is_empty());
        assert!(desired.into_ignored().is_empty());
    }
}
