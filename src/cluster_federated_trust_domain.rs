//! The `ClusterFederatedTrustDomain` declarative resource and its validation.
//!
//! A resource declares how the local trust domain federates with another
//! one. Its spec is parsed into a [`FederationRelationship`] both by the
//! admission predicate, which rejects bad input before it is stored, and by
//! the reconciler, which skips bad input that was stored anyway.

use crate::bundle::{BundleError, TrustDomainBundle};
use crate::federation_relationship::{
    BundleEndpointProfile, BundleEndpointUrl, BundleEndpointUrlError, FederationRelationship,
    HTTPS_SPIFFE_PROFILE, HTTPS_WEB_PROFILE,
};
use crate::prelude::info;
use serde::{Deserialize, Serialize};
use spiffe::spiffe_id::{SpiffeId, SpiffeIdError, TrustDomain};
use thiserror::Error;

/// Object metadata of a declarative resource.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Name of the resource. Cluster-scoped, so unique in the store.
    #[serde(default)]
    pub name: String,
}

/// A cluster-scoped declaration of a federation relationship.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterFederatedTrustDomain {
    /// Resource metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired federation relationship, as submitted by the operator.
    pub spec: ClusterFederatedTrustDomainSpec,
    /// Observed state.
    #[serde(default)]
    pub status: ClusterFederatedTrustDomainStatus,
}

/// Raw specification of a federation relationship.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFederatedTrustDomainSpec {
    /// Name of the federated trust domain, e.g. `example.org`.
    pub trust_domain: String,
    /// HTTPS URL of the federated trust domain's bundle endpoint.
    #[serde(rename = "bundleEndpointURL")]
    pub bundle_endpoint_url: String,
    /// How the bundle endpoint is authenticated.
    pub bundle_endpoint_profile: BundleEndpointProfileSpec,
    /// SPIFFE bundle document pinned for the trust domain. Empty for none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trust_domain_bundle: String,
}

/// Raw specification of a bundle endpoint profile.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BundleEndpointProfileSpec {
    /// Either `https_web` or `https_spiffe`.
    #[serde(rename = "type")]
    pub profile_type: String,
    /// Endpoint SPIFFE ID, required by `https_spiffe` and rejected by `https_web`.
    #[serde(
        rename = "endpointSPIFFEID",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub endpoint_spiffe_id: String,
}

/// Observed state of a [`ClusterFederatedTrustDomain`].
///
/// Nothing is reported yet; the type reserves the place for it.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterFederatedTrustDomainStatus {}

/// An error that can arise parsing a [`ClusterFederatedTrustDomainSpec`].
///
/// The first failing field wins; fields are checked in declaration order.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecError {
    /// `trustDomain` is not a valid trust domain name.
    #[error("invalid trustDomain value: {0}")]
    TrustDomain(#[source] SpiffeIdError),

    /// `bundleEndpointURL` is not an acceptable bundle endpoint URL.
    #[error("invalid bundleEndpointURL value: {0}")]
    BundleEndpointUrl(#[source] BundleEndpointUrlError),

    /// `endpointSPIFFEID` was set for the `https_web` profile.
    #[error("invalid endpointSPIFFEID value: not applicable to the \"https_web\" profile")]
    EndpointSpiffeIdNotApplicable,

    /// `endpointSPIFFEID` is not a valid SPIFFE ID.
    #[error("invalid endpointSPIFFEID value: {0}")]
    EndpointSpiffeId(#[source] SpiffeIdError),

    /// `bundleEndpointProfile.type` names an unknown profile.
    #[error("invalid type value {0:?}")]
    ProfileType(String),

    /// `trustDomainBundle` is not a valid bundle document.
    #[error("invalid trustDomainBundle value: {0}")]
    TrustDomainBundle(#[source] BundleError),
}

/// Parses a raw spec into a [`FederationRelationship`].
///
/// # Errors
///
/// Returns the [`SpecError`] for the first field that fails validation.
///
/// # Examples
///
/// ```
/// use spire_federation::cluster_federated_trust_domain::{
///     parse_cluster_federated_trust_domain_spec, BundleEndpointProfileSpec,
///     ClusterFederatedTrustDomainSpec,
/// };
///
/// let spec = ClusterFederatedTrustDomainSpec {
///     trust_domain: "example.org".to_string(),
///     bundle_endpoint_url: "https://example.org/bundle".to_string(),
///     bundle_endpoint_profile: BundleEndpointProfileSpec {
///         profile_type: "https_web".to_string(),
///         endpoint_spiffe_id: String::new(),
///     },
///     trust_domain_bundle: String::new(),
/// };
///
/// let relationship = parse_cluster_federated_trust_domain_spec(&spec).unwrap();
/// assert_eq!(relationship.trust_domain.to_string(), "example.org");
/// assert!(relationship.trust_domain_bundle.is_none());
/// ```
pub fn parse_cluster_federated_trust_domain_spec(
    spec: &ClusterFederatedTrustDomainSpec,
) -> Result<FederationRelationship, SpecError> {
    let trust_domain = TrustDomain::new(&spec.trust_domain).map_err(SpecError::TrustDomain)?;

    let bundle_endpoint_url = BundleEndpointUrl::parse(&spec.bundle_endpoint_url)
        .map_err(SpecError::BundleEndpointUrl)?;

    let profile = &spec.bundle_endpoint_profile;
    let bundle_endpoint_profile = match profile.profile_type.as_str() {
        HTTPS_WEB_PROFILE => {
            if !profile.endpoint_spiffe_id.is_empty() {
                return Err(SpecError::EndpointSpiffeIdNotApplicable);
            }
            BundleEndpointProfile::HttpsWeb
        }
        HTTPS_SPIFFE_PROFILE => BundleEndpointProfile::HttpsSpiffe {
            endpoint_spiffe_id: SpiffeId::new(&profile.endpoint_spiffe_id)
                .map_err(SpecError::EndpointSpiffeId)?,
        },
        other => return Err(SpecError::ProfileType(other.to_string())),
    };

    let trust_domain_bundle = if spec.trust_domain_bundle.is_empty() {
        None
    } else {
        Some(
            TrustDomainBundle::parse(trust_domain.clone(), spec.trust_domain_bundle.as_bytes())
                .map_err(SpecError::TrustDomainBundle)?,
        )
    };

    Ok(FederationRelationship {
        trust_domain,
        bundle_endpoint_url,
        bundle_endpoint_profile,
        trust_domain_bundle,
    })
}

/// Admission checks, run by the validating webhook on writes to the store.
impl ClusterFederatedTrustDomain {
    /// Validates a resource about to be created.
    ///
    /// # Errors
    ///
    /// Returns the [`SpecError`] that rejects the write.
    pub fn validate_create(&self) -> Result<(), SpecError> {
        info!("validate create: name={}", self.metadata.name);
        self.validate()
    }

    /// Validates a resource about to be updated. The previous version is not consulted.
    ///
    /// # Errors
    ///
    /// Returns the [`SpecError`] that rejects the write.
    pub fn validate_update(&self, _old: &ClusterFederatedTrustDomain) -> Result<(), SpecError> {
        info!("validate update: name={}", self.metadata.name);
        self.validate()
    }

    /// Deletes are not validated.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn validate_delete(&self) -> Result<(), SpecError> {
        Ok(())
    }

    fn validate(&self) -> Result<(), SpecError> {
        parse_cluster_federated_trust_domain_spec(&self.spec).map(|_| ())
    }
}
