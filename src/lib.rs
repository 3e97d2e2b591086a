#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! This library reconciles declared SPIRE [federation relationships](https://spiffe.io/docs/latest/architecture/federation/readme/)
//! with the ones held by a SPIRE Server. Relationships are declared as
//! `ClusterFederatedTrustDomain` resources and pushed through the federation
//! relationship operations of the SPIRE Server trust domain API.
//!
//! # Examples
//!
//! ```no_run
//! use spire_federation::cluster_federated_trust_domain::{
//!     parse_cluster_federated_trust_domain_spec, ClusterFederatedTrustDomainSpec,
//! };
//! use spire_federation::reconciler::Reconciler;
//! use spire_federation::trust_domain_client::{ClusterFederatedTrustDomainLister, TrustDomainClient};
//! use std::error::Error;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn some_function(
//! #     client: Arc<impl TrustDomainClient + 'static>,
//! #     lister: Arc<impl ClusterFederatedTrustDomainLister + 'static>,
//! #     spec: ClusterFederatedTrustDomainSpec,
//! # ) -> Result<(), Box<dyn Error>> {
//!
//! // validate a declared spec, as an admission check would
//! let federation_relationship = parse_cluster_federated_trust_domain_spec(&spec)?;
//! println!("{}", federation_relationship.fields());
//!
//! // build a reconciler from a trust domain API client and a resource lister
//! let reconciler = Reconciler::builder()
//!     .trust_domain_client(client)
//!     .cluster_federated_trust_domains(lister)
//!     .build()?;
//!
//! // run a single pass
//! let report = reconciler.reconcile(&CancellationToken::new()).await?;
//! for ignored in &report.ignored {
//!     println!("ignored {}", ignored.name());
//! }
//!
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod cert;
pub mod cluster_federated_trust_domain;
pub mod federation_relationship;
mod observability;
mod prelude;
pub mod reconciler;
pub mod trust_domain_client;

pub use crate::bundle::{BundleError, JwtAuthority, TrustDomainBundle};
pub use crate::cert::Certificate;
pub use crate::cluster_federated_trust_domain::{
    parse_cluster_federated_trust_domain_spec, ClusterFederatedTrustDomain,
    ClusterFederatedTrustDomainSpec, SpecError,
};
pub use crate::federation_relationship::{
    BundleEndpointProfile, BundleEndpointUrl, FederationRelationship,
};
pub use crate::reconciler::{ReconcileError, ReconcileReport, Reconciler, ReconcilerBuilder};
pub use crate::trust_domain_client::{
    ApiError, ClusterFederatedTrustDomainLister, Status, TrustDomainClient,
};
pub use spiffe::spiffe_id::{SpiffeId, TrustDomain};
