//! Reconciliation of declared federation relationships with the SPIRE Server.
//!
//! A pass lists the relationships the server holds and the declared
//! [`ClusterFederatedTrustDomain`](crate::cluster_federated_trust_domain::ClusterFederatedTrustDomain)
//! resources, computes a [`Diff`], and then issues the delete, create and
//! update batches. Nothing is kept between passes: each pass starts from
//! freshly listed state, so a failed item is simply retried on the next one.
//!
//! Deciding *when* to run a pass belongs to the caller, which must not run two
//! passes of the same [`Reconciler`] at once. [`Reconciler::gc_interval`]
//! is the idle interval it should wait before forcing a pass.
//!
//! # Examples
//!
//! ```no_run
//! use spire_federation::reconciler::Reconciler;
//! use spire_federation::trust_domain_client::{ClusterFederatedTrustDomainLister, TrustDomainClient};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(
//! #     client: Arc<impl TrustDomainClient + 'static>,
//! #     lister: Arc<impl ClusterFederatedTrustDomainLister + 'static>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let reconciler = Reconciler::builder()
//!     .trust_domain_client(client)
//!     .cluster_federated_trust_domains(lister)
//!     .gc_interval(Duration::from_secs(30))
//!     .build()?;
//!
//! let report = reconciler.reconcile(&CancellationToken::new()).await?;
//! println!("created {} relationships", report.created.succeeded.len());
//! # Ok(())
//! # }
//! ```

mod diff;
mod dispatch;
mod state;

pub use diff::Diff;
pub use dispatch::BatchReport;
pub use state::{ClusterFederatedTrustDomainState, DesiredState, IgnoredResource};

use crate::federation_relationship::FederationRelationship;
use crate::prelude::{debug, error, info};
use crate::trust_domain_client::{ApiError, ClusterFederatedTrustDomainLister, TrustDomainClient};
use dispatch::{dispatch, or_cancelled, Cancelled, Operation};
use spiffe::spiffe_id::TrustDomain;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Idle interval used when none is configured.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10);

/// An error that ends a reconciliation pass before any change is dispatched,
/// or interrupts it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReconcileError {
    /// Listing the relationships held by the server failed.
    #[error("failed to list SPIRE federation relationships: {0}")]
    ListFederationRelationships(#[source] ApiError),

    /// Listing the declared resources failed.
    #[error("failed to list ClusterFederatedTrustDomains: {0}")]
    ListClusterFederatedTrustDomains(#[source] ApiError),

    /// The pass was cancelled. Changes already acknowledged by the server are kept.
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl From<Cancelled> for ReconcileError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// An error that can arise building a [`Reconciler`].
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ReconcilerBuilderError {
    /// No [`TrustDomainClient`] was configured.
    #[error("missing trust domain client")]
    MissingTrustDomainClient,

    /// No [`ClusterFederatedTrustDomainLister`] was configured.
    #[error("missing ClusterFederatedTrustDomain lister")]
    MissingClusterFederatedTrustDomainLister,
}

/// What a completed pass did.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Result of the delete batch.
    pub deleted: BatchReport,
    /// Result of the create batch.
    pub created: BatchReport,
    /// Result of the update batch.
    pub updated: BatchReport,
    /// Declared resources left out of the desired state.
    pub ignored: Vec<IgnoredResource>,
}

impl ReconcileReport {
    /// Returns `true` if the pass issued no batch call.
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty() && self.created.is_empty() && self.updated.is_empty()
    }

    /// Returns `true` if any call or item failed.
    pub fn has_failures(&self) -> bool {
        [&self.deleted, &self.created, &self.updated]
            .iter()
            .any(|batch| batch.call_failed || !batch.failed.is_empty())
    }
}

/// Builder for [`Reconciler`].
#[derive(Default)]
pub struct ReconcilerBuilder {
    trust_domain_client: Option<Arc<dyn TrustDomainClient>>,
    cluster_federated_trust_domains: Option<Arc<dyn ClusterFederatedTrustDomainLister>>,
    gc_interval: Option<Duration>,
}

impl Debug for ReconcilerBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerBuilder")
            .field(
                "trust_domain_client",
                &self.trust_domain_client.as_ref().map(|_| "<TrustDomainClient>"),
            )
            .field(
                "cluster_federated_trust_domains",
                &self
                    .cluster_federated_trust_domains
                    .as_ref()
                    .map(|_| "<ClusterFederatedTrustDomainLister>"),
            )
            .field("gc_interval", &self.gc_interval)
            .finish()
    }
}

impl ReconcilerBuilder {
    /// Sets the client for the SPIRE Server trust domain API.
    #[must_use]
    pub fn trust_domain_client(mut self, client: Arc<dyn TrustDomainClient>) -> Self {
        self.trust_domain_client = Some(client);
        self
    }

    /// Sets the supplier of declared resources.
    #[must_use]
    pub fn cluster_federated_trust_domains(
        mut self,
        lister: Arc<dyn ClusterFederatedTrustDomainLister>,
    ) -> Self {
        self.cluster_federated_trust_domains = Some(lister);
        self
    }

    /// Sets how long the scheduler stays idle before forcing a pass.
    ///
    /// Defaults to [`DEFAULT_GC_INTERVAL`].
    #[must_use]
    pub fn gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = Some(gc_interval);
        self
    }

    /// Builds the [`Reconciler`].
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcilerBuilderError`] if a collaborator is missing.
    pub fn build(self) -> Result<Reconciler, ReconcilerBuilderError> {
        Ok(Reconciler {
            trust_domain_client: self
                .trust_domain_client
                .ok_or(ReconcilerBuilderError::MissingTrustDomainClient)?,
            cluster_federated_trust_domains: self
                .cluster_federated_trust_domains
                .ok_or(ReconcilerBuilderError::MissingClusterFederatedTrustDomainLister)?,
            gc_interval: self.gc_interval.unwrap_or(DEFAULT_GC_INTERVAL),
        })
    }
}

/// Converges the server's federation relationships towards the declared ones.
pub struct Reconciler {
    trust_domain_client: Arc<dyn TrustDomainClient>,
    cluster_federated_trust_domains: Arc<dyn ClusterFederatedTrustDomainLister>,
    gc_interval: Duration,
}

impl Debug for Reconciler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("gc_interval", &self.gc_interval)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Returns a [`ReconcilerBuilder`].
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::default()
    }

    /// Returns the idle interval configured for the scheduler.
    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    /// Runs one reconciliation pass.
    ///
    /// Failures of single items, or of a whole batch call, are logged and
    /// reported in the returned [`ReconcileReport`]; the remaining items and
    /// batches still run.
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcileError`] if either listing fails, in which case
    /// nothing is dispatched, or if `cancellation_token` is cancelled.
    pub async fn reconcile(
        &self,
        cancellation_token: &CancellationToken,
    ) -> Result<ReconcileReport, ReconcileError> {
        let result = self.run(cancellation_token).await;
        if let Err(err) = &result {
            error!("Reconciliation pass aborted: {err}");
        }
        result
    }

    async fn run(
        &self,
        cancellation_token: &CancellationToken,
    ) -> Result<ReconcileReport, ReconcileError> {
        debug!("Listing federation relationships");
        let current = self.list_federation_relationships(cancellation_token).await?;

        let cluster_federated_trust_domains = or_cancelled(
            cancellation_token,
            self.cluster_federated_trust_domains
                .list_cluster_federated_trust_domains(),
        )
        .await?
        .map_err(ReconcileError::ListClusterFederatedTrustDomains)?;
        let desired = DesiredState::collect(cluster_federated_trust_domains);

        let diff = Diff::compute(&current, &desired.federation_relationships());
        debug!(
            "Computed federation relationship changes: delete={} create={} update={}",
            diff.to_delete.len(),
            diff.to_create.len(),
            diff.to_update.len()
        );

        let client = self.trust_domain_client.as_ref();
        let deleted = dispatch(client, Operation::Delete, &diff.to_delete, cancellation_token).await?;
        let created = dispatch(client, Operation::Create, &diff.to_create, cancellation_token).await?;
        let updated = dispatch(client, Operation::Update, &diff.to_update, cancellation_token).await?;

        // TODO: write `next_status` back onto the resources once status reporting exists.
        let report = ReconcileReport {
            deleted,
            created,
            updated,
            ignored: desired.into_ignored(),
        };
        if !report.is_noop() {
            info!(
                "Reconciled federation relationships: deleted={} created={} updated={} failed={}",
                report.deleted.succeeded.len(),
                report.created.succeeded.len(),
                report.updated.succeeded.len(),
                report.deleted.failed.len() + report.created.failed.len() + report.updated.failed.len()
            );
        }
        Ok(report)
    }

    async fn list_federation_relationships(
        &self,
        cancellation_token: &CancellationToken,
    ) -> Result<BTreeMap<TrustDomain, FederationRelationship>, ReconcileError> {
        let federation_relationships = or_cancelled(
            cancellation_token,
            self.trust_domain_client.list_federation_relationships(),
        )
        .await?
        .map_err(ReconcileError::ListFederationRelationships)?;

        Ok(federation_relationships
            .into_iter()
            .map(|fr| (fr.trust_domain.clone(), fr))
            .collect())
    }
}
