//! Batch calls against the trust domain API and per-item result handling.

use crate::federation_relationship::FederationRelationship;
use crate::prelude::{error, info, warn};
use crate::trust_domain_client::{ApiError, Status, TrustDomainClient};
use spiffe::spiffe_id::TrustDomain;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Marker for a pass interrupted by its cancellation token.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Cancelled;

/// Awaits `fut` unless `token` is cancelled first.
pub(crate) async fn or_cancelled<F: Future>(
    token: &CancellationToken,
    fut: F,
) -> Result<F::Output, Cancelled> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Cancelled),
        output = fut => Ok(output),
    }
}

/// The kind of batch call.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "Created",
            Self::Update => "Updated",
            Self::Delete => "Deleted",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Outcome of one batch call.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BatchReport {
    /// Trust domains the server reported as done.
    pub succeeded: Vec<TrustDomain>,
    /// Trust domains the server rejected, or that were in a failed call.
    pub failed: Vec<TrustDomain>,
    /// `true` if the call as a whole failed and no per-item result is known.
    pub call_failed: bool,
}

impl BatchReport {
    /// Returns `true` if no call was made.
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    fn call_failed(federation_relationships: &[FederationRelationship]) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: trust_domains(federation_relationships),
            call_failed: true,
        }
    }
}

fn trust_domains(federation_relationships: &[FederationRelationship]) -> Vec<TrustDomain> {
    federation_relationships
        .iter()
        .map(|fr| fr.trust_domain.clone())
        .collect()
}

/// Issues one batch call for `federation_relationships` and logs every item result.
///
/// A failed call or a rejected item is logged and reported, never returned as
/// an error; only cancellation interrupts the batch. No call is made for an
/// empty batch.
pub(crate) async fn dispatch(
    client: &dyn TrustDomainClient,
    operation: Operation,
    federation_relationships: &[FederationRelationship],
    cancellation_token: &CancellationToken,
) -> Result<BatchReport, Cancelled> {
    if federation_relationships.is_empty() {
        return Ok(BatchReport::default());
    }

    let result: Result<Vec<Status>, ApiError> = match operation {
        Operation::Create => {
            or_cancelled(
                cancellation_token,
                client.create_federation_relationships(federation_relationships),
            )
            .await?
        }
        Operation::Update => {
            or_cancelled(
                cancellation_token,
                client.update_federation_relationships(federation_relationships),
            )
            .await?
        }
        Operation::Delete => {
            let trust_domains = trust_domains(federation_relationships);
            or_cancelled(
                cancellation_token,
                client.delete_federation_relationships(&trust_domains),
            )
            .await?
        }
    };

    let statuses = match result {
        Ok(statuses) => statuses,
        Err(err) => {
            error!("Failed to {operation} federation relationships: {err}");
            return Ok(BatchReport::call_failed(federation_relationships));
        }
    };

    if statuses.len() != federation_relationships.len() {
        warn!(
            "Failed to {operation} federation relationships: expected {} results, got {}",
            federation_relationships.len(),
            statuses.len()
        );
        return Ok(BatchReport::call_failed(federation_relationships));
    }

    let mut report = BatchReport::default();
    for (federation_relationship, status) in federation_relationships.iter().zip(&statuses) {
        let trust_domain = federation_relationship.trust_domain.clone();
        match status.err() {
            None => {
                info!(
                    "{} federation relationship: {}",
                    operation.past_tense(),
                    federation_relationship.fields()
                );
                report.succeeded.push(trust_domain);
            }
            Some(err) => {
                error!(
                    "Failed to {operation} federation relationship: {}: {err}",
                    federation_relationship.fields()
                );
                report.failed.push(trust_domain);
            }
        }
    }

    Ok(report)
}
