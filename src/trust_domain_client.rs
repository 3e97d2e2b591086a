//! Contracts of the collaborators a reconciliation pass talks to.
//!
//! [`TrustDomainClient`] is the federation relationship half of the SPIRE
//! Server trust domain API. [`ClusterFederatedTrustDomainLister`] supplies the
//! declared resources. Transports are provided by the embedding application.

use crate::cluster_federated_trust_domain::ClusterFederatedTrustDomain;
use crate::federation_relationship::FederationRelationship;
use async_trait::async_trait;
use spiffe::spiffe_id::TrustDomain;
use std::error::Error as StdError;
use thiserror::Error;
use tonic::Code;

/// Result of one item of a batch call, in the position of the item it answers.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Status {
    /// Outcome code. Anything but [`Code::Ok`] is a failure.
    pub code: Code,
    /// Detail reported by the server for a failure.
    pub message: String,
}

impl Status {
    /// A successful item result.
    pub fn ok() -> Self {
        Self {
            code: Code::Ok,
            message: String::new(),
        }
    }

    /// A failed item result.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` if the item succeeded.
    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    /// Returns the failure as an error, or `None` for a successful item.
    pub fn err(&self) -> Option<StatusError> {
        (!self.is_ok()).then(|| StatusError {
            code: self.code,
            message: self.message.clone(),
        })
    }
}

/// Failure of a single batch item.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("status: {code:?}, message: {message:?}")]
pub struct StatusError {
    /// Failure code.
    pub code: Code,
    /// Detail reported by the server.
    pub message: String,
}

/// An error returned by a collaborator call as a whole.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The call was answered with a non-OK gRPC status.
    #[error("gRPC status: {0}")]
    Grpc(#[from] tonic::Status),

    /// The call could not be carried out by the transport.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),
}

impl ApiError {
    /// Wraps a transport-specific error.
    pub fn transport(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }
}

/// Federation relationship operations of the SPIRE Server trust domain API.
///
/// Batch methods return one [`Status`] per input item, in input order.
#[async_trait]
pub trait TrustDomainClient: Send + Sync {
    /// Lists all federation relationships the server currently holds.
    async fn list_federation_relationships(
        &self,
    ) -> Result<Vec<FederationRelationship>, ApiError>;

    /// Creates the given federation relationships.
    async fn create_federation_relationships(
        &self,
        federation_relationships: &[FederationRelationship],
    ) -> Result<Vec<Status>, ApiError>;

    /// Replaces the given federation relationships, keyed by trust domain.
    async fn update_federation_relationships(
        &self,
        federation_relationships: &[FederationRelationship],
    ) -> Result<Vec<Status>, ApiError>;

    /// Deletes the federation relationships with the given trust domains.
    async fn delete_federation_relationships(
        &self,
        trust_domains: &[TrustDomain],
    ) -> Result<Vec<Status>, ApiError>;
}

/// Supplier of the declared [`ClusterFederatedTrustDomain`] resources.
#[async_trait]
pub trait ClusterFederatedTrustDomainLister: Send + Sync {
    /// Lists every declared resource, in store order.
    async fn list_cluster_federated_trust_domains(
        &self,
    ) -> Result<Vec<ClusterFederatedTrustDomain>, ApiError>;
}

#[cfg(test)]
mod status_tests {
    use super::*;

    #[test]
    fn test_ok_status_has_no_error() {
        let status = Status::ok();
        assert!(status.is_ok());
        assert!(status.err().is_none());
    }

    #[test]
    fn test_failed_status_error() {
        let status = Status::new(Code::AlreadyExists, "relationship already exists");
        assert!(!status.is_ok());

        let err = status.err().unwrap();
        assert_eq!(err.code, Code::AlreadyExists);
        assert_eq!(
            err.to_string(),
            "status: AlreadyExists, message: \"relationship already exists\""
        );
    }

    #[test]
    fn test_api_error_from_grpc_status() {
        let err = ApiError::from(tonic::Status::unavailable("connection refused"));
        assert!(matches!(err, ApiError::Grpc(ref s) if s.code() == Code::Unavailable));
    }

    #[test]
    fn test_api_error_transport() {
        let err = ApiError::transport("socket closed");
        assert_eq!(err.to_string(), "transport error: socket closed");
    }
}
