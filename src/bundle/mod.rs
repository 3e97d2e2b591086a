//! SPIFFE trust bundle documents.
//!
//! A bundle document is a JWKS (RFC 7517) carrying the X.509 and JWT
//! authorities of a trust domain, as described by the
//! [SPIFFE Trust Domain and Bundle](https://github.com/spiffe/spiffe/blob/main/standards/SPIFFE_Trust_Domain_and_Bundle.md#4-spiffe-bundle-format)
//! standard.

use crate::cert::errors::CertificateError;
use crate::cert::Certificate;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use spiffe::spiffe_id::TrustDomain;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::time::Duration;
use thiserror::Error;

const X509_SVID_USE: &str = "x509-svid";
const JWT_SVID_USE: &str = "jwt-svid";

/// A single JWT authority: a public key identified by its key ID.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JwtAuthority {
    key_id: String,
    jwk: Value,
}

impl JwtAuthority {
    /// Returns the key ID (`kid`).
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the JWK as a JSON value, without the bundle-level `use` member.
    pub fn jwk(&self) -> &Value {
        &self.jwk
    }
}

/// The trust material (X.509 and JWT authorities) of a single [`TrustDomain`].
///
/// Two bundles are equal when they belong to the same trust domain and carry
/// the same sequence number, refresh hint and authorities. X.509 authorities
/// are compared in order, JWT authorities by key ID.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TrustDomainBundle {
    trust_domain: TrustDomain,
    x509_authorities: Vec<Certificate>,
    jwt_authorities: BTreeMap<String, JwtAuthority>,
    sequence_number: Option<u64>,
    refresh_hint: Option<Duration>,
}

/// An error that can arise parsing a [`TrustDomainBundle`] from a bundle document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BundleError {
    /// The document is not a JSON object with the expected members.
    #[error("cannot deserialize bundle document: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// The required `keys` member is missing.
    #[error("no authorities found")]
    NoAuthorities,

    /// A key entry is not a JSON object.
    #[error("key entry {index} is not a JSON object")]
    InvalidKeyEntry {
        /// Position of the entry in `keys`.
        index: usize,
    },

    /// The `x5c` member of a key entry is not an array of strings.
    #[error("x5c of key entry {index} is not an array of strings")]
    InvalidCertificateEntry {
        /// Position of the entry in `keys`.
        index: usize,
    },

    /// An `x509-svid` entry must carry exactly one certificate in `x5c`.
    #[error("expected a single certificate in x509-svid entry {index}; got {count}")]
    X509CertificateCount {
        /// Position of the entry in `keys`.
        index: usize,
        /// Number of certificates found.
        count: usize,
    },

    /// The `x5c` value of an `x509-svid` entry is not valid base64.
    #[error("cannot decode certificate of x509-svid entry {index}")]
    Base64 {
        /// Position of the entry in `keys`.
        index: usize,
        /// Underlying decoding error.
        #[source]
        source: base64::DecodeError,
    },

    /// The `x5c` value of an `x509-svid` entry is not an X.509 certificate.
    #[error("invalid certificate in x509-svid entry {index}")]
    Certificate {
        /// Position of the entry in `keys`.
        index: usize,
        /// Underlying parsing error.
        #[source]
        source: CertificateError,
    },

    /// A `jwt-svid` entry has no (or an empty) `kid`.
    #[error("missing key ID in jwt-svid entry {index}")]
    MissingKeyId {
        /// Position of the entry in `keys`.
        index: usize,
    },

    /// A `jwt-svid` entry has no `kty`.
    #[error("missing key type in jwt-svid entry {index}")]
    MissingKeyType {
        /// Position of the entry in `keys`.
        index: usize,
    },
}

#[derive(Deserialize)]
struct BundleDocument {
    keys: Option<Vec<Value>>,
    spiffe_sequence: Option<u64>,
    spiffe_refresh_hint: Option<u64>,
}

impl TrustDomainBundle {
    /// Creates an empty bundle for the given [`TrustDomain`].
    pub fn new(trust_domain: TrustDomain) -> Self {
        Self {
            trust_domain,
            x509_authorities: Vec::new(),
            jwt_authorities: BTreeMap::new(),
            sequence_number: None,
            refresh_hint: None,
        }
    }

    /// Parses a SPIFFE bundle document and scopes it to `trust_domain`.
    ///
    /// Keys with `"use": "x509-svid"` must carry exactly one base64 DER
    /// certificate in `x5c`. Keys with `"use": "jwt-svid"` must carry a
    /// non-empty `kid` and a `kty`. Keys with any other use are ignored.
    ///
    /// # Errors
    ///
    /// If the document cannot be parsed, a [`BundleError`] variant is returned.
    pub fn parse(trust_domain: TrustDomain, document: &[u8]) -> Result<Self, BundleError> {
        let document: BundleDocument = serde_json::from_slice(document)?;

        let mut bundle = Self::new(trust_domain);
        bundle.sequence_number = document.spiffe_sequence;
        bundle.refresh_hint = document.spiffe_refresh_hint.map(Duration::from_secs);

        let keys = document.keys.ok_or(BundleError::NoAuthorities)?;
        for (index, key) in keys.into_iter().enumerate() {
            let Value::Object(mut key) = key else {
                return Err(BundleError::InvalidKeyEntry { index });
            };

            let certs: Vec<&str> = match key.get("x5c") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(certs)) => certs
                    .iter()
                    .map(Value::as_str)
                    .collect::<Option<_>>()
                    .ok_or(BundleError::InvalidCertificateEntry { index })?,
                Some(_) => return Err(BundleError::InvalidCertificateEntry { index }),
            };

            match key.get("use").and_then(Value::as_str) {
                Some(X509_SVID_USE) => {
                    if certs.len() != 1 {
                        return Err(BundleError::X509CertificateCount {
                            index,
                            count: certs.len(),
                        });
                    }

                    let der = STANDARD
                        .decode(certs[0])
                        .map_err(|source| BundleError::Base64 { index, source })?;
                    let certificate = Certificate::try_from(der)
                        .map_err(|source| BundleError::Certificate { index, source })?;
                    bundle.add_x509_authority(certificate);
                }
                Some(JWT_SVID_USE) => {
                    let key_id = match key.get("kid").and_then(Value::as_str) {
                        Some(kid) if !kid.is_empty() => kid.to_owned(),
                        _ => return Err(BundleError::MissingKeyId { index }),
                    };
                    if key.get("kty").and_then(Value::as_str).is_none() {
                        return Err(BundleError::MissingKeyType { index });
                    }

                    key.remove("use");
                    bundle.jwt_authorities.insert(
                        key_id.clone(),
                        JwtAuthority {
                            key_id,
                            jwk: Value::Object(key),
                        },
                    );
                }
                _ => {}
            }
        }

        Ok(bundle)
    }

    /// Adds an X.509 authority unless the bundle already holds it.
    pub fn add_x509_authority(&mut self, certificate: Certificate) {
        if !self.x509_authorities.contains(&certificate) {
            self.x509_authorities.push(certificate);
        }
    }

    /// Returns the [`TrustDomain`] associated to the bundle.
    pub fn trust_domain(&self) -> &TrustDomain {
        &self.trust_domain
    }

    /// Returns the X.509 authorities in the bundle.
    pub fn x509_authorities(&self) -> &[Certificate] {
        &self.x509_authorities
    }

    /// Returns an iterator over the JWT authorities, ordered by key ID.
    pub fn jwt_authorities(&self) -> impl Iterator<Item = &JwtAuthority> {
        self.jwt_authorities.values()
    }

    /// Returns the JWT authority with the given key ID.
    pub fn find_jwt_authority(&self, key_id: &str) -> Option<&JwtAuthority> {
        self.jwt_authorities.get(key_id)
    }

    /// Returns the `spiffe_sequence` of the document, if present.
    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    /// Returns the `spiffe_refresh_hint` of the document, if present.
    pub fn refresh_hint(&self) -> Option<Duration> {
        self.refresh_hint
    }
}
