//! X.509 certificate type used for the authorities of a trust bundle.

use crate::cert::errors::CertificateError;
use crate::cert::parsing::parse_single_der_certificate;
use std::convert::TryFrom;

pub mod errors;
pub(crate) mod parsing;

/// A single DER-encoded (binary format) X.509 certificate.
///
/// When an instance is created, it is checked that the bytes represent exactly
/// one parseable X.509 certificate with no trailing data.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    /// Returns the DER bytes of the certificate.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Certificate {
    type Error = CertificateError;

    fn try_from(der_bytes: &[u8]) -> Result<Self, Self::Error> {
        parse_single_der_certificate(der_bytes)?;
        Ok(Self(Vec::from(der_bytes)))
    }
}

impl TryFrom<Vec<u8>> for Certificate {
    type Error = CertificateError;

    fn try_from(der_bytes: Vec<u8>) -> Result<Self, Self::Error> {
        parse_single_der_certificate(&der_bytes)?;
        Ok(Self(der_bytes))
    }
}

#[cfg(test)]
mod certificate_tests {
    use super::*;

    #[test]
    fn test_rejects_bytes_that_are_not_a_certificate() {
        let result = Certificate::try_from(&b"not a certificate"[..]);

        assert!(matches!(
            result.unwrap_err(),
            CertificateError::ParseX509Certificate(..)
        ));
    }

    #[test]
    fn test_rejects_empty_input() {
        let result = Certificate::try_from(Vec::new());
        assert!(result.is_err());
    }
}
