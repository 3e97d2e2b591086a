//! Error type for X.509 certificate parsing.

use x509_parser::error::X509Error;

/// An error that may arise parsing an X.509 authority certificate.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum CertificateError {
    /// Error returned by the X.509 parsing library.
    #[error("failed parsing X.509 certificate")]
    ParseX509Certificate(#[from] X509Error),

    /// The input holds more bytes after the first certificate.
    #[error("unexpected trailing data after X.509 certificate ({0} bytes)")]
    TrailingData(usize),
}
