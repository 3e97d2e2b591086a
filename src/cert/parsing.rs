use crate::cert::errors::CertificateError;
use x509_parser::certificate::X509Certificate;
use x509_parser::error::X509Error;
use x509_parser::nom::Err;

/// Parses `der_bytes` as exactly one DER-encoded X.509 certificate.
pub(crate) fn parse_single_der_certificate(
    der_bytes: &[u8],
) -> Result<X509Certificate<'_>, CertificateError> {
    let (rest, cert) = x509_parser::parse_x509_certificate(der_bytes).map_err(|e| match e {
        Err::Incomplete(_) => CertificateError::ParseX509Certificate(X509Error::InvalidCertificate),
        Err::Error(err) | Err::Failure(err) => CertificateError::ParseX509Certificate(err),
    })?;

    if !rest.is_empty() {
        return Err(CertificateError::TrailingData(rest.len()));
    }

    Ok(cert)
}
