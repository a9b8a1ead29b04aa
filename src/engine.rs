//! The issuance pipeline.
//!
//! [`CertificateEngine::issue`] turns an [`IssuanceRequest`] into a PEM
//! certificate and private key: generate the subject key, build the
//! template, resolve the signer, sign, encode. Nothing here touches the
//! file system except through the configured [`AuthorityProvider`].

use std::net::IpAddr;

use tracing::debug;
use zeroize::Zeroizing;

use crate::authority::{AuthorityProvider, PemFileProvider};
use crate::cert::Certificate;
use crate::cert::extensions::{ExtendedKeyUsageOption, KeyUsage, KeyUsages, SubjectAltName};
use crate::cert::params::{
    CertificateTemplate, DistinguishedName, Validity, generate_serial_number,
};
use crate::config::IssuanceRequest;
use crate::error::{CertMintError, Result};
use crate::issuer::{Issuer, SelfIssuer, SigningContext};
use crate::key::KeyPair;

/// A freshly issued certificate and the private key it certifies.
#[derive(Clone)]
pub struct IssuedCertificate {
    /// `CERTIFICATE` PEM block.
    pub certificate_pem: String,
    /// Private key PEM block; the label depends on the key algorithm.
    pub private_key_pem: Zeroizing<String>,
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("certificate_pem", &self.certificate_pem)
            .finish_non_exhaustive()
    }
}

/// Maps a request onto the fields of the certificate to sign.
///
/// The window starts now. Every certificate gets DigitalSignature and
/// KeyCertSign key usage and ServerAuth plus ClientAuth extended key usage.
///
/// # Errors
/// `InvalidConfig` for an IP address that does not parse or a validity
/// window that cannot be encoded.
pub fn build_template(request: &IssuanceRequest) -> Result<CertificateTemplate> {
    let ip_addresses = request
        .subject_alt_names
        .ip_addresses
        .iter()
        .map(|ip| {
            ip.parse::<IpAddr>()
                .map_err(|_| CertMintError::InvalidConfig(format!("invalid IP address '{ip}'")))
        })
        .collect::<Result<Vec<_>>>()?;

    let validity = Validity::starting_now(&request.validity)?;
    validity.to_x509_validity()?;

    let template = CertificateTemplate::builder()
        .serial_number(generate_serial_number()?)
        .subject(DistinguishedName::from(&request.subject))
        .validity(validity)
        .is_ca(request.is_authority)
        .key_usage(KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyCertSign))
        .usages(vec![
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth,
        ])
        .subject_alt_names(SubjectAltName {
            dns_names: request.subject_alt_names.dns_names.clone(),
            ip_addresses,
        })
        .build();

    // Unencodable names are configuration errors.
    template.subject.as_x509_name()?;
    Ok(template)
}

/// Picks who signs the new certificate.
///
/// A named parent authority is loaded through `provider`. Without one, an
/// authority request signs itself with `own_key` and a leaf request fails.
pub fn resolve_signer<'a, P: AuthorityProvider + ?Sized>(
    request: &IssuanceRequest,
    provider: &P,
    own_key: &'a KeyPair,
    template: &CertificateTemplate,
) -> Result<SigningContext<'a>> {
    match &request.parent_authority {
        Some(reference) => Ok(SigningContext::Authority(provider.load(reference)?)),
        None if request.is_authority => Ok(SigningContext::SelfSigned(SelfIssuer {
            name: template.subject.as_x509_name()?,
            key: own_key,
        })),
        None => Err(CertMintError::InvalidConfig(
            "leaf certificate requires a parent authority".to_string(),
        )),
    }
}

/// Encodes an issued certificate and its private key as PEM.
///
/// # Panics
/// If either value cannot be encoded.
pub fn encode_artifacts(cert: &Certificate, key: &KeyPair) -> IssuedCertificate {
    let certificate_pem = cert
        .to_pem()
        .unwrap_or_else(|e| panic!("failed to PEM-encode issued certificate: {e}"));
    let private_key_pem = key
        .to_pem()
        .unwrap_or_else(|e| panic!("failed to PEM-encode private key: {e}"));

    IssuedCertificate {
        certificate_pem,
        private_key_pem,
    }
}

/// Issues certificates, loading parent authorities through `P`.
#[derive(Debug, Clone, Default)]
pub struct CertificateEngine<P = PemFileProvider> {
    provider: P,
}

impl CertificateEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: AuthorityProvider> CertificateEngine<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    /// Issues one certificate.
    ///
    /// The result is a pure function of the request, the loaded parent and
    /// fresh randomness; nothing is written anywhere.
    pub fn issue(&self, request: &IssuanceRequest) -> Result<IssuedCertificate> {
        debug!(algorithm = ?request.key_algorithm, "generating subject key");
        let key = KeyPair::generate(request.key_algorithm)?;

        let template = build_template(request)?;
        debug!(
            subject = %template.subject.common_name,
            not_after = %template.validity.not_after,
            is_ca = template.is_ca,
            "built certificate template"
        );

        let signer = resolve_signer(request, &self.provider, &key, &template)?;
        debug!(self_signed = signer.is_self_signed(), "resolved signer");

        let cert = signer.issue(&template, &key.public_key())?;
        debug!(issuer = %cert.issuer(), "signed certificate");

        Ok(encode_artifacts(&cert, &key))
    }
}

/// Issues `request` with parent authorities read from PEM files.
pub fn issue(request: &IssuanceRequest) -> Result<IssuedCertificate> {
    CertificateEngine::new().issue(request)
}
