//! Parent certificate authorities.
//!
//! A [`CertificateAuthority`] pairs a CA certificate with its private key and
//! signs new certificates through [`Issuer`]. Where the pair comes from is up
//! to an [`AuthorityProvider`]: [`PemFileProvider`] reads it from disk, and
//! an in-memory `CertificateAuthority` can stand in for one directly.

use std::path::Path;

use tracing::debug;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::config::AuthorityRef;
use crate::error::{CertMintError, Result};
use crate::issuer::{self, Issuer};
use crate::key::KeyPair;

/// Resolves an [`AuthorityRef`] into a usable signing authority.
pub trait AuthorityProvider {
    fn load(&self, reference: &AuthorityRef) -> Result<CertificateAuthority>;
}

/// Reads the certificate and key PEM files named by the reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct PemFileProvider;

impl PemFileProvider {
    fn read(path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            CertMintError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })
    }
}

impl AuthorityProvider for PemFileProvider {
    fn load(&self, reference: &AuthorityRef) -> Result<CertificateAuthority> {
        debug!(
            cert = %reference.cert_path.display(),
            key = %reference.key_path.display(),
            "loading parent authority"
        );
        let cert_pem = Self::read(&reference.cert_path)?;
        let key_pem = Self::read(&reference.key_path)?;
        CertificateAuthority::from_pem(&cert_pem, &key_pem)
    }
}

/// A CA certificate together with its private key.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateAuthority {
    /// Decodes a parent authority from its certificate and key PEM bytes.
    ///
    /// The key must be the private half of the certificate's public key and
    /// the certificate must be marked as a CA.
    ///
    /// # Errors
    /// * `DecodingError` for malformed input or a key that does not match.
    /// * `InvalidConfig` when the certificate is not a CA.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let cert_pem = std::str::from_utf8(cert_pem)
            .map_err(|e| CertMintError::DecodingError(format!("certificate PEM: {e}")))?;
        let key_pem = std::str::from_utf8(key_pem)
            .map_err(|e| CertMintError::DecodingError(format!("key PEM: {e}")))?;

        let cert = Certificate::from_pem(cert_pem)?;
        let key = KeyPair::from_pem(key_pem)?;

        if cert.public_key()? != key.public_key() {
            return Err(CertMintError::DecodingError(
                "private key does not match the certificate public key".to_string(),
            ));
        }

        if !cert.is_ca()? {
            return Err(CertMintError::InvalidConfig(format!(
                "parent certificate '{}' is not a certificate authority",
                cert.subject()
            )));
        }

        Ok(Self { cert, key })
    }
}

impl Issuer for CertificateAuthority {
    fn issuer_name(&self) -> Result<Name> {
        Ok(self.cert.subject().clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.cert.subject_key_identifier()? {
            Some(ski) => Ok(ski),
            None => Ok(issuer::key_identifier(&self.key.as_spki()?)),
        }
    }
}

impl AuthorityProvider for CertificateAuthority {
    fn load(&self, _reference: &AuthorityRef) -> Result<CertificateAuthority> {
        Ok(self.clone())
    }
}
