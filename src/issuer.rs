use der::Encode;
use der::asn1::BitString;
use sha1::{Digest, Sha1};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::authority::CertificateAuthority;
use crate::cert::Certificate;
use crate::cert::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier};
use crate::cert::params::{CertificateTemplate, ExtensionParam};
use crate::error::{CertMintError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// SHA-1 over the subjectPublicKey bits (RFC 5280 4.2.1.2, method 1).
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the name written into the `issuer` field.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the identifier written into the AuthorityKeyIdentifier.
    fn key_identifier(&self) -> Result<Vec<u8>> {
        Ok(key_identifier(&self.signing_key().as_spki()?))
    }

    /// Issues a certificate for `subject_public_key` from `template`.
    ///
    /// The template's extensions are followed by the SubjectKeyIdentifier and
    /// the AuthorityKeyIdentifier. The signature algorithm follows the type
    /// of the signing key.
    ///
    /// # Arguments
    /// * `template` - Serial, subject, validity and extensions of the new certificate.
    /// * `subject_public_key` - The key being certified.
    ///
    /// # Returns
    /// A `Certificate` object representing the issued certificate.
    fn issue(
        &self,
        template: &CertificateTemplate,
        subject_public_key: &PublicKey,
    ) -> Result<Certificate> {
        let signature_algorithm = self.signing_key().signature_algorithm();

        let subject_key_id = key_identifier(&subject_public_key.to_spki()?);
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: self.key_identifier()?,
        };

        let mut extensions = template.extension_params()?;
        extensions.push(ExtensionParam::from_extension(
            SubjectKeyIdentifier(subject_key_id),
            false,
        )?);
        extensions.push(ExtensionParam::from_extension(authority_key_id, false)?);

        let tbs_cert = TbsCertificate {
            serial_number: template.serial_number.clone(),
            signature_algorithm,
            issuer: self.issuer_name()?,
            validity: template.validity.clone(),
            subject: template.subject.as_x509_name()?,
            subject_public_key: subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;

        let signature = self.signing_key().sign_data(&tbs_der)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.into(),
            signature: BitString::from_bytes(&signature)
                .map_err(|e| CertMintError::SigningError(e.to_string()))?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// Signs with the subject's own key; issuer and subject names coincide.
pub struct SelfIssuer<'a> {
    pub name: Name,
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// The signer chosen for one issuance.
pub enum SigningContext<'a> {
    /// The new certificate's own key signs it.
    SelfSigned(SelfIssuer<'a>),
    /// A loaded parent authority signs it.
    Authority(CertificateAuthority),
}

impl SigningContext<'_> {
    pub fn is_self_signed(&self) -> bool {
        matches!(self, SigningContext::SelfSigned(_))
    }
}

impl Issuer for SigningContext<'_> {
    fn issuer_name(&self) -> Result<Name> {
        match self {
            SigningContext::SelfSigned(issuer) => issuer.issuer_name(),
            SigningContext::Authority(authority) => authority.issuer_name(),
        }
    }

    fn signing_key(&self) -> &KeyPair {
        match self {
            SigningContext::SelfSigned(issuer) => issuer.signing_key(),
            SigningContext::Authority(authority) => authority.signing_key(),
        }
    }

    fn key_identifier(&self) -> Result<Vec<u8>> {
        match self {
            SigningContext::SelfSigned(issuer) => issuer.key_identifier(),
            SigningContext::Authority(authority) => authority.key_identifier(),
        }
    }
}
