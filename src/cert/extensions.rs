use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::AssociatedOid;
use const_oid::db::rfc5912::{
    ID_KP_CLIENT_AUTH, ID_KP_CODE_SIGNING, ID_KP_EMAIL_PROTECTION, ID_KP_OCSP_SIGNING,
    ID_KP_SERVER_AUTH, ID_KP_TIME_STAMPING,
};
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::{self, name::GeneralName};

use crate::error::CertMintError;

pub use der::flagset::FlagSet;
pub use x509_cert::ext::pkix::KeyUsages;

/// A typed certificate extension that knows its OID and how to read and
/// write its DER `extnValue`.
///
/// ```
/// use certmint::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName {
///     dns_names: vec!["example.com".to_string()],
///     ip_addresses: vec!["10.0.0.1".parse().unwrap()],
/// };
/// let der = san.to_x509_extension_value().unwrap();
/// assert_eq!(SubjectAltName::from_x509_extension_value(&der).unwrap(), san);
/// ```
pub trait ToAndFromX509Extension {
    const OID: ObjectIdentifier;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertMintError>;

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertMintError>
    where
        Self: Sized;
}

fn encode(value: &impl Encode) -> Result<Vec<u8>, CertMintError> {
    value
        .to_der()
        .map_err(|e| CertMintError::EncodingError(format!("extension value: {e}")))
}

fn ip_octets(ip: &IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

fn ip_from_octets(octets: &[u8]) -> Result<IpAddr, CertMintError> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        return Ok(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    <[u8; 16]>::try_from(octets)
        .map(|v6| IpAddr::V6(Ipv6Addr::from(v6)))
        .map_err(|_| {
            CertMintError::DecodingError(format!("iPAddress entry of {} octets", octets.len()))
        })
}

/// subjectAltName: `dNSName` and `iPAddress` entries, DNS names first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl SubjectAltName {
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.ip_addresses.is_empty()
    }

    fn general_names(&self) -> Result<Vec<GeneralName>, CertMintError> {
        let mut names = Vec::with_capacity(self.dns_names.len() + self.ip_addresses.len());
        for dns in &self.dns_names {
            let ia5 = Ia5String::new(dns)
                .map_err(|e| CertMintError::InvalidConfig(format!("DNS name '{dns}': {e}")))?;
            names.push(GeneralName::DnsName(ia5));
        }
        for ip in &self.ip_addresses {
            names.push(GeneralName::IpAddress(OctetString::new(ip_octets(ip))?));
        }
        Ok(names)
    }
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertMintError> {
        encode(&pkix::SubjectAltName(self.general_names()?))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertMintError> {
        let mut san = Self::default();
        for name in pkix::SubjectAltName::from_der(extension)?.0 {
            match name {
                GeneralName::DnsName(dns) => san.dns_names.push(dns.to_string()),
                GeneralName::IpAddress(octets) => {
                    san.ip_addresses.push(ip_from_octets(octets.as_bytes())?)
                }
                other => {
                    return Err(CertMintError::DecodingError(format!(
                        "subjectAltName entry not supported: {other:?}"
                    )));
                }
            }
        }
        Ok(san)
    }
}

/// basicConstraints. `max_path_length` is only meaningful when `is_ca` is set.
#[derive(Debug, Default)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertMintError> {
        encode(&pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        })
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertMintError> {
        let pkix::BasicConstraints {
            ca,
            path_len_constraint,
        } = pkix::BasicConstraints::from_der(extension)?;
        Ok(Self {
            is_ca: ca,
            max_path_length: path_len_constraint,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <pkix::KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertMintError> {
        encode(&pkix::KeyUsage(self.0))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertMintError> {
        pkix::KeyUsage::from_der(extension)
            .map(|ku| Self(ku.0))
            .map_err(Into::into)
    }
}

/// extKeyUsage, written in the order given.
#[derive(Debug, Clone, Default)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertMintError> {
        encode(&pkix::ExtendedKeyUsage(
            self.usage.iter().copied().map(ObjectIdentifier::from).collect(),
        ))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertMintError> {
        let usage = pkix::ExtendedKeyUsage::from_der(extension)?
            .0
            .into_iter()
            .map(ExtendedKeyUsageOption::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Self { usage })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl ExtendedKeyUsageOption {
    const ALL: [Self; 6] = [
        Self::ServerAuth,
        Self::ClientAuth,
        Self::CodeSigning,
        Self::EmailProtection,
        Self::TimeStamping,
        Self::OcspSigning,
    ];
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        use ExtendedKeyUsageOption::*;
        match value {
            ServerAuth => ID_KP_SERVER_AUTH,
            ClientAuth => ID_KP_CLIENT_AUTH,
            CodeSigning => ID_KP_CODE_SIGNING,
            EmailProtection => ID_KP_EMAIL_PROTECTION,
            TimeStamping => ID_KP_TIME_STAMPING,
            OcspSigning => ID_KP_OCSP_SIGNING,
        }
    }
}

impl TryFrom<ObjectIdentifier> for ExtendedKeyUsageOption {
    type Error = CertMintError;

    fn try_from(oid: ObjectIdentifier) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|option| ObjectIdentifier::from(*option) == oid)
            .ok_or_else(|| CertMintError::DecodingError(format!("extended key usage {oid}")))
    }
}

/// subjectKeyIdentifier: the SHA-1 of the subject's public key bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertMintError> {
        encode(&pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?))
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertMintError> {
        let ski = pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.into_bytes()))
    }
}

/// authorityKeyIdentifier with only `keyIdentifier` set, naming the key that
/// signed the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertMintError> {
        encode(&pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        })
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertMintError> {
        let aki = pkix::AuthorityKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(OctetString::into_bytes)
                .unwrap_or_default(),
        })
    }
}
