//! The description of one certificate to issue.
//!
//! An [`IssuanceRequest`] is built either with its builder or from a TOML
//! file through [`IssuanceRequest::load`].

pub mod file;

use std::path::PathBuf;

use bon::Builder;
use serde::Deserialize;

use crate::cert::params::DistinguishedName;
use crate::key::KeyAlgorithm;

/// Everything needed to produce one certificate and its private key.
///
/// A request with `is_authority == false` must name a `parent_authority`;
/// a leaf certificate cannot sign itself.
///
/// # Example
/// ```
/// use certmint::config::{IssuanceRequest, Subject, ValidityPeriod};
///
/// let request = IssuanceRequest::builder()
///     .is_authority(true)
///     .validity(ValidityPeriod { years: 10, months: 0, days: 0 })
///     .subject(Subject { common_name: "Root CA".to_string(), ..Default::default() })
///     .build();
/// assert!(request.parent_authority.is_none());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct IssuanceRequest {
    #[builder(default)]
    pub is_authority: bool,
    pub parent_authority: Option<AuthorityRef>,
    #[builder(default)]
    pub validity: ValidityPeriod,
    #[builder(default)]
    pub subject: Subject,
    #[builder(default)]
    pub subject_alt_names: AltNames,
    #[builder(default)]
    pub key_algorithm: KeyAlgorithm,
}

/// Paths to a parent CA certificate and its private key, both PEM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityRef {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Calendar offsets added to the issuance time to get `notAfter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidityPeriod {
    #[serde(alias = "Years")]
    pub years: u32,
    #[serde(alias = "Months")]
    pub months: u32,
    #[serde(alias = "Days")]
    pub days: u32,
}

/// Subject name attributes. Each list entry becomes its own RDN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Subject {
    pub common_name: String,
    #[serde(alias = "Organization")]
    pub organization: Vec<String>,
    #[serde(alias = "Country")]
    pub country: Vec<String>,
    #[serde(alias = "Province")]
    pub province: Vec<String>,
    #[serde(alias = "Locality")]
    pub locality: Vec<String>,
    pub street_address: Vec<String>,
    #[serde(alias = "posta-code")]
    pub postal_code: Vec<String>,
}

impl From<&Subject> for DistinguishedName {
    fn from(subject: &Subject) -> Self {
        DistinguishedName {
            common_name: subject.common_name.clone(),
            organization: subject.organization.clone(),
            country: subject.country.clone(),
            province: subject.province.clone(),
            locality: subject.locality.clone(),
            street_address: subject.street_address.clone(),
            postal_code: subject.postal_code.clone(),
        }
    }
}

/// Subject alternative names as written in the request.
///
/// IP addresses stay strings here and are parsed when the template is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AltNames {
    #[serde(rename = "domains", alias = "Domains")]
    pub dns_names: Vec<String>,
    #[serde(rename = "ips", alias = "IPs")]
    pub ip_addresses: Vec<String>,
}
