//! TOML request files.
//!
//! ```toml
//! [metadata]
//! is-ca = false
//! ca-cert = "ca.pem"
//! ca-key = "ca.key"
//! key-algorithm = "ecdsa-p256"
//!
//! [metadata.expiration]
//! years = 1
//!
//! [subject]
//! common-name = "example.com"
//! organization = ["Example"]
//!
//! [dns]
//! domains = ["example.com"]
//! ips = ["127.0.0.1"]
//! ```
//!
//! The capitalised keys of older files (`[Metadata]`, `IsCa`, `[DNS]`,
//! `IPs` and so on) are read too. Any other key is an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::{AltNames, AuthorityRef, IssuanceRequest, Subject, ValidityPeriod};
use crate::error::{CertMintError, Result};
use crate::key::KeyAlgorithm;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    #[serde(alias = "Metadata")]
    metadata: MetadataCfg,
    #[serde(alias = "Subject")]
    subject: Subject,
    #[serde(alias = "DNS")]
    dns: AltNames,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct MetadataCfg {
    #[serde(alias = "isCa", alias = "IsCa", alias = "isca")]
    is_ca: bool,
    ca_cert: Option<PathBuf>,
    ca_key: Option<PathBuf>,
    key_algorithm: KeyAlgorithm,
    #[serde(alias = "Expiration")]
    expiration: ValidityPeriod,
}

impl MetadataCfg {
    /// Both paths or neither; an empty string counts as absent.
    fn parent_authority(&self) -> Result<Option<AuthorityRef>> {
        let present =
            |path: &Option<PathBuf>| path.clone().filter(|p| !p.as_os_str().is_empty());

        match (present(&self.ca_cert), present(&self.ca_key)) {
            (Some(cert_path), Some(key_path)) => Ok(Some(AuthorityRef {
                cert_path,
                key_path,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(CertMintError::InvalidConfig(
                "ca-cert is set but ca-key is missing".to_string(),
            )),
            (None, Some(_)) => Err(CertMintError::InvalidConfig(
                "ca-key is set but ca-cert is missing".to_string(),
            )),
        }
    }
}

impl IssuanceRequest {
    /// Reads a request from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading certificate config");
        let content = std::fs::read_to_string(path).map_err(|e| {
            CertMintError::InvalidConfig(format!(
                "cannot open cert config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a request from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;

        Ok(IssuanceRequest {
            is_authority: file.metadata.is_ca,
            parent_authority: file.metadata.parent_authority()?,
            validity: file.metadata.expiration,
            subject: file.subject,
            subject_alt_names: file.dns,
            key_algorithm: file.metadata.key_algorithm,
        })
    }
}
