#![allow(dead_code)]

use certmint::authority::CertificateAuthority;
use certmint::config::{AuthorityRef, IssuanceRequest, Subject, ValidityPeriod};
use certmint::engine::{CertificateEngine, IssuedCertificate};
use certmint::key::KeyAlgorithm;

pub fn request(common_name: &str, is_authority: bool) -> IssuanceRequest {
    IssuanceRequest::builder()
        .is_authority(is_authority)
        .validity(ValidityPeriod {
            years: 1,
            months: 0,
            days: 0,
        })
        .subject(Subject {
            common_name: common_name.to_string(),
            organization: vec!["My CA".to_string()],
            country: vec!["US".to_string()],
            ..Default::default()
        })
        .key_algorithm(KeyAlgorithm::EcdsaP256)
        .build()
}

/// A request signed by whatever authority the engine's provider returns.
pub fn child_request(common_name: &str, is_authority: bool) -> IssuanceRequest {
    let mut request = request(common_name, is_authority);
    request.parent_authority = Some(AuthorityRef {
        cert_path: "ca.pem".into(),
        key_path: "ca.key".into(),
    });
    request
}

pub fn generate_ca_cert() -> IssuedCertificate {
    certmint::engine::issue(&request("myca.local", true)).unwrap()
}

pub fn authority(issued: &IssuedCertificate) -> CertificateAuthority {
    CertificateAuthority::from_pem(
        issued.certificate_pem.as_bytes(),
        issued.private_key_pem.as_bytes(),
    )
    .unwrap()
}

/// Issues `request` under the CA in `parent`.
pub fn issue_under(parent: &IssuedCertificate, request: &IssuanceRequest) -> IssuedCertificate {
    CertificateEngine::with_provider(authority(parent))
        .issue(request)
        .unwrap()
}
