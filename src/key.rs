use std::fmt;

use const_oid::ObjectIdentifier;
use const_oid::db::rfc5912::{SECP_256_R_1, SECP_384_R_1};
use der::{Decode, Encode};
use ecdsa::signature::{SignatureEncoding, Signer, Verifier};
use ed25519_dalek::pkcs8::KeypairBytes;
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sec1::{EcParameters, EcPrivateKey};
use serde::Deserialize;
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use zeroize::Zeroizing;

use crate::cert::SignatureAlgorithm;
use crate::error::{CertMintError, Result};

/// PEM label of a PKCS#1 RSA private key.
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
/// PEM label of a SEC1 elliptic curve private key.
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";
/// PEM label of a PKCS#8 private key.
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Smallest RSA modulus accepted for newly generated keys.
pub const MIN_RSA_BITS: usize = 2048;

/// Key algorithm used for the subject key of a new certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyAlgorithm {
    Rsa2048,
    Rsa3072,
    #[default]
    Rsa4096,
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

/// Supported key types for certificate operations.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            KeyPair::Rsa { .. } => "Rsa",
            KeyPair::EcdsaP256 { .. } => "EcdsaP256",
            KeyPair::EcdsaP384 { .. } => "EcdsaP384",
            KeyPair::Ed25519 { .. } => "Ed25519",
        };
        f.debug_struct("KeyPair")
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a fresh key pair of the given algorithm from the OS random source.
    pub fn generate(algorithm: KeyAlgorithm) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Rsa2048 => Self::generate_rsa(2048),
            KeyAlgorithm::Rsa3072 => Self::generate_rsa(3072),
            KeyAlgorithm::Rsa4096 => Self::generate_rsa(4096),
            KeyAlgorithm::EcdsaP256 => Ok(Self::generate_ecdsa_p256()),
            KeyAlgorithm::EcdsaP384 => Ok(Self::generate_ecdsa_p384()),
            KeyAlgorithm::Ed25519 => Ok(Self::generate_ed25519()),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        if bits < MIN_RSA_BITS {
            return Err(CertMintError::KeyGenerationError(format!(
                "RSA keys must be at least {MIN_RSA_BITS} bits, got {bits}"
            )));
        }
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P384SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = Ed25519SigningKey::generate(&mut rng);
        KeyPair::Ed25519 { signing_key }
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// SubjectPublicKeyInfo of the public half, as it appears in a certificate.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Signature algorithm produced by [`KeyPair::sign_data`].
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    /// Signs `data`, returning the signature in the encoding X.509 expects
    /// (PKCS#1 v1.5 for RSA, DER `Ecdsa-Sig-Value` for ECDSA, raw for Ed25519).
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_error = |e: ecdsa::signature::Error| CertMintError::SigningError(e.to_string());
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = RsaSigningKey::<Sha256>::new(private.as_ref().clone());
                let signature: RsaSignature = signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::Ed25519 { signing_key } => {
                let signature = signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// PEM label written by [`KeyPair::to_pem`].
    pub fn pem_label(&self) -> &'static str {
        match self {
            KeyPair::Rsa { .. } => RSA_PRIVATE_KEY_LABEL,
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } => EC_PRIVATE_KEY_LABEL,
            KeyPair::Ed25519 { .. } => PRIVATE_KEY_LABEL,
        }
    }

    /// Encodes the private key into PEM.
    ///
    /// RSA keys are written as PKCS#1 and ECDSA keys as SEC1 carrying the
    /// named-curve OID. Ed25519 keys are written as a version 1 PKCS#8 block
    /// holding only the seed.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        let encoding_error = |e: String| CertMintError::EncodingError(e);
        match self {
            KeyPair::Rsa { private, .. } => private
                .to_pkcs1_pem(LineEnding::LF)
                .map_err(|e| encoding_error(e.to_string())),
            KeyPair::EcdsaP256 {
                signing_key,
                verifying_key,
            } => sec1_pem(
                &signing_key.to_bytes(),
                verifying_key.to_encoded_point(false).as_bytes(),
                SECP_256_R_1,
            ),
            KeyPair::EcdsaP384 {
                signing_key,
                verifying_key,
            } => sec1_pem(
                &signing_key.to_bytes(),
                verifying_key.to_encoded_point(false).as_bytes(),
                SECP_384_R_1,
            ),
            KeyPair::Ed25519 { signing_key } => KeypairBytes {
                secret_key: signing_key.to_bytes(),
                public_key: None,
            }
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| encoding_error(e.to_string())),
        }
    }

    /// Decodes the first PEM block of `pem_str` into a key pair.
    ///
    /// Accepts `RSA PRIVATE KEY` (PKCS#1), `EC PRIVATE KEY` (SEC1, P-256 or P-384)
    /// and `PRIVATE KEY` (PKCS#8, any supported algorithm).
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str)?;
        let contents = Zeroizing::new(block.contents().to_vec());
        match block.tag() {
            RSA_PRIVATE_KEY_LABEL => {
                let private = RsaPrivateKey::from_pkcs1_der(&contents)
                    .map_err(|e| CertMintError::DecodingError(e.to_string()))?;
                Ok(Self::from_rsa(private))
            }
            EC_PRIVATE_KEY_LABEL => Self::from_sec1_der(&contents),
            PRIVATE_KEY_LABEL => Self::from_pkcs8_der(&contents),
            other => Err(CertMintError::DecodingError(format!(
                "unsupported private key PEM type '{other}'"
            ))),
        }
    }

    /// Decodes a SEC1 `ECPrivateKey`. The curve comes from its named-curve
    /// parameter, or from the scalar length when the parameter is absent.
    pub fn from_sec1_der(der_bytes: &[u8]) -> Result<Self> {
        let key = EcPrivateKey::from_der(der_bytes)?;
        let curve = match key.parameters {
            Some(EcParameters::NamedCurve(oid)) => oid,
            None if key.private_key.len() == 32 => SECP_256_R_1,
            None if key.private_key.len() == 48 => SECP_384_R_1,
            None => {
                return Err(CertMintError::DecodingError(format!(
                    "EC private key of {} bytes names no curve",
                    key.private_key.len()
                )));
            }
        };
        let decoding_error = |curve: &str| {
            CertMintError::DecodingError(format!("EC private key is not a valid {curve} key"))
        };
        match curve {
            SECP_256_R_1 => Ok(Self::from_p256(P256SigningKey::from(
                p256::SecretKey::from_sec1_der(der_bytes).map_err(|_| decoding_error("P-256"))?,
            ))),
            SECP_384_R_1 => Ok(Self::from_p384(P384SigningKey::from(
                p384::SecretKey::from_sec1_der(der_bytes).map_err(|_| decoding_error("P-384"))?,
            ))),
            oid => Err(CertMintError::DecodingError(format!(
                "unsupported elliptic curve {oid}"
            ))),
        }
    }

    /// Decodes a PKCS#8 `PrivateKeyInfo`, dispatching on its algorithm OID.
    pub fn from_pkcs8_der(der_bytes: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::from_der(der_bytes)?;
        let decoding_error = |e: pkcs8::Error| CertMintError::DecodingError(e.to_string());

        match info.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => Ok(Self::from_rsa(
                RsaPrivateKey::from_pkcs8_der(der_bytes).map_err(decoding_error)?,
            )),
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                match info.algorithm.parameters_oid() {
                    Ok(SECP_256_R_1) => Ok(Self::from_p256(
                        P256SigningKey::from_pkcs8_der(der_bytes).map_err(decoding_error)?,
                    )),
                    Ok(SECP_384_R_1) => Ok(Self::from_p384(
                        P384SigningKey::from_pkcs8_der(der_bytes).map_err(decoding_error)?,
                    )),
                    _ => Err(CertMintError::DecodingError(
                        "unsupported elliptic curve".to_string(),
                    )),
                }
            }
            const_oid::db::rfc8410::ID_ED_25519 => Ok(KeyPair::Ed25519 {
                signing_key: Ed25519SigningKey::from_pkcs8_der(der_bytes)
                    .map_err(decoding_error)?,
            }),
            oid => Err(CertMintError::DecodingError(format!(
                "unsupported private key algorithm {oid}"
            ))),
        }
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    fn from_p256(signing_key: P256SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    fn from_p384(signing_key: P384SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }
}

fn sec1_pem(
    private_key: &[u8],
    public_key: &[u8],
    curve: ObjectIdentifier,
) -> Result<Zeroizing<String>> {
    let der_bytes = Zeroizing::new(
        EcPrivateKey {
            private_key,
            parameters: Some(EcParameters::NamedCurve(curve)),
            public_key: Some(public_key),
        }
        .to_der()?,
    );
    let block = pem::Pem::new(EC_PRIVATE_KEY_LABEL, der_bytes.as_slice());
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    Ok(Zeroizing::new(pem::encode_config(&block, config)))
}

/// Public half of a [`KeyPair`], or a key read from a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// Reads the public key out of a certificate's SubjectPublicKeyInfo.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let spki_der = spki.to_der()?;
        let decoding_error =
            |e: x509_cert::spki::Error| CertMintError::DecodingError(e.to_string());

        match spki.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => Ok(PublicKey::Rsa(
                RsaPublicKey::from_public_key_der(&spki_der).map_err(decoding_error)?,
            )),
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                if let Ok(key) = P256VerifyingKey::from_public_key_der(&spki_der) {
                    return Ok(PublicKey::EcdsaP256(key));
                }
                Ok(PublicKey::EcdsaP384(
                    P384VerifyingKey::from_public_key_der(&spki_der).map_err(decoding_error)?,
                ))
            }
            const_oid::db::rfc8410::ID_ED_25519 => Ok(PublicKey::Ed25519(
                Ed25519VerifyingKey::from_public_key_der(&spki_der).map_err(decoding_error)?,
            )),
            oid => Err(CertMintError::DecodingError(format!(
                "unsupported public key algorithm {oid}"
            ))),
        }
    }

    /// Encodes the key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
            PublicKey::Ed25519(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
        };
        spki.map_err(|e| CertMintError::EncodingError(e.to_string()))
    }

    /// Checks `signature` over `data` made with `algorithm`.
    pub fn verify(
        &self,
        algorithm: &SignatureAlgorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let invalid = |e: ecdsa::signature::Error| CertMintError::VerificationError(e.to_string());
        match (self, algorithm) {
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha256WithRSA) => {
                let signature = RsaSignature::try_from(signature).map_err(invalid)?;
                RsaVerifyingKey::<Sha256>::new(public.clone())
                    .verify(data, &signature)
                    .map_err(invalid)
            }
            (PublicKey::EcdsaP256(verifying_key), SignatureAlgorithm::Sha256WithECDSA) => {
                let signature = p256::ecdsa::Signature::from_der(signature).map_err(invalid)?;
                verifying_key.verify(data, &signature).map_err(invalid)
            }
            (PublicKey::EcdsaP384(verifying_key), SignatureAlgorithm::Sha384WithECDSA) => {
                let signature = p384::ecdsa::Signature::from_der(signature).map_err(invalid)?;
                verifying_key.verify(data, &signature).map_err(invalid)
            }
            (PublicKey::Ed25519(verifying_key), SignatureAlgorithm::Ed25519) => {
                let signature = ed25519_dalek::Signature::from_slice(signature).map_err(invalid)?;
                verifying_key.verify(data, &signature).map_err(invalid)
            }
            (_, algorithm) => Err(CertMintError::VerificationError(format!(
                "signature algorithm {algorithm:?} does not match the issuer key"
            ))),
        }
    }
}
