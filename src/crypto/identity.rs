//! Long-lived client certificate and key pair

use std::fs;
use std::path::{Path, PathBuf};

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameBuilder};
use tracing::info;

use super::CryptoError;
use crate::blob::Blob;

const CERT_FILE: &str = "client.pem";
const KEY_FILE: &str = "key.pem";

const RSA_KEY_BITS: u32 = 2048;
const CERT_VALIDITY_DAYS: u32 = 365 * 20;
const CERT_COMMON_NAME: &str = "NVIDIA GameStream Client";

/// The persisted client identity: a self-signed X.509 certificate and its
/// RSA private key
///
/// There is one identity per install. Regenerating it invalidates every
/// existing pairing on every server, so the identity is created once and
/// read-only thereafter.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    cert_pem: Blob,
    key_pem: Blob,
}

impl ClientIdentity {
    /// Load the identity persisted under `key_dir`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if either file is missing or unreadable, the
    /// PEM material does not parse, or the key does not match the
    /// certificate.
    pub fn load(key_dir: &Path) -> Result<Self, CryptoError> {
        let cert_pem = Blob::from(fs::read(key_dir.join(CERT_FILE))?);
        let key_pem = Blob::from(fs::read(key_dir.join(KEY_FILE))?);

        let cert = X509::from_pem(cert_pem.as_slice())?;
        let key = PKey::private_key_from_pem(key_pem.as_slice())?;
        let cert_key = cert.public_key()?;
        if !key.public_eq(cert_key.as_ref()) {
            return Err(CryptoError::CertKeyMismatch);
        }

        Ok(Self { cert_pem, key_pem })
    }

    /// Generate a fresh self-signed identity and persist it under `key_dir`
    ///
    /// Both files are written atomically (temp file + rename) so a crash
    /// mid-write never leaves a half-provisioned identity behind.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` on RNG, backend or I/O failure.
    pub fn generate(key_dir: &Path) -> Result<Self, CryptoError> {
        let rsa = Rsa::generate(RSA_KEY_BITS)?;
        let key = PKey::from_rsa(rsa)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_text("CN", CERT_COMMON_NAME)?;
        let name = name.build();

        let mut serial = BigNum::new()?;
        serial.rand(64, MsbOption::MAYBE_ZERO, false)?;

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        builder.set_serial_number(serial.to_asn1_integer()?.as_ref())?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_not_before(Asn1Time::days_from_now(0)?.as_ref())?;
        builder.set_not_after(Asn1Time::days_from_now(CERT_VALIDITY_DAYS)?.as_ref())?;
        builder.set_pubkey(&key)?;
        builder.sign(&key, MessageDigest::sha256())?;
        let cert = builder.build();

        let cert_pem = Blob::from(cert.to_pem()?);
        let key_pem = Blob::from(key.private_key_to_pem_pkcs8()?);

        fs::create_dir_all(key_dir)?;
        write_atomic(&key_dir.join(CERT_FILE), cert_pem.as_slice())?;
        write_atomic(&key_dir.join(KEY_FILE), key_pem.as_slice())?;

        Ok(Self { cert_pem, key_pem })
    }

    /// Load the identity, generating and persisting a new one on first run
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if generation fails. A failed load falls
    /// through to generation.
    pub fn load_or_generate(key_dir: &Path) -> Result<Self, CryptoError> {
        match Self::load(key_dir) {
            Ok(identity) => Ok(identity),
            Err(_) => {
                info!("no client certificate found, generating a new identity");
                Self::generate(key_dir)
            }
        }
    }

    /// PEM-encoded certificate
    #[must_use]
    pub fn cert_pem(&self) -> &Blob {
        &self.cert_pem
    }

    /// PEM-encoded private key
    #[must_use]
    pub fn key_pem(&self) -> &Blob {
        &self.key_pem
    }
}

fn write_atomic(path: &PathBuf, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("pem.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
