//! Cryptographic primitives for the pairing handshake
//!
//! Stateless helpers over the client identity: PIN-derived AES keys,
//! AES-128-ECB challenge transforms, SHA hashing and the RSA attestations
//! exchanged during pairing.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::blob::Blob;

mod identity;

pub use identity::ClientIdentity;

/// AES-128 key and block length
pub const AES_BLOCK_LEN: usize = 16;

/// RSA-2048 PKCS#1 v1.5 signature length
pub const RSA_SIGNATURE_LEN: usize = 256;

/// Errors from the cryptographic backend
///
/// There are no protocol-level semantic errors here; anything beyond a
/// malfunctioning backend or malformed key material is the orchestrator's
/// concern.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// OpenSSL backend failure
    #[error("backend error: {0}")]
    Backend(#[from] openssl::error::ErrorStack),

    /// I/O failure while persisting or loading the identity
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key material had the wrong length
    #[error("invalid key length: {actual} (expected {expected})")]
    InvalidKeyLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// AES-ECB input was not a multiple of the block length
    #[error("invalid input length {actual}: must be a multiple of {AES_BLOCK_LEN}")]
    InvalidBlockLength {
        /// Actual length in bytes
        actual: usize,
    },

    /// The persisted certificate and private key do not belong together
    #[error("certificate does not match private key")]
    CertKeyMismatch,
}

/// SHA-1 hash (20 bytes)
#[must_use]
pub fn sha1(data: &Blob) -> Blob {
    Blob::from(Sha1::digest(data.as_slice()).to_vec())
}

/// SHA-256 hash (32 bytes)
#[must_use]
pub fn sha256(data: &Blob) -> Blob {
    Blob::from(Sha256::digest(data.as_slice()).to_vec())
}

/// Derive an AES-128 key from a salted PIN: first 16 bytes of SHA-1
///
/// Used against servers older than generation 7.
#[must_use]
pub fn aes_key_from_salted_pin_sha1(salted_pin: &Blob) -> Blob {
    sha1(salted_pin).subdata(0, AES_BLOCK_LEN)
}

/// Derive an AES-128 key from a salted PIN: first 16 bytes of SHA-256
///
/// Used against generation 7 and newer servers.
#[must_use]
pub fn aes_key_from_salted_pin_sha256(salted_pin: &Blob) -> Blob {
    sha256(salted_pin).subdata(0, AES_BLOCK_LEN)
}

fn ecb_cipher(key: &Blob) -> Result<Aes128, CryptoError> {
    Aes128::new_from_slice(key.as_slice()).map_err(|_| CryptoError::InvalidKeyLength {
        expected: AES_BLOCK_LEN,
        actual: key.len(),
    })
}

fn check_block_len(data: &Blob) -> Result<(), CryptoError> {
    if data.len() % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::InvalidBlockLength { actual: data.len() });
    }
    Ok(())
}

/// AES-128-ECB encrypt without padding
///
/// ECB is mandated by the GameStream pairing wire format and must not be
/// used for anything else. Block-aligned input passes through unchanged;
/// shorter tails are zero-filled up to the block boundary, which the wire
/// format relies on for the 20-byte SHA-1 challenge hashes of pre-gen-7
/// servers.
///
/// # Errors
///
/// Returns `CryptoError` on a bad key.
pub fn encrypt_aes_ecb(plaintext: &Blob, key: &Blob) -> Result<Blob, CryptoError> {
    let cipher = ecb_cipher(key)?;
    let mut out = plaintext.as_slice().to_vec();
    out.resize(out.len().div_ceil(AES_BLOCK_LEN) * AES_BLOCK_LEN, 0);
    for block in out.chunks_exact_mut(AES_BLOCK_LEN) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(Blob::from(out))
}

/// AES-128-ECB decrypt without padding
///
/// # Errors
///
/// Returns `CryptoError` on a bad key or input length.
pub fn decrypt_aes_ecb(ciphertext: &Blob, key: &Blob) -> Result<Blob, CryptoError> {
    check_block_len(ciphertext)?;
    let cipher = ecb_cipher(key)?;
    let mut out = ciphertext.as_slice().to_vec();
    for block in out.chunks_exact_mut(AES_BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(Blob::from(out))
}

/// RSA PKCS#1 v1.5 signature with SHA-256 over `data`
///
/// `key_pem` is the PEM-encoded private key; a 2048-bit key yields the
/// 256-byte signature the wire format expects.
///
/// # Errors
///
/// Returns `CryptoError` if the key cannot be parsed or signing fails.
pub fn sign(data: &Blob, key_pem: &Blob) -> Result<Blob, CryptoError> {
    let key = PKey::private_key_from_pem(key_pem.as_slice())?;
    let mut signer = Signer::new(MessageDigest::sha256(), &key)?;
    signer.update(data.as_slice())?;
    Ok(Blob::from(signer.sign_to_vec()?))
}

/// Verify an RSA PKCS#1 v1.5 / SHA-256 signature against a certificate
///
/// Returns `Ok(false)` when the signature simply does not match; only
/// backend malfunctions and unparseable certificates are errors.
///
/// # Errors
///
/// Returns `CryptoError` if the certificate cannot be parsed.
pub fn verify(data: &Blob, signature: &Blob, cert_pem: &Blob) -> Result<bool, CryptoError> {
    let cert = X509::from_pem(cert_pem.as_slice())?;
    let pubkey = cert.public_key()?;
    let mut verifier = Verifier::new(MessageDigest::sha256(), &pubkey)?;
    verifier.update(data.as_slice())?;
    Ok(verifier.verify(signature.as_slice()).unwrap_or(false))
}

/// Extract the raw `signatureValue` BIT STRING from an X.509 certificate
///
/// The pairing handshake hashes this value as an identity witness for both
/// sides.
///
/// # Errors
///
/// Returns `CryptoError` if the certificate cannot be parsed.
pub fn cert_signature(cert_pem: &Blob) -> Result<Blob, CryptoError> {
    let cert = X509::from_pem(cert_pem.as_slice())?;
    Ok(Blob::from(cert.signature().as_slice()))
}
