//! Byte-buffer value type used for crypto material and wire payloads

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;

/// An owned byte buffer with value semantics
///
/// Every crypto input and output and every hex-encoded wire payload flows
/// through this type. Operations never mutate the receiver; they return new
/// buffers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
    /// Create an empty blob
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate `n` bytes from the OS cryptographically secure RNG
    ///
    /// Used for the pairing salt, challenges, client secret and the
    /// remote-input AES key.
    #[must_use]
    pub fn random(n: usize) -> Self {
        let mut bytes = vec![0u8; n];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Concatenate, returning a new blob
    #[must_use]
    pub fn append(&self, other: &Blob) -> Self {
        let mut bytes = Vec::with_capacity(self.0.len() + other.0.len());
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(&other.0);
        Self(bytes)
    }

    /// Copy out `len` bytes starting at `offset`, clamped to the buffer
    #[must_use]
    pub fn subdata(&self, offset: usize, len: usize) -> Self {
        let start = offset.min(self.0.len());
        let end = offset.saturating_add(len).min(self.0.len());
        Self(self.0[start..end].to_vec())
    }

    /// Lowercase ASCII hex encoding as a new blob (no separators)
    #[must_use]
    pub fn hex(&self) -> Self {
        Self(hex::encode(&self.0).into_bytes())
    }

    /// Lowercase hex encoding as a `String`
    #[must_use]
    pub fn hex_string(&self) -> String {
        hex::encode(&self.0)
    }

    /// Decode this blob's contents as ASCII hex
    ///
    /// # Errors
    ///
    /// Returns `hex::FromHexError` if the contents are not valid hex.
    pub fn hex_to_bytes(&self) -> Result<Self, hex::FromHexError> {
        hex::decode(&self.0).map(Self)
    }

    /// View the contents as UTF-8, replacing invalid sequences
    #[must_use]
    pub fn as_utf8(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Borrow the raw bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the blob, returning the underlying vector
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Blob {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes: {})", self.0.len(), self.hex_string())
    }
}
