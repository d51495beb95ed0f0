//! HTTP request layer
//!
//! The protocol orchestrator composes full URLs; this layer issues the GET
//! and hands back the raw body. The [`RequestClient`] trait is the seam the
//! orchestrator is generic over, so tests can drive the protocol without a
//! network.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

mod client;

pub use client::GsHttpClient;

/// Named timeout class for a request
///
/// Concrete durations are configuration; these are the suggested defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Quick status queries (`serverinfo`, `unpair`)
    Low,
    /// List and asset fetches
    Medium,
    /// Pairing stages and launch, which can block on user interaction
    Long,
}

impl Timeout {
    /// Wall-clock bound for the whole request
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Low => Duration::from_secs(5),
            Self::Medium => Duration::from_secs(10),
            Self::Long => Duration::from_secs(30),
        }
    }
}

/// Transport abstraction for protocol GET requests
///
/// Implementations must report every transport failure (DNS, TCP, TLS
/// handshake, timeout, non-2xx status) as [`crate::GsError::Io`] and must
/// not follow redirects.
#[async_trait]
pub trait RequestClient: Send + Sync {
    /// Issue a GET for `url` bounded by `timeout`, returning the body
    ///
    /// # Errors
    ///
    /// Returns [`crate::GsError::Io`] on any transport failure.
    async fn get(&self, url: &str, timeout: Timeout) -> Result<Vec<u8>>;
}
