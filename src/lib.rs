//! # gamestream
//!
//! A pure Rust client library for the GameStream control protocol spoken by
//! NVIDIA GeForce Experience and Sunshine hosts.
//!
//! ## Features
//!
//! - Server discovery via the `serverinfo` endpoint, with the mandatory
//!   HTTPS→HTTP fallback for unpaired clients
//! - The five-stage PIN pairing handshake (AES-ECB challenges, RSA-signed
//!   attestations, MITM detection)
//! - Session lifecycle: app listing, box art, launch/resume, cancel
//!
//! ## Example
//!
//! ```rust,no_run
//! use gamestream::{AudioConfiguration, GameStreamClient, StreamConfiguration};
//!
//! # async fn example() -> Result<(), gamestream::GsError> {
//! let client = GameStreamClient::new("/var/lib/moonlight/key".as_ref())?;
//! let mut server = client.init("192.168.1.10").await?;
//!
//! if !server.paired {
//!     client.pair(&mut server, "1234").await?;
//! }
//!
//! let apps = client.applist(&server).await?;
//! let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Stereo);
//! client
//!     .start_app(&mut server, &mut config, apps[0].id, true, false, 0x1)
//!     .await?;
//! // server.rtsp_session_url and config.remote_input_aes_key now feed the
//! // downstream streaming transport.
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Orchestrator**: [`GameStreamClient`] - the protocol state machine
//! - **Transport**: [`net::RequestClient`] - pluggable GET transport with
//!   mutual TLS
//! - **Primitives**: [`crypto`], [`xml`], [`Blob`] - handshake building
//!   blocks

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Byte-buffer value type
pub mod blob;
/// Error types
pub mod error;
/// Server and session data types
pub mod server;

/// Testing utilities
pub mod testing;

// Internal modules
mod client;
pub mod crypto;
pub mod net;
pub mod xml;

// Re-exports
pub use blob::Blob;
pub use client::GameStreamClient;
pub use crypto::ClientIdentity;
pub use error::{GsError, GsStatus};
pub use net::{GsHttpClient, RequestClient, Timeout};
pub use server::{
    AppEntry, AudioConfiguration, DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT,
    MAX_SUPPORTED_GFE_VERSION, MIN_SUPPORTED_GFE_VERSION, ServerData, StreamConfiguration,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        AppEntry, AudioConfiguration, Blob, ClientIdentity, GameStreamClient, GsError, GsStatus,
        ServerData, StreamConfiguration,
    };
}
