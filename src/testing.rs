//! Testing utilities
//!
//! A scriptable [`RequestClient`] so the protocol orchestrator can be
//! exercised without a network or a real GameStream host.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::net::{RequestClient, Timeout};

/// Handler invoked by [`MockRequestClient`] for each request
pub type MockHandler = Box<dyn Fn(&str) -> Result<Vec<u8>> + Send + Sync>;

/// A [`RequestClient`] that records every URL and answers from a handler
///
/// The handler sees the full request URL and returns the response body (or
/// a transport error), so tests can script entire protocol conversations
/// and then assert on the recorded exchange.
pub struct MockRequestClient {
    handler: MockHandler,
    requests: Mutex<Vec<String>>,
}

impl MockRequestClient {
    /// Create a mock that answers every request with `handler`
    pub fn new(handler: impl Fn(&str) -> Result<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every URL requested so far, in order
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests issued so far
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl RequestClient for MockRequestClient {
    async fn get(&self, url: &str, _timeout: Timeout) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_owned());
        (self.handler)(url)
    }
}

/// Build a minimal XML response with the given status code and body
#[must_use]
pub fn xml_response(status_code: u16, inner: &str) -> Vec<u8> {
    format!(r#"<root status_code="{status_code}">{inner}</root>"#).into_bytes()
}
