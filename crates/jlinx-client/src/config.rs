//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use jlinx_host_client::DEFAULT_HOST_URL;

/// Configuration for a [`crate::JlinxClient`] talking to a remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the jlinx host.
    pub host_url: String,
    /// Timeout for a single host request.
    pub request_timeout: Duration,
    /// Upper bound for one long-poll; the host default when unset.
    pub wait_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_url: DEFAULT_HOST_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            wait_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host_url: impl Into<String>) -> Self {
        Self {
            host_url: host_url.into(),
            ..Default::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}
