// Shared transport configuration for building reqwest::Client instances.
//
// The accessory API is plain HTTP on the loopback network (insecure mode
// by definition), so there is no TLS knob here — only timeout tuning.

use std::time::Duration;

/// Default per-request timeout. A hung endpoint must never stall a
/// registry refresh indefinitely.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        Ok(reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("homefly/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}
