//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a minimal (or absent) config file works.

use serde::{Deserialize, Serialize};

/// Root configuration for the warden demo server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WardenConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deadline enforcement settings.
    pub deadline: DeadlineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Deadline enforcement settings. Fixed before traffic begins; the
/// middleware never re-reads configuration mid-request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Base processing timeout in seconds. 0 disables the base deadline;
    /// staleness rejection still applies.
    pub timeout_secs: u64,

    /// Extra seconds of age budget granted to requests carrying a body,
    /// compensating for upload time spent before processing started.
    pub overtime_secs: u64,

    /// Report the configured base timeout in every timeout error instead of
    /// the possibly clipped per-request value, so log aggregators can bucket
    /// all timeouts under a single message.
    pub simple_errors: bool,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            overtime_secs: 60,
            simple_errors: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when RUST_LOG is
    /// unset.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
