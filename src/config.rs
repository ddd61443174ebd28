//! Engine configuration surfaced verbatim by `GET_ENGINE_CONFIG`.
//!
//! A plain struct-of-knobs with a `Default` impl and an `from_env`
//! constructor, rather than a dedicated config-file parser -- transport
//! and packaging concerns are out of scope.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration returned by the `GET_ENGINE_CONFIG` command.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Path to the shared object store's IPC socket.
    pub vineyard_socket: String,
    /// Opaque RPC endpoint string; the transport itself is out of scope.
    pub rpc_endpoint: String,
    /// Whether per-command metrics collection is enabled.
    pub metrics_enabled: bool,
    /// Whether the scoped thread-per-fragment fan-out is used for dynamic
    /// vertex-map copies.
    pub multi_threaded_convert: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vineyard_socket: "/tmp/vineyard.sock".to_string(),
            rpc_endpoint: "unconfigured".to_string(),
            metrics_enabled: cfg!(feature = "metrics"),
            multi_threaded_convert: cfg!(feature = "multi_threaded_convert"),
        }
    }
}

impl EngineConfig {
    /// Build a config from the process environment, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `GRAPE_VINEYARD_SOCKET`, `GRAPE_RPC_ENDPOINT`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("GRAPE_VINEYARD_SOCKET") {
            cfg.vineyard_socket = v;
        }
        if let Ok(v) = env::var("GRAPE_RPC_ENDPOINT") {
            cfg.rpc_endpoint = v;
        }
        cfg
    }

    /// Serialize to the JSON payload `GET_ENGINE_CONFIG` returns.
    ///
    /// # Errors
    /// Returns an error only if the config somehow fails to serialize,
    /// which cannot happen for this plain-data struct in practice.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
