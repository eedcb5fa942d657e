//! Configuration for the bridge runtime.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// WASI capability grants for a module.
///
/// Deny-by-default: everything starts disabled and must be enabled
/// explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasiCapabilities {
    /// Allow writing to stdout
    pub stdout: bool,

    /// Allow writing to stderr
    pub stderr: bool,

    /// Environment variables to expose
    pub env_vars: Vec<(String, String)>,

    /// Command-line arguments to pass
    pub args: Vec<String>,
}

impl WasiCapabilities {
    /// Nothing allowed
    pub fn none() -> Self {
        Self::default()
    }

    /// stdout and stderr allowed
    pub fn with_stdio() -> Self {
        Self {
            stdout: true,
            stderr: true,
            ..Default::default()
        }
    }

    /// Builder: enable stdout
    pub fn stdout(mut self, allow: bool) -> Self {
        self.stdout = allow;
        self
    }

    /// Builder: enable stderr
    pub fn stderr(mut self, allow: bool) -> Self {
        self.stderr = allow;
        self
    }

    /// Builder: add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Builder: add command-line argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Names of the exports the bridge calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportNames {
    /// `allocate(len) -> ptr`
    pub allocate: String,

    /// `launch() -> bool`
    pub launch: String,

    /// `dispatchEvent(dispatch_id)`
    pub dispatch: String,
}

impl Default for ExportNames {
    fn default() -> Self {
        Self {
            allocate: "allocate".to_string(),
            launch: "launch".to_string(),
            dispatch: "dispatchEvent".to_string(),
        }
    }
}

impl ExportNames {
    /// All three names, in `allocate`, `launch`, `dispatch` order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            self.allocate.as_str(),
            self.launch.as_str(),
            self.dispatch.as_str(),
        ]
        .into_iter()
    }
}

/// Configuration for the bridge runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// WASI capability configuration
    pub capabilities: WasiCapabilities,

    /// Export names the bridge calls
    pub exports: ExportNames,

    /// Maximum linear memory in bytes (default = 64MB)
    pub max_memory: usize,

    /// Maximum handles issued per session
    pub max_objects: usize,

    /// Fuel per session, `None` to disable metering
    pub fuel_limit: Option<u64>,

    /// Cranelift optimization level (0-2)
    pub optimization_level: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capabilities: WasiCapabilities::none(),
            exports: ExportNames::default(),
            max_memory: 64 * 1024 * 1024, // 64 MB
            max_objects: 1 << 20,
            fuel_limit: None,
            optimization_level: 2,
        }
    }
}

impl BridgeConfig {
    /// Tight limits for untrusted modules
    pub fn minimal() -> Self {
        Self {
            max_memory: 16 * 1024 * 1024, // 16 MB
            max_objects: 64 * 1024,
            fuel_limit: Some(1_000_000_000), // 1B fuel units
            ..Default::default()
        }
    }

    /// Config for development/debugging
    pub fn development() -> Self {
        Self {
            capabilities: WasiCapabilities::with_stdio(),
            optimization_level: 0, // Faster compilation
            ..Default::default()
        }
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| BridgeError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BridgeError::ConfigError(e.to_string()))
    }

    /// Builder: set capabilities
    pub fn capabilities(mut self, caps: WasiCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    /// Builder: set export names
    pub fn exports(mut self, exports: ExportNames) -> Self {
        self.exports = exports;
        self
    }

    /// Builder: set max memory
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Builder: set max handles per session
    pub fn max_objects(mut self, count: usize) -> Self {
        self.max_objects = count;
        self
    }

    /// Builder: set fuel limit
    pub fn fuel_limit(mut self, fuel: u64) -> Self {
        self.fuel_limit = Some(fuel);
        self
    }

    /// Builder: set optimization level
    pub fn optimize(mut self, level: u8) -> Self {
        self.optimization_level = level.min(2);
        self
    }
}
