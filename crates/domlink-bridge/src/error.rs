//! Error types for the bridge crate.

use domlink_core::DocumentError;
use thiserror::Error;

/// Bridge error type
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Access outside the guest's linear memory
    #[error("memory access out of bounds: ptr={ptr} len={len} memory_size={memory_size}")]
    MemoryAccess {
        /// Start offset requested
        ptr: u32,
        /// Number of bytes requested
        len: u32,
        /// Current size of linear memory in bytes
        memory_size: usize,
    },

    /// The guest allocator returned a null pointer
    #[error("guest allocator returned null for {len} bytes")]
    AllocationFailed {
        /// Bytes requested
        len: u32,
    },

    /// The guest's launch entry point reported failure
    #[error("launch entry point returned false")]
    LaunchFailed,

    /// A required guest export is missing or has the wrong type
    #[error("missing guest export: {0}")]
    MissingExport(String),

    /// Resource exhausted
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Host document operation failed
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// WebAssembly runtime error, including guest traps
    #[error("WASM error: {0}")]
    WasmError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
