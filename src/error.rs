//! Error types shared by the bridge and the native engine.

use thiserror::Error;

use crate::policy::HookName;

/// Closed set of error kinds visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Native cache engine invariant violation.
    CacheError,
    /// Malformed trace input.
    ReaderError,
    /// A host hook raised.
    HostCallableError,
    ValueError,
    MemoryError,
    OverflowError,
    IndexError,
    RuntimeError,
    /// A required hook is missing or the configuration is invalid.
    ConfigurationError,
    /// A hook was invoked outside the Active phase of its descriptor.
    LifecycleError,
}

impl ErrorKind {
    /// Stable name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CacheError => "CacheError",
            ErrorKind::ReaderError => "ReaderError",
            ErrorKind::HostCallableError => "HostCallableError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::MemoryError => "MemoryError",
            ErrorKind::OverflowError => "OverflowError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::LifecycleError => "LifecycleError",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Host-visible error. Every failure leaving the crate is one of these.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("cache error: {0}")]
    Cache(String),
    #[error("reader error: {0}")]
    Reader(String),
    #[error("{hook} hook of policy `{policy}` raised: {message}")]
    HostCallable {
        policy: String,
        hook: HookName,
        message: String,
    },
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    Memory(String),
    #[error("{0}")]
    Overflow(String),
    #[error("{0}")]
    Index(String),
    #[error("{0}")]
    Runtime(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
    #[error("{hook} hook of policy `{policy}` invoked while another hook is in flight")]
    InFlight { policy: String, hook: HookName },
    #[error("{hook} hook of policy `{policy}` returned {found}, expected {expected}")]
    ReturnType {
        policy: String,
        hook: HookName,
        expected: &'static str,
        found: &'static str,
    },
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Cache(_) => ErrorKind::CacheError,
            BridgeError::Reader(_) => ErrorKind::ReaderError,
            BridgeError::HostCallable { .. } => ErrorKind::HostCallableError,
            BridgeError::Value(_) => ErrorKind::ValueError,
            BridgeError::Memory(_) => ErrorKind::MemoryError,
            BridgeError::Overflow(_) => ErrorKind::OverflowError,
            BridgeError::Index(_) => ErrorKind::IndexError,
            BridgeError::Runtime(_) => ErrorKind::RuntimeError,
            BridgeError::Configuration(_) => ErrorKind::ConfigurationError,
            BridgeError::Lifecycle(_) | BridgeError::InFlight { .. } => ErrorKind::LifecycleError,
            BridgeError::ReturnType { .. } => ErrorKind::ValueError,
        }
    }
}

/// Failure raised inside the native engine, before translation.
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("{0}")]
    Cache(String),
    #[error("{0}")]
    Reader(String),
    #[error("{0}")]
    Alloc(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    OutOfRange(String),
    #[error("{0}")]
    Domain(String),
    #[error("{0}")]
    Overflow(String),
    #[error("{0}")]
    Range(String),
    #[error("{0}")]
    Runtime(String),
    /// A failure type the engine does not classify.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}
