//! Values crossing from the host side back into the engine.

use std::fmt;

/// Dynamically-typed value returned by hooks whose result the engine
/// must inspect (eviction, admit).
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
}

impl HostValue {
    /// Name of the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "none",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "str",
        }
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::None
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

macro_rules! int_host_value {
    ($($t:ty),*) => {
        $(impl From<$t> for HostValue {
            fn from(v: $t) -> Self {
                HostValue::Int(v as i128)
            }
        })*
    };
}

int_host_value!(i32, i64, u32, u64, usize);

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Str(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_owned())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(HostValue::None, Into::into)
    }
}

/// An error raised by a host hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        HostError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostError {}

impl From<String> for HostError {
    fn from(message: String) -> Self {
        HostError { message }
    }
}

impl From<&str> for HostError {
    fn from(message: &str) -> Self {
        HostError::new(message)
    }
}

/// A hook that calls back into a cache or admissioner re-raises its error.
impl From<crate::error::BridgeError> for HostError {
    fn from(e: crate::error::BridgeError) -> Self {
        HostError::new(e.to_string())
    }
}

/// Result type returned by every hook.
pub type HookResult<T> = std::result::Result<T, HostError>;
