//! Translation of native failures into host-visible errors.
//!
//! Engine code returns [`Fault`]s. At the public boundary of each cache
//! operation, [`Engine::boundary`] turns them, and any native panic, into a
//! [`BridgeError`] using the translator registered on that engine.

use std::any::Any;
use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{BridgeError, NativeError, Result};
use crate::trampoline::panic_message;

/// A failure travelling through engine code.
#[derive(Debug)]
pub(crate) enum Fault {
    /// Already host-visible (hook raises, lifecycle and type errors).
    Bridge(BridgeError),
    /// Raised by the engine itself; translated at the boundary.
    Native(NativeError),
}

impl From<BridgeError> for Fault {
    fn from(e: BridgeError) -> Self {
        Fault::Bridge(e)
    }
}

impl From<NativeError> for Fault {
    fn from(e: NativeError) -> Self {
        Fault::Native(e)
    }
}

/// Maps an unclassified native error to a host error, or passes.
pub type TranslationRule =
    Box<dyn Fn(&(dyn StdError + Send + Sync + 'static)) -> Option<BridgeError> + Send + Sync>;

/// Ordered mapping from native failures to host errors.
///
/// Known categories are matched by a fixed table. Unclassified errors go
/// through the custom rules in registration order, then fall back to a
/// runtime error.
#[derive(Default)]
pub struct ExceptionTranslator {
    rules: Vec<TranslationRule>,
}

impl ExceptionTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule for [`NativeError::Other`] payloads.
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&(dyn StdError + Send + Sync + 'static)) -> Option<BridgeError> + Send + Sync + 'static,
    {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn translate(&self, err: NativeError) -> BridgeError {
        match err {
            NativeError::Cache(m) => BridgeError::Cache(m),
            NativeError::Reader(m) => BridgeError::Reader(m),
            NativeError::Alloc(m) => BridgeError::Memory(m),
            NativeError::InvalidArgument(m) => BridgeError::Value(m),
            NativeError::OutOfRange(m) => BridgeError::Index(m),
            NativeError::Domain(m) => BridgeError::Value(format!("Domain error: {m}")),
            NativeError::Overflow(m) => BridgeError::Overflow(m),
            NativeError::Range(m) => BridgeError::Value(format!("Range error: {m}")),
            NativeError::Runtime(m) => BridgeError::Runtime(m),
            NativeError::Other(e) => self
                .rules
                .iter()
                .find_map(|rule| rule(&*e))
                .unwrap_or_else(|| BridgeError::Runtime(format!("native exception: {e}"))),
        }
    }

    /// Translates a panic raised by engine code. A `NativeError` payload
    /// (from `panic_any`) is translated like a returned one.
    pub fn translate_panic(&self, payload: Box<dyn Any + Send>) -> BridgeError {
        match payload.downcast::<NativeError>() {
            Ok(native) => self.translate(*native),
            Err(payload) => BridgeError::Runtime(format!(
                "native exception: {}",
                panic_message(payload)
            )),
        }
    }
}

/// Embedding context shared by the caches and admissioners built from it.
///
/// The translator is registered at most once per engine; separate engines
/// in one process each keep their own.
#[derive(Default)]
pub struct Engine {
    translator: OnceLock<ExceptionTranslator>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `translator`. Returns `false`, leaving the installed one in
    /// place, if a translator was already registered or used.
    pub fn register_translator(&self, translator: ExceptionTranslator) -> bool {
        let installed = self.translator.set(translator).is_ok();
        debug!(installed, "exception translator registration");
        installed
    }

    /// The registered translator, installing the default on first use.
    pub fn translator(&self) -> &ExceptionTranslator {
        self.translator.get_or_init(ExceptionTranslator::default)
    }

    /// Runs one engine operation and converts whatever it raises.
    pub(crate) fn boundary<T>(&self, f: impl FnOnce() -> std::result::Result<T, Fault>) -> Result<T> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(Fault::Bridge(e))) => Err(e),
            Ok(Err(Fault::Native(e))) => {
                debug!(error = %e, "translating native error");
                Err(self.translator().translate(e))
            }
            Err(payload) => Err(self.translator().translate_panic(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct DiskFault;

    #[test]
    fn categories_map_most_specific_first() {
        let t = ExceptionTranslator::new();
        let cases = [
            (NativeError::Cache("idx".into()), ErrorKind::CacheError, "cache error: idx"),
            (NativeError::Reader("eof".into()), ErrorKind::ReaderError, "reader error: eof"),
            (NativeError::Alloc("oom".into()), ErrorKind::MemoryError, "oom"),
            (NativeError::InvalidArgument("arg".into()), ErrorKind::ValueError, "arg"),
            (NativeError::OutOfRange("oor".into()), ErrorKind::IndexError, "oor"),
            (NativeError::Domain("sqrt".into()), ErrorKind::ValueError, "Domain error: sqrt"),
            (NativeError::Overflow("big".into()), ErrorKind::OverflowError, "big"),
            (NativeError::Range("r".into()), ErrorKind::ValueError, "Range error: r"),
            (NativeError::Runtime("rt".into()), ErrorKind::RuntimeError, "rt"),
        ];
        for (native, kind, message) in cases {
            let err = t.translate(native);
            assert_eq!(err.kind(), kind);
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn unknown_native_error_is_synthesized() {
        let err = ExceptionTranslator::new().translate(NativeError::Other(Box::new(DiskFault)));
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
        assert_eq!(err.to_string(), "native exception: disk on fire");
    }

    #[test]
    fn custom_rule_claims_its_type() {
        let t = ExceptionTranslator::new().with_rule(|e| {
            e.downcast_ref::<DiskFault>()
                .map(|_| BridgeError::Memory("disk full".into()))
        });
        let err = t.translate(NativeError::Other(Box::new(DiskFault)));
        assert_eq!(err.kind(), ErrorKind::MemoryError);
    }

    #[test]
    fn registration_is_idempotent() {
        let engine = Engine::new();
        assert!(engine.register_translator(ExceptionTranslator::new()));
        assert!(!engine.register_translator(ExceptionTranslator::new()));
    }

    #[test]
    fn first_use_installs_default() {
        let engine = Engine::new();
        let _ = engine.translator();
        assert!(!engine.register_translator(ExceptionTranslator::new()));
    }

    #[test]
    fn boundary_contains_native_panics() {
        let engine = Engine::new();
        let err = engine
            .boundary::<()>(|| panic!("corrupted index"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
        assert_eq!(err.to_string(), "native exception: corrupted index");

        let err = engine
            .boundary::<()>(|| std::panic::panic_any(NativeError::OutOfRange("slot 9".into())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexError);
    }
}
