use cachesim_plugin::config::load_from_str;
use cachesim_plugin::{
    BridgeError, Engine, ErrorKind, ExceptionTranslator, NativeError, OpaqueState, PluginCache,
    PluginCacheBuilder, Reader, Request,
};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("checksum mismatch at block {0}")]
struct ChecksumError(u64);

/// A reader that yields `good` requests and then fails with `fail`.
struct FailingReader {
    good: u64,
    pos: u64,
    fail: fn(u64) -> NativeError,
}

impl Reader for FailingReader {
    fn reset(&mut self) -> Result<(), NativeError> {
        self.pos = 0;
        Ok(())
    }

    fn next_req(&mut self) -> Result<Option<Request>, NativeError> {
        if self.pos == self.good {
            return Err((self.fail)(self.pos));
        }
        self.pos += 1;
        Ok(Some(Request::new(self.pos, 1).at(self.pos)))
    }
}

fn never_evicting(cache_size: u64) -> PluginCacheBuilder {
    PluginCache::builder(cache_size)
        .init_hook(|_| Ok(OpaqueState::unit()))
        .hit_hook(|_, _| Ok(()))
        .miss_hook(|_, _| Ok(()))
        .eviction_hook(|_, req| Ok(req.obj_id))
        .remove_hook(|_, _| Ok(()))
}

// ---------------------------------------------------------------------------
// Native error translation
// ---------------------------------------------------------------------------

#[test]
fn reader_failure_surfaces_as_reader_error() {
    let mut cache = never_evicting(100).build().unwrap();
    let mut reader = FailingReader {
        good: 3,
        pos: 0,
        fail: |pos| NativeError::Reader(format!("truncated record at {pos}")),
    };
    let err = cache.process_trace(&mut reader, 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReaderError);
    assert_eq!(err.to_string(), "reader error: truncated record at 3");
    assert_eq!(cache.get_n_obj(), 3);
}

#[test]
fn unclassified_error_uses_fallback_message() {
    let mut cache = never_evicting(100).build().unwrap();
    let mut reader = FailingReader {
        good: 0,
        pos: 0,
        fail: |pos| NativeError::Other(Box::new(ChecksumError(pos))),
    };
    let err = cache.process_trace(&mut reader, 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    assert_eq!(err.to_string(), "native exception: checksum mismatch at block 0");
}

#[test]
fn registered_rule_claims_unclassified_error() {
    let engine = Arc::new(Engine::new());
    assert!(engine.register_translator(ExceptionTranslator::new().with_rule(|e| {
        e.downcast_ref::<ChecksumError>()
            .map(|c| BridgeError::Reader(format!("corrupt block {}", c.0)))
    })));

    let mut cache = never_evicting(100).engine(Arc::clone(&engine)).build().unwrap();
    let mut reader = FailingReader {
        good: 2,
        pos: 0,
        fail: |pos| NativeError::Other(Box::new(ChecksumError(pos))),
    };
    let err = cache.process_trace(&mut reader, 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReaderError);
    assert_eq!(err.to_string(), "reader error: corrupt block 2");
}

#[test]
fn translator_registration_is_scoped_to_its_engine() {
    let shared = Arc::new(Engine::new());
    let mut a = never_evicting(10).engine(Arc::clone(&shared)).build().unwrap();
    let _b = never_evicting(10).engine(Arc::clone(&shared)).build().unwrap();
    assert!(Arc::ptr_eq(a.engine(), &shared));

    // First translation installs the default.
    assert!(a.insert(&Request::new(1, 11)).is_err());
    assert!(!shared.register_translator(ExceptionTranslator::new()));

    let other = Engine::new();
    assert!(other.register_translator(ExceptionTranslator::new()));
}

#[test]
fn panicking_reader_becomes_runtime_error() {
    struct Broken;
    impl Reader for Broken {
        fn reset(&mut self) -> Result<(), NativeError> {
            Ok(())
        }
        fn next_req(&mut self) -> Result<Option<Request>, NativeError> {
            panic!("reader state corrupted")
        }
    }

    let mut cache = never_evicting(10).build().unwrap();
    let err = cache.process_trace(&mut Broken, 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    assert_eq!(err.to_string(), "native exception: reader state corrupted");

    // The cache survives a contained panic.
    assert!(!cache.get(&Request::new(1, 1)).unwrap());
}

#[test]
fn engine_invariants_surface_as_cache_errors() {
    let mut cache = never_evicting(10).build().unwrap();
    cache.insert(&Request::new(1, 1)).unwrap();
    let err = cache.insert(&Request::new(1, 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheError);
    assert!(err.to_string().starts_with("cache error: "));

    let err = cache.insert(&Request::new(2, 11)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueError);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn each_missing_cache_hook_is_named() {
    let err = PluginCache::builder(10)
        .init_hook(|_| Ok(OpaqueState::unit()))
        .hit_hook(|_, _| Ok(()))
        .miss_hook(|_, _| Ok(()))
        .remove_hook(|_, _| Ok(()))
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert_eq!(
        err.to_string(),
        "configuration error: plugin cache is missing its eviction hook"
    );
}

#[test]
fn yaml_params_drive_the_builder() {
    let params = load_from_str("cache_size: 4096\ndefault_ttl: 0\n").unwrap();
    assert_eq!(params.cache_size, 4096);
    let cache = PluginCacheBuilder::with_params(params)
        .init_hook(|p| Ok(OpaqueState::new(p.cache_size)))
        .hit_hook(|_, _| Ok(()))
        .miss_hook(|_, _| Ok(()))
        .eviction_hook(|_, req| Ok(req.obj_id))
        .remove_hook(|_, _| Ok(()))
        .build()
        .unwrap();
    assert_eq!(cache.cache_size(), 4096);
    assert_eq!(cache.params().default_ttl, 0);
}

#[test]
fn unknown_yaml_field_is_rejected() {
    let err = load_from_str("cache_size: 10\neviction: lru\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}
