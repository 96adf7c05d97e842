mod admissioner;
mod builder;
mod cache;
mod descriptor;
mod error;
mod host;
mod lifecycle;
mod metrics;
mod request;
mod store;
mod trampoline;
mod translate;
pub mod config;
pub mod policy;
pub mod trace;

pub use admissioner::{Admissioner, PluginAdmissioner};
pub use builder::{PluginAdmissionerBuilder, PluginCacheBuilder};
pub use cache::PluginCache;
pub use config::CommonCacheParams;
pub use descriptor::NAME_LEN;
pub use error::{BridgeError, ErrorKind, NativeError, Result};
pub use host::{HookResult, HostError, HostValue};
pub use lifecycle::{state_mut, state_ref, OpaqueState};
pub use metrics::stats::Metrics;
pub use policy::{AdmissionHookSlots, CacheHookSlots, HookName};
pub use request::{CacheObject, ObjId, ReqOp, Request};
pub use trace::{Reader, VecReader};
pub use translate::{Engine, ExceptionTranslator, TranslationRule};
