use std::sync::Arc;

use crate::config::CommonCacheParams;
use crate::error::Result;
use crate::host::{HookResult, HostValue};
use crate::lifecycle::OpaqueState;
use crate::request::{ObjId, Request};

use super::{missing, FreeHook, HookName, HookTable};

/// `init(params) -> state`
pub type CacheInitHook = Arc<dyn Fn(&CommonCacheParams) -> HookResult<OpaqueState> + Send + Sync>;
/// `hit(state, req)` / `miss(state, req)`
pub type RequestHook = Arc<dyn Fn(&mut OpaqueState, &Request) -> HookResult<()> + Send + Sync>;
/// `eviction(state, req) -> id`
pub type EvictionHook =
    Arc<dyn Fn(&mut OpaqueState, &Request) -> HookResult<HostValue> + Send + Sync>;
/// `remove(state, id)`
pub type RemoveHook = Arc<dyn Fn(&mut OpaqueState, ObjId) -> HookResult<()> + Send + Sync>;

/// Hook slots of an eviction policy, each installed or absent.
#[derive(Clone, Default)]
pub struct CacheHookSlots {
    pub init: Option<CacheInitHook>,
    pub hit: Option<RequestHook>,
    pub miss: Option<RequestHook>,
    pub eviction: Option<EvictionHook>,
    pub remove: Option<RemoveHook>,
    pub free: Option<FreeHook>,
}

impl CacheHookSlots {
    /// Checks that every required slot is filled.
    ///
    /// `free` is the only optional hook.
    pub fn install(self) -> Result<CacheHooks> {
        const FAMILY: &str = "plugin cache";
        Ok(CacheHooks {
            init: self.init.ok_or_else(|| missing(FAMILY, HookName::Init))?,
            hit: self.hit.ok_or_else(|| missing(FAMILY, HookName::Hit))?,
            miss: self.miss.ok_or_else(|| missing(FAMILY, HookName::Miss))?,
            eviction: self.eviction.ok_or_else(|| missing(FAMILY, HookName::Eviction))?,
            remove: self.remove.ok_or_else(|| missing(FAMILY, HookName::Remove))?,
            free: self.free,
        })
    }
}

/// Validated hook table of an eviction policy.
pub struct CacheHooks {
    pub(crate) init: CacheInitHook,
    pub(crate) hit: RequestHook,
    pub(crate) miss: RequestHook,
    pub(crate) eviction: EvictionHook,
    pub(crate) remove: RemoveHook,
    pub(crate) free: Option<FreeHook>,
}

impl HookTable for CacheHooks {
    fn free_hook(&self) -> Option<&FreeHook> {
        self.free.as_ref()
    }
}
