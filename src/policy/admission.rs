use std::sync::Arc;

use crate::error::Result;
use crate::host::{HookResult, HostValue};
use crate::lifecycle::OpaqueState;
use crate::request::Request;

use super::{missing, FreeHook, HookName, HookTable};

/// `init(init_params) -> state`
pub type AdmissionInitHook = Arc<dyn Fn(Option<&str>) -> HookResult<OpaqueState> + Send + Sync>;
/// `admit(state, req) -> bool`
pub type AdmitHook = Arc<dyn Fn(&mut OpaqueState, &Request) -> HookResult<HostValue> + Send + Sync>;
/// `update(state, req, cache_size)`
pub type UpdateHook = Arc<dyn Fn(&mut OpaqueState, &Request, u64) -> HookResult<()> + Send + Sync>;
/// `clone(state) -> new state`
///
/// Whether the new state deep-copies or shares host data referenced from the
/// parent is the hook's decision; the state object itself is always new.
pub type CloneHook = Arc<dyn Fn(&OpaqueState) -> HookResult<OpaqueState> + Send + Sync>;

/// Hook slots of an admission policy, each installed or absent.
#[derive(Clone, Default)]
pub struct AdmissionHookSlots {
    pub init: Option<AdmissionInitHook>,
    pub admit: Option<AdmitHook>,
    pub update: Option<UpdateHook>,
    pub clone: Option<CloneHook>,
    pub free: Option<FreeHook>,
}

impl AdmissionHookSlots {
    /// `init` and `admit` are required. An absent `update` is a no-op and an
    /// absent `clone` makes the admissioner non-clonable.
    pub fn install(self) -> Result<AdmissionHooks> {
        const FAMILY: &str = "plugin admissioner";
        Ok(AdmissionHooks {
            init: self.init.ok_or_else(|| missing(FAMILY, HookName::Init))?,
            admit: self.admit.ok_or_else(|| missing(FAMILY, HookName::Admit))?,
            update: self.update,
            clone: self.clone,
            free: self.free,
        })
    }
}

/// Validated hook table of an admission policy.
pub struct AdmissionHooks {
    pub(crate) init: AdmissionInitHook,
    pub(crate) admit: AdmitHook,
    pub(crate) update: Option<UpdateHook>,
    pub(crate) clone: Option<CloneHook>,
    pub(crate) free: Option<FreeHook>,
}

impl AdmissionHooks {
    pub fn is_clonable(&self) -> bool {
        self.clone.is_some()
    }
}

impl HookTable for AdmissionHooks {
    fn free_hook(&self) -> Option<&FreeHook> {
        self.free.as_ref()
    }
}
