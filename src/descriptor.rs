//! The installed plugin instance: name, hook table and opaque state.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::host::HookResult;
use crate::lifecycle::{OpaqueState, StateSlot};
use crate::policy::{HookName, HookTable};
use crate::trampoline;

/// Size of the engine's name field, terminator included.
pub const NAME_LEN: usize = 64;

/// Truncates `name` to fit the engine's name field.
pub fn bounded_name(name: &str) -> String {
    let mut end = name.len().min(NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

/// One plugin instance.
///
/// Owns exactly one [`OpaqueState`]. Dropping the descriptor releases the
/// state through the free hook unless it was already released.
pub struct PolicyDescriptor<H: HookTable> {
    name: String,
    init_params: Option<String>,
    hooks: Arc<H>,
    slot: StateSlot,
}

impl<H: HookTable> PolicyDescriptor<H> {
    /// Builds a descriptor by running `init`. Fails without side effects if
    /// `init` raises.
    pub(crate) fn create<F>(
        name: &str,
        init_params: Option<String>,
        hooks: Arc<H>,
        init: F,
    ) -> Result<Self>
    where
        F: FnOnce(&H) -> HookResult<OpaqueState>,
    {
        let name = bounded_name(name);
        let slot = StateSlot::acquire(&name, || init(&hooks))?;
        debug!(policy = %name, "policy descriptor created");
        Ok(PolicyDescriptor {
            name,
            init_params,
            hooks,
            slot,
        })
    }

    /// Builds a descriptor around a state produced elsewhere (clone).
    pub(crate) fn adopt(
        name: String,
        init_params: Option<String>,
        hooks: Arc<H>,
        state: OpaqueState,
    ) -> Self {
        debug!(policy = %name, "policy descriptor adopted cloned state");
        PolicyDescriptor {
            name,
            init_params,
            hooks,
            slot: StateSlot::adopt(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init_params(&self) -> Option<&str> {
        self.init_params.as_deref()
    }

    pub fn hooks(&self) -> &Arc<H> {
        &self.hooks
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }

    /// Invokes one hook through the trampoline.
    pub(crate) fn call<R>(
        &self,
        hook: HookName,
        f: impl FnOnce(&H, &mut OpaqueState) -> HookResult<R>,
    ) -> Result<R> {
        let hooks = &*self.hooks;
        trampoline::call(&self.slot, &self.name, hook, |state| f(hooks, state))
    }

    /// Releases the state. A second call is a lifecycle error.
    pub(crate) fn free(&self) -> Result<()> {
        let free = self.hooks.free_hook().map(|f| move |state: OpaqueState| f(state));
        self.slot.release(&self.name, free)
    }
}

impl<H: HookTable> Drop for PolicyDescriptor<H> {
    fn drop(&mut self) {
        if self.slot.is_active() {
            // Release errors are already logged; nothing else to do on drop.
            let _ = self.free();
        }
    }
}
