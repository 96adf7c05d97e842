//! The hook protocol a host policy must satisfy.
//!
//! A policy is a table of named hook slots. Each slot is either installed
//! or absent (`Option`); required slots are checked once, when the table is
//! installed, instead of at every call site.
//!
//! Hooks are plain shared closures. They hold no instance data: everything
//! an instance knows lives in its [`OpaqueState`], which the bridge threads
//! through every call, so one table serves an admissioner and all of its
//! clones.

pub mod admission;
pub mod cache;

use std::fmt;
use std::sync::Arc;

use crate::host::HookResult;
use crate::lifecycle::OpaqueState;

pub use admission::{AdmissionHookSlots, AdmissionHooks};
pub use cache::{CacheHookSlots, CacheHooks};

/// Name of a hook slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookName {
    Init,
    Hit,
    Miss,
    Eviction,
    Remove,
    Free,
    Admit,
    Update,
    Clone,
}

impl HookName {
    pub fn as_str(self) -> &'static str {
        match self {
            HookName::Init => "init",
            HookName::Hit => "hit",
            HookName::Miss => "miss",
            HookName::Eviction => "eviction",
            HookName::Remove => "remove",
            HookName::Free => "free",
            HookName::Admit => "admit",
            HookName::Update => "update",
            HookName::Clone => "clone",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Releases an instance's state. Takes ownership, so it can run only once.
pub type FreeHook = Arc<dyn Fn(OpaqueState) -> HookResult<()> + Send + Sync>;

/// A complete, validated hook table.
pub trait HookTable: Send + Sync + 'static {
    /// Optional teardown hook.
    fn free_hook(&self) -> Option<&FreeHook>;
}

/// Error message for a required slot left empty.
pub(crate) fn missing(family: &str, hook: HookName) -> crate::error::BridgeError {
    crate::error::BridgeError::Configuration(format!("{family} is missing its {hook} hook"))
}
