//! Ownership of the host-defined per-instance state.
//!
//! A [`StateSlot`] goes through exactly two phases: `Active` from the return
//! of the init hook, then `Freed`. There is no way back. The state is
//! handed to the free hook by value, so it can be released at most once.

use std::any::Any;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::host::HookResult;
use crate::policy::HookName;
use crate::trampoline;

/// Host-defined state created by an init hook.
///
/// Hooks receive it as `&mut OpaqueState` and recover their concrete type
/// with [`downcast_mut`](Self::downcast_mut).
pub struct OpaqueState(Box<dyn Any + Send>);

impl OpaqueState {
    pub fn new<T: Any + Send>(value: T) -> Self {
        OpaqueState(Box::new(value))
    }

    /// Empty state for policies that keep nothing.
    pub fn unit() -> Self {
        OpaqueState::new(())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut::<T>()
    }

    /// Takes the concrete value back, or returns the state unchanged when
    /// `T` is not its type.
    pub fn into_inner<T: Any>(self) -> std::result::Result<T, OpaqueState> {
        match self.0.downcast::<T>() {
            Ok(b) => Ok(*b),
            Err(inner) => Err(OpaqueState(inner)),
        }
    }
}

impl fmt::Debug for OpaqueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueState(..)")
    }
}

/// Downcast helper for hooks: a state of the wrong type is a host raise.
pub fn state_mut<T: Any>(state: &mut OpaqueState) -> HookResult<&mut T> {
    state
        .downcast_mut::<T>()
        .ok_or_else(|| format!("opaque state is not a {}", std::any::type_name::<T>()).into())
}

/// Shared-view counterpart of [`state_mut`].
pub fn state_ref<T: Any>(state: &OpaqueState) -> HookResult<&T> {
    state
        .downcast_ref::<T>()
        .ok_or_else(|| format!("opaque state is not a {}", std::any::type_name::<T>()).into())
}

enum Phase {
    Active(OpaqueState),
    Freed,
}

/// Holder of one [`OpaqueState`] for one descriptor.
///
/// The inner lock is only ever taken with `try_lock`: contention means a
/// second hook call raced or re-entered, which is reported instead of
/// waited on.
pub(crate) struct StateSlot {
    phase: Mutex<Phase>,
}

impl StateSlot {
    /// Runs `init` and wraps its state. Nothing is released if `init` fails
    /// because nothing was acquired.
    pub(crate) fn acquire<F>(policy: &str, init: F) -> Result<Self>
    where
        F: FnOnce() -> HookResult<OpaqueState>,
    {
        let state = trampoline::guarded(policy, HookName::Init, init)?;
        debug!(policy, "opaque state acquired");
        Ok(StateSlot {
            phase: Mutex::new(Phase::Active(state)),
        })
    }

    /// Wraps a state that was created by a clone hook.
    pub(crate) fn adopt(state: OpaqueState) -> Self {
        StateSlot {
            phase: Mutex::new(Phase::Active(state)),
        }
    }

    /// `false` once free has begun. A slot with a hook in flight is active.
    pub(crate) fn is_active(&self) -> bool {
        match self.phase.try_lock() {
            Some(guard) => matches!(*guard, Phase::Active(_)),
            None => true,
        }
    }

    /// Lends the state to `f` for the duration of one hook call.
    pub(crate) fn with_active<R>(
        &self,
        policy: &str,
        hook: HookName,
        f: impl FnOnce(&mut OpaqueState) -> R,
    ) -> Result<R> {
        let mut guard = self.phase.try_lock().ok_or_else(|| BridgeError::InFlight {
            policy: policy.to_owned(),
            hook,
        })?;
        match &mut *guard {
            Phase::Active(state) => Ok(f(state)),
            Phase::Freed => Err(BridgeError::Lifecycle(format!(
                "{hook} hook of policy `{policy}` invoked after free"
            ))),
        }
    }

    /// Moves the slot to `Freed` and hands the state to `free`, if any.
    ///
    /// The lock is held while `free` runs, so nothing can reach the state
    /// once release has begun. A raising free hook is logged and swallowed.
    pub(crate) fn release<F>(&self, policy: &str, free: Option<F>) -> Result<()>
    where
        F: FnOnce(OpaqueState) -> HookResult<()>,
    {
        let mut guard = self.phase.try_lock().ok_or_else(|| BridgeError::InFlight {
            policy: policy.to_owned(),
            hook: HookName::Free,
        })?;
        let state = match std::mem::replace(&mut *guard, Phase::Freed) {
            Phase::Active(state) => state,
            Phase::Freed => {
                return Err(BridgeError::Lifecycle(format!(
                    "policy `{policy}` was already freed"
                )))
            }
        };

        match free {
            Some(free) => {
                if let Err(e) = trampoline::guarded(policy, HookName::Free, || free(state)) {
                    warn!(policy, error = %e, "free hook raised during teardown");
                }
            }
            // Without a free hook the state is simply dropped.
            None => drop(state),
        }
        debug!(policy, "opaque state released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type NoFree = fn(OpaqueState) -> HookResult<()>;

    #[test]
    fn failed_init_acquires_nothing() {
        let err = StateSlot::acquire("p", || Err("no memory".into())).err().unwrap();
        assert!(matches!(err, BridgeError::HostCallable { hook: HookName::Init, .. }));
    }

    #[test]
    fn second_release_is_a_lifecycle_error() {
        let slot = StateSlot::acquire("p", || Ok(OpaqueState::unit())).unwrap();
        slot.release::<NoFree>("p", None).unwrap();
        assert!(!slot.is_active());
        let err = slot.release::<NoFree>("p", None).unwrap_err();
        assert!(matches!(err, BridgeError::Lifecycle(_)));
    }

    #[test]
    fn free_receives_the_state_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = StateSlot::acquire("p", || Ok(OpaqueState::new(41u32))).unwrap();
        let c = Arc::clone(&calls);
        slot.release(
            "p",
            Some(move |s: OpaqueState| {
                assert_eq!(s.into_inner::<u32>().unwrap(), 41);
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn raising_free_is_swallowed() {
        let slot = StateSlot::acquire("p", || Ok(OpaqueState::unit())).unwrap();
        let res = slot.release("p", Some(|_s: OpaqueState| -> HookResult<()> { Err("late".into()) }));
        assert!(res.is_ok());
        assert!(!slot.is_active());
    }

    #[test]
    fn access_after_free_is_rejected() {
        let slot = StateSlot::acquire("p", || Ok(OpaqueState::unit())).unwrap();
        slot.release::<NoFree>("p", None).unwrap();
        let err = slot.with_active("p", HookName::Hit, |_| ()).unwrap_err();
        assert!(matches!(err, BridgeError::Lifecycle(_)));
    }

    #[test]
    fn nested_access_fails_fast() {
        let slot = StateSlot::acquire("p", || Ok(OpaqueState::unit())).unwrap();
        let inner = slot
            .with_active("p", HookName::Update, |_| slot.with_active("p", HookName::Admit, |_| ()))
            .unwrap();
        assert!(matches!(inner, Err(BridgeError::InFlight { hook: HookName::Admit, .. })));
    }

    #[test]
    fn state_helpers_downcast() {
        let mut state = OpaqueState::new(vec![1u64, 2]);
        state_mut::<Vec<u64>>(&mut state).unwrap().push(3);
        assert_eq!(state_ref::<Vec<u64>>(&state).unwrap().len(), 3);
        assert!(state_ref::<String>(&state).is_err());
    }
}
