//! Invocation of host hooks from engine code.
//!
//! Every crossing goes through [`guarded`]: the hook runs synchronously on
//! the calling thread, and whatever it raises (an `Err` or a panic) comes
//! back as [`BridgeError::HostCallable`]. Nothing raised by a hook unwinds
//! into engine frames.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::trace;

use crate::error::{BridgeError, Result};
use crate::host::{HookResult, HostValue};
use crate::lifecycle::{OpaqueState, StateSlot};
use crate::policy::HookName;
use crate::request::ObjId;

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one host hook and converts a raise into a native-typed error.
pub(crate) fn guarded<R>(
    policy: &str,
    hook: HookName,
    f: impl FnOnce() -> HookResult<R>,
) -> Result<R> {
    trace!(policy, %hook, "invoking hook");
    let message = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(raised)) => raised.message().to_owned(),
        Err(payload) => format!("hook panicked: {}", panic_message(payload)),
    };
    trace!(policy, %hook, %message, "hook raised");
    Err(BridgeError::HostCallable {
        policy: policy.to_owned(),
        hook,
        message,
    })
}

/// Single-flight call of a hook that needs the instance state.
pub(crate) fn call<R>(
    slot: &StateSlot,
    policy: &str,
    hook: HookName,
    f: impl FnOnce(&mut OpaqueState) -> HookResult<R>,
) -> Result<R> {
    slot.with_active(policy, hook, |state| guarded(policy, hook, || f(state)))?
}

// ---------------------------------------------------------------------------
// Return-value validation
// ---------------------------------------------------------------------------

/// Converts an eviction hook's return value into an object id.
///
/// Integers must fit in `u64`. Strings must hold a decimal `u64`; they name
/// the same object as the equal integer. Everything else is rejected.
pub(crate) fn victim_id(policy: &str, value: HostValue) -> Result<ObjId> {
    match value {
        HostValue::Int(i) => ObjId::try_from(i).map_err(|_| {
            BridgeError::Overflow(format!(
                "eviction hook of policy `{policy}` returned id {i} outside the object id range"
            ))
        }),
        HostValue::Str(s) => s.trim().parse::<ObjId>().map_err(|_| {
            BridgeError::Value(format!(
                "eviction hook of policy `{policy}` returned string id {s:?} which is not a decimal object id"
            ))
        }),
        other => Err(BridgeError::ReturnType {
            policy: policy.to_owned(),
            hook: HookName::Eviction,
            expected: "int or str object id",
            found: other.type_name(),
        }),
    }
}

/// Converts an admit hook's return value into a decision.
pub(crate) fn admission(policy: &str, value: HostValue) -> Result<bool> {
    match value {
        HostValue::Bool(b) => Ok(b),
        other => Err(BridgeError::ReturnType {
            policy: policy.to_owned(),
            hook: HookName::Admit,
            expected: "bool",
            found: other.type_name(),
        }),
    }
}
