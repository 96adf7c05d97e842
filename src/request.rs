//! Request and cached-object descriptors.
//!
//! Both are owned by the engine. Hooks only ever see `&Request`, and the
//! borrow cannot outlive the hook call.

use serde::{Deserialize, Serialize};

/// Identifier of a simulated object.
pub type ObjId = u64;

/// Kind of access carried by a [`Request`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReqOp {
    #[default]
    Read,
    Write,
    Delete,
}

/// One simulated access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Logical or physical timestamp of the access.
    #[serde(default)]
    pub clock_time: u64,
    pub obj_id: ObjId,
    pub obj_size: u64,
    #[serde(default)]
    pub op: ReqOp,
    /// Time-to-live override; `None` falls back to the cache default.
    #[serde(default)]
    pub ttl: Option<u64>,
    /// Virtual time of the next access to the same object, when known.
    #[serde(default)]
    pub next_access_vtime: Option<u64>,
}

impl Request {
    pub fn new(obj_id: ObjId, obj_size: u64) -> Self {
        Request {
            clock_time: 0,
            obj_id,
            obj_size,
            op: ReqOp::Read,
            ttl: None,
            next_access_vtime: None,
        }
    }

    pub fn with_op(mut self, op: ReqOp) -> Self {
        self.op = op;
        self
    }

    pub fn at(mut self, clock_time: u64) -> Self {
        self.clock_time = clock_time;
        self
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_next_access(mut self, vtime: u64) -> Self {
        self.next_access_vtime = Some(vtime);
        self
    }
}

/// A cached object as reported back to callers of the cache surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheObject {
    pub obj_id: ObjId,
    pub obj_size: u64,
    /// Clock time at which the object was admitted.
    pub create_time: u64,
    /// Absolute expiry clock time. `None` = never expires.
    pub exp_time: Option<u64>,
}

impl CacheObject {
    #[inline]
    pub fn is_expired_at(&self, clock_time: u64) -> bool {
        matches!(self.exp_time, Some(exp) if clock_time >= exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_with_defaults() {
        let req: Request = serde_json::from_str(r#"{"obj_id": 7, "obj_size": 3}"#).unwrap();
        assert_eq!(req, Request::new(7, 3));
    }

    #[test]
    fn delete_op_parses_lowercase() {
        let req: Request =
            serde_json::from_str(r#"{"obj_id": 1, "obj_size": 1, "op": "delete"}"#).unwrap();
        assert_eq!(req.op, ReqOp::Delete);
    }

    #[test]
    fn expiry_is_inclusive() {
        let obj = CacheObject {
            obj_id: 1,
            obj_size: 1,
            create_time: 0,
            exp_time: Some(10),
        };
        assert!(!obj.is_expired_at(9));
        assert!(obj.is_expired_at(10));
    }
}
