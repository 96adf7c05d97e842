//! Cache parameters and init-string parsing.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

pub const DEFAULT_TTL: u64 = 86400 * 300;
pub const DEFAULT_HASHPOWER: u8 = 24;
/// Bytes charged per resident object when metadata is counted.
pub const OBJ_MD_SIZE: u64 = 16;

/// Parameters shared by every cache, handed to the cache init hook.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommonCacheParams {
    /// Capacity in bytes (sum of object sizes).
    pub cache_size: u64,
    /// TTL applied to requests without their own; `0` disables expiry.
    #[serde(default = "default_ttl")]
    pub default_ttl: u64,
    /// log2 of the initial object-table size hint.
    #[serde(default = "default_hashpower")]
    pub hashpower: u8,
    /// Charge [`OBJ_MD_SIZE`] extra bytes per object against capacity.
    #[serde(default)]
    pub consider_obj_metadata: bool,
}

fn default_ttl() -> u64 {
    DEFAULT_TTL
}

fn default_hashpower() -> u8 {
    DEFAULT_HASHPOWER
}

impl CommonCacheParams {
    pub fn new(cache_size: u64) -> Self {
        CommonCacheParams {
            cache_size,
            default_ttl: DEFAULT_TTL,
            hashpower: DEFAULT_HASHPOWER,
            consider_obj_metadata: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_size == 0 {
            return Err(BridgeError::Configuration(
                "cache_size must be greater than 0".into(),
            ));
        }
        if !(1..=40).contains(&self.hashpower) {
            return Err(BridgeError::Configuration(format!(
                "hashpower must be in 1..=40, got {}",
                self.hashpower
            )));
        }
        Ok(())
    }

    /// Per-object overhead counted against capacity.
    #[inline]
    pub fn obj_md_size(&self) -> u64 {
        if self.consider_obj_metadata {
            OBJ_MD_SIZE
        } else {
            0
        }
    }

    /// Bytes an object of `obj_size` occupies once resident.
    #[inline]
    pub fn charged_size(&self, obj_size: u64) -> u64 {
        obj_size.saturating_add(self.obj_md_size())
    }

    /// Initial capacity for the object table, capped so a large hashpower
    /// does not pre-allocate gigabytes.
    pub(crate) fn table_capacity(&self) -> usize {
        1usize << self.hashpower.min(16)
    }
}

pub fn load_from_file(path: &str) -> Result<CommonCacheParams> {
    let s = fs::read_to_string(path)
        .map_err(|e| BridgeError::Configuration(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<CommonCacheParams> {
    let params: CommonCacheParams = serde_yaml::from_str(s)
        .map_err(|e| BridgeError::Configuration(format!("invalid yaml: {e}")))?;
    params.validate()?;
    Ok(params)
}

/// Splits an opaque init string of the form `key=value,key=value`.
///
/// Whitespace around keys and values is ignored, as are empty segments.
pub fn parse_init_params(s: &str) -> Result<Vec<(String, String)>> {
    s.split(',')
        .map(str::trim)
        .filter(|seg| !seg.is_empty())
        .map(|seg| match seg.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_owned(), v.trim().to_owned())),
            _ => Err(BridgeError::Value(format!(
                "malformed init parameter {seg:?}, expected key=value"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn yaml_fills_defaults() {
        let params = load_from_str("cache_size: 1024\n").unwrap();
        assert_eq!(params, CommonCacheParams::new(1024));
    }

    #[test]
    fn metadata_charge_is_opt_in() {
        let params = load_from_str("cache_size: 64\nconsider_obj_metadata: true\n").unwrap();
        assert_eq!(params.charged_size(10), 10 + OBJ_MD_SIZE);
        assert_eq!(CommonCacheParams::new(64).charged_size(10), 10);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = load_from_str("cache_size: 10\nhashpowr: 3\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(load_from_str("cache_size: 0\n").is_err());
    }

    #[test]
    fn init_params_split() {
        let kv = parse_init_params("prob=0.5, size = 10,").unwrap();
        assert_eq!(
            kv,
            vec![("prob".into(), "0.5".into()), ("size".into(), "10".into())]
        );
        assert_eq!(parse_init_params("novalue").unwrap_err().kind(), ErrorKind::ValueError);
    }
}
