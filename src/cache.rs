use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::admissioner::Admissioner;
use crate::builder::PluginCacheBuilder;
use crate::config::CommonCacheParams;
use crate::descriptor::PolicyDescriptor;
use crate::error::{NativeError, Result};
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::policy::{CacheHooks, HookName};
use crate::request::{CacheObject, ObjId, ReqOp, Request};
use crate::store::ObjectTable;
use crate::trace::Reader;
use crate::trampoline;
use crate::translate::{Engine, Fault};

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// Everything but the engine handle, so a boundary closure can borrow it
/// while the engine is borrowed separately.
struct Core {
    params: CommonCacheParams,
    policy: PolicyDescriptor<CacheHooks>,
    admissioner: Option<Box<dyn Admissioner>>,
    store: ObjectTable,
    stats: StatsCounter,
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A cache whose eviction decisions are made by host hooks.
///
/// The cache owns the object table and capacity accounting; the policy
/// only names victims. Every operation runs on the caller's thread and
/// calls hooks synchronously, in request order.
///
/// # Example
/// ```
/// use std::collections::VecDeque;
/// use cachesim_plugin::{state_mut, OpaqueState, PluginCache, Request};
///
/// let mut cache = PluginCache::builder(2)
///     .name("FIFO")
///     .init_hook(|_params| Ok(OpaqueState::new(VecDeque::<u64>::new())))
///     .hit_hook(|_state, _req| Ok(()))
///     .miss_hook(|state, req| {
///         state_mut::<VecDeque<u64>>(state)?.push_back(req.obj_id);
///         Ok(())
///     })
///     .eviction_hook(|state, _req| {
///         state_mut::<VecDeque<u64>>(state)?.front().copied().ok_or_else(|| "empty".into())
///     })
///     .remove_hook(|state, obj_id| {
///         state_mut::<VecDeque<u64>>(state)?.retain(|&id| id != obj_id);
///         Ok(())
///     })
///     .build()
///     .unwrap();
///
/// for id in [1, 2, 3] {
///     assert!(!cache.get(&Request::new(id, 1)).unwrap());
/// }
/// assert!(cache.get(&Request::new(3, 1)).unwrap());
/// assert_eq!(cache.get_n_obj(), 2);
/// ```
pub struct PluginCache {
    engine: Arc<Engine>,
    core: Core,
}

impl PluginCache {
    pub(crate) fn new(
        name: &str,
        params: CommonCacheParams,
        hooks: Arc<CacheHooks>,
        admissioner: Option<Box<dyn Admissioner>>,
        engine: Arc<Engine>,
    ) -> Result<Self> {
        params.validate()?;
        let policy = PolicyDescriptor::create(name, None, hooks, |hooks| (hooks.init)(&params))?;
        debug!(
            policy = %policy.name(),
            cache_size = params.cache_size,
            admissioner = admissioner.as_ref().map(|a| a.name()),
            "plugin cache created"
        );
        Ok(PluginCache {
            engine,
            core: Core {
                store: ObjectTable::with_capacity(params.table_capacity(), params.obj_md_size()),
                params,
                policy,
                admissioner,
                stats: StatsCounter::new(),
            },
        })
    }

    /// Returns a [`PluginCacheBuilder`] for a cache of `cache_size` bytes.
    pub fn builder(cache_size: u64) -> PluginCacheBuilder {
        PluginCacheBuilder::new(cache_size)
    }

    // -----------------------------------------------------------------------
    // Request path
    // -----------------------------------------------------------------------

    /// Serves one request. Returns `true` on a hit.
    ///
    /// A miss is inserted when [`can_insert`](Self::can_insert) allows it.
    /// `Delete` requests remove the object and never hit.
    pub fn get(&mut self, req: &Request) -> Result<bool> {
        self.engine.boundary(|| self.core.get(req))
    }

    /// Looks the request's object up. With `update_cache` the hit hook
    /// fires on a hit and expired objects are dropped; without it this is a
    /// pure lookup.
    pub fn find(&mut self, req: &Request, update_cache: bool) -> Result<Option<CacheObject>> {
        self.engine.boundary(|| self.core.find(req, update_cache))
    }

    /// `false` if the object is larger than the cache or the admissioner
    /// refuses it.
    pub fn can_insert(&self, req: &Request) -> Result<bool> {
        self.engine.boundary(|| self.core.can_insert(req))
    }

    /// Inserts a missed object, evicting until it fits.
    pub fn insert(&mut self, req: &Request) -> Result<CacheObject> {
        self.engine.boundary(|| self.core.insert(req))
    }

    /// `true` if inserting `req` would exceed capacity.
    pub fn need_eviction(&self, req: &Request) -> bool {
        self.core.need_eviction(req)
    }

    /// Asks the policy for a victim and removes it.
    pub fn evict(&mut self, req: &Request) -> Result<CacheObject> {
        self.engine.boundary(|| self.core.evict(req))
    }

    /// Asks the policy for a victim without removing it.
    ///
    /// The eviction hook cannot tell this call from a real eviction, so a
    /// policy that updates its bookkeeping when naming a victim will do so
    /// here too.
    pub fn to_evict(&self, req: &Request) -> Result<CacheObject> {
        self.engine.boundary(|| self.core.victim(req))
    }

    /// Removes `obj_id`. Returns `false` if it was not resident.
    pub fn remove(&mut self, obj_id: ObjId) -> Result<bool> {
        self.engine.boundary(|| self.core.remove(obj_id))
    }

    /// Replays `reader` from request `start_req` through this cache, for at
    /// most `max_req` requests (`None` = to the end).
    ///
    /// Returns `(request_miss_ratio, byte_miss_ratio)` over the replayed
    /// requests; both are `0.0` when nothing was replayed.
    pub fn process_trace<R: Reader + ?Sized>(
        &mut self,
        reader: &mut R,
        start_req: u64,
        max_req: Option<u64>,
    ) -> Result<(f64, f64)> {
        self.engine
            .boundary(|| self.core.process_trace(reader, start_req, max_req))
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn get_occupied_byte(&self) -> u64 {
        self.core.store.occupied()
    }

    pub fn get_n_obj(&self) -> usize {
        self.core.store.len()
    }

    pub fn contains(&self, obj_id: ObjId) -> bool {
        self.core.store.contains(obj_id)
    }

    pub fn cache_size(&self) -> u64 {
        self.core.params.cache_size
    }

    pub fn cache_name(&self) -> &str {
        self.core.policy.name()
    }

    pub fn params(&self) -> &CommonCacheParams {
        &self.core.params
    }

    pub fn admissioner(&self) -> Option<&dyn Admissioner> {
        self.core.admissioner.as_deref()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn stats(&self) -> Metrics {
        self.core.stats.snapshot()
    }

    /// Renders a summary line followed by one line per resident object, in
    /// id order.
    pub fn print_cache(&self) -> String {
        let mut objs: Vec<&CacheObject> = self.core.store.iter().collect();
        objs.sort_unstable_by_key(|obj| obj.obj_id);

        let mut out = format!(
            "{}: {} objects, {}/{} bytes\n",
            self.cache_name(),
            objs.len(),
            self.get_occupied_byte(),
            self.cache_size()
        );
        for obj in objs {
            let exp = obj.exp_time.map_or_else(|| "-".to_owned(), |t| t.to_string());
            out.push_str(&format!(
                "{} size={} created={} expires={exp}\n",
                obj.obj_id, obj.obj_size, obj.create_time
            ));
        }
        out
    }
}

impl fmt::Debug for PluginCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCache")
            .field("name", &self.cache_name())
            .field("cache_size", &self.cache_size())
            .field("occupied", &self.get_occupied_byte())
            .field("n_obj", &self.get_n_obj())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Engine operations
// ---------------------------------------------------------------------------

type EngineResult<T> = std::result::Result<T, Fault>;

impl Core {
    fn get(&mut self, req: &Request) -> EngineResult<bool> {
        if let Some(admissioner) = &self.admissioner {
            admissioner.update(req, self.params.cache_size)?;
        }

        if req.op == ReqOp::Delete {
            self.remove(req.obj_id)?;
            return Ok(false);
        }

        if self.find(req, true)?.is_some() {
            self.stats.record_hit(req.obj_size);
            return Ok(true);
        }

        self.stats.record_miss(req.obj_size);
        if self.can_insert(req)? {
            self.insert(req)?;
        } else {
            self.stats.record_rejection();
        }
        Ok(false)
    }

    fn find(&mut self, req: &Request, update_cache: bool) -> EngineResult<Option<CacheObject>> {
        let Some(obj) = self.store.get(req.obj_id).copied() else {
            return Ok(None);
        };

        if obj.is_expired_at(req.clock_time) {
            if update_cache {
                debug!(obj_id = obj.obj_id, clock_time = req.clock_time, "object expired");
                self.remove_resident(obj.obj_id)?;
            }
            return Ok(None);
        }

        if update_cache {
            self.policy
                .call(HookName::Hit, |hooks, state| (hooks.hit)(state, req))?;
        }
        Ok(Some(obj))
    }

    fn can_insert(&self, req: &Request) -> EngineResult<bool> {
        if self.params.charged_size(req.obj_size) > self.params.cache_size {
            return Ok(false);
        }
        match &self.admissioner {
            Some(admissioner) => Ok(admissioner.admit(req)?),
            None => Ok(true),
        }
    }

    fn insert(&mut self, req: &Request) -> EngineResult<CacheObject> {
        let charged = self.params.charged_size(req.obj_size);
        if charged > self.params.cache_size {
            return Err(NativeError::InvalidArgument(format!(
                "object {} of {charged} bytes does not fit in a cache of {} bytes",
                req.obj_id, self.params.cache_size
            ))
            .into());
        }
        if self.store.contains(req.obj_id) {
            return Err(NativeError::Cache(format!("object {} is already resident", req.obj_id)).into());
        }

        self.policy
            .call(HookName::Miss, |hooks, state| (hooks.miss)(state, req))?;
        while self.need_eviction(req) {
            self.evict(req)?;
        }

        let obj = CacheObject {
            obj_id: req.obj_id,
            obj_size: req.obj_size,
            create_time: req.clock_time,
            exp_time: self.expiry_for(req),
        };
        self.store.insert(obj)?;
        Ok(obj)
    }

    #[inline]
    fn need_eviction(&self, req: &Request) -> bool {
        self.store
            .occupied()
            .saturating_add(self.params.charged_size(req.obj_size))
            > self.params.cache_size
    }

    fn evict(&mut self, req: &Request) -> EngineResult<CacheObject> {
        let victim = self.victim(req)?;
        self.remove_resident(victim.obj_id)?;
        self.stats.record_eviction();
        debug!(
            policy = %self.policy.name(),
            victim = victim.obj_id,
            for_obj = req.obj_id,
            "evicted"
        );
        Ok(victim)
    }

    /// Calls the eviction hook and resolves its answer to a resident object.
    fn victim(&self, req: &Request) -> EngineResult<CacheObject> {
        if self.store.is_empty() {
            return Err(NativeError::Cache(format!(
                "no resident object can be evicted to make room for object {}",
                req.obj_id
            ))
            .into());
        }
        let value = self
            .policy
            .call(HookName::Eviction, |hooks, state| (hooks.eviction)(state, req))?;
        let obj_id = trampoline::victim_id(self.policy.name(), value)?;
        let victim = self.store.get(obj_id).copied().ok_or_else(|| {
            NativeError::Cache(format!(
                "eviction hook of policy `{}` named object {obj_id}, which is not resident",
                self.policy.name()
            ))
        })?;
        Ok(victim)
    }

    fn remove(&mut self, obj_id: ObjId) -> EngineResult<bool> {
        if !self.store.contains(obj_id) {
            return Ok(false);
        }
        self.remove_resident(obj_id)?;
        Ok(true)
    }

    /// Notifies the policy, then drops the object. A raising remove hook
    /// leaves the object resident.
    fn remove_resident(&mut self, obj_id: ObjId) -> EngineResult<()> {
        self.policy
            .call(HookName::Remove, |hooks, state| (hooks.remove)(state, obj_id))?;
        self.store.remove(obj_id)?;
        Ok(())
    }

    fn expiry_for(&self, req: &Request) -> Option<u64> {
        match req.ttl.unwrap_or(self.params.default_ttl) {
            0 => None,
            ttl => Some(req.clock_time.saturating_add(ttl)),
        }
    }

    fn process_trace<R: Reader + ?Sized>(
        &mut self,
        reader: &mut R,
        start_req: u64,
        max_req: Option<u64>,
    ) -> EngineResult<(f64, f64)> {
        reader.reset()?;
        if start_req > 0 {
            reader.skip_n_req(start_req)?;
        }

        let replay = StatsCounter::new();
        let mut n_req = 0u64;
        while max_req.map_or(true, |max| n_req < max) {
            let Some(req) = reader.next_req()? else {
                break;
            };
            n_req += 1;
            if self.get(&req)? {
                replay.record_hit(req.obj_size);
            } else {
                replay.record_miss(req.obj_size);
            }
        }

        let m = replay.snapshot();
        debug!(
            policy = %self.policy.name(),
            n_req,
            miss_ratio = m.miss_ratio,
            byte_miss_ratio = m.byte_miss_ratio,
            "trace replayed"
        );
        Ok((m.miss_ratio, m.byte_miss_ratio))
    }
}
