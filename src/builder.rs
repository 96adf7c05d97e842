use std::sync::Arc;

use crate::admissioner::{Admissioner, PluginAdmissioner};
use crate::cache::PluginCache;
use crate::config::CommonCacheParams;
use crate::error::Result;
use crate::host::{HookResult, HostValue};
use crate::lifecycle::OpaqueState;
use crate::policy::{AdmissionHookSlots, CacheHookSlots};
use crate::request::{ObjId, Request};
use crate::translate::Engine;

/// Builder for configuring and constructing a [`PluginCache`].
///
/// Hooks can be given one at a time or as a whole [`CacheHookSlots`] table.
/// Missing required hooks are reported by [`build`](Self::build).
///
/// # Example
/// ```
/// use cachesim_plugin::{OpaqueState, PluginCacheBuilder};
///
/// let err = PluginCacheBuilder::new(1_000)
///     .init_hook(|_params| Ok(OpaqueState::unit()))
///     .build()
///     .unwrap_err();
/// assert_eq!(err.to_string(), "configuration error: plugin cache is missing its hit hook");
/// ```
pub struct PluginCacheBuilder {
    name: String,
    params: CommonCacheParams,
    slots: CacheHookSlots,
    admissioner: Option<Box<dyn Admissioner>>,
    engine: Option<Arc<Engine>>,
}

impl PluginCacheBuilder {
    pub fn new(cache_size: u64) -> Self {
        Self::with_params(CommonCacheParams::new(cache_size))
    }

    /// Starts from a full parameter set, e.g. one loaded with
    /// [`config::load_from_file`](crate::config::load_from_file).
    pub fn with_params(params: CommonCacheParams) -> Self {
        PluginCacheBuilder {
            name: "PluginCache".to_owned(),
            params,
            slots: CacheHookSlots::default(),
            admissioner: None,
            engine: None,
        }
    }

    /// Policy name reported by [`PluginCache::cache_name`]. Truncated to 63
    /// bytes.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// TTL applied to requests that carry none. `0` disables expiry.
    pub fn default_ttl(mut self, ttl: u64) -> Self {
        self.params.default_ttl = ttl;
        self
    }

    /// Sizing hint for the object table (`1 << hashpower` slots).
    pub fn hashpower(mut self, hashpower: u8) -> Self {
        self.params.hashpower = hashpower;
        self
    }

    /// Counts a fixed per-object metadata overhead against capacity.
    pub fn consider_obj_metadata(mut self, enabled: bool) -> Self {
        self.params.consider_obj_metadata = enabled;
        self
    }

    /// Attaches an admission policy. The cache takes ownership and frees it
    /// when dropped.
    pub fn admissioner<A: Admissioner + 'static>(self, admissioner: A) -> Self {
        self.boxed_admissioner(Box::new(admissioner))
    }

    pub fn boxed_admissioner(mut self, admissioner: Box<dyn Admissioner>) -> Self {
        self.admissioner = Some(admissioner);
        self
    }

    /// Shares an engine, and so its exception translator, with other caches.
    /// Each cache gets its own engine otherwise.
    pub fn engine(mut self, engine: Arc<Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replaces every hook slot at once. Tables are cheap to clone and can be
    /// shared between caches.
    pub fn hooks(mut self, slots: CacheHookSlots) -> Self {
        self.slots = slots;
        self
    }

    pub fn init_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommonCacheParams) -> HookResult<OpaqueState> + Send + Sync + 'static,
    {
        self.slots.init = Some(Arc::new(move |params: &CommonCacheParams| f(params)));
        self
    }

    pub fn hit_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut OpaqueState, &Request) -> HookResult<()> + Send + Sync + 'static,
    {
        self.slots.hit = Some(Arc::new(move |state: &mut OpaqueState, req: &Request| f(state, req)));
        self
    }

    pub fn miss_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut OpaqueState, &Request) -> HookResult<()> + Send + Sync + 'static,
    {
        self.slots.miss = Some(Arc::new(move |state: &mut OpaqueState, req: &Request| f(state, req)));
        self
    }

    /// The hook names its victim by id, as an integer or a decimal string.
    pub fn eviction_hook<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut OpaqueState, &Request) -> HookResult<R> + Send + Sync + 'static,
        R: Into<HostValue>,
    {
        self.slots.eviction = Some(Arc::new(move |state: &mut OpaqueState, req: &Request| {
            f(state, req).map(Into::into)
        }));
        self
    }

    pub fn remove_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut OpaqueState, ObjId) -> HookResult<()> + Send + Sync + 'static,
    {
        self.slots.remove = Some(Arc::new(move |state: &mut OpaqueState, obj_id: ObjId| f(state, obj_id)));
        self
    }

    pub fn free_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(OpaqueState) -> HookResult<()> + Send + Sync + 'static,
    {
        self.slots.free = Some(Arc::new(f));
        self
    }

    /// Validates parameters and hooks, then runs the init hook.
    pub fn build(self) -> Result<PluginCache> {
        let hooks = Arc::new(self.slots.install()?);
        let engine = self.engine.unwrap_or_default();
        PluginCache::new(&self.name, self.params, hooks, self.admissioner, engine)
    }
}

/// Builder for configuring and constructing a [`PluginAdmissioner`].
pub struct PluginAdmissionerBuilder {
    name: String,
    init_params: Option<String>,
    slots: AdmissionHookSlots,
}

impl PluginAdmissionerBuilder {
    pub fn new(name: &str) -> Self {
        PluginAdmissionerBuilder {
            name: name.to_owned(),
            init_params: None,
            slots: AdmissionHookSlots::default(),
        }
    }

    /// Opaque string handed to the init hook, e.g. `"threshold=0.1"`.
    pub fn init_params(mut self, params: &str) -> Self {
        self.init_params = Some(params.to_owned());
        self
    }

    pub fn hooks(mut self, slots: AdmissionHookSlots) -> Self {
        self.slots = slots;
        self
    }

    pub fn init_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>) -> HookResult<OpaqueState> + Send + Sync + 'static,
    {
        self.slots.init = Some(Arc::new(move |params: Option<&str>| f(params)));
        self
    }

    /// The hook must answer with a boolean.
    pub fn admit_hook<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut OpaqueState, &Request) -> HookResult<R> + Send + Sync + 'static,
        R: Into<HostValue>,
    {
        self.slots.admit = Some(Arc::new(move |state: &mut OpaqueState, req: &Request| {
            f(state, req).map(Into::into)
        }));
        self
    }

    pub fn update_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut OpaqueState, &Request, u64) -> HookResult<()> + Send + Sync + 'static,
    {
        self.slots.update = Some(Arc::new(
            move |state: &mut OpaqueState, req: &Request, cache_size: u64| f(state, req, cache_size),
        ));
        self
    }

    /// Without a clone hook the admissioner cannot be cloned.
    pub fn clone_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&OpaqueState) -> HookResult<OpaqueState> + Send + Sync + 'static,
    {
        self.slots.clone = Some(Arc::new(move |state: &OpaqueState| f(state)));
        self
    }

    pub fn free_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(OpaqueState) -> HookResult<()> + Send + Sync + 'static,
    {
        self.slots.free = Some(Arc::new(f));
        self
    }

    /// Validates hooks, then runs the init hook with the init params.
    pub fn build(self) -> Result<PluginAdmissioner> {
        let hooks = Arc::new(self.slots.install()?);
        PluginAdmissioner::create(&self.name, self.init_params, hooks)
    }
}
