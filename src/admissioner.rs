//! Admission policies and the clone protocol.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::builder::PluginAdmissionerBuilder;
use crate::descriptor::PolicyDescriptor;
use crate::error::{BridgeError, Result};
use crate::policy::{AdmissionHooks, HookName};
use crate::request::Request;
use crate::trampoline;

/// Decides whether a missed object may enter the cache at all.
///
/// All methods take `&self`. Two calls on the same instance must never
/// overlap; an implementation reports an overlap as an error instead of
/// blocking.
pub trait Admissioner: Send {
    fn name(&self) -> &str;

    /// `true` if the request's object may be inserted.
    fn admit(&self, req: &Request) -> Result<bool>;

    /// Observes a request, with the capacity of the cache it guards.
    fn update(&self, req: &Request, cache_size: u64) -> Result<()>;

    /// A new, independent instance of the same policy.
    fn clone_admissioner(&self) -> Result<Box<dyn Admissioner>>;

    /// Releases the instance. Later calls, including another `free`,
    /// fail with a lifecycle error.
    fn free(&self) -> Result<()>;
}

/// An admission policy implemented by host hooks.
///
/// # Example
/// ```
/// use cachesim_plugin::{OpaqueState, PluginAdmissioner, Request};
///
/// let small_only = PluginAdmissioner::builder("SmallOnly")
///     .init_hook(|_params| Ok(OpaqueState::unit()))
///     .admit_hook(|_state, req| Ok(req.obj_size < 100))
///     .build()
///     .unwrap();
/// assert!(small_only.admit(&Request::new(1, 10)).unwrap());
/// assert!(!small_only.admit(&Request::new(2, 500)).unwrap());
/// ```
pub struct PluginAdmissioner {
    descriptor: PolicyDescriptor<AdmissionHooks>,
}

impl PluginAdmissioner {
    /// Returns a [`PluginAdmissionerBuilder`] for a policy called `name`.
    pub fn builder(name: &str) -> PluginAdmissionerBuilder {
        PluginAdmissionerBuilder::new(name)
    }

    pub(crate) fn create(
        name: &str,
        init_params: Option<String>,
        hooks: Arc<AdmissionHooks>,
    ) -> Result<Self> {
        let params = init_params.clone();
        let descriptor = PolicyDescriptor::create(name, init_params, hooks, |hooks| {
            (hooks.init)(params.as_deref())
        })?;
        Ok(PluginAdmissioner { descriptor })
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The opaque init string given at construction.
    pub fn init_params(&self) -> Option<&str> {
        self.descriptor.init_params()
    }

    pub fn is_active(&self) -> bool {
        self.descriptor.is_active()
    }

    pub fn is_clonable(&self) -> bool {
        self.descriptor.hooks().is_clonable()
    }

    pub fn admit(&self, req: &Request) -> Result<bool> {
        let value = self
            .descriptor
            .call(HookName::Admit, |hooks, state| (hooks.admit)(state, req))?;
        trampoline::admission(self.name(), value)
    }

    pub fn update(&self, req: &Request, cache_size: u64) -> Result<()> {
        self.descriptor
            .call(HookName::Update, |hooks, state| match &hooks.update {
                Some(update) => update(state, req, cache_size),
                None => Ok(()),
            })
    }

    /// Runs the clone hook and wraps its state in a new descriptor that
    /// shares this one's hook table but nothing else.
    pub fn try_clone(&self) -> Result<PluginAdmissioner> {
        let hooks = self.descriptor.hooks();
        let Some(clone_hook) = hooks.clone.as_ref() else {
            return Err(BridgeError::Configuration(format!(
                "plugin admissioner `{}` has no clone hook",
                self.name()
            )));
        };
        let state = self
            .descriptor
            .call(HookName::Clone, |_, state| clone_hook(&*state))?;
        debug!(policy = %self.name(), "admissioner cloned");
        Ok(PluginAdmissioner {
            descriptor: PolicyDescriptor::adopt(
                self.name().to_owned(),
                self.init_params().map(str::to_owned),
                Arc::clone(hooks),
                state,
            ),
        })
    }

    pub fn free(&self) -> Result<()> {
        self.descriptor.free()
    }
}

impl Admissioner for PluginAdmissioner {
    fn name(&self) -> &str {
        PluginAdmissioner::name(self)
    }

    fn admit(&self, req: &Request) -> Result<bool> {
        PluginAdmissioner::admit(self, req)
    }

    fn update(&self, req: &Request, cache_size: u64) -> Result<()> {
        PluginAdmissioner::update(self, req, cache_size)
    }

    fn clone_admissioner(&self) -> Result<Box<dyn Admissioner>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn free(&self) -> Result<()> {
        PluginAdmissioner::free(self)
    }
}

impl fmt::Debug for PluginAdmissioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginAdmissioner")
            .field("name", &self.name())
            .field("active", &self.is_active())
            .finish()
    }
}
