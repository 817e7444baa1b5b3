//! In-process endpoint registry.
//!
//! [`LocalRegistry`] serves endpoints that live in the current process. It
//! starts an endpoint from its factory on first acquire, counts holders per
//! tier, and models the two retention tiers: an endpoint with at least one
//! stable holder is never reclaimed, while one held only by unstable holders
//! can be torn down by [`LocalRegistry::reclaim`].

use crate::error::Result;
use crate::traits::{Endpoint, EndpointRegistry, Handle, HandleId, Tier};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Creates a fresh endpoint instance.
pub type EndpointFactory = Arc<dyn Fn() -> Result<Arc<dyn Endpoint>> + Send + Sync>;

/// What happens to a running endpoint when its last holder releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdlePolicy {
    /// Keep the instance running until it dies or is reclaimed
    #[default]
    KeepRunning,
    /// Drop the instance as soon as nobody holds it
    TearDown,
}

struct Outstanding {
    authority: String,
    tier: Tier,
    generation: u64,
}

struct Entry {
    factory: EndpointFactory,
    instance: Option<Arc<dyn Endpoint>>,
    generation: u64,
    starts: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    outstanding: HashMap<HandleId, Outstanding>,
}

impl State {
    fn holders(&self, authority: &str, generation: u64) -> (usize, usize) {
        self.outstanding
            .values()
            .filter(|o| o.authority == authority && o.generation == generation)
            .fold((0, 0), |(stable, unstable), o| match o.tier {
                Tier::Stable => (stable + 1, unstable),
                Tier::Unstable => (stable, unstable + 1),
            })
    }
}

/// Registry for endpoints running in the current process.
///
/// # Examples
///
/// ```rust
/// use providerlink_transport::local::LocalRegistry;
/// use providerlink_transport::{Endpoint, EndpointRegistry, Tier};
/// use std::sync::Arc;
///
/// struct Notes;
/// impl Endpoint for Notes {}
///
/// let registry = LocalRegistry::new();
/// registry.register("notes", || Ok(Arc::new(Notes) as Arc<dyn Endpoint>));
///
/// let handle = registry.acquire("notes", Tier::Unstable).unwrap();
/// assert_eq!(registry.holders("notes"), (0, 1));
/// assert!(registry.release(handle));
/// ```
pub struct LocalRegistry {
    state: Mutex<State>,
    next_id: AtomicU64,
    idle_policy: IdlePolicy,
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRegistry {
    /// Create an empty registry that keeps idle endpoints running
    pub fn new() -> Self {
        Self::with_idle_policy(IdlePolicy::default())
    }

    /// Create an empty registry with the given idle policy
    pub fn with_idle_policy(idle_policy: IdlePolicy) -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
            idle_policy,
        }
    }

    /// Register (or replace) the factory serving `authority`
    pub fn register<F>(&self, authority: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Endpoint>> + Send + Sync + 'static,
    {
        let authority = authority.into();
        debug!(authority = %authority, "registering local endpoint");
        self.state.lock().entries.insert(
            authority,
            Entry {
                factory: Arc::new(factory),
                instance: None,
                generation: 0,
                starts: 0,
            },
        );
    }

    /// Holders of the running instance as `(stable, unstable)`
    pub fn holders(&self, authority: &str) -> (usize, usize) {
        let state = self.state.lock();
        match state.entries.get(authority) {
            Some(entry) => state.holders(authority, entry.generation),
            None => (0, 0),
        }
    }

    /// How many times the endpoint for `authority` has been started
    pub fn starts(&self, authority: &str) -> u64 {
        self.state
            .lock()
            .entries
            .get(authority)
            .map_or(0, |entry| entry.starts)
    }

    /// Whether an instance is currently running for `authority`
    pub fn is_running(&self, authority: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(authority)
            .is_some_and(|entry| entry.instance.is_some())
    }

    /// Tear down the running instance unless a stable holder pins it.
    ///
    /// Unstable holders keep their handles; their next call is expected to
    /// observe a stale endpoint. Returns whether an instance was torn down.
    pub fn reclaim(&self, authority: &str) -> bool {
        let mut state = self.state.lock();
        let Some(generation) = state.entries.get(authority).map(|e| e.generation) else {
            return false;
        };
        let (stable, unstable) = state.holders(authority, generation);
        if stable > 0 {
            debug!(authority, stable, "reclaim skipped: endpoint pinned by stable holders");
            return false;
        }
        let Some(entry) = state.entries.get_mut(authority) else {
            return false;
        };
        if entry.instance.take().is_none() {
            return false;
        }
        entry.generation += 1;
        debug!(authority, unstable, "reclaimed endpoint");
        true
    }
}

impl LocalRegistry {
    fn track(
        &self,
        state: &mut State,
        authority: &str,
        tier: Tier,
        generation: u64,
        endpoint: Arc<dyn Endpoint>,
    ) -> Handle {
        let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        state.outstanding.insert(
            id,
            Outstanding {
                authority: authority.to_string(),
                tier,
                generation,
            },
        );
        Handle::new(id, authority, tier, endpoint)
    }
}

impl EndpointRegistry for LocalRegistry {
    /// Factories run without the registry lock held, so a factory may itself
    /// acquire from this registry. When two acquires race to start the same
    /// endpoint, the first instance installed wins and the other is dropped.
    fn acquire(&self, authority: &str, tier: Tier) -> Option<Handle> {
        loop {
            let factory = {
                let mut state = self.state.lock();
                let entry = state.entries.get(authority)?;
                if let Some(instance) = &entry.instance {
                    let (instance, generation) = (Arc::clone(instance), entry.generation);
                    return Some(self.track(&mut state, authority, tier, generation, instance));
                }
                Arc::clone(&entry.factory)
            };

            let started = match factory() {
                Ok(instance) => instance,
                Err(err) => {
                    warn!(authority, error = %err, "failed to start local endpoint");
                    return None;
                }
            };

            let mut state = self.state.lock();
            let entry = state.entries.get_mut(authority)?;
            if !Arc::ptr_eq(&entry.factory, &factory) {
                debug!(authority, "factory replaced while starting; retrying");
                continue;
            }
            let endpoint = match &entry.instance {
                Some(instance) => Arc::clone(instance),
                None => {
                    entry.starts += 1;
                    entry.instance = Some(Arc::clone(&started));
                    debug!(authority, starts = entry.starts, "started local endpoint");
                    started
                }
            };
            let generation = entry.generation;
            return Some(self.track(&mut state, authority, tier, generation, endpoint));
        }
    }

    fn release(&self, handle: Handle) -> bool {
        let mut state = self.state.lock();
        let Some(released) = state.outstanding.remove(&handle.id()) else {
            warn!(handle = %handle.id(), authority = handle.authority(), "release of unknown handle");
            return false;
        };

        if self.idle_policy == IdlePolicy::TearDown {
            let generation = state.entries.get(&released.authority).map(|e| e.generation);
            if generation == Some(released.generation)
                && state.holders(&released.authority, released.generation) == (0, 0)
                && let Some(entry) = state.entries.get_mut(&released.authority)
            {
                entry.instance = None;
                entry.generation += 1;
                debug!(authority = %released.authority, "tore down idle endpoint");
            }
        }
        true
    }

    fn notify_dead(&self, handle: &Handle) {
        let mut state = self.state.lock();
        let Some(generation) = state.outstanding.get(&handle.id()).map(|o| o.generation) else {
            return;
        };
        if let Some(entry) = state.entries.get_mut(handle.authority())
            && entry.generation == generation
            && entry.instance.take().is_some()
        {
            entry.generation += 1;
            debug!(authority = handle.authority(), handle = %handle.id(), "endpoint reported dead");
        }
    }
}
