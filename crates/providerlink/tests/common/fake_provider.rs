//! Scriptable provider endpoint and counting registry
//!
//! [`FakeEndpoint`] answers every operation according to a queue of
//! [`Behavior`]s, one per call, and records what it was asked. Payloads it
//! hands out count their own closes. [`CountingRegistry`] serves that one
//! endpoint for one authority and counts acquires per tier, releases, and
//! dead-endpoint reports, so tests can assert the handle bookkeeping.
//!
//! # Examples
//!
//! ```rust,ignore
//! let fixture = Fixture::new();
//! fixture.endpoint.push(Behavior::Stale);
//!
//! let rows = fixture.resolver.query(&fixture.target("items"), &[], &QueryArgs::new(), None)?;
//! assert_eq!(fixture.registry.stable_acquires(), 1);
//! ```

use parking_lot::Mutex;
use providerlink::{Resolver, ResolverConfig};
use providerlink_core::cancel::CancellationSignal;
use providerlink_transport::{
    AssetDescriptor, Bundle, ContentValues, Cursor, Endpoint, EndpointRegistry, Handle, HandleId,
    OpenMode, QueryArgs, RemoteCancel, RemoteCancellable, RemoteStream, RowCursor, Tier,
    TransportError,
};
use serde_json::{Value, json};
use std::collections::{HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use url::Url;

pub const AUTHORITY: &str = "com.example.fake";

/// How the endpoint answers one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer normally
    Ok,
    /// Fail as a dead endpoint
    Stale,
    /// Fail as a dropped transport
    Dropped,
    /// Query succeeds, but the cursor dies while counting rows
    StaleOnCount,
    /// Cancel the signal given to [`FakeEndpoint::cancel_during_call`] mid-call
    CancelMidCall,
}

/// Cursor over fixed rows that counts its closes.
pub struct TrackedCursor {
    rows: RowCursor,
    closes: Arc<AtomicUsize>,
    stale_on_count: bool,
}

impl Cursor for TrackedCursor {
    fn columns(&self) -> &[String] {
        self.rows.columns()
    }

    fn count(&mut self) -> providerlink_transport::Result<usize> {
        if self.stale_on_count {
            return Err(TransportError::StaleEndpoint("died while counting".into()));
        }
        self.rows.count()
    }

    fn position(&self) -> Option<usize> {
        self.rows.position()
    }

    fn move_to_next(&mut self) -> providerlink_transport::Result<bool> {
        self.rows.move_to_next()
    }

    fn get(&self, column: usize) -> Option<&Value> {
        self.rows.get(column)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.rows.close();
    }
}

/// In-memory stream that counts its closes.
pub struct TrackedStream {
    inner: io::Cursor<Vec<u8>>,
    closes: Arc<AtomicUsize>,
}

impl Read for TrackedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TrackedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteStream for TrackedStream {
    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scriptable endpoint.
pub struct FakeEndpoint {
    script: Mutex<VecDeque<Behavior>>,
    calls: AtomicUsize,
    pub cursor_closes: Arc<AtomicUsize>,
    pub stream_closes: Arc<AtomicUsize>,
    pub declared_length: Mutex<i64>,
    pub stream_bytes: Mutex<Vec<u8>>,
    pub stream_extras: Mutex<Option<Bundle>>,
    /// `open_typed_asset` answers `None` when set
    pub no_representation: Mutex<bool>,
    pub typed_opens: Mutex<Vec<(String, Bundle)>>,
    pub raw_opens: Mutex<Vec<OpenMode>>,
    pub remotes: Mutex<Vec<CancellationSignal>>,
    pub cancel_during_call: Mutex<Option<CancellationSignal>>,
    pub inserted: Mutex<Vec<ContentValues>>,
}

impl Default for FakeEndpoint {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            cursor_closes: Arc::new(AtomicUsize::new(0)),
            stream_closes: Arc::new(AtomicUsize::new(0)),
            declared_length: Mutex::new(-1),
            stream_bytes: Mutex::new(b"hello provider".to_vec()),
            stream_extras: Mutex::new(None),
            no_representation: Mutex::new(false),
            typed_opens: Mutex::new(Vec::new()),
            raw_opens: Mutex::new(Vec::new()),
            remotes: Mutex::new(Vec::new()),
            cancel_during_call: Mutex::new(None),
            inserted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEndpoint {
    /// Queue the behavior for the next call. Unscripted calls answer normally.
    pub fn push(&self, behavior: Behavior) -> &Self {
        self.script.lock().push_back(behavior);
        self
    }

    /// Number of operation dispatches that reached the endpoint
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cursor_closes(&self) -> usize {
        self.cursor_closes.load(Ordering::SeqCst)
    }

    pub fn stream_closes(&self) -> usize {
        self.stream_closes.load(Ordering::SeqCst)
    }

    pub fn set_declared_length(&self, length: i64) {
        *self.declared_length.lock() = length;
    }

    fn next(&self) -> Behavior {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or(Behavior::Ok)
    }

    /// Apply `behavior`, returning the error it calls for.
    fn fail(&self, behavior: Behavior) -> providerlink_transport::Result<()> {
        match behavior {
            Behavior::Stale => Err(TransportError::StaleEndpoint("endpoint process died".into())),
            Behavior::Dropped => Err(TransportError::Dropped("channel closed".into())),
            Behavior::CancelMidCall => {
                if let Some(signal) = self.cancel_during_call.lock().as_ref() {
                    signal.cancel();
                }
                Err(TransportError::Canceled)
            }
            Behavior::Ok | Behavior::StaleOnCount => Ok(()),
        }
    }

    fn descriptor(&self) -> AssetDescriptor {
        let stream = TrackedStream {
            inner: io::Cursor::new(self.stream_bytes.lock().clone()),
            closes: Arc::clone(&self.stream_closes),
        };
        let length = *self.declared_length.lock();
        let mut descriptor = if length == -1 {
            AssetDescriptor::whole(Box::new(stream))
        } else {
            AssetDescriptor::range(Box::new(stream), 100, length)
        };
        if let Some(extras) = self.stream_extras.lock().clone() {
            descriptor = descriptor.with_extras(extras);
        }
        descriptor.with_mime_type("image/png")
    }
}

impl Endpoint for FakeEndpoint {
    fn create_cancellation(&self) -> providerlink_transport::Result<Arc<dyn RemoteCancellable>> {
        let remote = CancellationSignal::new();
        self.remotes.lock().push(remote.clone());
        Ok(Arc::new(remote))
    }

    fn query(
        &self,
        _target: &Url,
        _projection: &[String],
        _args: &QueryArgs,
        _cancel: RemoteCancel,
    ) -> providerlink_transport::Result<Box<dyn Cursor>> {
        let behavior = self.next();
        self.fail(behavior)?;
        let rows = RowCursor::new(["_id", "title"])
            .with_row(vec![json!(1), json!("alpha")])
            .with_row(vec![json!(2), json!("beta")])
            .with_row(vec![json!(3), json!("gamma")]);
        Ok(Box::new(TrackedCursor {
            rows,
            closes: Arc::clone(&self.cursor_closes),
            stale_on_count: behavior == Behavior::StaleOnCount,
        }))
    }

    fn get_type(&self, _target: &Url) -> providerlink_transport::Result<Option<String>> {
        self.fail(self.next())?;
        Ok(Some("vnd.example.item".to_string()))
    }

    fn get_stream_types(&self, _target: &Url, mime_filter: &str) -> providerlink_transport::Result<Vec<String>> {
        self.fail(self.next())?;
        Ok(providerlink_transport::mime::filter_types(
            ["image/png", "image/jpeg", "text/plain"],
            mime_filter,
        ))
    }

    fn open_file(
        &self,
        _target: &Url,
        mode: OpenMode,
        _cancel: RemoteCancel,
    ) -> providerlink_transport::Result<AssetDescriptor> {
        self.fail(self.next())?;
        self.raw_opens.lock().push(mode);
        Ok(self.descriptor())
    }

    fn open_typed_asset(
        &self,
        _target: &Url,
        mime_filter: &str,
        options: &Bundle,
        _cancel: RemoteCancel,
    ) -> providerlink_transport::Result<Option<AssetDescriptor>> {
        self.fail(self.next())?;
        self.typed_opens
            .lock()
            .push((mime_filter.to_string(), options.clone()));
        if *self.no_representation.lock() {
            return Ok(None);
        }
        Ok(Some(self.descriptor()))
    }

    fn insert(
        &self,
        target: &Url,
        values: &ContentValues,
        _extras: &Bundle,
    ) -> providerlink_transport::Result<Option<Url>> {
        self.fail(self.next())?;
        let mut inserted = self.inserted.lock();
        inserted.push(values.clone());
        Ok(target.join(&format!("items/{}", inserted.len())).ok())
    }

    fn refresh(&self, _target: &Url, _extras: &Bundle, _cancel: RemoteCancel) -> providerlink_transport::Result<bool> {
        self.fail(self.next())?;
        Ok(true)
    }
}

/// Registry serving one [`FakeEndpoint`] under [`AUTHORITY`].
pub struct CountingRegistry {
    pub endpoint: Arc<FakeEndpoint>,
    stable_available: bool,
    next_id: AtomicU64,
    unstable_acquires: AtomicUsize,
    stable_acquires: AtomicUsize,
    releases: AtomicUsize,
    outstanding: Mutex<HashSet<HandleId>>,
    released_tiers: Mutex<Vec<Tier>>,
    dead: Mutex<Vec<(HandleId, Tier)>>,
}

impl CountingRegistry {
    pub fn new(endpoint: Arc<FakeEndpoint>) -> Self {
        Self {
            endpoint,
            stable_available: true,
            next_id: AtomicU64::new(1),
            unstable_acquires: AtomicUsize::new(0),
            stable_acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            outstanding: Mutex::new(HashSet::new()),
            released_tiers: Mutex::new(Vec::new()),
            dead: Mutex::new(Vec::new()),
        }
    }

    /// A registry that can never produce a stable handle
    pub fn without_stable(endpoint: Arc<FakeEndpoint>) -> Self {
        Self {
            stable_available: false,
            ..Self::new(endpoint)
        }
    }

    pub fn unstable_acquires(&self) -> usize {
        self.unstable_acquires.load(Ordering::SeqCst)
    }

    pub fn stable_acquires(&self) -> usize {
        self.stable_acquires.load(Ordering::SeqCst)
    }

    pub fn acquires(&self) -> usize {
        self.unstable_acquires() + self.stable_acquires()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Handles acquired and not yet released
    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().len()
    }

    pub fn released_tiers(&self) -> Vec<Tier> {
        self.released_tiers.lock().clone()
    }

    pub fn dead_reports(&self) -> Vec<(HandleId, Tier)> {
        self.dead.lock().clone()
    }
}

impl EndpointRegistry for CountingRegistry {
    fn acquire(&self, authority: &str, tier: Tier) -> Option<Handle> {
        if authority != AUTHORITY {
            return None;
        }
        match tier {
            Tier::Unstable => self.unstable_acquires.fetch_add(1, Ordering::SeqCst),
            Tier::Stable if self.stable_available => self.stable_acquires.fetch_add(1, Ordering::SeqCst),
            Tier::Stable => return None,
        };
        let id = HandleId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.outstanding.lock().insert(id);
        Some(Handle::new(id, authority, tier, self.endpoint.clone()))
    }

    fn release(&self, handle: Handle) -> bool {
        if !self.outstanding.lock().remove(&handle.id()) {
            return false;
        }
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.released_tiers.lock().push(handle.tier());
        true
    }

    fn notify_dead(&self, handle: &Handle) {
        self.dead.lock().push((handle.id(), handle.tier()));
    }
}

/// Endpoint, registry, and resolver wired together.
pub struct Fixture {
    pub endpoint: Arc<FakeEndpoint>,
    pub registry: Arc<CountingRegistry>,
    pub resolver: Resolver,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default().with_leak_warnings(true))
    }

    pub fn without_stable() -> Self {
        Self::build(
            CountingRegistry::without_stable,
            ResolverConfig::default().with_leak_warnings(true),
        )
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self::build(CountingRegistry::new, config)
    }

    fn build(
        make: impl FnOnce(Arc<FakeEndpoint>) -> CountingRegistry,
        config: ResolverConfig,
    ) -> Self {
        super::init_tracing();
        let endpoint = Arc::new(FakeEndpoint::default());
        let registry = Arc::new(make(Arc::clone(&endpoint)));
        let resolver = Resolver::new(registry.clone(), config);
        Self {
            endpoint,
            registry,
            resolver,
        }
    }

    /// `content://com.example.fake/{path}`
    pub fn target(&self, path: &str) -> Url {
        Url::parse(&format!("content://{AUTHORITY}/{path}")).unwrap()
    }
}
