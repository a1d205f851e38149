//! Session-scoped cache of JSON endpoint responses.
//!
//! Ownership model:
//! - `JsonCache` is a cheap-to-clone handle; all clones share one entry map,
//!   one semaphore table, and one set of counters.
//! - `JsonFetcher` is the HTTP seam. `UreqFetcher` is the default; tests and
//!   embedders can inject their own.
//! - A batch (`with_jsons` / `spawn_jsons`) holds a `BatchTicket`. Starting a
//!   newer batch under the same semaphore name supersedes older tickets and
//!   trips their `CancelToken`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread;
use tracing::{debug, error, warn};

use crate::config::CacheConfig;
use crate::constants::cache::BATCH_THREAD_NAME;
use crate::errors::PageError;
use crate::query::{encode_component, update_url_parameter};
use crate::types::{Endpoint, Params, ParamsKey, SemaphoreName};

/// Parsed JSON document shared between the cache and its callers.
pub type SharedJson = Arc<Value>;

/// Callback invoked with every fetch or parse failure.
pub type AlertHandler = Arc<dyn Fn(&PageError) + Send + Sync>;

/// A fully resolved GET request for a JSON endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonRequest {
    /// Endpoint name the request was built for.
    pub endpoint: Endpoint,
    /// Route path without query string (for example `/json/count`).
    pub path: String,
    /// Unencoded query pairs in params order.
    pub query: Vec<(String, String)>,
    /// Path plus encoded query string, used in logs and alerts.
    pub url: String,
}

/// HTTP seam used by `JsonCache` on a cache miss.
pub trait JsonFetcher: Send + Sync {
    /// Perform the GET and return the raw response body.
    fn fetch(&self, request: &JsonRequest) -> Result<String, PageError>;
}

/// Blocking `ureq` fetcher rooted at `CacheConfig::base_url`.
pub struct UreqFetcher {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqFetcher {
    /// Build an agent with the configured global timeout.
    pub fn new(config: &CacheConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl JsonFetcher for UreqFetcher {
    fn fetch(&self, request: &JsonRequest) -> Result<String, PageError> {
        let target = format!("{}{}", self.base_url, request.path);
        let mut builder = self.agent.get(&target);
        for (name, value) in &request.query {
            builder = builder.query(name, value);
        }
        let response = builder.call().map_err(|err| PageError::Http {
            url: request.url.clone(),
            reason: err.to_string(),
        })?;
        response
            .into_body()
            .read_to_string()
            .map_err(|err| PageError::Http {
                url: request.url.clone(),
                reason: format!("failed reading response body: {err}"),
            })
    }
}

/// One `(endpoint, params)` pair within a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonGet {
    /// Endpoint name under the JSON route prefix.
    pub endpoint: Endpoint,
    /// Request params; key order does not affect caching.
    pub params: Params,
}

impl JsonGet {
    /// Pair `endpoint` with `params`.
    pub fn new(endpoint: impl Into<Endpoint>, params: Params) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
        }
    }
}

/// Shared flag observed by the sub-fetches of one batch.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token for every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once any clone has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of running a batch.
#[derive(Clone, Debug)]
pub enum BatchOutcome {
    /// Every sub-fetch finished; values are in request order. Failed fetches are `None`.
    Complete(Vec<Option<SharedJson>>),
    /// A newer batch started under the same semaphore before this one finished.
    Superseded {
        /// Semaphore name shared with the newer batch.
        semaphore: SemaphoreName,
    },
    /// The batch was cancelled through its handle.
    Cancelled,
}

impl BatchOutcome {
    /// Returns `true` for `BatchOutcome::Complete`.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Convert into the completed values, or the reason there are none.
    pub fn into_values(self) -> Result<Vec<Option<SharedJson>>, PageError> {
        match self {
            Self::Complete(values) => Ok(values),
            Self::Superseded { semaphore } => Err(PageError::Superseded { semaphore }),
            Self::Cancelled => Err(PageError::Cancelled),
        }
    }
}

/// Handle to a batch running on a background thread.
pub struct BatchHandle {
    handle: thread::JoinHandle<BatchOutcome>,
    token: CancelToken,
}

impl BatchHandle {
    /// Stop the batch: sub-fetches that have not started skip the network and
    /// the callback does not run. Requests already in flight still complete.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the batch finishes.
    pub fn join(self) -> BatchOutcome {
        self.handle.join().unwrap_or_else(|_| {
            warn!("batch worker panicked");
            BatchOutcome::Cancelled
        })
    }
}

/// Request accounting snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache (including after waiting on an in-flight fetch).
    pub hits: usize,
    /// Lookups that had to fetch.
    pub misses: usize,
    /// Requests handed to the fetcher.
    pub requests: usize,
    /// Fetch or parse failures.
    pub failures: usize,
    /// Requests currently in flight.
    pub in_flight: usize,
    /// Batches dropped because a newer batch superseded them.
    pub superseded_batches: usize,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    requests: AtomicUsize,
    failures: AtomicUsize,
    in_flight: AtomicUsize,
    superseded_batches: AtomicUsize,
}

struct SemaphoreSlot {
    epoch: u64,
    started_at: DateTime<Utc>,
    token: CancelToken,
}

/// Marker held by a running batch.
struct BatchTicket {
    semaphore: Option<SemaphoreName>,
    epoch: u64,
    token: CancelToken,
}

enum SubFetch {
    Loaded(Option<SharedJson>),
    Dropped,
}

type EntryKey = (Endpoint, ParamsKey);

struct Shared {
    fetcher: Arc<dyn JsonFetcher>,
    json_prefix: String,
    entries: RwLock<HashMap<Endpoint, HashMap<ParamsKey, SharedJson>>>,
    pending: (Mutex<HashSet<EntryKey>>, Condvar),
    semaphores: Mutex<HashMap<SemaphoreName, SemaphoreSlot>>,
    next_epoch: AtomicU64,
    counters: CacheCounters,
    alert: RwLock<Option<AlertHandler>>,
}

/// Cache of parsed JSON responses keyed by endpoint and canonical params.
///
/// Entries live as long as the cache and are never evicted. A failed fetch
/// stores nothing, so the next lookup for the same key fetches again.
/// Concurrent misses for one key are coalesced into a single request.
#[derive(Clone)]
pub struct JsonCache {
    shared: Arc<Shared>,
}

impl JsonCache {
    /// Create a cache that fetches over HTTP with `UreqFetcher`.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_fetcher(config, Arc::new(UreqFetcher::new(config)))
    }

    /// Create a cache backed by a custom fetcher.
    pub fn with_fetcher(config: &CacheConfig, fetcher: Arc<dyn JsonFetcher>) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                json_prefix: config.json_prefix.clone(),
                entries: RwLock::new(HashMap::new()),
                pending: (Mutex::new(HashSet::new()), Condvar::new()),
                semaphores: Mutex::new(HashMap::new()),
                next_epoch: AtomicU64::new(0),
                counters: CacheCounters::default(),
                alert: RwLock::new(None),
            }),
        }
    }

    /// Replace the handler notified of fetch and parse failures.
    ///
    /// Without a handler, failures are logged at `error` level.
    pub fn set_alert_handler(&self, handler: impl Fn(&PageError) + Send + Sync + 'static) {
        let mut alert = self.shared.alert.write().expect("json cache alert poisoned");
        *alert = Some(Arc::new(handler));
    }

    /// Build the request issued for `endpoint` with `params`.
    ///
    /// The display URL applies `update_url_parameter` once per param in
    /// params order, with values percent-encoded.
    pub fn request_for(&self, endpoint: &str, params: &Params) -> JsonRequest {
        let path = format!("{}{}", self.shared.json_prefix, endpoint);
        let mut url = path.clone();
        let mut query = Vec::with_capacity(params.len());
        for (name, value) in params {
            let rendered = render_param(value);
            url = update_url_parameter(&url, name, &encode_component(&rendered));
            query.push((name.clone(), rendered));
        }
        JsonRequest {
            endpoint: endpoint.to_string(),
            path,
            query,
            url,
        }
    }

    /// Cached value for `endpoint` and `params`, without fetching.
    pub fn cached(&self, endpoint: &str, params: &Params) -> Option<SharedJson> {
        self.lookup(endpoint, &canonical_params(params))
    }

    /// Return the parsed payload for `endpoint` and `params`, fetching on a miss.
    pub fn get_json(&self, endpoint: &str, params: &Params) -> Result<SharedJson, PageError> {
        let key = canonical_params(params);
        if let Some(hit) = self.claim_or_wait(endpoint, &key) {
            return Ok(hit);
        }
        let _claim = ClaimGuard {
            cache: self,
            endpoint,
            key: key.clone(),
        };
        self.shared.counters.misses.fetch_add(1, Ordering::Relaxed);

        let request = self.request_for(endpoint, params);
        let result = self.fetch_and_parse(&request);
        if let Ok(value) = &result {
            let mut entries = self.shared.entries.write().expect("json cache poisoned");
            entries
                .entry(endpoint.to_string())
                .or_default()
                .insert(key.clone(), Arc::clone(value));
        } else {
            self.shared.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Deliver the payload for `endpoint` and `params` to `callback`.
    ///
    /// On failure the alert handler is notified (naming the URL) and
    /// `callback` receives `None`.
    pub fn with_json<F>(&self, endpoint: &str, params: &Params, callback: F)
    where
        F: FnOnce(Option<SharedJson>),
    {
        callback(self.get_json_or_alert(endpoint, params));
    }

    /// Fetch every entry of `gets` concurrently and deliver them in order.
    ///
    /// `callback` runs once, after every sub-fetch has finished, unless a
    /// newer batch starts under the same `semaphore` first; in that case the
    /// results are dropped and `BatchOutcome::Superseded` is returned.
    pub fn with_jsons<F>(
        &self,
        gets: &[JsonGet],
        semaphore: Option<&str>,
        callback: F,
    ) -> BatchOutcome
    where
        F: FnOnce(Vec<Option<SharedJson>>),
    {
        let ticket = self.begin_batch(semaphore);
        let outcome = self.run_batch(&ticket, gets);
        if let BatchOutcome::Complete(values) = &outcome {
            callback(values.clone());
        }
        outcome
    }

    /// Like [`JsonCache::with_jsons`], but runs the batch on a background thread.
    ///
    /// The batch's semaphore epoch is recorded before this returns, so a
    /// batch spawned later always supersedes it.
    pub fn spawn_jsons<F>(
        &self,
        gets: Vec<JsonGet>,
        semaphore: Option<&str>,
        callback: F,
    ) -> Result<BatchHandle, PageError>
    where
        F: FnOnce(Vec<Option<SharedJson>>) + Send + 'static,
    {
        let ticket = self.begin_batch(semaphore);
        let token = ticket.token.clone();
        let cache = self.clone();
        let handle = thread::Builder::new()
            .name(format!("{BATCH_THREAD_NAME}-{}", ticket.epoch))
            .spawn(move || {
                let outcome = cache.run_batch(&ticket, &gets);
                if let BatchOutcome::Complete(values) = &outcome {
                    callback(values.clone());
                }
                outcome
            })?;
        Ok(BatchHandle { handle, token })
    }

    /// Current request accounting.
    pub fn stats(&self) -> CacheStats {
        let counters = &self.shared.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            requests: counters.requests.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            in_flight: counters.in_flight.load(Ordering::Relaxed),
            superseded_batches: counters.superseded_batches.load(Ordering::Relaxed),
        }
    }

    /// Number of cached payloads across all endpoints.
    pub fn len(&self) -> usize {
        let entries = self.shared.entries.read().expect("json cache poisoned");
        entries.values().map(HashMap::len).sum()
    }

    /// Returns `true` when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached payload. Semaphore epochs are kept.
    pub fn clear(&self) {
        self.shared
            .entries
            .write()
            .expect("json cache poisoned")
            .clear();
    }

    fn lookup(&self, endpoint: &str, key: &str) -> Option<SharedJson> {
        let entries = self.shared.entries.read().expect("json cache poisoned");
        entries.get(endpoint).and_then(|by_params| by_params.get(key)).cloned()
    }

    /// Return a cached value, or claim the key for fetching.
    ///
    /// Waits while another thread holds the claim for the same key.
    fn claim_or_wait(&self, endpoint: &str, key: &str) -> Option<SharedJson> {
        let (lock, cvar) = &self.shared.pending;
        let slot: EntryKey = (endpoint.to_string(), key.to_string());
        let mut pending = lock.lock().expect("json cache pending poisoned");
        loop {
            if let Some(hit) = self.lookup(endpoint, key) {
                self.shared.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint, params = key, "json cache hit");
                return Some(hit);
            }
            if !pending.contains(&slot) {
                pending.insert(slot);
                return None;
            }
            pending = cvar.wait(pending).expect("json cache pending poisoned");
        }
    }

    fn release_claim(&self, endpoint: &str, key: &str) {
        let (lock, cvar) = &self.shared.pending;
        let mut pending = lock.lock().expect("json cache pending poisoned");
        pending.remove(&(endpoint.to_string(), key.to_string()));
        cvar.notify_all();
    }

    fn fetch_and_parse(&self, request: &JsonRequest) -> Result<SharedJson, PageError> {
        let counters = &self.shared.counters;
        counters.requests.fetch_add(1, Ordering::Relaxed);
        counters.in_flight.fetch_add(1, Ordering::Relaxed);
        let in_flight = InFlightGuard(&counters.in_flight);
        debug!(url = %request.url, "json cache miss, fetching");
        let body = self.shared.fetcher.fetch(request);
        drop(in_flight);
        let value: Value =
            serde_json::from_str(&body?).map_err(|err| PageError::MalformedJson {
                url: request.url.clone(),
                reason: err.to_string(),
            })?;
        Ok(Arc::new(value))
    }

    fn get_json_or_alert(&self, endpoint: &str, params: &Params) -> Option<SharedJson> {
        match self.get_json(endpoint, params) {
            Ok(value) => Some(value),
            Err(err) => {
                self.alert(&err);
                None
            }
        }
    }

    fn alert(&self, err: &PageError) {
        let handler = self
            .shared
            .alert
            .read()
            .expect("json cache alert poisoned")
            .clone();
        match handler {
            Some(handler) => handler(err),
            None => error!(error = %err, "json endpoint load failed"),
        }
    }

    fn begin_batch(&self, semaphore: Option<&str>) -> BatchTicket {
        let epoch = self.shared.next_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancelToken::new();
        if let Some(name) = semaphore {
            let started_at = Utc::now();
            let mut slots = self
                .shared
                .semaphores
                .lock()
                .expect("json cache semaphores poisoned");
            let previous = slots.insert(
                name.to_string(),
                SemaphoreSlot {
                    epoch,
                    started_at,
                    token: token.clone(),
                },
            );
            if let Some(previous) = previous {
                debug!(
                    semaphore = name,
                    previous_epoch = previous.epoch,
                    previous_started_at = %previous.started_at,
                    epoch,
                    "superseding running batch"
                );
                previous.token.cancel();
            }
        }
        BatchTicket {
            semaphore: semaphore.map(str::to_string),
            epoch,
            token,
        }
    }

    fn is_superseded(&self, ticket: &BatchTicket) -> bool {
        let Some(name) = ticket.semaphore.as_deref() else {
            return false;
        };
        let slots = self
            .shared
            .semaphores
            .lock()
            .expect("json cache semaphores poisoned");
        slots.get(name).is_some_and(|slot| slot.epoch > ticket.epoch)
    }

    fn run_batch(&self, ticket: &BatchTicket, gets: &[JsonGet]) -> BatchOutcome {
        let results: Vec<SubFetch> = thread::scope(|scope| {
            let handles: Vec<_> = gets
                .iter()
                .map(|get| scope.spawn(move || self.run_sub_fetch(ticket, get)))
                .collect();
            handles
                .into_iter()
                .zip(gets)
                .map(|(handle, get)| {
                    handle.join().unwrap_or_else(|_| {
                        warn!(endpoint = %get.endpoint, "json sub-fetch panicked");
                        SubFetch::Loaded(None)
                    })
                })
                .collect()
        });

        let mut values = Vec::with_capacity(results.len());
        for result in results {
            match result {
                SubFetch::Loaded(value) => values.push(value),
                SubFetch::Dropped => return self.abandoned_outcome(ticket),
            }
        }
        if ticket.token.is_cancelled() {
            return self.abandoned_outcome(ticket);
        }
        BatchOutcome::Complete(values)
    }

    fn run_sub_fetch(&self, ticket: &BatchTicket, get: &JsonGet) -> SubFetch {
        if ticket.token.is_cancelled() {
            debug!(endpoint = %get.endpoint, "batch cancelled, skipping request");
            return SubFetch::Dropped;
        }
        let loaded = self.get_json_or_alert(&get.endpoint, &get.params);
        if ticket.token.is_cancelled() || self.is_superseded(ticket) {
            debug!(
                semaphore = ticket.semaphore.as_deref().unwrap_or_default(),
                endpoint = %get.endpoint,
                "with_jsons result blocked for being stale"
            );
            return SubFetch::Dropped;
        }
        SubFetch::Loaded(loaded)
    }

    fn abandoned_outcome(&self, ticket: &BatchTicket) -> BatchOutcome {
        match ticket.semaphore.as_ref() {
            Some(name) if self.is_superseded(ticket) => {
                self.shared
                    .counters
                    .superseded_batches
                    .fetch_add(1, Ordering::Relaxed);
                BatchOutcome::Superseded {
                    semaphore: name.clone(),
                }
            }
            _ => BatchOutcome::Cancelled,
        }
    }
}

/// Releases a fetch claim when the fetching call returns or unwinds.
struct ClaimGuard<'a> {
    cache: &'a JsonCache,
    endpoint: &'a str,
    key: ParamsKey,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.cache.release_claim(self.endpoint, &self.key);
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Compact JSON of `params` with object keys sorted at every depth.
pub fn canonical_params(params: &Params) -> ParamsKey {
    canonical_value(&Value::Object(params.clone())).to_string()
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map
                .iter()
                .map(|(key, inner)| (key, canonical_value(inner)))
                .collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(key, inner)| (key.clone(), inner))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

/// Render a param value the way it appears in a query string.
fn render_param(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_param)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
