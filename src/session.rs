use crate::cache::JsonCache;
use crate::config::CacheConfig;
use crate::query::{
    encode_component, get_parameter_by_name, remove_url_parameter, update_url_parameter,
};

/// Page-lifetime context: the current location plus the shared JSON cache.
///
/// Dropping the session drops the cache with it (unless a clone of the
/// cache handle is still held elsewhere).
#[derive(Clone)]
pub struct PageSession {
    location: String,
    cache: JsonCache,
}

impl PageSession {
    /// Create a session at `location` sharing an existing cache.
    pub fn new(location: impl Into<String>, cache: JsonCache) -> Self {
        Self {
            location: location.into(),
            cache,
        }
    }

    /// Create a session with a fresh HTTP-backed cache.
    pub fn with_config(location: impl Into<String>, config: &CacheConfig) -> Self {
        Self::new(location, JsonCache::new(config))
    }

    /// Current location URL.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Replace the current location.
    pub fn navigate(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    /// Decoded value of `name` in the current location.
    pub fn parameter(&self, name: &str) -> Option<String> {
        get_parameter_by_name(name, &self.location)
    }

    /// Set `name` in the current location; `value` is percent-encoded.
    pub fn set_parameter(&mut self, name: &str, value: &str) {
        self.location = update_url_parameter(&self.location, name, &encode_component(value));
    }

    /// Remove `name` from the current location.
    pub fn remove_parameter(&mut self, name: &str) {
        self.location = remove_url_parameter(&self.location, name);
    }

    /// Shared JSON cache for this session.
    pub fn cache(&self) -> &JsonCache {
        &self.cache
    }
}
