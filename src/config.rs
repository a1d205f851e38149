use std::time::Duration;

use crate::constants::cache::{
    BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_JSON_PREFIX, DEFAULT_TIMEOUT_SECS, TIMEOUT_ENV,
};
use crate::errors::PageError;

/// Settings for the JSON endpoint cache and its default HTTP fetcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Scheme, host, and port the JSON routes are served from.
    pub base_url: String,
    /// Route prefix placed before the endpoint name (`/json/` gives `/json/count`).
    pub json_prefix: String,
    /// Global timeout applied to each HTTP request.
    pub timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            json_prefix: DEFAULT_JSON_PREFIX.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CacheConfig {
    /// Defaults overridden by `PAGEKIT_BASE_URL` and `PAGEKIT_TIMEOUT_SECS`.
    ///
    /// Blank variables are ignored; a timeout that is not a whole number of
    /// seconds is a configuration error.
    pub fn from_env() -> Result<Self, PageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PageError> {
        let mut config = Self::default();
        if let Some(value) = lookup(BASE_URL_ENV)
            && !value.trim().is_empty()
        {
            config.base_url = value.trim().to_string();
        }
        if let Some(value) = lookup(TIMEOUT_ENV)
            && !value.trim().is_empty()
        {
            let secs = value.trim().parse::<u64>().map_err(|_| {
                PageError::Configuration(format!(
                    "{TIMEOUT_ENV} must be a whole number of seconds, got '{value}'"
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
