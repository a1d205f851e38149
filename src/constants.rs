/// Constants used by query-string parsing and rewriting.
pub mod query {
    /// Separator between the URL base and its query string.
    pub const QUERY_DELIMITER: char = '?';
    /// Separator between the query string and the fragment identifier.
    pub const FRAGMENT_DELIMITER: char = '#';
    /// Separator emitted between query pairs.
    pub const PAIR_DELIMITER: char = '&';
    /// Alternate pair separator accepted when removing parameters.
    pub const ALT_PAIR_DELIMITER: char = ';';
    /// Separator between a parameter key and its value.
    pub const KEY_VALUE_DELIMITER: char = '=';
}

/// Constants used by descriptive statistics.
pub mod stats {
    /// Default quantile distance used by the robust mode estimator.
    pub const DEFAULT_MODE_TRIM: f64 = 0.2;
    /// Lower quartile reported by `describe`.
    pub const LOWER_QUARTILE: f64 = 0.25;
    /// Upper quartile reported by `describe`.
    pub const UPPER_QUARTILE: f64 = 0.75;
}

/// Constants used by the weighted moving average.
pub mod smoothing {
    /// Cumulative weight required before averages are emitted.
    pub const DEFAULT_MIN_START_THRESHOLD: f64 = 10.0;
    /// Whether smoothing restarts after the last gap by default.
    pub const DEFAULT_START_AFTER_LAST_NULL: bool = true;
}

/// Constants used by the JSON endpoint cache.
pub mod cache {
    /// Base URL used when no override is configured.
    pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
    /// Route prefix under which JSON endpoints are served.
    pub const DEFAULT_JSON_PREFIX: &str = "/json/";
    /// Global request timeout for the default HTTP fetcher.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Environment variable overriding the base URL.
    pub const BASE_URL_ENV: &str = "PAGEKIT_BASE_URL";
    /// Environment variable overriding the request timeout (seconds).
    pub const TIMEOUT_ENV: &str = "PAGEKIT_TIMEOUT_SECS";
    /// Thread name prefix for background batch workers.
    pub const BATCH_THREAD_NAME: &str = "pagekit-batch";
}
