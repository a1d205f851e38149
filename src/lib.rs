#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Session-scoped JSON endpoint cache with batch coalescing.
pub mod cache;
/// Cache and HTTP configuration types.
pub mod config;
/// Centralized constants used across query, stats, smoothing, and cache code.
pub mod constants;
/// Reusable example runners shared by the demo binaries.
pub mod example_apps;
/// Form schema and form-to-params conversion.
pub mod form;
/// URL query-string helpers.
pub mod query;
/// Page-lifetime context tying a location to its cache.
pub mod session;
/// Weighted moving averages over series with gaps.
pub mod smoothing;
/// Descriptive statistics over numeric samples.
pub mod stats;
/// Shared type aliases.
pub mod types;

mod errors;

pub use cache::{
    AlertHandler, BatchHandle, BatchOutcome, CacheStats, CancelToken, JsonCache, JsonFetcher,
    JsonGet, JsonRequest, SharedJson, UreqFetcher, canonical_params,
};
pub use config::CacheConfig;
pub use errors::PageError;
pub use form::{
    FieldKind, FormDict, FormField, FormInputs, FormSchema, FormValue, form_to_dict,
    serialize_form,
};
pub use query::{
    decode_component, encode_component, get_parameter_by_name, remove_url_parameter,
    update_url_parameter,
};
pub use session::PageSession;
pub use smoothing::{MovingAverageOptions, SeriesPoint, moving_average, smooth_points};
pub use stats::{
    Summary, calc_mean, calc_median, calc_mode, calc_skewness, calc_stddev, describe, quantile,
};
pub use types::{Endpoint, FieldName, FormId, ParamName, Params, ParamsKey, SemaphoreName};
