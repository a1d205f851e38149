/// JSON endpoint name appended to the JSON route prefix.
/// Examples: `wordcloud`, `count`, `projection`
pub type Endpoint = String;
/// Canonical (key-sorted, compact) JSON encoding of request params.
/// Example: `{"lang":"en","query":"coronavirus"}`
pub type ParamsKey = String;
/// Name shared by batches that should supersede each other.
/// Examples: `wordcloud_panel`, `timeseries`
pub type SemaphoreName = String;
/// Identifier of a form schema.
/// Example: `search_form`
pub type FormId = String;
/// Name of a form field.
/// Examples: `query`, `filter_host`, `normalize`
pub type FieldName = String;
/// Query parameter name.
/// Examples: `query`, `time_lo`
pub type ParamName = String;
/// Request params keyed by parameter name.
pub type Params = serde_json::Map<String, serde_json::Value>;
