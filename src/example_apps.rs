use std::error::Error;
use std::io::Read;

use clap::{Parser, error::ErrorKind};
use serde_json::Value;

use crate::cache::{JsonCache, JsonGet};
use crate::config::CacheConfig;
use crate::errors::PageError;
use crate::smoothing::{MovingAverageOptions, moving_average};
use crate::stats::{DEFAULT_MODE_TRIM, Summary, calc_mode, describe, quantile};
use crate::types::Params;

#[derive(Debug, Parser)]
#[command(
    name = "stats_report",
    disable_help_subcommand = true,
    about = "Describe a numeric sample",
    long_about = "Print mean, median, robust mode, standard deviation, skewness, and quantiles for a sample, optionally followed by its weighted moving average.",
    after_help = "Values come from positional arguments, or from whitespace-separated stdin when none are given. Use `null` to mark a gap in the series."
)]
struct StatsReportCli {
    #[arg(
        value_name = "VALUE",
        allow_negative_numbers = true,
        value_parser = parse_sample_token,
        help = "Sample values in series order (`null` marks a gap)"
    )]
    values: Vec<Option<f64>>,
    #[arg(
        long = "mode-trim",
        default_value_t = DEFAULT_MODE_TRIM,
        value_parser = parse_mode_trim,
        help = "Quantile distance used by the robust mode estimator"
    )]
    mode_trim: f64,
    #[arg(
        long = "quantile",
        value_name = "Q",
        value_parser = parse_unit_interval,
        help = "Extra quantile to report, repeat as needed"
    )]
    quantiles: Vec<f64>,
    #[arg(
        long,
        value_parser = parse_positive_usize,
        help = "Print the weighted moving average using this window size"
    )]
    window: Option<usize>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated weights for the moving average (defaults to 1 per value)"
    )]
    weights: Vec<f64>,
    #[arg(
        long = "min-start-threshold",
        default_value_t = MovingAverageOptions::default().min_start_threshold,
        help = "Cumulative weight required before the moving average starts"
    )]
    min_start_threshold: f64,
    #[arg(
        long = "no-restart",
        help = "Do not restart the moving average after the last gap"
    )]
    no_restart: bool,
    #[arg(long, help = "Emit the summary as JSON")]
    json: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "fetch_json",
    disable_help_subcommand = true,
    about = "Fetch JSON endpoints through the response cache",
    long_about = "Issue one batch of GET requests against /json/<endpoint> routes, repeat it to exercise the cache, and print the payloads plus request accounting.",
    after_help = "The base URL is resolved from --base-url, then PAGEKIT_BASE_URL, then http://localhost:5000."
)]
/// CLI for `fetch_json`.
///
/// Common usage:
/// - Single endpoint: `--endpoint count --param query=covid`
/// - Several endpoints in one batch: repeat `--endpoint`
/// - Show cache reuse: `--repeat 3`
struct FetchJsonCli {
    #[arg(long = "base-url", value_name = "URL", help = "Override the base URL")]
    base_url: Option<String>,
    #[arg(
        long = "endpoint",
        value_name = "NAME",
        required = true,
        help = "Endpoint name under the JSON route prefix, repeat as needed"
    )]
    endpoints: Vec<String>,
    #[arg(
        long = "param",
        value_name = "KEY=VALUE",
        value_parser = parse_param_arg,
        help = "Request parameter applied to every endpoint, repeat as needed"
    )]
    params: Vec<(String, String)>,
    #[arg(long, help = "Semaphore name for the batch")]
    semaphore: Option<String>,
    #[arg(
        long,
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "How many times to run the batch"
    )]
    repeat: usize,
}

/// Run the `stats_report` CLI with `args_iter` (program name excluded).
pub fn run_stats_report<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<StatsReportCli, _>(std::iter::once("stats_report".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let series = if cli.values.is_empty() {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        input
            .split_whitespace()
            .map(parse_sample_token)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        cli.values.clone()
    };
    let sample: Vec<f64> = series.iter().flatten().copied().collect();
    if sample.is_empty() {
        return Err(
            PageError::Configuration("stats_report needs at least one value".into()).into(),
        );
    }

    let mut summary = describe(&sample);
    summary.mode = calc_mode(&sample, cli.mode_trim);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    for q in &cli.quantiles {
        println!("quantile({q}) = {}", quantile(&sample, *q));
    }

    if let Some(window) = cli.window {
        let weights = if cli.weights.is_empty() {
            vec![1.0; series.len()]
        } else {
            cli.weights.clone()
        };
        let xs: Vec<f64> = (0..series.len()).map(|idx| idx as f64).collect();
        let options = MovingAverageOptions {
            start_after_last_null: !cli.no_restart,
            min_start_threshold: cli.min_start_threshold,
        };
        let smoothed = moving_average(&xs, &series, window, &weights, &options)?;
        println!();
        println!("=== moving average (window {window}) ===");
        for (idx, (raw, avg)) in series.iter().zip(&smoothed).enumerate() {
            println!("{idx:>4}  {:>12}  {:>12}", format_cell(*raw), format_cell(*avg));
        }
    }
    Ok(())
}

/// Run the `fetch_json` CLI with `args_iter` (program name excluded).
pub fn run_fetch_json<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<FetchJsonCli, _>(std::iter::once("fetch_json".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let mut config = CacheConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    let cache = JsonCache::new(&config);
    cache.set_alert_handler(|err| eprintln!("[fetch_json] {err}"));

    let params: Params = cli
        .params
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let gets: Vec<JsonGet> = cli
        .endpoints
        .iter()
        .map(|endpoint| JsonGet::new(endpoint.clone(), params.clone()))
        .collect();

    println!("Fetching from {}", config.base_url);
    for round in 1..=cli.repeat {
        let outcome = cache.with_jsons(&gets, cli.semaphore.as_deref(), |values| {
            println!("=== round {round} ===");
            for (get, value) in gets.iter().zip(values) {
                let request = cache.request_for(&get.endpoint, &get.params);
                match value {
                    Some(json) => println!(
                        "{}\n{}",
                        request.url,
                        serde_json::to_string_pretty(json.as_ref()).unwrap_or_default()
                    ),
                    None => println!("{}\n<no payload>", request.url),
                }
            }
        });
        if !outcome.is_complete() {
            println!("round {round} did not complete: {outcome:?}");
        }
    }

    let stats = cache.stats();
    println!();
    println!("=== cache ===");
    println!("entries  : {}", cache.len());
    println!("requests : {}", stats.requests);
    println!("hits     : {}", stats.hits);
    println!("misses   : {}", stats.misses);
    println!("failures : {}", stats.failures);
    Ok(())
}

fn print_summary(summary: &Summary) {
    println!("=== summary ===");
    println!("count    : {}", summary.count);
    println!("mean     : {}", summary.mean);
    println!("median   : {}", summary.median);
    println!("mode     : {}", summary.mode);
    println!("stddev   : {}", summary.stddev);
    println!("skewness : {}", summary.skewness);
    println!("q25      : {}", summary.lower_quartile);
    println!("q75      : {}", summary.upper_quartile);
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.4}"),
        None => "null".to_string(),
    }
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn parse_sample_token(raw: &str) -> Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("invalid sample value '{trimmed}': expected a number or `null`"))
}

fn parse_unit_interval(raw: &str) -> Result<f64, String> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid quantile '{raw}': must be a float"))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("quantile {parsed} must be within [0, 1]"));
    }
    Ok(parsed)
}

fn parse_mode_trim(raw: &str) -> Result<f64, String> {
    let parsed = parse_unit_interval(raw)?;
    if parsed > 0.5 {
        return Err("--mode-trim must be at most 0.5".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_param_arg(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("--param expects KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("--param key must not be empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_tokens_accept_numbers_and_null() {
        assert_eq!(parse_sample_token("2.5"), Ok(Some(2.5)));
        assert_eq!(parse_sample_token("-3"), Ok(Some(-3.0)));
        assert_eq!(parse_sample_token("NULL"), Ok(None));
        assert!(parse_sample_token("abc").is_err());
    }

    #[test]
    fn param_args_split_on_first_equals() {
        assert_eq!(
            parse_param_arg("query=a=b"),
            Ok(("query".to_string(), "a=b".to_string()))
        );
        assert!(parse_param_arg("novalue").is_err());
        assert!(parse_param_arg("=x").is_err());
    }

    #[test]
    fn mode_trim_is_bounded() {
        assert_eq!(parse_mode_trim("0.2"), Ok(0.2));
        assert!(parse_mode_trim("0.7").is_err());
        assert!(parse_unit_interval("1.5").is_err());
    }

    #[test]
    fn stats_report_runs_with_positional_values() {
        let args = ["1", "2", "null", "4", "--window", "2", "--min-start-threshold", "0"];
        run_stats_report(args.iter().map(|arg| arg.to_string())).unwrap();
    }

    #[test]
    fn stats_report_help_is_not_an_error() {
        run_stats_report(std::iter::once("--help".to_string())).unwrap();
    }

    #[test]
    fn fetch_json_requires_an_endpoint() {
        assert!(run_fetch_json(std::iter::empty()).is_err());
    }
}
