use anyhow::{Context, Result};
use clap::Args;
use std::env;
use std::time::Duration;
use url::Url;

use lens_telemetry::POLL_INTERVAL_MS;

pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://localhost:8001";
pub const DEFAULT_EVENTS_URL: &str = "ws://localhost:8001/ws/events";
pub const DEFAULT_COLLECTOR_METRICS_URL: &str = "http://localhost:8002/metrics";
pub const DEFAULT_INFERENCE_METRICS_URL: &str = "http://localhost:8000/metrics";

#[derive(Debug, Clone, Default, Args)]
pub struct EndpointArgs {
    /// Orchestrator base URL (env: LENS_ORCHESTRATOR_URL)
    #[arg(long)]
    pub orchestrator_url: Option<String>,
    /// Event-stream websocket URL (env: LENS_EVENTS_URL)
    #[arg(long)]
    pub events_url: Option<String>,
    /// Metrics-collector exposition URL (env: LENS_METRICS_URL)
    #[arg(long)]
    pub metrics_url: Option<String>,
    /// Inference-service exposition URL (env: LENS_INFERENCE_METRICS_URL)
    #[arg(long)]
    pub inference_metrics_url: Option<String>,
    /// Telemetry poll interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub orchestrator_url: Url,
    pub events_url: Url,
    pub metrics_urls: Vec<String>,
    pub poll_interval: Duration,
}

pub fn resolve_endpoints(args: &EndpointArgs) -> Result<Endpoints> {
    let orchestrator_url = resolve_url(
        &args.orchestrator_url,
        "LENS_ORCHESTRATOR_URL",
        DEFAULT_ORCHESTRATOR_URL,
    )?;
    let events_url = resolve_url(&args.events_url, "LENS_EVENTS_URL", DEFAULT_EVENTS_URL)?;
    let collector = resolve_url(&args.metrics_url, "LENS_METRICS_URL", DEFAULT_COLLECTOR_METRICS_URL)?;
    let inference = resolve_url(
        &args.inference_metrics_url,
        "LENS_INFERENCE_METRICS_URL",
        DEFAULT_INFERENCE_METRICS_URL,
    )?;
    let orchestrator_metrics = orchestrator_url
        .join("/metrics")
        .context("orchestrator metrics url")?;
    let poll_interval = Duration::from_millis(args.poll_interval_ms.unwrap_or(POLL_INTERVAL_MS));
    Ok(Endpoints {
        orchestrator_url,
        events_url,
        metrics_urls: vec![
            collector.to_string(),
            inference.to_string(),
            orchestrator_metrics.to_string(),
        ],
        poll_interval,
    })
}

fn resolve_url(flag: &Option<String>, env_key: &str, default: &str) -> Result<Url> {
    let raw = flag
        .clone()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env_nonempty(env_key))
        .unwrap_or_else(|| default.to_string());
    Url::parse(&raw).with_context(|| format!("invalid url '{raw}' (flag or {env_key})"))
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_three_metrics_services() {
        let endpoints = resolve_endpoints(&EndpointArgs::default()).expect("endpoints");
        assert_eq!(endpoints.metrics_urls.len(), 3);
        assert!(endpoints
            .metrics_urls
            .iter()
            .any(|url| url.contains("8001/metrics")));
        assert_eq!(endpoints.poll_interval, Duration::from_millis(2000));
        assert_eq!(endpoints.events_url.scheme(), "ws");
    }

    #[test]
    fn flags_override_defaults() {
        let args = EndpointArgs {
            orchestrator_url: Some("http://10.0.0.5:9001".to_string()),
            poll_interval_ms: Some(500),
            ..EndpointArgs::default()
        };
        let endpoints = resolve_endpoints(&args).expect("endpoints");
        assert_eq!(endpoints.orchestrator_url.as_str(), "http://10.0.0.5:9001/");
        assert!(endpoints
            .metrics_urls
            .iter()
            .any(|url| url == "http://10.0.0.5:9001/metrics"));
        assert_eq!(endpoints.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let args = EndpointArgs {
            events_url: Some("not a url".to_string()),
            ..EndpointArgs::default()
        };
        assert!(resolve_endpoints(&args).is_err());
    }
}
