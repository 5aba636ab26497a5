use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::expo::{extract_metric, metric_present};
use crate::history::{TpsHistory, TpsSample};
use crate::rate::RateCalculator;
use crate::snapshot::GpuMetricsSnapshot;

pub const POLL_INTERVAL_MS: u64 = 2000;

/// Series names exposed by the metrics collector, the inference service
/// and the orchestrator.
pub mod series {
    pub const GPU_UTILIZATION: &str = "gpu_utilization_percent";
    pub const GPU_MEMORY_PERCENT: &str = "gpu_memory_usage_percent";
    pub const GPU_MEMORY_USED: &str = "gpu_memory_used_bytes";
    pub const GPU_MEMORY_TOTAL: &str = "gpu_memory_total_bytes";
    pub const GPU_TEMPERATURE: &str = "gpu_temperature_celsius";
    pub const GPU_AVAILABLE: &str = "gpu_available";
    pub const VRAM_MODEL: &str = "inference_vram_model_bytes";
    pub const VRAM_CACHE: &str = "inference_vram_context_bytes";
    pub const INFERENCE_TOKENS: &str = "inference_tokens_generated_total";
    pub const ORCHESTRATOR_TOKENS: &str = "orchestrator_tokens_total";

    /// The dashboard charts the first GPU only.
    pub const GPU_INDEX_0: &str = "gpu_index=\"0\"";
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("metrics endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("no metrics endpoint reachable")]
    AllEndpointsDown,
}

/// What poller consumers see: the wholesale GPU snapshot, the bounded
/// throughput history and the last fetch failure, if any. A failed tick
/// only ever updates `last_error`; it never blanks the telemetry.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub gpu: GpuMetricsSnapshot,
    pub history: Vec<TpsSample>,
    pub last_error: Option<String>,
}

/// Extracts one whole [`GpuMetricsSnapshot`] from exposition text,
/// deriving tokens/second from whichever token counter the text carries
/// (inference-side preferred, orchestrator-side as fallback).
pub fn read_snapshot(
    text: &str,
    rate: &mut RateCalculator,
    now: DateTime<Utc>,
) -> GpuMetricsSnapshot {
    let idx0 = Some(series::GPU_INDEX_0);
    let mut vram_percent = extract_metric(text, series::GPU_MEMORY_PERCENT, idx0);
    let vram_total_bytes = extract_metric(text, series::GPU_MEMORY_TOTAL, idx0);
    if vram_percent == 0.0 && vram_total_bytes > 0.0 {
        let used = extract_metric(text, series::GPU_MEMORY_USED, idx0);
        vram_percent = used / vram_total_bytes * 100.0;
    }

    let counter = if metric_present(text, series::INFERENCE_TOKENS) {
        extract_metric(text, series::INFERENCE_TOKENS, None)
    } else {
        extract_metric(text, series::ORCHESTRATOR_TOKENS, None)
    };

    GpuMetricsSnapshot {
        gpu_load_percent: extract_metric(text, series::GPU_UTILIZATION, idx0),
        vram_percent,
        vram_model_bytes: extract_metric(text, series::VRAM_MODEL, None),
        vram_cache_bytes: extract_metric(text, series::VRAM_CACHE, None),
        vram_total_bytes,
        temperature_c: extract_metric(text, series::GPU_TEMPERATURE, idx0),
        tokens_per_second: rate.observe(counter, now),
        available: extract_metric(text, series::GPU_AVAILABLE, None) >= 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Exposition endpoints, polled in order and concatenated; the
    /// tracked series are spread across the collector, inference and
    /// orchestrator services.
    pub endpoints: Vec<String>,
    pub interval: Duration,
}

impl PollerConfig {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            interval: Duration::from_millis(POLL_INTERVAL_MS),
        }
    }

    /// Spawns the polling task. The first tick fires immediately.
    pub fn spawn(self) -> Result<PollerHandle, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(self.interval).build()?;
        let (snapshot_tx, snapshot_rx) = watch::channel(TelemetrySnapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(self, client, snapshot_tx, shutdown_rx));
        Ok(PollerHandle {
            snapshot: snapshot_rx,
            shutdown: shutdown_tx,
            task,
        })
    }
}

pub struct PollerHandle {
    snapshot: watch::Receiver<TelemetrySnapshot>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshot.clone()
    }

    /// Stops the interval; pending fetches are abandoned with the task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn poll_loop(
    cfg: PollerConfig,
    client: reqwest::Client,
    snapshot_tx: watch::Sender<TelemetrySnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut rate = RateCalculator::new();
    let mut history = TpsHistory::new();
    let mut ticker = tokio::time::interval(cfg.interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fetched = fetch_exposition(&client, &cfg.endpoints).await;
                apply_tick(&snapshot_tx, &mut rate, &mut history, fetched, Utc::now());
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}

/// Folds one tick's fetch result into the published snapshot. A failed
/// fetch records the error and leaves the last good snapshot and history
/// untouched; the next success clears it.
fn apply_tick(
    snapshot_tx: &watch::Sender<TelemetrySnapshot>,
    rate: &mut RateCalculator,
    history: &mut TpsHistory,
    fetched: Result<String, FetchError>,
    now: DateTime<Utc>,
) {
    match fetched {
        Ok(text) => {
            let gpu = read_snapshot(&text, rate, now);
            history.push(now, gpu.tokens_per_second);
            debug!(
                "metrics_tick: load={:.1}% tps={:.1}",
                gpu.gpu_load_percent, gpu.tokens_per_second
            );
            let _ = snapshot_tx.send(TelemetrySnapshot {
                gpu,
                history: history.to_vec(),
                last_error: None,
            });
        }
        Err(err) => {
            warn!("metrics_fetch_error: {err}");
            snapshot_tx.send_modify(|snap| snap.last_error = Some(err.to_string()));
        }
    }
}

/// Fetches every endpoint and concatenates the bodies. Individual
/// endpoint failures are tolerated as long as at least one responds.
async fn fetch_exposition(
    client: &reqwest::Client,
    endpoints: &[String],
) -> Result<String, FetchError> {
    let mut combined = String::new();
    let mut last_error = None;
    for url in endpoints {
        match fetch_one(client, url).await {
            Ok(text) => {
                combined.push_str(&text);
                if !combined.ends_with('\n') {
                    combined.push('\n');
                }
            }
            Err(err) => {
                warn!("metrics_endpoint_error: {url}: {err}");
                last_error = Some(err);
            }
        }
    }
    if combined.is_empty() {
        Err(last_error.unwrap_or(FetchError::AllEndpointsDown))
    } else {
        Ok(combined)
    }
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn exposition(tokens: f64) -> String {
        format!(
            "gpu_available 1\n\
             gpu_utilization_percent{{gpu_index=\"0\"}} 42.5\n\
             gpu_memory_usage_percent{{gpu_index=\"0\"}} 54.2\n\
             gpu_memory_used_bytes{{gpu_index=\"0\"}} 6979321856\n\
             gpu_memory_total_bytes{{gpu_index=\"0\"}} 12884901888\n\
             gpu_temperature_celsius{{gpu_index=\"0\"}} 62\n\
             inference_vram_model_bytes 4800000000\n\
             inference_vram_context_bytes 900000000\n\
             inference_tokens_generated_total {tokens}\n"
        )
    }

    #[test]
    fn snapshot_reads_all_tracked_series() {
        let mut rate = RateCalculator::new();
        let snap = read_snapshot(&exposition(100.0), &mut rate, at(10));
        assert_eq!(snap.gpu_load_percent, 42.5);
        assert_eq!(snap.vram_percent, 54.2);
        assert_eq!(snap.vram_model_bytes, 4_800_000_000.0);
        assert_eq!(snap.vram_cache_bytes, 900_000_000.0);
        assert_eq!(snap.vram_total_bytes, 12_884_901_888.0);
        assert_eq!(snap.temperature_c, 62.0);
        assert!(snap.available);
        assert_eq!(snap.tokens_per_second, 0.0);

        let snap = read_snapshot(&exposition(150.0), &mut rate, at(11));
        assert_eq!(snap.tokens_per_second, 50.0);
    }

    #[test]
    fn vram_percent_falls_back_to_used_over_total() {
        let text = "gpu_memory_used_bytes{gpu_index=\"0\"} 50\n\
                    gpu_memory_total_bytes{gpu_index=\"0\"} 200\n";
        let mut rate = RateCalculator::new();
        let snap = read_snapshot(text, &mut rate, at(0));
        assert_eq!(snap.vram_percent, 25.0);
        assert!(!snap.available);
    }

    #[test]
    fn token_counter_falls_back_to_orchestrator_series() {
        let mut rate = RateCalculator::new();
        let text = "orchestrator_tokens_total 40\n";
        read_snapshot(text, &mut rate, at(0));
        let snap = read_snapshot("orchestrator_tokens_total 100\n", &mut rate, at(2));
        assert_eq!(snap.tokens_per_second, 30.0);
    }

    #[test]
    fn failed_tick_preserves_prior_snapshot_and_history() {
        let (tx, rx) = watch::channel(TelemetrySnapshot::default());
        let mut rate = RateCalculator::new();
        let mut history = TpsHistory::new();
        apply_tick(&tx, &mut rate, &mut history, Ok(exposition(100.0)), at(10));
        apply_tick(&tx, &mut rate, &mut history, Ok(exposition(150.0)), at(11));
        let good = rx.borrow().clone();
        assert_eq!(good.gpu.tokens_per_second, 50.0);
        assert_eq!(good.history.len(), 2);

        apply_tick(
            &tx,
            &mut rate,
            &mut history,
            Err(FetchError::AllEndpointsDown),
            at(12),
        );
        let stale = rx.borrow().clone();
        // Telemetry is stale, never blanked.
        assert_eq!(stale.gpu, good.gpu);
        assert_eq!(stale.history.len(), 2);
        assert!(stale.last_error.is_some());

        apply_tick(&tx, &mut rate, &mut history, Ok(exposition(250.0)), at(13));
        let fresh = rx.borrow().clone();
        assert!(fresh.last_error.is_none());
        // Rate bridges the failed tick: (250 - 150) / (13s - 11s).
        assert_eq!(fresh.gpu.tokens_per_second, 50.0);
        assert_eq!(fresh.history.len(), 3);
    }

    #[tokio::test]
    async fn one_reachable_endpoint_is_enough() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).await;
            let body = "gpu_available 1\n";
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });

        let client = reqwest::Client::new();
        let endpoints = vec![
            // Port 1 has no listener; the dead endpoint must be tolerated.
            "http://127.0.0.1:1/metrics".to_string(),
            format!("http://{addr}/metrics"),
        ];
        let text = fetch_exposition(&client, &endpoints).await.expect("reachable");
        assert!(text.contains("gpu_available 1"));
    }

    #[tokio::test]
    async fn all_endpoints_down_is_an_error() {
        let client = reqwest::Client::new();
        let endpoints = vec!["http://127.0.0.1:1/metrics".to_string()];
        assert!(fetch_exposition(&client, &endpoints).await.is_err());
    }

    #[test]
    fn inference_counter_wins_even_at_zero() {
        let mut rate = RateCalculator::new();
        let text = "inference_tokens_generated_total 0\norchestrator_tokens_total 5000\n";
        read_snapshot(text, &mut rate, at(0));
        // A real zero sample on the preferred series must not fall through
        // to the other counter and fake a burst of throughput.
        let snap = read_snapshot(
            "inference_tokens_generated_total 0\norchestrator_tokens_total 9000\n",
            &mut rate,
            at(2),
        );
        assert_eq!(snap.tokens_per_second, 0.0);
    }
}
