use anyhow::Result;
use clap::{Parser, Subcommand};
use lens_core::{AgentEvent, DerivedState, EventBuffer, EventKind};
use lens_feed::{FeedConfig, OrchestrationRequest, OrchestratorClient};
use lens_telemetry::PollerConfig;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{resolve_endpoints, EndpointArgs, Endpoints};

#[derive(Parser)]
#[command(name = "lens")]
#[command(about = "AgentLens pipeline telemetry client", long_about = None)]
struct Cli {
    #[command(flatten)]
    endpoints: EndpointArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the live event stream and GPU telemetry until interrupted
    Watch,
    /// Submit a coding task and print the outcome
    Submit {
        task: String,
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
    },
    /// Probe the orchestrator health endpoint
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let cli = Cli::parse();
    let endpoints = resolve_endpoints(&cli.endpoints)?;

    match cli.command {
        Commands::Watch => watch(endpoints).await,
        Commands::Submit { task, max_retries } => submit(endpoints, task, max_retries).await,
        Commands::Health => health(endpoints).await,
    }
}

async fn watch(endpoints: Endpoints) -> Result<()> {
    let mut feed = FeedConfig::new(endpoints.events_url.clone()).spawn();
    let poller = PollerConfig {
        endpoints: endpoints.metrics_urls.clone(),
        interval: endpoints.poll_interval,
    }
    .spawn()?;
    let mut snapshot_rx = poller.subscribe();
    let mut connected_rx = feed.connected.clone();

    let mut buffer = EventBuffer::new();
    let mut state = DerivedState::default();

    info!(
        "watching {} (polling {} endpoints every {:?})",
        endpoints.events_url,
        endpoints.metrics_urls.len(),
        endpoints.poll_interval
    );

    loop {
        tokio::select! {
            maybe_event = feed.events.recv() => {
                let Some(event) = maybe_event else { break };
                state.apply(&event);
                log_event(&event, &state);
                buffer.push(event);
            }
            changed = connected_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("feed_status: connected={}", *connected_rx.borrow());
            }
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshot_rx.borrow().clone();
                match &snapshot.last_error {
                    Some(err) => warn!("telemetry_stale: {err}"),
                    None => debug!(
                        "telemetry: gpu={:.0}% vram={:.0}% temp={:.0}C tps={:.1} samples={}",
                        snapshot.gpu.gpu_load_percent,
                        snapshot.gpu.vram_percent,
                        snapshot.gpu.temperature_c,
                        snapshot.gpu.tokens_per_second,
                        snapshot.history.len()
                    ),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    feed.disconnect().await;
    poller.shutdown().await;

    info!("session_summary: events={} tokens={}", buffer.len(), state.total_tokens);
    for (id, record) in state.roster.iter() {
        info!(
            "agent_summary: {id} status={} tokens={} latency={}",
            record.status,
            record
                .token_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record
                .latency_seconds
                .map(|s| format!("{s:.2}s"))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

fn log_event(event: &AgentEvent, state: &DerivedState) {
    match &event.kind {
        // Token events are far too chatty for info level.
        EventKind::Token => debug!(
            "token: agent={} streamed={}B",
            event.agent,
            state.streaming.content.len()
        ),
        EventKind::AgentStart | EventKind::AgentEnd | EventKind::Error => {
            info!("event: {} agent={}", event.kind, event.agent);
        }
        EventKind::FileCreated | EventKind::CodeWritten => {
            info!(
                "event: {} path={} workspace_files={}",
                event.kind,
                state.selected_file.as_deref().unwrap_or("-"),
                state.workspace.len()
            );
        }
        EventKind::PlanCreated => {
            info!("event: plan_created summary={:?}", state.plan.as_deref().unwrap_or(""));
        }
        kind => debug!("event: {kind} agent={}", event.agent),
    }
}

async fn submit(endpoints: Endpoints, task: String, max_retries: u32) -> Result<()> {
    let client = OrchestratorClient::new(endpoints.orchestrator_url.clone());
    let mut state = DerivedState::default();
    state.reset_for_submission();

    info!("submitting task ({} chars)", task.len());
    let response = client
        .submit(&OrchestrationRequest { task, max_retries })
        .await?;
    state.ingest_submission(&response.outcome());

    println!(
        "{} after {} retries",
        if response.success { "succeeded" } else { "failed" },
        response.retries
    );
    for (path, content) in state.workspace.iter() {
        println!("  {path} ({}B)", content.len());
    }
    if let Some(preview) = &state.preview {
        println!("preview: {}", preview.url);
    }
    if !state.execution_log.is_empty() {
        println!("--- execution output ---");
        println!("{}", state.execution_log);
    }
    Ok(())
}

async fn health(endpoints: Endpoints) -> Result<()> {
    let client = OrchestratorClient::new(endpoints.orchestrator_url.clone());
    let health = client.health().await?;
    println!("{} {} {}", health.status, health.service, health.version);
    Ok(())
}
