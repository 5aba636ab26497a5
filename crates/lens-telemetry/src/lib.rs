pub mod expo;
pub mod history;
pub mod poller;
pub mod rate;
pub mod snapshot;

pub use expo::{extract_metric, metric_present};
pub use history::{TpsHistory, TpsSample, TPS_HISTORY_CAPACITY};
pub use poller::{
    read_snapshot, FetchError, PollerConfig, PollerHandle, TelemetrySnapshot, POLL_INTERVAL_MS,
};
pub use rate::RateCalculator;
pub use snapshot::GpuMetricsSnapshot;
