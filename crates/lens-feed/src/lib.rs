pub mod api;
pub mod conn;

pub use api::{
    ApiError, HealthResponse, OrchestrationRequest, OrchestrationResponse, OrchestratorClient,
};
pub use conn::{FeedConfig, FeedHandle, RECONNECT_DELAY_MS};
