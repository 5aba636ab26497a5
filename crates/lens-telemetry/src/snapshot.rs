use serde::Serialize;

/// GPU/inference telemetry as of the latest poll tick. Recomputed
/// wholesale every tick; there are no partial updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct GpuMetricsSnapshot {
    pub gpu_load_percent: f64,
    pub vram_percent: f64,
    pub vram_model_bytes: f64,
    pub vram_cache_bytes: f64,
    pub vram_total_bytes: f64,
    pub temperature_c: f64,
    pub tokens_per_second: f64,
    pub available: bool,
}
