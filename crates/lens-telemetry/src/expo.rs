//! Best-effort extraction of scalar samples from Prometheus exposition
//! text. This is deliberately not a full grammar parser: it scans line by
//! line and callers disambiguate multi-series names with a label substring
//! (e.g. `gpu_index="0"`).

/// Returns the value of the first sample line whose metric name equals
/// `metric` and (when given) whose label set contains `label_filter` as a
/// substring. `0.0` when no line matches or the value does not parse.
pub fn extract_metric(text: &str, metric: &str, label_filter: Option<&str>) -> f64 {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(rest) = line.strip_prefix(metric) else {
            continue;
        };
        // The name must end exactly here, at a label set or whitespace,
        // so `gpu_memory_used_bytes` never matches a longer name.
        if !(rest.starts_with('{') || rest.starts_with(' ') || rest.starts_with('\t')) {
            continue;
        }
        if let Some(filter) = label_filter {
            if !line.contains(filter) {
                continue;
            }
        }
        if let Some(value) = line.split_whitespace().last() {
            if let Ok(parsed) = value.parse::<f64>() {
                return parsed;
            }
        }
    }
    0.0
}

/// Like [`extract_metric`] but distinguishes "series absent" from a real
/// zero sample, for counters with a fallback series.
pub fn metric_present(text: &str, metric: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim();
        if line.starts_with('#') {
            return false;
        }
        match line.strip_prefix(metric) {
            Some(rest) => rest.starts_with('{') || rest.starts_with(' ') || rest.starts_with('\t'),
            None => false,
        }
    })
}
