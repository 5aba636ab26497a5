use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

pub const TPS_HISTORY_CAPACITY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TpsSample {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Bounded tokens/second history for sparkline charting; arrival order is
/// preserved and the oldest samples fall off first.
#[derive(Debug, Clone)]
pub struct TpsHistory {
    samples: VecDeque<TpsSample>,
    capacity: usize,
}

impl Default for TpsHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl TpsHistory {
    pub fn new() -> Self {
        Self::with_capacity(TPS_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, time: DateTime<Utc>, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(TpsSample { time, value });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&TpsSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TpsSample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<TpsSample> {
        self.samples.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[test]
    fn keeps_only_the_most_recent_thirty() {
        let mut history = TpsHistory::new();
        for i in 0..35 {
            history.push(at(i), i as f64);
        }
        assert_eq!(history.len(), TPS_HISTORY_CAPACITY);
        let values: Vec<f64> = history.iter().map(|s| s.value).collect();
        assert_eq!(values.first(), Some(&5.0));
        assert_eq!(values.last(), Some(&34.0));
        // Still in arrival order.
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn latest_points_at_the_newest_sample() {
        let mut history = TpsHistory::new();
        assert!(history.latest().is_none());
        history.push(at(1), 10.0);
        history.push(at(2), 20.0);
        assert_eq!(history.latest().map(|s| s.value), Some(20.0));
    }
}
