use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
struct CounterSample {
    counter: f64,
    at: DateTime<Utc>,
}

/// Derives a per-second rate from successive samples of a monotonic
/// counter. A counter regression (service restart) is reported as zero
/// throughput for that tick, never as a negative rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateCalculator {
    previous: Option<CounterSample>,
}

impl RateCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample and returns the rate since the previous one.
    /// Zero on the first sample and whenever elapsed time is non-positive
    /// (clock anomalies, e.g. across a system sleep).
    pub fn observe(&mut self, counter: f64, at: DateTime<Utc>) -> f64 {
        let rate = match self.previous {
            None => 0.0,
            Some(prev) => {
                let elapsed = (at - prev.at).num_milliseconds() as f64 / 1000.0;
                if elapsed <= 0.0 {
                    0.0
                } else {
                    ((counter - prev.counter) / elapsed).max(0.0)
                }
            }
        };
        self.previous = Some(CounterSample { counter, at });
        rate
    }

    /// Forgets the prior sample; the next observation starts fresh.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
