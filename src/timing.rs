//! Wall-clock timing of the pipeline stages.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Time spent in one stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Per-stage timings of one tracking run, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn push(&mut self, label: impl Into<String>, elapsed: Duration) {
        self.stages.push(StageTiming::new(label, elapsed_ms(elapsed)));
    }

    /// Run `f`, record its duration under `label` and return its result.
    pub fn time<T>(&mut self, label: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.push(label, start.elapsed());
        out
    }

    pub fn stage(&self, label: &str) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.label == label)
    }

    /// Set the total from the stages recorded so far.
    pub fn finish(&mut self) {
        self.total_ms = self.stages.iter().map(|s| s.elapsed_ms).sum();
    }
}

#[inline]
pub fn elapsed_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_records_stage() {
        let mut t = TimingBreakdown::default();
        let v = t.time("solve", || 41 + 1);
        assert_eq!(v, 42);
        t.push("decode", Duration::from_millis(2));
        t.finish();
        assert_eq!(t.stages.len(), 2);
        assert_eq!(t.stage("decode").unwrap().elapsed_ms, 2.0);
        assert!(t.total_ms >= 2.0);
        assert!(t.stage("missing").is_none());
    }
}
