//! Configuration for model assembly and solving.
//!
//! - [`TruncationThresholds`] - per event kind, costs at or above the threshold are forbidden
//! - [`SolverConfig`] - limits for the built-in branch-and-bound backend
//! - [`TrackingConfig`] - everything a [`Tracker`](crate::Tracker) run needs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::costs::EventKind;
use crate::errors::TrackingError;

/// Default truncation threshold for every transition kind.
pub const DEFAULT_TRUNCATION_THRESHOLD: f64 = 1.0e3;

/// Truncation thresholds for the event kinds that can be forbidden.
///
/// Segment selection is never truncated: every hypothesis gets a variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationThresholds {
    pub movement: f64,
    pub division: f64,
    pub appearance: f64,
    pub disappearance: f64,
}

impl TruncationThresholds {
    /// Same threshold for all kinds.
    pub fn uniform(threshold: f64) -> Self {
        Self {
            movement: threshold,
            division: threshold,
            appearance: threshold,
            disappearance: threshold,
        }
    }

    /// Threshold for `kind`, `None` for kinds that are never truncated.
    pub fn for_kind(&self, kind: EventKind) -> Option<f64> {
        match kind {
            EventKind::Segment => None,
            EventKind::Movement => Some(self.movement),
            EventKind::Division => Some(self.division),
            EventKind::Appearance => Some(self.appearance),
            EventKind::Disappearance => Some(self.disappearance),
        }
    }
}

impl Default for TruncationThresholds {
    fn default() -> Self {
        Self::uniform(DEFAULT_TRUNCATION_THRESHOLD)
    }
}

/// Limits and strategy of the built-in 0/1 solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock limit in milliseconds; hitting it is a solver failure.
    pub time_limit_ms: Option<u64>,
    /// Maximum number of search nodes; hitting it is a solver failure.
    pub node_limit: Option<u64>,
    /// Solve independent blocks of the program separately.
    pub decompose: bool,
}

impl SolverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: None,
            node_limit: None,
            decompose: true,
        }
    }
}

/// Complete configuration of a tracking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub thresholds: TruncationThresholds,
    pub solver: SolverConfig,
    /// Build conflict graphs and transition candidates on the rayon pool.
    /// Has no effect without the `rayon` feature.
    pub parallel: bool,
    /// Do not create divisions whose two daughters overlap (they can never be selected together).
    pub skip_conflicting_divisions: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            thresholds: TruncationThresholds::default(),
            solver: SolverConfig::default(),
            parallel: true,
            skip_conflicting_divisions: true,
        }
    }
}

impl TrackingConfig {
    pub fn builder() -> TrackingConfigBuilder {
        TrackingConfigBuilder::default()
    }

    /// Reject settings that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), TrackingError> {
        for kind in EventKind::ALL {
            if let Some(t) = self.thresholds.for_kind(kind) {
                if t.is_nan() {
                    return Err(TrackingError::Configuration(format!(
                        "{} truncation threshold is NaN",
                        kind
                    )));
                }
            }
        }
        if self.solver.node_limit == Some(0) {
            return Err(TrackingError::Configuration(
                "solver node limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Serialize to pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Builder for [`TrackingConfig`].
#[derive(Debug, Default)]
pub struct TrackingConfigBuilder {
    thresholds: Option<TruncationThresholds>,
    solver: Option<SolverConfig>,
    parallel: Option<bool>,
    skip_conflicting_divisions: Option<bool>,
}

impl TrackingConfigBuilder {
    pub fn thresholds(mut self, thresholds: TruncationThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Same truncation threshold for every kind.
    pub fn truncation_threshold(mut self, threshold: f64) -> Self {
        self.thresholds = Some(TruncationThresholds::uniform(threshold));
        self
    }

    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        let mut solver = self.solver.unwrap_or_default();
        solver.time_limit_ms = Some(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
        self.solver = Some(solver);
        self
    }

    pub fn node_limit(mut self, nodes: u64) -> Self {
        let mut solver = self.solver.unwrap_or_default();
        solver.node_limit = Some(nodes);
        self.solver = Some(solver);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn skip_conflicting_divisions(mut self, skip: bool) -> Self {
        self.skip_conflicting_divisions = Some(skip);
        self
    }

    pub fn build(self) -> TrackingConfig {
        let defaults = TrackingConfig::default();
        TrackingConfig {
            thresholds: self.thresholds.unwrap_or(defaults.thresholds),
            solver: self.solver.unwrap_or(defaults.solver),
            parallel: self.parallel.unwrap_or(defaults.parallel),
            skip_conflicting_divisions: self
                .skip_conflicting_divisions
                .unwrap_or(defaults.skip_conflicting_divisions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = TrackingConfig::builder()
            .truncation_threshold(50.0)
            .node_limit(1000)
            .time_limit(Duration::from_secs(2))
            .parallel(false)
            .build();
        assert_eq!(config.thresholds.division, 50.0);
        assert_eq!(config.solver.node_limit, Some(1000));
        assert_eq!(config.solver.time_limit(), Some(Duration::from_secs(2)));
        assert!(config.solver.decompose);
        assert!(!config.parallel);
        assert!(config.skip_conflicting_divisions);
    }

    #[test]
    fn test_huge_time_limit_saturates() {
        let config = TrackingConfig::builder().time_limit(Duration::MAX).build();
        assert_eq!(config.solver.time_limit_ms, Some(u64::MAX));
    }

    #[test]
    fn test_validate() {
        assert!(TrackingConfig::default().validate().is_ok());

        let mut config = TrackingConfig::default();
        config.thresholds.appearance = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(TrackingError::Configuration(msg)) if msg.contains("appearance")
        ));

        let config = TrackingConfig::builder().node_limit(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_segment_kind_is_never_truncated() {
        let t = TruncationThresholds::default();
        assert_eq!(t.for_kind(EventKind::Segment), None);
        assert_eq!(t.for_kind(EventKind::Movement), Some(DEFAULT_TRUNCATION_THRESHOLD));
    }

    #[test]
    fn test_json_roundtrip_with_partial_input() {
        let config: TrackingConfig =
            serde_json::from_str(r#"{ "thresholds": { "movement": 12.0 }, "parallel": false }"#)
                .unwrap();
        assert_eq!(config.thresholds.movement, 12.0);
        assert_eq!(config.thresholds.division, DEFAULT_TRUNCATION_THRESHOLD);
        assert!(!config.parallel);

        let back: TrackingConfig = serde_json::from_str(&config.to_json()).unwrap();
        assert_eq!(back, config);
    }
}
