//! Indicator variables: one boolean per candidate tracking event.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::costs::EventKind;
use crate::segmentation::SegmentKey;

/// Index of a variable inside its [`FactorGraph`](super::FactorGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub usize);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The event a variable stands for, with the segment(s) it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Indicator {
    /// The segment is selected.
    Segment { segment: SegmentKey },
    /// `from` continues as `to` in the next frame.
    Movement { from: SegmentKey, to: SegmentKey },
    /// `from` divides into the two segments of `to` (ordered by index).
    Division { from: SegmentKey, to: [SegmentKey; 2] },
    /// The segment has no predecessor.
    Appearance { segment: SegmentKey },
    /// The segment has no successor.
    Disappearance { segment: SegmentKey },
}

impl Indicator {
    pub fn kind(&self) -> EventKind {
        match self {
            Indicator::Segment { .. } => EventKind::Segment,
            Indicator::Movement { .. } => EventKind::Movement,
            Indicator::Division { .. } => EventKind::Division,
            Indicator::Appearance { .. } => EventKind::Appearance,
            Indicator::Disappearance { .. } => EventKind::Disappearance,
        }
    }

    /// Frame of the (source) segment.
    pub fn frame(&self) -> usize {
        match self {
            Indicator::Segment { segment }
            | Indicator::Appearance { segment }
            | Indicator::Disappearance { segment } => segment.frame,
            Indicator::Movement { from, .. } | Indicator::Division { from, .. } => from.frame,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Segment { segment } => write!(f, "segment {}", segment),
            Indicator::Movement { from, to } => write!(f, "movement {} -> {}", from, to),
            Indicator::Division { from, to } => {
                write!(f, "division {} -> ({}, {})", from, to[0], to[1])
            }
            Indicator::Appearance { segment } => write!(f, "appearance {}", segment),
            Indicator::Disappearance { segment } => write!(f, "disappearance {}", segment),
        }
    }
}

/// Value domain of a variable. The tracking model only ever creates booleans;
/// anything else is rejected by the ILP adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableDomain {
    Boolean,
    Integer { min: i64, max: i64 },
}

impl fmt::Display for VariableDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableDomain::Boolean => f.write_str("boolean"),
            VariableDomain::Integer { min, max } => write!(f, "integer [{}, {}]", min, max),
        }
    }
}

/// One decision variable of the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorVar {
    pub id: VarId,
    pub indicator: Indicator,
    pub domain: VariableDomain,
}

impl IndicatorVar {
    #[inline]
    pub fn kind(&self) -> EventKind {
        self.indicator.kind()
    }

    #[inline]
    pub fn is_boolean(&self) -> bool {
        self.domain == VariableDomain::Boolean
    }
}
