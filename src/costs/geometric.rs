//! Cost provider derived from region geometry.
//!
//! Movement is priced by squared centroid displacement plus a log size-change
//! term; division compares the parent with the two daughters' combined size
//! and mean displacement. Displacements beyond `max_displacement` are forbidden.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::CostModel;
use crate::segmentation::Segment;

/// Geometry-based costs. All weights are non-negative by convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometricCosts {
    /// Cost of selecting a segment (negative to reward explanations).
    pub selection_cost: f64,
    /// Segments smaller than this are penalized by `size_penalty` per missing pixel.
    pub min_area: usize,
    pub size_penalty: f64,
    /// Weight of squared centroid displacement.
    pub displacement_weight: f64,
    /// Weight of `|ln(area_after / area_before)|`.
    pub size_change_weight: f64,
    /// Transitions moving a centroid further than this are forbidden.
    pub max_displacement: f64,
    /// Fixed extra cost of every division.
    pub division_offset: f64,
    pub appearance_cost: f64,
    pub disappearance_cost: f64,
}

impl Default for GeometricCosts {
    fn default() -> Self {
        Self {
            selection_cost: -10.0,
            min_area: 0,
            size_penalty: 0.0,
            displacement_weight: 0.1,
            size_change_weight: 1.0,
            max_displacement: 20.0,
            division_offset: 4.0,
            appearance_cost: 8.0,
            disappearance_cost: 8.0,
        }
    }
}

impl GeometricCosts {
    fn centroid(segment: &Segment) -> Option<Vector3<f64>> {
        segment.region.centroid()
    }

    fn size_change(&self, before: usize, after: usize) -> f64 {
        if before == 0 || after == 0 {
            return f64::INFINITY;
        }
        self.size_change_weight * (after as f64 / before as f64).ln().abs()
    }
}

impl CostModel for GeometricCosts {
    fn segment_cost(&self, _frame: usize, segment: &Segment) -> f64 {
        let missing = self.min_area.saturating_sub(segment.region.len());
        self.selection_cost + self.size_penalty * missing as f64
    }

    fn appearance_cost(&self, _frame: usize, _segment: &Segment) -> f64 {
        self.appearance_cost
    }

    fn disappearance_cost(&self, _frame: usize, _segment: &Segment) -> f64 {
        self.disappearance_cost
    }

    fn movement_cost(&self, _frame: usize, from: &Segment, to: &Segment) -> f64 {
        let (Some(a), Some(b)) = (Self::centroid(from), Self::centroid(to)) else {
            return f64::INFINITY;
        };
        let displacement = (b - a).norm();
        if displacement > self.max_displacement {
            return f64::INFINITY;
        }
        self.displacement_weight * displacement * displacement
            + self.size_change(from.region.len(), to.region.len())
    }

    fn division_cost(&self, _frame: usize, from: &Segment, to: (&Segment, &Segment)) -> f64 {
        let (Some(p), Some(d1), Some(d2)) = (
            Self::centroid(from),
            Self::centroid(to.0),
            Self::centroid(to.1),
        ) else {
            return f64::INFINITY;
        };
        let (m1, m2) = ((d1 - p).norm(), (d2 - p).norm());
        if m1.max(m2) > self.max_displacement {
            return f64::INFINITY;
        }
        let combined = to.0.region.len() + to.1.region.len();
        self.division_offset
            + self.displacement_weight * 0.5 * (m1 * m1 + m2 * m2)
            + self.size_change(from.region.len(), combined)
    }

    fn name(&self) -> &'static str {
        "geometric"
    }
}
