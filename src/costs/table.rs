//! Lookup-table cost provider.
//!
//! Costs are keyed by [`SegmentId`], so ids should be unique across the whole
//! store when a table is used. Events missing from the table fall back to the
//! per-kind default; by default transitions are forbidden and unary events cost 0.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::CostModel;
use crate::segmentation::{Segment, SegmentId};

fn forbidden() -> f64 {
    f64::INFINITY
}

/// Fallback costs for events without a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultCosts {
    #[serde(default)]
    pub segment: f64,
    #[serde(default)]
    pub appearance: f64,
    #[serde(default)]
    pub disappearance: f64,
    #[serde(default = "forbidden")]
    pub movement: f64,
    #[serde(default = "forbidden")]
    pub division: f64,
}

impl Default for DefaultCosts {
    fn default() -> Self {
        Self {
            segment: 0.0,
            appearance: 0.0,
            disappearance: 0.0,
            movement: forbidden(),
            division: forbidden(),
        }
    }
}

/// Scenario-file form of the table (JSON objects cannot be keyed by tuples).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCostsRepr {
    pub defaults: DefaultCosts,
    pub segments: Vec<UnaryEntry>,
    pub appearances: Vec<UnaryEntry>,
    pub disappearances: Vec<UnaryEntry>,
    pub movements: Vec<MovementEntry>,
    pub divisions: Vec<DivisionEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnaryEntry {
    pub segment: SegmentId,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovementEntry {
    pub from: SegmentId,
    pub to: SegmentId,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DivisionEntry {
    pub from: SegmentId,
    pub to: [SegmentId; 2],
    pub cost: f64,
}

/// Explicit per-event costs.
///
/// ```
/// use tracking_by_assignment_rs::costs::{CostModel, TableCosts};
/// use tracking_by_assignment_rs::segmentation::{Region, Segment};
///
/// let costs = TableCosts::new().with_segment(1, -2.0).with_movement(1, 2, 0.5);
/// let a = Segment::new(1, 0, Region::rectangle(0, 0, 2, 2));
/// let b = Segment::new(2, 1, Region::rectangle(0, 0, 2, 2));
/// assert_eq!(costs.segment_cost(0, &a), -2.0);
/// assert_eq!(costs.movement_cost(0, &a, &b), 0.5);
/// assert!(costs.movement_cost(0, &b, &a).is_infinite());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "TableCostsRepr", into = "TableCostsRepr")]
pub struct TableCosts {
    defaults: DefaultCosts,
    segment: HashMap<SegmentId, f64>,
    appearance: HashMap<SegmentId, f64>,
    disappearance: HashMap<SegmentId, f64>,
    movement: HashMap<(SegmentId, SegmentId), f64>,
    division: HashMap<(SegmentId, SegmentId, SegmentId), f64>,
}

/// Divisions are unordered in their destinations.
fn division_key(from: SegmentId, a: SegmentId, b: SegmentId) -> (SegmentId, SegmentId, SegmentId) {
    if a <= b {
        (from, a, b)
    } else {
        (from, b, a)
    }
}

impl TableCosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self, defaults: DefaultCosts) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &DefaultCosts {
        &self.defaults
    }

    pub fn with_segment(mut self, id: u64, cost: f64) -> Self {
        self.segment.insert(SegmentId(id), cost);
        self
    }

    pub fn with_appearance(mut self, id: u64, cost: f64) -> Self {
        self.appearance.insert(SegmentId(id), cost);
        self
    }

    pub fn with_disappearance(mut self, id: u64, cost: f64) -> Self {
        self.disappearance.insert(SegmentId(id), cost);
        self
    }

    pub fn with_movement(mut self, from: u64, to: u64, cost: f64) -> Self {
        self.movement.insert((SegmentId(from), SegmentId(to)), cost);
        self
    }

    pub fn with_division(mut self, from: u64, to: (u64, u64), cost: f64) -> Self {
        self.division.insert(
            division_key(SegmentId(from), SegmentId(to.0), SegmentId(to.1)),
            cost,
        );
        self
    }
}

impl CostModel for TableCosts {
    fn segment_cost(&self, _frame: usize, segment: &Segment) -> f64 {
        self.segment
            .get(&segment.id)
            .copied()
            .unwrap_or(self.defaults.segment)
    }

    fn appearance_cost(&self, _frame: usize, segment: &Segment) -> f64 {
        self.appearance
            .get(&segment.id)
            .copied()
            .unwrap_or(self.defaults.appearance)
    }

    fn disappearance_cost(&self, _frame: usize, segment: &Segment) -> f64 {
        self.disappearance
            .get(&segment.id)
            .copied()
            .unwrap_or(self.defaults.disappearance)
    }

    fn movement_cost(&self, _frame: usize, from: &Segment, to: &Segment) -> f64 {
        self.movement
            .get(&(from.id, to.id))
            .copied()
            .unwrap_or(self.defaults.movement)
    }

    fn division_cost(&self, _frame: usize, from: &Segment, to: (&Segment, &Segment)) -> f64 {
        self.division
            .get(&division_key(from.id, to.0.id, to.1.id))
            .copied()
            .unwrap_or(self.defaults.division)
    }

    fn name(&self) -> &'static str {
        "table"
    }
}

impl From<TableCostsRepr> for TableCosts {
    fn from(repr: TableCostsRepr) -> Self {
        let unary = |entries: Vec<UnaryEntry>| {
            entries
                .into_iter()
                .map(|e| (e.segment, e.cost))
                .collect::<HashMap<_, _>>()
        };
        Self {
            defaults: repr.defaults,
            segment: unary(repr.segments),
            appearance: unary(repr.appearances),
            disappearance: unary(repr.disappearances),
            movement: repr
                .movements
                .into_iter()
                .map(|e| ((e.from, e.to), e.cost))
                .collect(),
            division: repr
                .divisions
                .into_iter()
                .map(|e| (division_key(e.from, e.to[0], e.to[1]), e.cost))
                .collect(),
        }
    }
}

impl From<TableCosts> for TableCostsRepr {
    fn from(table: TableCosts) -> Self {
        let unary = |map: HashMap<SegmentId, f64>| {
            let mut entries: Vec<UnaryEntry> = map
                .into_iter()
                .map(|(segment, cost)| UnaryEntry { segment, cost })
                .collect();
            entries.sort_by_key(|e| e.segment);
            entries
        };
        let mut movements: Vec<MovementEntry> = table
            .movement
            .into_iter()
            .map(|((from, to), cost)| MovementEntry { from, to, cost })
            .collect();
        movements.sort_by_key(|e| (e.from, e.to));
        let mut divisions: Vec<DivisionEntry> = table
            .division
            .into_iter()
            .map(|((from, a, b), cost)| DivisionEntry {
                from,
                to: [a, b],
                cost,
            })
            .collect();
        divisions.sort_by_key(|e| (e.from, e.to));
        Self {
            defaults: table.defaults,
            segments: unary(table.segment),
            appearances: unary(table.appearance),
            disappearances: unary(table.disappearance),
            movements,
            divisions,
        }
    }
}
