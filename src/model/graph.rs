//! The factor graph of one tracking run and boolean assignments over it.

use serde::Serialize;

use super::factors::{ConstraintViolation, Factor};
use super::variables::{Indicator, IndicatorVar, VarId, VariableDomain};
use crate::costs::EventKind;
use crate::errors::ModelError;
use crate::segmentation::{SegmentId, SegmentKey};

/// Number of indicators per event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub segments: usize,
    pub movements: usize,
    pub divisions: usize,
    pub appearances: usize,
    pub disappearances: usize,
}

impl EventCounts {
    pub fn add(&mut self, kind: EventKind) {
        match kind {
            EventKind::Segment => self.segments += 1,
            EventKind::Movement => self.movements += 1,
            EventKind::Division => self.divisions += 1,
            EventKind::Appearance => self.appearances += 1,
            EventKind::Disappearance => self.disappearances += 1,
        }
    }

    pub fn get(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Segment => self.segments,
            EventKind::Movement => self.movements,
            EventKind::Division => self.divisions,
            EventKind::Appearance => self.appearances,
            EventKind::Disappearance => self.disappearances,
        }
    }

    pub fn total(&self) -> usize {
        self.segments + self.movements + self.divisions + self.appearances + self.disappearances
    }
}

/// Variables attached to one segment: its own activation plus every event it takes part in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentNode {
    pub key: SegmentKey,
    pub id: SegmentId,
    pub active: VarId,
    pub appearance: Option<VarId>,
    pub disappearance: Option<VarId>,
    pub moves_out: Vec<VarId>,
    pub moves_in: Vec<VarId>,
    pub divisions_out: Vec<VarId>,
    pub divisions_in: Vec<VarId>,
}

impl SegmentNode {
    pub(crate) fn new(key: SegmentKey, id: SegmentId, active: VarId) -> Self {
        Self {
            key,
            id,
            active,
            appearance: None,
            disappearance: None,
            moves_out: Vec::new(),
            moves_in: Vec::new(),
            divisions_out: Vec::new(),
            divisions_in: Vec::new(),
        }
    }

    /// Outgoing transitions, movements first.
    pub fn outgoing(&self) -> impl Iterator<Item = VarId> + '_ {
        self.moves_out.iter().chain(&self.divisions_out).copied()
    }

    /// Incoming transitions, movements first.
    pub fn incoming(&self) -> impl Iterator<Item = VarId> + '_ {
        self.moves_in.iter().chain(&self.divisions_in).copied()
    }
}

/// Size summary of a factor graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ModelStats {
    pub frames: usize,
    pub variables: EventCounts,
    pub cost_factors: usize,
    pub conflict_constraints: usize,
    pub flow_constraints: usize,
}

/// All indicator variables and factors of one run, plus a per-segment index.
///
/// Built by [`TrackingModelBuilder`](super::TrackingModelBuilder) and never changed
/// afterwards. The same graph may be handed to several solvers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorGraph {
    variables: Vec<IndicatorVar>,
    factors: Vec<Factor>,
    nodes: Vec<Vec<SegmentNode>>,
}

impl FactorGraph {
    /// Empty graph spanning `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            variables: Vec::new(),
            factors: Vec::new(),
            nodes: vec![Vec::new(); num_frames],
        }
    }

    /// Add a boolean variable.
    pub fn add_variable(&mut self, indicator: Indicator) -> VarId {
        self.add_variable_with_domain(indicator, VariableDomain::Boolean)
    }

    /// Add a variable with an explicit domain.
    ///
    /// Non-boolean domains exist so that malformed graphs can be represented;
    /// the ILP adapter rejects them.
    pub fn add_variable_with_domain(
        &mut self,
        indicator: Indicator,
        domain: VariableDomain,
    ) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(IndicatorVar {
            id,
            indicator,
            domain,
        });
        id
    }

    /// Add a factor and return its index.
    pub fn add_factor(&mut self, factor: Factor) -> usize {
        self.factors.push(factor);
        self.factors.len() - 1
    }

    pub(crate) fn push_node(&mut self, node: SegmentNode) {
        let frame = node.key.frame;
        if frame >= self.nodes.len() {
            self.nodes.resize_with(frame + 1, Vec::new);
        }
        self.nodes[frame].push(node);
    }

    pub(crate) fn node_mut(&mut self, key: SegmentKey) -> Option<&mut SegmentNode> {
        self.nodes.get_mut(key.frame)?.get_mut(key.index)
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub fn variables(&self) -> &[IndicatorVar] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> Option<&IndicatorVar> {
        self.variables.get(id.0)
    }

    #[inline]
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Segment nodes of one frame, in segment order (empty past the end).
    pub fn segment_nodes(&self, frame: usize) -> &[SegmentNode] {
        self.nodes.get(frame).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node(&self, key: SegmentKey) -> Option<&SegmentNode> {
        self.nodes.get(key.frame)?.get(key.index)
    }

    /// Every constraint factor `assignment` violates, in factor order.
    pub fn violations(&self, assignment: &Assignment) -> Vec<ConstraintViolation> {
        self.factors
            .iter()
            .enumerate()
            .filter_map(|(index, factor)| {
                let (lhs, relation, rhs) = factor.activity(|v| assignment.value(v))?;
                (!relation.holds(lhs, rhs)).then_some(ConstraintViolation {
                    factor: index,
                    lhs,
                    relation,
                    rhs,
                })
            })
            .collect()
    }

    /// First violated constraint, if any.
    pub fn check_assignment(&self, assignment: &Assignment) -> Result<(), ConstraintViolation> {
        match self.violations(assignment).into_iter().next() {
            Some(v) => Err(v),
            None => Ok(()),
        }
    }

    /// Total cost of `assignment`, including the false-state costs.
    pub fn objective(&self, assignment: &Assignment) -> f64 {
        self.factors
            .iter()
            .map(|factor| match *factor {
                Factor::UnaryCost {
                    var,
                    cost_true,
                    cost_false,
                } => {
                    if assignment.value(var) {
                        cost_true
                    } else {
                        cost_false
                    }
                }
                _ => 0.0,
            })
            .sum()
    }

    /// True indicators per event kind.
    pub fn count_true(&self, assignment: &Assignment) -> EventCounts {
        let mut counts = EventCounts::default();
        for var in &self.variables {
            if assignment.value(var.id) {
                counts.add(var.kind());
            }
        }
        counts
    }

    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats {
            frames: self.num_frames(),
            ..ModelStats::default()
        };
        for var in &self.variables {
            stats.variables.add(var.kind());
        }
        for factor in &self.factors {
            match factor {
                Factor::UnaryCost { .. } => stats.cost_factors += 1,
                Factor::ConflictConstraint { .. } => stats.conflict_constraints += 1,
                Factor::WeightedSumConstraint { .. } => stats.flow_constraints += 1,
            }
        }
        stats
    }
}

/// Total boolean valuation of a graph's variables, produced by a solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    values: Vec<bool>,
}

impl Assignment {
    /// Wrap one value per variable of `graph`.
    pub fn new(graph: &FactorGraph, values: Vec<bool>) -> Result<Self, ModelError> {
        if values.len() != graph.num_variables() {
            return Err(ModelError::AssignmentSize {
                expected: graph.num_variables(),
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    /// All-false assignment.
    pub fn all_false(graph: &FactorGraph) -> Self {
        Self {
            values: vec![false; graph.num_variables()],
        }
    }

    /// Value of `var`; ids outside the graph read as false.
    #[inline]
    pub fn value(&self, var: VarId) -> bool {
        self.values.get(var.0).copied().unwrap_or(false)
    }

    #[inline]
    pub fn values(&self) -> &[bool] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Variables set to true, ascending.
    pub fn true_vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(|(i, _)| VarId(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Relation;

    fn key(frame: usize, index: usize) -> SegmentKey {
        SegmentKey::new(frame, index)
    }

    fn two_var_graph() -> FactorGraph {
        let mut g = FactorGraph::new(1);
        let a = g.add_variable(Indicator::Segment { segment: key(0, 0) });
        let b = g.add_variable(Indicator::Segment { segment: key(0, 1) });
        g.add_factor(Factor::cost(a, -1.0));
        g.add_factor(Factor::UnaryCost {
            var: b,
            cost_true: -2.0,
            cost_false: 0.5,
        });
        g.add_factor(Factor::ConflictConstraint { vars: vec![a, b] });
        g
    }

    #[test]
    fn test_objective_includes_false_costs() {
        let g = two_var_graph();
        let none = Assignment::all_false(&g);
        assert_eq!(g.objective(&none), 0.5);
        let only_b = Assignment::new(&g, vec![false, true]).unwrap();
        assert_eq!(g.objective(&only_b), -2.0);
    }

    #[test]
    fn test_violations_reported() {
        let g = two_var_graph();
        let both = Assignment::new(&g, vec![true, true]).unwrap();
        let v = g.check_assignment(&both).unwrap_err();
        assert_eq!(v.factor, 2);
        assert_eq!(v.relation, Relation::Le);
        assert_eq!(v.lhs, 2.0);
        assert!(g.check_assignment(&Assignment::all_false(&g)).is_ok());
    }

    #[test]
    fn test_assignment_size_checked() {
        let g = two_var_graph();
        assert_eq!(
            Assignment::new(&g, vec![true]),
            Err(ModelError::AssignmentSize {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_stats_and_counts() {
        let g = two_var_graph();
        let stats = g.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.variables.segments, 2);
        assert_eq!(stats.cost_factors, 2);
        assert_eq!(stats.conflict_constraints, 1);
        assert_eq!(stats.flow_constraints, 0);

        let a = Assignment::new(&g, vec![true, false]).unwrap();
        assert_eq!(g.count_true(&a).segments, 1);
        assert_eq!(a.true_vars().collect::<Vec<_>>(), vec![VarId(0)]);
    }
}
