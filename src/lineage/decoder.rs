//! Assignment decoding: active segments and lineage trees.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::model::{Assignment, FactorGraph, Indicator};
use crate::segmentation::{SegmentId, SegmentKey};

/// Identifier of a lineage, issued in discovery order starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LineageId(pub usize);

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Movement,
    Division,
}

/// Parent to child link inside a lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineageEdge {
    pub parent: SegmentKey,
    pub child: SegmentKey,
    pub kind: EdgeKind,
}

/// One tracked object and all of its descendants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lineage {
    pub id: LineageId,
    pub root: SegmentKey,
    /// Members in visit order (breadth-first from the root).
    pub segments: Vec<SegmentKey>,
    pub edges: Vec<LineageEdge>,
}

impl Lineage {
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first_frame(&self) -> usize {
        self.root.frame
    }

    pub fn last_frame(&self) -> usize {
        self.segments
            .iter()
            .map(|k| k.frame)
            .max()
            .unwrap_or(self.root.frame)
    }

    /// Number of division events inside the lineage.
    pub fn num_divisions(&self) -> usize {
        self.edges.iter().filter(|e| e.kind == EdgeKind::Division).count() / 2
    }

    /// Children of `parent` inside this lineage.
    pub fn children(&self, parent: SegmentKey) -> impl Iterator<Item = SegmentKey> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.parent == parent)
            .map(|e| e.child)
    }
}

/// Export row: one labelled segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineageLabel {
    pub frame: usize,
    pub index: usize,
    pub segment: SegmentId,
    pub lineage: LineageId,
}

/// Decoded tracking: per-frame active segments and the (frame, segment) to lineage mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageMap {
    #[serde(serialize_with = "serialize_labels")]
    labels: BTreeMap<SegmentKey, LineageLabel>,
    active: Vec<Vec<SegmentKey>>,
    lineages: Vec<Lineage>,
}

fn serialize_labels<S: Serializer>(
    labels: &BTreeMap<SegmentKey, LineageLabel>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(labels.values())
}

impl LineageMap {
    /// Lineage of a segment, `None` if it is not part of any lineage.
    pub fn lineage_of(&self, key: SegmentKey) -> Option<LineageId> {
        self.labels.get(&key).map(|l| l.lineage)
    }

    pub fn lineage(&self, id: LineageId) -> Option<&Lineage> {
        self.lineages.get(id.0)
    }

    #[inline]
    pub fn lineages(&self) -> &[Lineage] {
        &self.lineages
    }

    /// Number of lineages.
    #[inline]
    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    /// Labelled segments ordered by (frame, index).
    pub fn labels(&self) -> impl Iterator<Item = &LineageLabel> + '_ {
        self.labels.values()
    }

    /// Active segments of `frame`, ascending (empty past the end).
    pub fn active_segments(&self, frame: usize) -> &[SegmentKey] {
        self.active.get(frame).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_frames(&self) -> usize {
        self.active.len()
    }

    /// True if both maps label the same segments and group them identically,
    /// whatever the identifiers.
    pub fn is_relabeling_of(&self, other: &LineageMap) -> bool {
        if self.labels.len() != other.labels.len() {
            return false;
        }
        let mut forward: HashMap<LineageId, LineageId> = HashMap::new();
        let mut backward: HashMap<LineageId, LineageId> = HashMap::new();
        for (key, label) in &self.labels {
            let Some(theirs) = other.labels.get(key) else {
                return false;
            };
            let a = *forward.entry(label.lineage).or_insert(theirs.lineage);
            let b = *backward.entry(theirs.lineage).or_insert(label.lineage);
            if a != theirs.lineage || b != label.lineage {
                return false;
            }
        }
        true
    }
}

/// Decode `assignment` into lineages.
///
/// Roots are the active segments of frame 0 in segment order, followed by active
/// segments of later frames whose appearance indicator is true, in frame order.
/// From each root the decoder walks true movement (one child) and division (two
/// children) indicators breadth-first. Every segment is painted at most once: a
/// segment reached again, from the same or another root, keeps its first label.
pub fn decode_lineages(graph: &FactorGraph, assignment: &Assignment) -> LineageMap {
    let num_frames = graph.num_frames();
    let active: Vec<Vec<SegmentKey>> = (0..num_frames)
        .map(|frame| {
            graph
                .segment_nodes(frame)
                .iter()
                .filter(|n| assignment.value(n.active))
                .map(|n| n.key)
                .collect()
        })
        .collect();

    let roots = active.iter().flatten().copied().filter(|key| {
        key.frame == 0
            || graph
                .node(*key)
                .and_then(|n| n.appearance)
                .is_some_and(|v| assignment.value(v))
    });

    let mut labels: BTreeMap<SegmentKey, LineageLabel> = BTreeMap::new();
    let mut lineages: Vec<Lineage> = Vec::new();
    let mut queue: VecDeque<SegmentKey> = VecDeque::new();

    for root in roots {
        if labels.contains_key(&root) {
            log::trace!("root {} already painted, skipping", root);
            continue;
        }
        let id = LineageId(lineages.len());
        let mut lineage = Lineage {
            id,
            root,
            segments: Vec::new(),
            edges: Vec::new(),
        };

        paint(graph, &mut labels, &mut lineage, root);
        queue.push_back(root);
        while let Some(key) = queue.pop_front() {
            let Some(node) = graph.node(key) else {
                continue;
            };
            for var in node.outgoing().filter(|&v| assignment.value(v)) {
                let (children, kind) = match graph.variable(var).map(|v| v.indicator) {
                    Some(Indicator::Movement { to, .. }) => ([Some(to), None], EdgeKind::Movement),
                    Some(Indicator::Division { to, .. }) => {
                        ([Some(to[0]), Some(to[1])], EdgeKind::Division)
                    }
                    _ => continue,
                };
                for child in children.into_iter().flatten() {
                    if labels.contains_key(&child) {
                        continue;
                    }
                    paint(graph, &mut labels, &mut lineage, child);
                    lineage.edges.push(LineageEdge {
                        parent: key,
                        child,
                        kind,
                    });
                    queue.push_back(child);
                }
            }
        }
        lineages.push(lineage);
    }

    LineageMap {
        labels,
        active,
        lineages,
    }
}

fn paint(
    graph: &FactorGraph,
    labels: &mut BTreeMap<SegmentKey, LineageLabel>,
    lineage: &mut Lineage,
    key: SegmentKey,
) {
    let segment = graph
        .node(key)
        .map(|n| n.id)
        .unwrap_or(SegmentId(u64::MAX));
    labels.insert(
        key,
        LineageLabel {
            frame: key.frame,
            index: key.index,
            segment,
            lineage: lineage.id,
        },
    );
    lineage.segments.push(key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingConfig;
    use crate::costs::TableCosts;
    use crate::model::TrackingModelBuilder;
    use crate::segmentation::{HypothesisStore, Region, Segment};

    fn seg(id: u64, frame: usize, x: i64) -> Segment {
        Segment::new(id, frame, Region::rectangle(x, 0, 2, 2))
    }

    /// Frame 0: A. Frame 1: B, C. Frame 2: D.
    /// Candidates: A->B, A->(B,C), C->D, B->D.
    fn graph() -> FactorGraph {
        let store = HypothesisStore::from_segments(vec![
            vec![seg(1, 0, 0)],
            vec![seg(2, 1, 0), seg(3, 1, 10)],
            vec![seg(4, 2, 10)],
        ])
        .unwrap();
        let costs = TableCosts::new()
            .with_movement(1, 2, 1.0)
            .with_division(1, (2, 3), 1.0)
            .with_movement(3, 4, 1.0)
            .with_movement(2, 4, 1.0);
        let config = TrackingConfig::builder().parallel(false).build();
        TrackingModelBuilder::new(&config, &costs)
            .build_from_store(&store)
            .unwrap()
            .1
    }

    fn set(graph: &FactorGraph, wanted: impl Fn(&Indicator) -> bool) -> Assignment {
        let values = graph.variables().iter().map(|v| wanted(&v.indicator)).collect();
        Assignment::new(graph, values).unwrap()
    }

    fn k(frame: usize, index: usize) -> SegmentKey {
        SegmentKey::new(frame, index)
    }

    #[test]
    fn test_division_lineage() {
        let g = graph();
        let a = set(&g, |i| match *i {
            Indicator::Segment { .. } => true,
            Indicator::Division { .. } => true,
            Indicator::Movement { from, .. } => from == k(1, 1),
            Indicator::Disappearance { segment } => segment == k(1, 0),
            Indicator::Appearance { .. } => false,
        });
        assert!(g.check_assignment(&a).is_ok());

        let map = decode_lineages(&g, &a);
        assert_eq!(map.len(), 1);
        let lineage = &map.lineages()[0];
        assert_eq!(lineage.root, k(0, 0));
        assert_eq!(lineage.segments, vec![k(0, 0), k(1, 0), k(1, 1), k(2, 0)]);
        assert_eq!(lineage.num_divisions(), 1);
        assert_eq!(lineage.children(k(0, 0)).collect::<Vec<_>>(), vec![k(1, 0), k(1, 1)]);
        assert_eq!(lineage.last_frame(), 2);
        assert_eq!(map.lineage_of(k(2, 0)), Some(LineageId(0)));
        assert_eq!(map.active_segments(1), &[k(1, 0), k(1, 1)]);
    }

    #[test]
    fn test_appearance_starts_new_lineage() {
        let g = graph();
        // A disappears, C appears and moves to D, B stays off.
        let a = set(&g, |i| match *i {
            Indicator::Segment { segment } => segment != k(1, 0),
            Indicator::Disappearance { segment } => segment == k(0, 0),
            Indicator::Appearance { segment } => segment == k(1, 1),
            Indicator::Movement { from, .. } => from == k(1, 1),
            Indicator::Division { .. } => false,
        });
        assert!(g.check_assignment(&a).is_ok());

        let map = decode_lineages(&g, &a);
        assert_eq!(map.len(), 2);
        assert_eq!(map.lineage_of(k(0, 0)), Some(LineageId(0)));
        assert_eq!(map.lineage_of(k(1, 1)), Some(LineageId(1)));
        assert_eq!(map.lineage_of(k(2, 0)), Some(LineageId(1)));
        assert_eq!(map.lineage_of(k(1, 0)), None);
    }

    #[test]
    fn test_second_visit_keeps_first_label() {
        let g = graph();
        // Inconsistent on purpose: D is reached from both B and C.
        let a = set(&g, |i| match *i {
            Indicator::Segment { .. } => true,
            Indicator::Division { .. } => true,
            Indicator::Movement { to, .. } => to == k(2, 0),
            _ => false,
        });
        assert!(g.check_assignment(&a).is_err());

        let map = decode_lineages(&g, &a);
        assert_eq!(map.len(), 1);
        let lineage = &map.lineages()[0];
        assert_eq!(lineage.segments.iter().filter(|&&s| s == k(2, 0)).count(), 1);
        // B is visited before C, so D hangs off B.
        assert!(lineage.children(k(1, 0)).any(|c| c == k(2, 0)));
        assert_eq!(lineage.children(k(1, 1)).count(), 0);
    }

    #[test]
    fn test_decoding_is_idempotent() {
        let g = graph();
        let a = set(&g, |i| !matches!(i, Indicator::Appearance { .. }));
        let first = decode_lineages(&g, &a);
        let second = decode_lineages(&g, &a);
        assert_eq!(first, second);
        assert!(first.is_relabeling_of(&second));
    }

    #[test]
    fn test_relabeling_detects_different_grouping() {
        let g = graph();
        let one = set(&g, |i| match *i {
            Indicator::Segment { segment } => segment.frame == 0,
            _ => false,
        });
        let two = set(&g, |i| match *i {
            Indicator::Segment { segment } => segment == k(1, 1),
            Indicator::Appearance { segment } => segment == k(1, 1),
            _ => false,
        });
        let a = decode_lineages(&g, &one);
        let b = decode_lineages(&g, &two);
        assert!(!a.is_relabeling_of(&b));
        assert!(a.is_relabeling_of(&a));
    }

    #[test]
    fn test_labels_serialize_as_list() {
        let g = graph();
        let a = set(&g, |i| match *i {
            Indicator::Segment { segment } => segment.frame == 0,
            _ => false,
        });
        let json = serde_json::to_value(decode_lineages(&g, &a)).unwrap();
        assert_eq!(json["labels"][0]["segment"], 1);
        assert_eq!(json["labels"][0]["lineage"], 0);
    }
}
