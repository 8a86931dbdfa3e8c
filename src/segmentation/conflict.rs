//! Conflict graph construction.
//!
//! Two hypotheses of the same frame conflict when their regions share a pixel;
//! at most one of them may be selected. The builder computes the symmetric
//! overlap relation and reports its maximal cliques, each of which later
//! becomes one `sum <= 1` constraint. Maximal cliques cover every conflicting
//! pair, and one clique constraint is tighter than the pairwise constraints
//! it replaces.
//!
//! Cliques are enumerated with Bron–Kerbosch using Tomita pivoting. The
//! reported set is deterministic: members are sorted, cliques are sorted
//! lexicographically.

use serde::Serialize;
use smallvec::SmallVec;

use super::store::{HypothesisStore, Segment};
use crate::common::map_indexed;
use crate::errors::TrackingError;

/// Set of mutually exclusive hypotheses within one frame (indices into the frame).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConflictClique {
    members: SmallVec<[usize; 4]>,
}

impl ConflictClique {
    /// Segment indices, sorted ascending.
    #[inline]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// Overlap relation of one frame plus its maximal-clique cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictGraph {
    frame: usize,
    adjacency: Vec<Vec<usize>>,
    cliques: Vec<ConflictClique>,
}

impl ConflictGraph {
    #[inline]
    pub fn frame(&self) -> usize {
        self.frame
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of conflicting (unordered) pairs.
    pub fn num_conflicts(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Maximal cliques, each of size at least two.
    #[inline]
    pub fn cliques(&self) -> &[ConflictClique] {
        &self.cliques
    }

    /// Segments overlapping `index`, sorted ascending.
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.adjacency.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if the two segments overlap.
    pub fn conflicts(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Cliques containing `index`.
    pub fn cliques_of(&self, index: usize) -> impl Iterator<Item = &ConflictClique> + '_ {
        self.cliques.iter().filter(move |c| c.contains(index))
    }
}

/// Build the conflict graph of one frame.
///
/// An empty segment list yields an empty graph. A segment with an empty region
/// fails the whole frame: it could not take part in overlap tests, and silently
/// dropping it would lose exclusivity edges.
pub fn build_conflict_graph(
    frame: usize,
    segments: &[Segment],
) -> Result<ConflictGraph, TrackingError> {
    if let Some(bad) = segments.iter().find(|s| s.region.is_empty()) {
        return Err(TrackingError::InvalidGeometry {
            frame,
            segment: bad.id.0,
            reason: "region has no pixels".to_string(),
        });
    }

    let n = segments.len();
    // Outer index ascends and every push is a larger index, so lists stay sorted.
    let mut adjacency = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if segments[i].region.intersects(&segments[j].region) {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }

    let cliques = maximal_cliques(&adjacency);
    log::trace!(
        "frame {}: {} segments, {} cliques",
        frame,
        n,
        cliques.len()
    );

    Ok(ConflictGraph {
        frame,
        adjacency,
        cliques,
    })
}

/// Build the conflict graphs of every frame in the store, in frame order.
///
/// Frames are independent, so with `parallel` (and the `rayon` feature) they are
/// built on the rayon pool. The first failing frame aborts the whole run.
pub fn build_conflict_graphs(
    store: &HypothesisStore,
    parallel: bool,
) -> Result<Vec<ConflictGraph>, TrackingError> {
    map_indexed(store.num_frames(), parallel, |frame| {
        build_conflict_graph(frame, store.segments(frame))
    })
}

/// Enumerate the maximal cliques (size >= 2) of a graph given as sorted adjacency lists.
pub(crate) fn maximal_cliques(adjacency: &[Vec<usize>]) -> Vec<ConflictClique> {
    let mut cliques = Vec::new();
    for v in 0..adjacency.len() {
        if adjacency[v].is_empty() {
            continue;
        }
        // Later neighbours are candidates, earlier ones were already expanded.
        let (earlier, later): (Vec<usize>, Vec<usize>) =
            adjacency[v].iter().copied().partition(|&u| u < v);
        let mut r = vec![v];
        expand(adjacency, &mut r, later, earlier, &mut cliques);
    }
    cliques.sort();
    cliques
}

fn expand(
    adjacency: &[Vec<usize>],
    r: &mut Vec<usize>,
    mut p: Vec<usize>,
    mut x: Vec<usize>,
    out: &mut Vec<ConflictClique>,
) {
    if p.is_empty() {
        if x.is_empty() {
            let mut members: SmallVec<[usize; 4]> = r.iter().copied().collect();
            members.sort_unstable();
            out.push(ConflictClique { members });
        }
        return;
    }

    let pivot = p
        .iter()
        .chain(x.iter())
        .copied()
        .max_by_key(|&u| count_common(&p, &adjacency[u]))
        .unwrap_or(p[0]);
    let candidates: Vec<usize> = p
        .iter()
        .copied()
        .filter(|v| adjacency[pivot].binary_search(v).is_err())
        .collect();

    for v in candidates {
        let next_p = intersect(&p, &adjacency[v]);
        let next_x = intersect(&x, &adjacency[v]);
        r.push(v);
        expand(adjacency, r, next_p, next_x, out);
        r.pop();
        if let Ok(pos) = p.binary_search(&v) {
            p.remove(pos);
        }
        if let Err(pos) = x.binary_search(&v) {
            x.insert(pos, v);
        }
    }
}

fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn count_common(a: &[usize], b: &[usize]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                n += 1;
                i += 1;
                j += 1;
            }
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::Region;

    fn rect(id: u64, x: i64, y: i64, w: i64, h: i64) -> Segment {
        Segment::new(id, 0, Region::rectangle(x, y, w, h))
    }

    fn members(graph: &ConflictGraph) -> Vec<Vec<usize>> {
        graph.cliques().iter().map(|c| c.members().to_vec()).collect()
    }

    #[test]
    fn test_empty_frame() {
        let graph = build_conflict_graph(3, &[]).unwrap();
        assert_eq!(graph.frame(), 3);
        assert_eq!(graph.num_segments(), 0);
        assert!(graph.cliques().is_empty());
    }

    #[test]
    fn test_isolated_segments_have_no_clique() {
        let segments = vec![rect(1, 0, 0, 2, 2), rect(2, 10, 10, 2, 2)];
        let graph = build_conflict_graph(0, &segments).unwrap();
        assert!(graph.cliques().is_empty());
        assert_eq!(graph.num_conflicts(), 0);
    }

    #[test]
    fn test_nested_hypotheses_form_one_clique() {
        // Component-tree style nesting: every region contains the next one.
        let segments = vec![
            rect(1, 0, 0, 8, 8),
            rect(2, 0, 0, 4, 4),
            rect(3, 0, 0, 2, 2),
        ];
        let graph = build_conflict_graph(0, &segments).unwrap();
        assert_eq!(members(&graph), vec![vec![0, 1, 2]]);
        assert_eq!(graph.num_conflicts(), 3);
    }

    #[test]
    fn test_chain_yields_pairwise_cliques() {
        // 0-1 and 1-2 overlap, 0-2 do not.
        let segments = vec![
            rect(1, 0, 0, 3, 3),
            rect(2, 2, 0, 3, 3),
            rect(3, 4, 0, 3, 3),
        ];
        let graph = build_conflict_graph(0, &segments).unwrap();
        assert_eq!(members(&graph), vec![vec![0, 1], vec![1, 2]]);
        assert!(graph.conflicts(0, 1));
        assert!(!graph.conflicts(0, 2));
        assert_eq!(graph.cliques_of(1).count(), 2);
    }

    #[test]
    fn test_two_overlapping_triangles() {
        // Adjacency of K4 minus edge (0,3): maximal cliques {0,1,2} and {1,2,3}.
        let adjacency = vec![vec![1, 2], vec![0, 2, 3], vec![0, 1, 3], vec![1, 2]];
        let cliques: Vec<Vec<usize>> = maximal_cliques(&adjacency)
            .iter()
            .map(|c| c.members().to_vec())
            .collect();
        assert_eq!(cliques, vec![vec![0, 1, 2], vec![1, 2, 3]]);
    }

    #[test]
    fn test_every_conflicting_pair_is_covered() {
        let segments = vec![
            rect(1, 0, 0, 5, 5),
            rect(2, 3, 3, 5, 5),
            rect(3, 6, 0, 5, 5),
            rect(4, 0, 6, 5, 5),
            rect(5, 4, 4, 2, 2),
        ];
        let graph = build_conflict_graph(0, &segments).unwrap();
        for i in 0..segments.len() {
            for j in (i + 1)..segments.len() {
                if segments[i].region.intersects(&segments[j].region) {
                    assert!(
                        graph.cliques().iter().any(|c| c.contains(i) && c.contains(j)),
                        "pair ({}, {}) not covered",
                        i,
                        j
                    );
                }
            }
        }
        // Maximality: no clique is a subset of another.
        for a in graph.cliques() {
            for b in graph.cliques() {
                if a != b {
                    assert!(!a.members().iter().all(|m| b.contains(*m)));
                }
            }
        }
    }

    #[test]
    fn test_graphs_for_every_frame() {
        let store = crate::segmentation::HypothesisStore::from_segments(vec![
            vec![rect(1, 0, 0, 4, 4), rect(2, 1, 1, 2, 2)],
            vec![],
            vec![Segment::new(3, 2, Region::rectangle(0, 0, 2, 2))],
        ])
        .unwrap();
        let seq = build_conflict_graphs(&store, false).unwrap();
        let par = build_conflict_graphs(&store, true).unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[0].cliques().len(), 1);
        assert!(seq[1].cliques().is_empty());
        assert_eq!(seq[2].frame(), 2);
    }

    #[test]
    fn test_empty_region_fails_frame() {
        let segments = vec![rect(1, 0, 0, 2, 2), Segment::new(9, 0, Region::new(vec![]))];
        let err = build_conflict_graph(4, &segments).unwrap_err();
        assert!(matches!(
            err,
            TrackingError::InvalidGeometry {
                frame: 4,
                segment: 9,
                ..
            }
        ));
    }
}
