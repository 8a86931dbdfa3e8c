/*!
Segment hypotheses and their per-frame exclusivity structure.

- [`Region`] - exact pixel set of a hypothesis
- [`Segment`], [`Frame`], [`HypothesisStore`] - validated per-frame input
- [`build_conflict_graph`] - overlap relation and maximal-clique cover of one frame
- [`build_conflict_graphs`] - the same for every frame of a store
*/

pub mod conflict;
pub mod region;
pub mod store;

pub use conflict::{build_conflict_graph, build_conflict_graphs, ConflictClique, ConflictGraph};
pub use region::{BoundingBox, Pixel, Region};
pub use store::{Frame, HypothesisStore, Segment, SegmentId, SegmentKey};
