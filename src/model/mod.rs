/*!
Boolean factor graph of a tracking problem.

Every candidate event gets one boolean [`IndicatorVar`]:

| indicator       | created for                                        |
|-----------------|----------------------------------------------------|
| segment         | every hypothesis                                   |
| movement        | admitted pairs (s in f, s' in f+1)                 |
| division        | admitted triples (s in f; d1 < d2 in f+1)          |
| appearance      | every hypothesis in frames > 0, unless truncated   |
| disappearance   | every hypothesis before the last frame, unless truncated |

[`Factor`]s price variables (unary costs) and constrain them: one `sum <= 1` per
conflict clique, and per segment and side one flow equality tying its activation
to exactly one explaining transition or slack event.
*/

pub mod builder;
pub mod factors;
pub mod graph;
pub mod variables;

pub use builder::TrackingModelBuilder;
pub use factors::{ConstraintViolation, Factor, Relation};
pub use graph::{Assignment, EventCounts, FactorGraph, ModelStats, SegmentNode};
pub use variables::{Indicator, IndicatorVar, VarId, VariableDomain};
