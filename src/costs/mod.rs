/*!
Cost providers for tracking events.

The optimizer never looks at pixels directly: every candidate event is priced by
a [`CostModel`]. Lower is better; negative costs reward an event.

A cost at or above the configured truncation threshold for its event kind means
"forbidden" and the corresponding variable is never created (see
[`TruncationThresholds`](crate::config::TruncationThresholds)). `f64::INFINITY` is
therefore a valid way to forbid an event. NaN and `-inf` are modeling errors.

Implementations:
- [`TableCosts`] - explicit per-event lookup with per-kind defaults
- [`GeometricCosts`] - costs derived from region size and centroid displacement
*/

pub mod geometric;
pub mod table;

pub use geometric::GeometricCosts;
pub use table::{DefaultCosts, TableCosts};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::segmentation::Segment;

/// Kind of event an indicator variable stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Segment,
    Movement,
    Division,
    Appearance,
    Disappearance,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Segment,
        EventKind::Movement,
        EventKind::Division,
        EventKind::Appearance,
        EventKind::Disappearance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Segment => "segment",
            EventKind::Movement => "movement",
            EventKind::Division => "division",
            EventKind::Appearance => "appearance",
            EventKind::Disappearance => "disappearance",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five pure cost functions consumed by the model builder.
///
/// `frame` is the frame of the segment for unary events and the frame of the
/// source segment for movements and divisions. Implementations must be pure:
/// the builder may call them from several threads and in any order.
pub trait CostModel: Send + Sync {
    /// Cost of selecting `segment`.
    fn segment_cost(&self, frame: usize, segment: &Segment) -> f64;

    /// Cost of `segment` having no predecessor (only asked for frames > 0).
    fn appearance_cost(&self, frame: usize, segment: &Segment) -> f64;

    /// Cost of `segment` having no successor (only asked for frames before the last).
    fn disappearance_cost(&self, frame: usize, segment: &Segment) -> f64;

    /// Cost of `from` (frame `frame`) continuing as `to` (frame `frame + 1`).
    fn movement_cost(&self, frame: usize, from: &Segment, to: &Segment) -> f64;

    /// Cost of `from` (frame `frame`) dividing into the two segments of `to`.
    fn division_cost(&self, frame: usize, from: &Segment, to: (&Segment, &Segment)) -> f64;

    /// Short name for logs.
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<C: CostModel + ?Sized> CostModel for &C {
    fn segment_cost(&self, frame: usize, segment: &Segment) -> f64 {
        (**self).segment_cost(frame, segment)
    }

    fn appearance_cost(&self, frame: usize, segment: &Segment) -> f64 {
        (**self).appearance_cost(frame, segment)
    }

    fn disappearance_cost(&self, frame: usize, segment: &Segment) -> f64 {
        (**self).disappearance_cost(frame, segment)
    }

    fn movement_cost(&self, frame: usize, from: &Segment, to: &Segment) -> f64 {
        (**self).movement_cost(frame, from, to)
    }

    fn division_cost(&self, frame: usize, from: &Segment, to: (&Segment, &Segment)) -> f64 {
        (**self).division_cost(frame, from, to)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<C: CostModel + ?Sized> CostModel for Box<C> {
    fn segment_cost(&self, frame: usize, segment: &Segment) -> f64 {
        (**self).segment_cost(frame, segment)
    }

    fn appearance_cost(&self, frame: usize, segment: &Segment) -> f64 {
        (**self).appearance_cost(frame, segment)
    }

    fn disappearance_cost(&self, frame: usize, segment: &Segment) -> f64 {
        (**self).disappearance_cost(frame, segment)
    }

    fn movement_cost(&self, frame: usize, from: &Segment, to: &Segment) -> f64 {
        (**self).movement_cost(frame, from, to)
    }

    fn division_cost(&self, frame: usize, from: &Segment, to: (&Segment, &Segment)) -> f64 {
        (**self).division_cost(frame, from, to)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
