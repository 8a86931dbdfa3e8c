//! Hypothesis store: the per-frame candidate segments handed over by an external segmenter.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::region::Region;
use crate::errors::TrackingError;

/// Stable identity of a segment hypothesis, assigned by the segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a segment inside a [`HypothesisStore`]: frame index plus index in that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub frame: usize,
    pub index: usize,
}

impl SegmentKey {
    #[inline]
    pub fn new(frame: usize, index: usize) -> Self {
        Self { frame, index }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}#{}", self.frame, self.index)
    }
}

/// One candidate region hypothesis in one frame. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub frame: usize,
    pub region: Region,
}

impl Segment {
    pub fn new(id: u64, frame: usize, region: Region) -> Self {
        Self {
            id: SegmentId(id),
            frame,
            region,
        }
    }
}

/// All hypotheses of a single frame, in segmenter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: usize,
    pub segments: Vec<Segment>,
}

impl Frame {
    pub fn new(index: usize, segments: Vec<Segment>) -> Self {
        Self { index, segments }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Validated, contiguous sequence of frames.
///
/// Construction checks the structural input errors: an empty store, frame numbering
/// that is not `0, 1, 2, ...`, segments filed under the wrong frame and duplicate ids
/// within a frame. Geometry is checked later, per frame, by the conflict graph builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisStore {
    frames: Vec<Frame>,
}

impl HypothesisStore {
    /// Validate and wrap a list of frames.
    pub fn new(frames: Vec<Frame>) -> Result<Self, TrackingError> {
        if frames.is_empty() {
            return Err(TrackingError::EmptyStore);
        }
        for (expected, frame) in frames.iter().enumerate() {
            if frame.index != expected {
                return Err(TrackingError::NonContiguousFrames {
                    expected,
                    found: frame.index,
                });
            }
            let mut seen = HashSet::with_capacity(frame.segments.len());
            for segment in &frame.segments {
                if segment.frame != frame.index {
                    return Err(TrackingError::FrameMismatch {
                        segment: segment.id.0,
                        frame: frame.index,
                        reported: segment.frame,
                    });
                }
                if !seen.insert(segment.id) {
                    return Err(TrackingError::DuplicateSegment {
                        frame: frame.index,
                        segment: segment.id.0,
                    });
                }
            }
        }
        Ok(Self { frames })
    }

    /// Build from per-frame segment lists; the list position is the frame index.
    pub fn from_segments(frames: Vec<Vec<Segment>>) -> Result<Self, TrackingError> {
        Self::new(
            frames
                .into_iter()
                .enumerate()
                .map(|(index, segments)| Frame::new(index, segments))
                .collect(),
        )
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Segments of one frame (empty slice past the end).
    pub fn segments(&self, frame: usize) -> &[Segment] {
        self.frames
            .get(frame)
            .map(|f| f.segments.as_slice())
            .unwrap_or(&[])
    }

    pub fn segment(&self, key: SegmentKey) -> Option<&Segment> {
        self.frames.get(key.frame)?.segments.get(key.index)
    }

    /// Total number of hypotheses over all frames.
    pub fn num_segments(&self) -> usize {
        self.frames.iter().map(Frame::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: u64, frame: usize) -> Segment {
        Segment::new(id, frame, Region::rectangle(id as i64 * 10, 0, 2, 2))
    }

    #[test]
    fn test_empty_store_rejected() {
        assert_eq!(HypothesisStore::new(vec![]), Err(TrackingError::EmptyStore));
    }

    #[test]
    fn test_non_contiguous_frames_rejected() {
        let frames = vec![Frame::new(0, vec![seg(1, 0)]), Frame::new(2, vec![seg(2, 2)])];
        assert_eq!(
            HypothesisStore::new(frames),
            Err(TrackingError::NonContiguousFrames {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_frame_mismatch_rejected() {
        let err = HypothesisStore::from_segments(vec![vec![seg(1, 0)], vec![seg(2, 0)]]);
        assert!(matches!(err, Err(TrackingError::FrameMismatch { segment: 2, .. })));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = HypothesisStore::from_segments(vec![vec![seg(1, 0), seg(1, 0)]]);
        assert!(matches!(err, Err(TrackingError::DuplicateSegment { frame: 0, segment: 1 })));
    }

    #[test]
    fn test_empty_frames_allowed() {
        let store = HypothesisStore::from_segments(vec![vec![seg(1, 0)], vec![], vec![seg(3, 2)]])
            .unwrap();
        assert_eq!(store.num_frames(), 3);
        assert_eq!(store.num_segments(), 2);
        assert!(store.segments(1).is_empty());
        assert!(store.segments(9).is_empty());
        assert_eq!(store.segment(SegmentKey::new(2, 0)).unwrap().id, SegmentId(3));
    }
}
