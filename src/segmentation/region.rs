//! Pixel/voxel regions of segment hypotheses.
//!
//! A [`Region`] is an exact set of integer coordinates. Two regions overlap when
//! they share at least one coordinate; there is no fuzzy tolerance. Pixels are
//! stored sorted and deduplicated so intersection tests are a linear merge, with
//! a bounding-box rejection in front.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Integer coordinate `[x, y, z]`. 2D data uses `z = 0`.
pub type Pixel = [i64; 3];

/// Axis-aligned inclusive bounding box of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Pixel,
    pub max: Pixel,
}

impl BoundingBox {
    /// True if the two boxes share at least one coordinate.
    #[inline]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        (0..3).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }
}

/// Pixel as written in scenario files: `[x, y]` or `[x, y, z]`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum PixelRepr {
    Planar([i64; 2]),
    Volumetric([i64; 3]),
}

impl From<PixelRepr> for Pixel {
    fn from(p: PixelRepr) -> Self {
        match p {
            PixelRepr::Planar([x, y]) => [x, y, 0],
            PixelRepr::Volumetric(v) => v,
        }
    }
}

/// Exact set of pixels covered by one segment hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PixelRepr>", into = "Vec<Pixel>")]
pub struct Region {
    pixels: Vec<Pixel>,
    bbox: Option<BoundingBox>,
}

impl Region {
    /// Build a region from any collection of pixels (duplicates are dropped).
    pub fn new(pixels: impl IntoIterator<Item = Pixel>) -> Self {
        let mut pixels: Vec<Pixel> = pixels.into_iter().collect();
        pixels.sort_unstable();
        pixels.dedup();
        let bbox = bounding_box(&pixels);
        Self { pixels, bbox }
    }

    /// Build a 2D region from `(x, y)` pairs.
    pub fn from_2d(pixels: impl IntoIterator<Item = (i64, i64)>) -> Self {
        Self::new(pixels.into_iter().map(|(x, y)| [x, y, 0]))
    }

    /// Filled 2D rectangle with top-left corner `(x, y)`.
    pub fn rectangle(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self::from_2d((x..x + width).flat_map(|px| (y..y + height).map(move |py| (px, py))))
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Sorted, deduplicated pixels.
    #[inline]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Bounding box, `None` for an empty region.
    #[inline]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox
    }

    /// True if the regions share at least one pixel.
    pub fn intersects(&self, other: &Region) -> bool {
        match (self.bbox, other.bbox) {
            (Some(a), Some(b)) if a.intersects(&b) => {}
            _ => return false,
        }
        let (mut i, mut j) = (0, 0);
        while i < self.pixels.len() && j < other.pixels.len() {
            match self.pixels[i].cmp(&other.pixels[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }

    /// Number of shared pixels.
    pub fn intersection_size(&self, other: &Region) -> usize {
        match (self.bbox, other.bbox) {
            (Some(a), Some(b)) if a.intersects(&b) => {}
            _ => return 0,
        }
        let (mut i, mut j, mut shared) = (0, 0, 0);
        while i < self.pixels.len() && j < other.pixels.len() {
            match self.pixels[i].cmp(&other.pixels[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }

    /// Mean pixel position, `None` for an empty region.
    pub fn centroid(&self) -> Option<Vector3<f64>> {
        if self.pixels.is_empty() {
            return None;
        }
        let sum = self
            .pixels
            .iter()
            .fold(Vector3::zeros(), |acc: Vector3<f64>, p| {
                acc + Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64)
            });
        Some(sum / self.pixels.len() as f64)
    }
}

impl From<Vec<PixelRepr>> for Region {
    fn from(pixels: Vec<PixelRepr>) -> Self {
        Region::new(pixels.into_iter().map(Pixel::from))
    }
}

impl From<Region> for Vec<Pixel> {
    fn from(region: Region) -> Self {
        region.pixels
    }
}

fn bounding_box(pixels: &[Pixel]) -> Option<BoundingBox> {
    let first = *pixels.first()?;
    let mut bbox = BoundingBox {
        min: first,
        max: first,
    };
    for p in &pixels[1..] {
        for d in 0..3 {
            bbox.min[d] = bbox.min[d].min(p[d]);
            bbox.max[d] = bbox.max[d].max(p[d]);
        }
    }
    Some(bbox)
}
