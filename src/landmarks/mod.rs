mod pfld;

pub use pfld::PfldLandmarkEstimator;

use crate::detection::Rect;
use crate::error::LandmarkError;
use anyhow::Result;
use image::RgbImage;

/// Number of points in the 68-point facial landmark layout.
pub const LANDMARK_COUNT: usize = 68;

/// Top of the nose bridge; its x coordinate is the mirror axis.
pub const NOSE_BRIDGE_TOP: usize = 27;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An inclusive index range of the landmark layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LandmarkGroup {
    pub first: usize,
    pub last: usize,
    /// Whether the outline joins its last point back to its first.
    pub closed: bool,
}

/// The fixed semantic groups of the 68-point layout. Lower nose shares
/// point 30 with the nose bridge.
pub const LANDMARK_GROUPS: [LandmarkGroup; 9] = [
    LandmarkGroup { first: 0, last: 16, closed: false }, // jaw
    LandmarkGroup { first: 17, last: 21, closed: false }, // left eyebrow
    LandmarkGroup { first: 22, last: 26, closed: false }, // right eyebrow
    LandmarkGroup { first: 27, last: 30, closed: false }, // nose bridge
    LandmarkGroup { first: 30, last: 35, closed: true }, // lower nose
    LandmarkGroup { first: 36, last: 41, closed: true }, // left eye
    LandmarkGroup { first: 42, last: 47, closed: true }, // right eye
    LandmarkGroup { first: 48, last: 59, closed: true }, // outer lip
    LandmarkGroup { first: 60, last: 67, closed: true }, // inner lip
];

/// Exactly 68 facial landmarks in the fixed layout order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Result<Self, LandmarkError> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarkError::PointCount {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn group(&self, group: &LandmarkGroup) -> &[Point] {
        &self.points[group.first..=group.last]
    }

    /// Mirror axis for this face, clamped to `[0, frame_width]`.
    pub fn mirror_axis(&self, frame_width: u32) -> u32 {
        self.points[NOSE_BRIDGE_TOP].x.clamp(0, frame_width as i32) as u32
    }
}

/// Trait for 68-point landmark regressors
pub trait LandmarkEstimator {
    /// Locate the landmarks of the face inside `face` on `frame`.
    /// Implementations keep no state between calls.
    fn estimate(&mut self, frame: &RgbImage, face: Rect) -> Result<LandmarkSet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmarks_with_axis(x: i32) -> LandmarkSet {
        let mut points: Vec<Point> = (0..LANDMARK_COUNT as i32).map(|i| Point::new(i, i)).collect();
        points[NOSE_BRIDGE_TOP] = Point::new(x, 5);
        LandmarkSet::new(points).unwrap()
    }

    #[test]
    fn test_rejects_wrong_point_count() {
        let err = LandmarkSet::new(vec![Point::new(0, 0); 5]).unwrap_err();
        assert_eq!(
            err,
            LandmarkError::PointCount {
                expected: 68,
                actual: 5
            }
        );
    }

    #[test]
    fn test_groups_cover_every_index_in_order() {
        let mut next = 0;
        for (index, group) in LANDMARK_GROUPS.iter().enumerate() {
            // Lower nose starts on the last nose bridge point.
            assert!(group.first == next || group.first + 1 == next, "group {}", index);
            assert!(group.last >= group.first);
            next = group.last + 1;
        }
        assert_eq!(next, LANDMARK_COUNT);
    }

    #[test]
    fn test_group_slices_are_inclusive() {
        let set = landmarks_with_axis(200);
        let jaw = set.group(&LANDMARK_GROUPS[0]);
        assert_eq!(jaw.len(), 17);
        assert_eq!(jaw[16], Point::new(16, 16));

        let bridge = set.group(&LANDMARK_GROUPS[3]);
        assert_eq!(bridge[0], Point::new(200, 5));
        assert_eq!(bridge.len(), 4);
    }

    #[test]
    fn test_mirror_axis_is_nose_bridge_top() {
        assert_eq!(landmarks_with_axis(200).mirror_axis(640), 200);
    }

    #[test]
    fn test_mirror_axis_is_clamped_to_frame() {
        assert_eq!(landmarks_with_axis(-12).mirror_axis(640), 0);
        assert_eq!(landmarks_with_axis(700).mirror_axis(640), 640);
    }
}
