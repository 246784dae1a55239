//! Debug overlays drawn onto a frame before it is mirrored, so they appear in
//! every derived output.

use crate::landmarks::{LandmarkSet, Point, LANDMARK_GROUPS};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_antialiased_line_segment_mut, draw_line_segment_mut};
use imageproc::pixelops::interpolate;

pub const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const AXIS_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Draw the nine landmark outlines.
pub fn draw_landmarks(frame: &mut RgbImage, landmarks: &LandmarkSet) {
    for group in &LANDMARK_GROUPS {
        draw_polyline(frame, landmarks.group(group), group.closed);
    }
}

/// Draw a full-height vertical line at the mirror axis, kept on the last
/// column when the axis sits on the right edge.
pub fn draw_axis(frame: &mut RgbImage, axis: u32) {
    if frame.width() == 0 {
        return;
    }
    let x = axis.min(frame.width() - 1) as f32;
    draw_line_segment_mut(frame, (x, 0.0), (x, frame.height() as f32), AXIS_COLOR);
}

fn draw_polyline(frame: &mut RgbImage, points: &[Point], closed: bool) {
    for pair in points.windows(2) {
        draw_segment(frame, pair[0], pair[1]);
    }
    if closed && points.len() > 2 {
        draw_segment(frame, points[points.len() - 1], points[0]);
    }
}

fn draw_segment(frame: &mut RgbImage, from: Point, to: Point) {
    draw_antialiased_line_segment_mut(
        frame,
        (from.x, from.y),
        (to.x, to.y),
        LANDMARK_COLOR,
        interpolate,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LANDMARK_COUNT;

    #[test]
    fn test_axis_line_covers_the_column() {
        let mut frame = RgbImage::new(40, 30);
        draw_axis(&mut frame, 12);
        for y in 0..30 {
            assert_eq!(*frame.get_pixel(12, y), AXIS_COLOR);
        }
        assert_eq!(*frame.get_pixel(11, 10), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(13, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_axis_at_right_edge_uses_last_column() {
        let mut frame = RgbImage::new(40, 30);
        draw_axis(&mut frame, 40);
        for y in 0..30 {
            assert_eq!(*frame.get_pixel(39, y), AXIS_COLOR);
        }
        assert_eq!(*frame.get_pixel(38, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_axis_on_empty_frame_is_skipped() {
        let mut frame = RgbImage::new(0, 0);
        draw_axis(&mut frame, 0);
    }

    #[test]
    fn test_closed_polyline_joins_last_point_to_first() {
        let mut frame = RgbImage::new(50, 50);
        let triangle = [Point::new(10, 10), Point::new(40, 10), Point::new(10, 40)];
        draw_polyline(&mut frame, &triangle, true);
        // On the closing edge from (10, 40) back to (10, 10).
        assert_eq!(*frame.get_pixel(10, 25), LANDMARK_COLOR);
    }

    #[test]
    fn test_open_polyline_leaves_gap() {
        let mut frame = RgbImage::new(50, 50);
        let triangle = [Point::new(10, 10), Point::new(40, 10), Point::new(10, 40)];
        draw_polyline(&mut frame, &triangle, false);
        assert_eq!(*frame.get_pixel(10, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_landmarks_are_drawn() {
        let points = (0..LANDMARK_COUNT as i32)
            .map(|i| Point::new(5 + i, 20))
            .collect();
        let landmarks = LandmarkSet::new(points).unwrap();
        let mut frame = RgbImage::new(100, 40);
        draw_landmarks(&mut frame, &landmarks);
        assert_eq!(*frame.get_pixel(10, 20), LANDMARK_COLOR);
    }
}
