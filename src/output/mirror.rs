//! Symmetric crop/flip composition around a mirror axis.
//!
//! A reflected frame of width `W` has its seam at `W / 2`. One side of the seam
//! is a genuine crop of the source ending (or starting) at the axis, the other
//! side is that crop flipped horizontally. When fewer than `W / 2` columns are
//! available between the axis and the frame edge, the crop is narrower and the
//! outer columns of the output stay black.

use image::{imageops, RgbImage};

/// Which side of the axis supplies the real pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Crop left of the axis; its mirror image fills the right half.
    Left,
    /// Crop right of the axis; its mirror image fills the left half.
    Right,
}

/// Source columns `[start, end)` cropped for an output of `width` columns.
pub fn crop_span(side: Side, axis: u32, width: u32, frame_width: u32) -> (u32, u32) {
    let mid = width / 2;
    let axis = axis.min(frame_width);
    match side {
        Side::Left => {
            if axis < mid {
                (0, axis)
            } else {
                (axis - mid, axis)
            }
        }
        Side::Right => {
            if frame_width - axis < mid {
                (axis, frame_width)
            } else {
                (axis, axis + mid)
            }
        }
    }
}

/// Join two halves at `width / 2` on a black canvas: `lhs` ends at the seam,
/// `rhs` starts at it.
pub fn compose_halves(lhs: &RgbImage, rhs: &RgbImage, width: u32, height: u32) -> RgbImage {
    let mid = width / 2;
    let mut result = RgbImage::new(width, height);
    imageops::replace(&mut result, lhs, mid as i64 - lhs.width() as i64, 0);
    imageops::replace(&mut result, rhs, mid as i64, 0);
    result
}

/// Compose the reflected frame of `width` columns for `frame` mirrored at `axis`.
pub fn reflect(frame: &RgbImage, side: Side, axis: u32, width: u32) -> RgbImage {
    let (start, end) = crop_span(side, axis, width, frame.width());
    let crop = imageops::crop_imm(frame, start, 0, end - start, frame.height()).to_image();
    let flipped = imageops::flip_horizontal(&crop);

    match side {
        Side::Left => compose_halves(&crop, &flipped, width, frame.height()),
        Side::Right => compose_halves(&flipped, &crop, width, frame.height()),
    }
}
