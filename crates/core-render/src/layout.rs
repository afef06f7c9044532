//! Slot arithmetic for both view modes.
//!
//! The pair view scales each image to fit its half of the screen minus a
//! fixed gutter, keeps aspect ratio, and sits the result slightly below
//! center. The single view scales up until the image covers the whole
//! screen, cropping whatever overflows. Scale factors may exceed 1, so
//! small assets are enlarged rather than letterboxed in a corner.

/// Gutter between the two halves of the pair view, in pixels.
pub const PAIR_SPACING: u32 = 15;

/// The pair view sits this far below vertical center.
pub const VERTICAL_OFFSET: i32 = 50;

/// Placed rectangle in frame coordinates. May extend past the frame
/// edges; drawing clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Where one half of a pair lands. `index` 0 is the left slot, 1 the
/// right.
pub fn pair_slot(
    frame_width: u32,
    frame_height: u32,
    image_width: u32,
    image_height: u32,
    index: usize,
) -> Rect {
    let half = frame_width / 2;
    let avail = half.saturating_sub(PAIR_SPACING).max(1);
    let scale = f64::min(
        f64::from(avail) / f64::from(image_width.max(1)),
        f64::from(frame_height) / f64::from(image_height.max(1)),
    );
    let width = ((f64::from(image_width) * scale) as u32).max(1);
    let height = ((f64::from(image_height) * scale) as u32).max(1);

    let mut x = (index as i32) * (half as i32) + (half as i32 - width as i32) / 2;
    let nudge = (PAIR_SPACING / 2) as i32;
    if index == 0 {
        x -= nudge;
    } else {
        x += nudge;
    }
    let y = (frame_height as i32 - height as i32) / 2 + VERTICAL_OFFSET;

    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Where a single image lands when scaled to cover the whole frame.
pub fn fill_slot(frame_width: u32, frame_height: u32, image_width: u32, image_height: u32) -> Rect {
    let scale = f64::max(
        f64::from(frame_width) / f64::from(image_width.max(1)),
        f64::from(frame_height) / f64::from(image_height.max(1)),
    );
    let width = ((f64::from(image_width) * scale) as u32).max(1);
    let height = ((f64::from(image_height) * scale) as u32).max(1);
    Rect {
        x: (frame_width as i32 - width as i32) / 2,
        y: (frame_height as i32 - height as i32) / 2,
        width,
        height,
    }
}
