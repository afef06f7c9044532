use core_events::Side;
use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::frame::{Frame, rgb};
use crate::layout::{self, Rect};

/// Border drawn on the side the viewer just chose.
const HIGHLIGHT_COLOR: u32 = rgb(0, 255, 0);
const HIGHLIGHT_THICKNESS: u32 = 50;

/// Panel shown where an asset failed to decode.
const PLACEHOLDER_FILL: u32 = rgb(24, 24, 24);
const PLACEHOLDER_BORDER: u32 = rgb(200, 0, 0);
const PLACEHOLDER_THICKNESS: u32 = 6;

/// Outline drawn when there is nothing to show at all.
const IDLE_BORDER: u32 = rgb(64, 64, 64);

/// Assembles the side-by-side pair view. `None` halves render as
/// placeholder panels; `highlight` frames the chosen side.
pub fn compose_pair(
    width: u32,
    height: u32,
    left: Option<&RgbaImage>,
    right: Option<&RgbaImage>,
    highlight: Option<Side>,
) -> Frame {
    let mut frame = Frame::new(width, height);
    for (index, image) in [left, right].into_iter().enumerate() {
        let (image_width, image_height) = match image {
            Some(image) => (image.width(), image.height()),
            None => (width / 2, height),
        };
        let slot = layout::pair_slot(width, height, image_width, image_height, index);
        match image {
            Some(image) => draw_scaled(&mut frame, image, slot),
            None => draw_placeholder(&mut frame, slot),
        }
        let side = if index == 0 { Side::Left } else { Side::Right };
        if highlight == Some(side) {
            frame.stroke_rect(
                slot.x,
                slot.y,
                slot.width,
                slot.height,
                HIGHLIGHT_THICKNESS,
                HIGHLIGHT_COLOR,
            );
        }
    }
    frame
}

/// Assembles the screen-filling single view used by slideshow mode.
pub fn compose_single(width: u32, height: u32, image: Option<&RgbaImage>) -> Frame {
    let mut frame = Frame::new(width, height);
    match image {
        Some(image) => {
            let slot = layout::fill_slot(width, height, image.width(), image.height());
            draw_scaled(&mut frame, image, slot);
        }
        None => {
            let slot = layout::fill_slot(width, height, width.max(1), height.max(1));
            draw_placeholder(&mut frame, slot);
        }
    }
    frame
}

/// The dark idle screen shown while the collection is empty: black with
/// a dim centered outline so the kiosk still reads as alive.
pub fn compose_empty(width: u32, height: u32) -> Frame {
    let mut frame = Frame::new(width, height);
    let box_width = (width / 3).max(1);
    let box_height = (height / 3).max(1);
    frame.stroke_rect(
        ((width - box_width) / 2) as i32,
        ((height - box_height) / 2) as i32,
        box_width,
        box_height,
        2,
        IDLE_BORDER,
    );
    frame
}

fn draw_scaled(frame: &mut Frame, image: &RgbaImage, slot: Rect) {
    let scaled = if image.width() == slot.width && image.height() == slot.height {
        image.clone()
    } else {
        imageops::resize(image, slot.width, slot.height, FilterType::Triangle)
    };
    frame.blit(&scaled, slot.x, slot.y);
}

fn draw_placeholder(frame: &mut Frame, slot: Rect) {
    frame.fill_rect(slot.x, slot.y, slot.width, slot.height, PLACEHOLDER_FILL);
    frame.stroke_rect(
        slot.x,
        slot.y,
        slot.width,
        slot.height,
        PLACEHOLDER_THICKNESS,
        PLACEHOLDER_BORDER,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([color[0], color[1], color[2], 255]))
    }

    #[test]
    fn pair_places_each_image_in_its_half() {
        // Sources at exactly the 625x468 slot size skip resampling, so
        // every pixel lands verbatim.
        let left = solid(625, 468, [255, 0, 0]);
        let right = solid(625, 468, [0, 0, 255]);
        let frame = compose_pair(1280, 720, Some(&left), Some(&right), None);

        assert_eq!(frame.pixel(312, 410), rgb(255, 0, 0));
        assert_eq!(frame.pixel(966, 410), rgb(0, 0, 255));
        // The gutter between the halves stays background.
        assert_eq!(frame.pixel(640, 410), 0);
        assert_eq!(frame.pixel(0, 0), 0);
    }

    #[test]
    fn highlight_frames_only_the_chosen_side() {
        let left = solid(625, 468, [255, 0, 0]);
        let right = solid(625, 468, [0, 0, 255]);
        let frame = compose_pair(1280, 720, Some(&left), Some(&right), Some(Side::Right));

        // Top-left corner of each slot: left keeps image color, right is
        // covered by the border.
        assert_eq!(frame.pixel(0, 176), rgb(255, 0, 0));
        assert_eq!(frame.pixel(654, 176), HIGHLIGHT_COLOR);
        // Right slot center is still the image.
        assert_eq!(frame.pixel(966, 410), rgb(0, 0, 255));
    }

    #[test]
    fn missing_half_renders_placeholder_panel() {
        let left = solid(625, 468, [255, 0, 0]);
        let frame = compose_pair(1280, 720, Some(&left), None, None);

        // A 640x720 panel scales by 625/640 into a 625x703 slot at
        // (654, 58).
        assert_eq!(frame.pixel(654, 58), PLACEHOLDER_BORDER);
        assert_eq!(frame.pixel(966, 410), PLACEHOLDER_FILL);
        assert_eq!(frame.pixel(312, 410), rgb(255, 0, 0));
    }

    #[test]
    fn scaled_pair_assets_keep_to_their_slots() {
        // 800x600 sources go through the resize path into the 625x468
        // slots; filtering may wobble channel values, placement may not.
        let left = solid(800, 600, [255, 0, 0]);
        let right = solid(800, 600, [0, 0, 255]);
        let frame = compose_pair(1280, 720, Some(&left), Some(&right), None);

        assert_ne!(frame.pixel(312, 410), 0);
        assert_ne!(frame.pixel(966, 410), 0);
        // One row above and below the slot is still background.
        assert_eq!(frame.pixel(312, 175), 0);
        assert_eq!(frame.pixel(312, 644), 0);
        assert_eq!(frame.pixel(640, 410), 0);
    }

    #[test]
    fn single_covers_entire_frame() {
        let image = solid(1280, 720, [0, 128, 0]);
        let frame = compose_single(1280, 720, Some(&image));
        for (x, y) in [(0, 0), (1279, 0), (0, 719), (1279, 719), (640, 360)] {
            assert_eq!(frame.pixel(x, y), rgb(0, 128, 0));
        }
    }

    #[test]
    fn single_upscales_to_cover_and_crop() {
        // 640x480 into 1280x720 doubles to 1280x960 and crops the vertical
        // overflow, so no corner is left as background.
        let image = solid(640, 480, [0, 128, 0]);
        let frame = compose_single(1280, 720, Some(&image));
        for (x, y) in [(0, 0), (1279, 0), (0, 719), (1279, 719), (640, 360)] {
            assert_ne!(frame.pixel(x, y), 0);
        }
    }

    #[test]
    fn empty_frame_is_black_with_idle_outline() {
        let frame = compose_empty(1280, 720);
        assert_eq!(frame.pixel(0, 0), 0);
        assert_eq!(frame.pixel(640, 360), 0);
        assert_eq!(frame.pixel(427, 240), IDLE_BORDER);
    }
}
