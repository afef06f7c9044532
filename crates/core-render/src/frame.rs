use image::RgbaImage;

/// Packs one color into the `0RGB` u32 layout the surface buffer expects.
pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Owned pixel grid, row-major `0RGB`. All drawing primitives clip to the
/// frame bounds, so callers may pass rectangles that hang off any edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Frame {
    /// A frame cleared to black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// Fills a rectangle, silently dropping the parts outside the frame.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: u32) {
        for row in self.clip_rows(y, height) {
            let (start, end) = self.clip_span(x, width);
            let offset = row * self.width as usize;
            for pixel in &mut self.pixels[offset + start..offset + end] {
                *pixel = color;
            }
        }
    }

    /// Copies a decoded image with its top-left corner at `(x, y)`,
    /// dropping alpha. Off-frame source pixels are skipped.
    pub fn blit(&mut self, image: &RgbaImage, x: i32, y: i32) {
        for (sy, row) in image.rows().enumerate() {
            let dy = y + sy as i32;
            if dy < 0 {
                continue;
            }
            let dy = dy as usize;
            if dy >= self.height as usize {
                break;
            }
            let offset = dy * self.width as usize;
            for (sx, pixel) in row.enumerate() {
                let dx = x + sx as i32;
                if dx < 0 {
                    continue;
                }
                let dx = dx as usize;
                if dx >= self.width as usize {
                    break;
                }
                let [r, g, b, _] = pixel.0;
                self.pixels[offset + dx] = rgb(r, g, b);
            }
        }
    }

    /// Draws a rectangle outline of the given edge thickness, clipped.
    pub fn stroke_rect(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        thickness: u32,
        color: u32,
    ) {
        let t = thickness.min(width).min(height);
        self.fill_rect(x, y, width, t, color);
        self.fill_rect(x, y + (height - t) as i32, width, t, color);
        self.fill_rect(x, y, t, height, color);
        self.fill_rect(x + (width - t) as i32, y, t, height, color);
    }

    fn clip_rows(&self, y: i32, height: u32) -> std::ops::Range<usize> {
        let top = y.max(0) as usize;
        let bottom = (y + height as i32).clamp(0, self.height as i32) as usize;
        top.min(self.height as usize)..bottom
    }

    fn clip_span(&self, x: i32, width: u32) -> (usize, usize) {
        let left = x.clamp(0, self.width as i32) as usize;
        let right = (x + width as i32).clamp(0, self.width as i32) as usize;
        (left, right.max(left))
    }
}
