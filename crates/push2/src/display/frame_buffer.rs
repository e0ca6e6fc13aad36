//! Host canvas and device frame encoding.
//!
//! The host draws into a [`Canvas`] in RGB. A [`DeviceFrame`] holds the same
//! picture in the encoding the Push 2 expects on its bulk endpoint:
//!
//! - 160 lines of 1024 pixels (960 visible, 64 filler)
//! - 16-bit little-endian pixels, `bbbbbggggggrrrrr`
//! - every line XORed with the `E7 F3 E7 FF` pattern

/// Visible display width in pixels
pub const DISPLAY_WIDTH: usize = 960;

/// Display height in pixels
pub const DISPLAY_HEIGHT: usize = 160;

/// Pixels per line on the wire, including filler
pub const LINE_STRIDE: usize = 1024;

/// Bytes per encoded line
pub const LINE_BYTES: usize = LINE_STRIDE * 2;

/// Size of the encoded frame payload
pub const FRAME_BYTES: usize = LINE_BYTES * DISPLAY_HEIGHT;

/// Frame header sent before each frame
pub const FRAME_HEADER: [u8; 16] = [
    0xFF, 0xCC, 0xAA, 0x88, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// XOR mask for frame data (applied as u32 words)
const XOR_MASK: [u8; 4] = [0xE7, 0xF3, 0xE7, 0xFF];

/// 24-bit color as drawn by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const GRAY: Rgb = Rgb::new(128, 128, 128);
    pub const DARK_GRAY: Rgb = Rgb::new(64, 64, 64);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Device pixel value before masking.
    pub const fn to_device_pixel(self) -> u16 {
        ((self.b as u16 >> 3) << 11) | ((self.g as u16 >> 2) << 5) | (self.r as u16 >> 3)
    }
}

/// Host drawing surface, one RGB value per visible pixel.
#[derive(Clone)]
pub struct Canvas {
    pixels: Vec<Rgb>,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            pixels: vec![Rgb::BLACK; DISPLAY_WIDTH * DISPLAY_HEIGHT],
        }
    }

    pub fn width(&self) -> usize {
        DISPLAY_WIDTH
    }

    pub fn height(&self) -> usize {
        DISPLAY_HEIGHT
    }

    pub fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    /// Set a pixel. Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        if x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT {
            self.pixels[y * DISPLAY_WIDTH + x] = color;
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT {
            Some(self.pixels[y * DISPLAY_WIDTH + x])
        } else {
            None
        }
    }

    /// One line of pixels, empty below the last line.
    pub fn row(&self, y: usize) -> &[Rgb] {
        if y >= DISPLAY_HEIGHT {
            return &[];
        }
        &self.pixels[y * DISPLAY_WIDTH..(y + 1) * DISPLAY_WIDTH]
    }

    pub fn draw_hline(&mut self, x: usize, y: usize, w: usize, color: Rgb) {
        if y >= DISPLAY_HEIGHT || x >= DISPLAY_WIDTH {
            return;
        }
        let end = x.saturating_add(w).min(DISPLAY_WIDTH);
        self.pixels[y * DISPLAY_WIDTH + x..y * DISPLAY_WIDTH + end].fill(color);
    }

    pub fn draw_vline(&mut self, x: usize, y: usize, h: usize, color: Rgb) {
        for row in y..y.saturating_add(h).min(DISPLAY_HEIGHT) {
            self.set_pixel(x, row, color);
        }
    }

    /// Rectangle outline.
    pub fn draw_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        if w == 0 || h == 0 {
            return;
        }
        self.draw_hline(x, y, w, color);
        self.draw_hline(x, y.saturating_add(h - 1), w, color);
        self.draw_vline(x, y, h, color);
        self.draw_vline(x.saturating_add(w - 1), y, h, color);
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        for row in y..y.saturating_add(h).min(DISPLAY_HEIGHT) {
            self.draw_hline(x, row, w, color);
        }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

/// One encoded frame payload, ready for the bulk endpoint.
pub struct DeviceFrame {
    data: Box<[u8]>,
}

impl DeviceFrame {
    pub fn new() -> Self {
        let mut frame = Self {
            data: vec![0u8; FRAME_BYTES].into_boxed_slice(),
        };
        apply_xor_mask(&mut frame.data);
        frame
    }

    /// Encode the canvas into this frame, row by row.
    pub fn encode(&mut self, canvas: &Canvas) {
        for (y, line) in self.data.chunks_exact_mut(LINE_BYTES).enumerate() {
            let row = canvas.row(y);
            let (visible, filler) = line.split_at_mut(DISPLAY_WIDTH * 2);
            for (pixel, bytes) in row.iter().zip(visible.chunks_exact_mut(2)) {
                bytes.copy_from_slice(&pixel.to_device_pixel().to_le_bytes());
            }
            filler.fill(0);
            apply_xor_mask(line);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Unmasked device pixel at a visible coordinate.
    pub fn pixel(&self, x: usize, y: usize) -> u16 {
        let offset = y * LINE_BYTES + x * 2;
        let lo = self.data[offset] ^ XOR_MASK[offset % 4];
        let hi = self.data[offset + 1] ^ XOR_MASK[(offset + 1) % 4];
        u16::from_le_bytes([lo, hi])
    }
}

impl Default for DeviceFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply XOR mask to frame data (in-place).
pub fn apply_xor_mask(data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= XOR_MASK[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_packing() {
        assert_eq!(Rgb::BLACK.to_device_pixel(), 0x0000);
        assert_eq!(Rgb::WHITE.to_device_pixel(), 0xFFFF);
        assert_eq!(Rgb::RED.to_device_pixel(), 0x001F);
        assert_eq!(Rgb::GREEN.to_device_pixel(), 0x07E0);
        assert_eq!(Rgb::BLUE.to_device_pixel(), 0xF800);
    }

    #[test]
    fn test_frame_geometry() {
        assert_eq!(FRAME_BYTES, 327_680);
        assert_eq!(DeviceFrame::new().as_bytes().len(), FRAME_BYTES);
        assert_eq!(FRAME_HEADER[..4], [0xFF, 0xCC, 0xAA, 0x88]);
    }

    #[test]
    fn test_encode_masks_every_line() {
        let mut canvas = Canvas::new();
        canvas.set_pixel(0, 0, Rgb::RED);
        canvas.set_pixel(959, 159, Rgb::BLUE);

        let mut frame = DeviceFrame::new();
        frame.encode(&canvas);

        assert_eq!(frame.pixel(0, 0), 0x001F);
        assert_eq!(frame.pixel(959, 159), 0xF800);
        assert_eq!(frame.pixel(1, 0), 0x0000);

        // A black pixel on the wire is the mask itself
        let bytes = frame.as_bytes();
        assert_eq!(bytes[LINE_BYTES + 4..LINE_BYTES + 8], XOR_MASK);
        // Filler at the end of a line is masked zeros
        assert_eq!(bytes[LINE_BYTES - 4..LINE_BYTES], XOR_MASK);
    }

    #[test]
    fn test_drawing_clips() {
        let mut canvas = Canvas::new();
        canvas.draw_hline(950, 0, 100, Rgb::WHITE);
        canvas.draw_vline(0, 150, 100, Rgb::WHITE);
        canvas.fill_rect(958, 158, 10, 10, Rgb::GREEN);
        canvas.set_pixel(2000, 2000, Rgb::RED);

        assert_eq!(canvas.pixel(959, 0), Some(Rgb::WHITE));
        assert_eq!(canvas.pixel(0, 159), Some(Rgb::WHITE));
        assert_eq!(canvas.pixel(959, 159), Some(Rgb::GREEN));
        assert_eq!(canvas.pixel(960, 0), None);
    }

    #[test]
    fn test_huge_extents_clip() {
        let mut canvas = Canvas::new();
        canvas.draw_hline(10, 0, usize::MAX, Rgb::WHITE);
        canvas.draw_vline(0, 10, usize::MAX, Rgb::WHITE);
        canvas.fill_rect(usize::MAX, usize::MAX, usize::MAX, usize::MAX, Rgb::RED);
        canvas.draw_rect(950, 150, usize::MAX, usize::MAX, Rgb::GREEN);
        canvas.draw_rect(usize::MAX, usize::MAX, 1, 1, Rgb::RED);

        assert_eq!(canvas.pixel(959, 0), Some(Rgb::WHITE));
        assert_eq!(canvas.pixel(0, 159), Some(Rgb::WHITE));
        // Right and bottom edges land off screen
        assert_eq!(canvas.pixel(950, 159), Some(Rgb::GREEN));
        assert_eq!(canvas.pixel(959, 150), Some(Rgb::GREEN));
        assert_eq!(canvas.pixel(959, 159), Some(Rgb::BLACK));

        assert!(canvas.row(DISPLAY_HEIGHT).is_empty());
        assert!(canvas.row(usize::MAX).is_empty());
        assert_eq!(canvas.row(DISPLAY_HEIGHT - 1).len(), DISPLAY_WIDTH);
    }

    #[test]
    fn test_draw_rect_outline() {
        let mut canvas = Canvas::new();
        canvas.draw_rect(10, 10, 5, 4, Rgb::WHITE);

        assert_eq!(canvas.pixel(10, 10), Some(Rgb::WHITE));
        assert_eq!(canvas.pixel(14, 13), Some(Rgb::WHITE));
        assert_eq!(canvas.pixel(12, 11), Some(Rgb::BLACK));
    }
}
