//! Screen decoder.
//!
//! Turns the 6912-byte display file into 32-bit pixels once per frame.
//!
//! ## Display file layout
//!
//! The bitmap (0x4000–0x57FF) stores 192 rows of 32 bytes, but not in
//! order. A row number `y` is split into three fields and reassembled as
//!
//! ```text
//! address = 0x4000 | (y[7:6] << 11) | (y[2:0] << 8) | (y[5:3] << 5) | x/8
//! ```
//!
//! so the screen is three 64-row thirds, each holding eight character rows
//! whose pixel lines are interleaved 256 bytes apart.
//!
//! The attribute plane (0x5800–0x5AFF) is linear: one byte per 8×8 cell,
//! `FBPPPIII` = flash, bright, paper, ink.

use crate::memory::AddressSpace;
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Start of the bitmap plane.
pub const BITMAP_BASE: u16 = 0x4000;
/// Start of the attribute plane.
pub const ATTR_BASE: u16 = 0x5800;
/// Frames between flash phase changes.
pub const FLASH_PERIOD: u8 = 16;

/// 0xAARRGGBB colours: 8 normal then 8 bright. Bright black is still black.
pub const PALETTE: [u32; 16] = [
    0xFF000000, 0xFF0000D7, 0xFFD70000, 0xFFD700D7,
    0xFF00D700, 0xFF00D7D7, 0xFFD7D700, 0xFFD7D7D7,
    0xFF000000, 0xFF0000FF, 0xFFFF0000, 0xFFFF00FF,
    0xFF00FF00, 0xFF00FFFF, 0xFFFFFF00, 0xFFFFFFFF,
];

/// Bitmap byte holding pixel (x, y).
#[inline(always)]
pub fn bitmap_addr(x: usize, y: usize) -> u16 {
    let row = ((y & 0xC0) << 5) | ((y & 0x07) << 8) | ((y & 0x38) << 2);
    BITMAP_BASE + (row + (x >> 3)) as u16
}

/// Attribute byte for the cell containing pixel (x, y).
#[inline(always)]
pub fn attr_addr(x: usize, y: usize) -> u16 {
    ATTR_BASE + ((y / 8) * 32 + x / 8) as u16
}

/// Decoded attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub ink: u8,
    pub paper: u8,
    pub bright: bool,
    pub flash: bool,
}

impl Attribute {
    pub fn decode(byte: u8) -> Self {
        Attribute {
            ink: byte & 0x07,
            paper: (byte >> 3) & 0x07,
            bright: byte & 0x40 != 0,
            flash: byte & 0x80 != 0,
        }
    }

    /// Palette index for a set (`ink == true`) or clear bitmap bit.
    #[inline(always)]
    pub fn color_index(&self, ink: bool, flash_inverted: bool) -> usize {
        let (fg, bg) = if self.flash && flash_inverted {
            (self.paper, self.ink)
        } else {
            (self.ink, self.paper)
        };
        let base = if ink { fg } else { bg };
        (base + if self.bright { 8 } else { 0 }) as usize
    }
}

/// Flash phase: flips every [`FLASH_PERIOD`] frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flash {
    counter: u8,
    inverted: bool,
}

impl Flash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame; returns true when the phase flipped.
    pub fn advance(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= FLASH_PERIOD {
            self.counter = 0;
            self.inverted = !self.inverted;
            true
        } else {
            false
        }
    }

    /// True while flashing cells show ink and paper swapped.
    pub fn inverted(&self) -> bool {
        self.inverted
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    pub fn from_parts(counter: u8, inverted: bool) -> Self {
        Flash { counter: counter % FLASH_PERIOD, inverted }
    }
}

/// Output size: the 256×192 screen plus `border` pixels on every side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub border: usize,
}

impl Geometry {
    pub fn with_border(border: usize) -> Self {
        Geometry { border }
    }

    pub fn width(&self) -> usize {
        SCREEN_WIDTH + 2 * self.border
    }

    pub fn height(&self) -> usize {
        SCREEN_HEIGHT + 2 * self.border
    }

    pub fn pixel_count(&self) -> usize {
        self.width() * self.height()
    }
}

/// Render one frame into `out`.
///
/// Pure function of memory, border colour and flash phase: the whole buffer
/// is rewritten. `out` must hold `geometry.pixel_count()` pixels.
pub fn render(
    mem: &AddressSpace,
    border: u8,
    flash_inverted: bool,
    geometry: Geometry,
    out: &mut [u32],
) {
    debug_assert_eq!(out.len(), geometry.pixel_count());
    out.fill(PALETTE[(border & 0x07) as usize]);

    let stride = geometry.width();
    let origin = geometry.border * stride + geometry.border;
    for y in 0..SCREEN_HEIGHT {
        let line = &mut out[origin + y * stride..origin + y * stride + SCREEN_WIDTH];
        for cell in 0..SCREEN_WIDTH / 8 {
            let x = cell * 8;
            let bits = mem.read(bitmap_addr(x, y));
            let attr = Attribute::decode(mem.read(attr_addr(x, y)));
            for px in 0..8 {
                let ink = bits & (0x80 >> px) != 0;
                line[x + px] = PALETTE[attr.color_index(ink, flash_inverted)];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(geometry: Geometry) -> Vec<u32> {
        vec![0; geometry.pixel_count()]
    }

    fn pixel(buf: &[u32], geometry: Geometry, x: usize, y: usize) -> u32 {
        buf[(y + geometry.border) * geometry.width() + x + geometry.border]
    }

    #[test]
    fn test_bitmap_addressing() {
        assert_eq!(bitmap_addr(0, 0), 0x4000);
        assert_eq!(bitmap_addr(8, 0), 0x4001);
        assert_eq!(bitmap_addr(255, 0), 0x401F);
        assert_eq!(bitmap_addr(0, 1), 0x4100);
        assert_eq!(bitmap_addr(0, 7), 0x4700);
        assert_eq!(bitmap_addr(0, 8), 0x4020);
        assert_eq!(bitmap_addr(0, 63), 0x47E0);
        assert_eq!(bitmap_addr(0, 64), 0x4800);
        assert_eq!(bitmap_addr(0, 128), 0x5000);
        assert_eq!(bitmap_addr(255, 191), 0x57FF);
    }

    #[test]
    fn test_attr_addressing() {
        assert_eq!(attr_addr(0, 0), 0x5800);
        assert_eq!(attr_addr(7, 7), 0x5800);
        assert_eq!(attr_addr(8, 0), 0x5801);
        assert_eq!(attr_addr(0, 8), 0x5820);
        assert_eq!(attr_addr(255, 191), 0x5AFF);
    }

    #[test]
    fn test_attribute_decode() {
        let a = Attribute::decode(0b1101_0110);
        assert_eq!(a, Attribute { ink: 6, paper: 2, bright: true, flash: true });
        assert_eq!(a.color_index(true, false), 14);
        assert_eq!(a.color_index(false, false), 10);
        assert_eq!(a.color_index(true, true), 10);
    }

    #[test]
    fn test_paper_cell() {
        let mut mem = AddressSpace::new();
        mem.write(0x5800, 0x47); // ink 7, paper 0
        let g = Geometry::default();
        let mut buf = frame(g);
        render(&mem, 0, false, g, &mut buf);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(pixel(&buf, g, x, y), PALETTE[0]);
            }
        }
    }

    #[test]
    fn test_ink_pixels() {
        let mut mem = AddressSpace::new();
        mem.write(0x5801, 0x0A); // cell (1,0): ink 2, paper 1
        mem.write(bitmap_addr(8, 3), 0b1000_0001);
        let g = Geometry::default();
        let mut buf = frame(g);
        render(&mem, 0, false, g, &mut buf);
        assert_eq!(pixel(&buf, g, 8, 3), PALETTE[2]);
        assert_eq!(pixel(&buf, g, 15, 3), PALETTE[2]);
        assert_eq!(pixel(&buf, g, 9, 3), PALETTE[1]);
        assert_eq!(pixel(&buf, g, 8, 2), PALETTE[1]);
    }

    #[test]
    fn test_bright() {
        let mut mem = AddressSpace::new();
        mem.write(0x5800, 0x40 | 0x08 | 0x04); // bright, paper 1, ink 4
        mem.write(0x4000, 0xF0);
        let g = Geometry::default();
        let mut buf = frame(g);
        render(&mem, 0, false, g, &mut buf);
        assert_eq!(pixel(&buf, g, 0, 0), PALETTE[12]);
        assert_eq!(pixel(&buf, g, 7, 0), PALETTE[9]);
    }

    #[test]
    fn test_flash_swaps_ink_and_paper() {
        let mut mem = AddressSpace::new();
        mem.write(0x5800, 0x80 | (5 << 3) | 2);
        mem.write(0x4000, 0b1010_1010);
        let g = Geometry::default();
        let mut normal = frame(g);
        let mut flashed = frame(g);
        render(&mem, 0, false, g, &mut normal);
        render(&mem, 0, true, g, &mut flashed);
        for y in 0..8 {
            for x in 0..8 {
                let n = pixel(&normal, g, x, y);
                let f = pixel(&flashed, g, x, y);
                assert_ne!(n, f);
                assert!(
                    (n == PALETTE[2] && f == PALETTE[5]) || (n == PALETTE[5] && f == PALETTE[2]),
                    "pixel ({}, {}) not swapped", x, y
                );
            }
        }
        // Cells without the flash bit are unaffected.
        assert_eq!(pixel(&normal, g, 8, 0), pixel(&flashed, g, 8, 0));
    }

    #[test]
    fn test_border_fill() {
        let mem = AddressSpace::new();
        let g = Geometry::with_border(4);
        let mut buf = frame(g);
        render(&mem, 3, false, g, &mut buf);
        assert_eq!(buf[0], PALETTE[3]);
        assert_eq!(buf[buf.len() - 1], PALETTE[3]);
        assert_eq!(buf[3 * g.width() + 100], PALETTE[3]);
        // Active area: all-zero attributes render black paper.
        assert_eq!(pixel(&buf, g, 0, 0), PALETTE[0]);
    }

    #[test]
    fn test_border_hidden_without_margin() {
        let mut mem = AddressSpace::new();
        for a in 0x5800..0x5B00u16 {
            mem.write(a, 0x38); // paper 7
        }
        let g = Geometry::default();
        let mut buf = frame(g);
        render(&mem, 2, false, g, &mut buf);
        assert!(buf.iter().all(|&p| p == PALETTE[7]));
    }

    #[test]
    fn test_flash_period() {
        let mut flash = Flash::new();
        for _ in 0..15 {
            assert!(!flash.advance());
        }
        assert!(!flash.inverted());
        assert!(flash.advance());
        assert!(flash.inverted());
        for _ in 0..15 {
            flash.advance();
        }
        assert!(flash.inverted());
        flash.advance();
        assert!(!flash.inverted());
    }

    proptest! {
        #[test]
        fn render_is_pure(seed in any::<u64>(), border in 0u8..8, inverted in any::<bool>()) {
            let mut mem = AddressSpace::new();
            let mut s = seed | 1;
            for a in BITMAP_BASE..0x5B00 {
                s ^= s << 13; s ^= s >> 7; s ^= s << 17;
                mem.write(a, s as u8);
            }
            let g = Geometry::with_border(2);
            let mut a = frame(g);
            let mut b = vec![0x1234_5678; g.pixel_count()];
            render(&mem, border, inverted, g, &mut a);
            render(&mem, border, inverted, g, &mut b);
            prop_assert!(a == b);
        }
    }
}
