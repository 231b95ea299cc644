//! 1bpp framebuffer and the pixel primitive everything else draws with.
//!
//! Pixel (x, y) lives in byte `x / 8` of row `y`, under mask `0x80 >> (x % 8)`
//! -- leftmost pixel in the MSB, which is the order the emitters shift bits
//! out to the video pin.
//!
//! # Sharing with the scanout ISR
//!
//! Cells are `AtomicU8` accessed with `Relaxed` ordering, which on Cortex-M
//! compiles to the same plain byte loads and stores a C framebuffer would get.
//! The ISR only reads; drawing code reads, modifies and writes back without a
//! lock. That's fine for one drawing context, but two drawing contexts
//! (say, thread mode and some other ISR) can lose each other's updates.
//!
//! There's no attempt to keep scanout and drawing apart: a row modified while
//! it's being emitted can show up torn for a frame.

use core::sync::atomic::{AtomicU8, Ordering};

/// How `set_pixel` affects the pixel it's aimed at.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ColorMode {
    /// Pixels are turned off (black).
    Clear = 0,
    /// Pixels are turned on (white).
    Set = 1,
    /// Pixels are toggled.
    Invert = 2,
}

impl ColorMode {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => ColorMode::Clear,
            1 => ColorMode::Set,
            _ => ColorMode::Invert,
        }
    }
}

/// Whole-buffer fill performed by `Framebuffer::clear`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fill {
    Black,
    White,
    /// Inverts every pixel. Doing it twice gets you back where you started.
    Invert,
}

/// Direction for `Framebuffer::shift`. Content moves *toward* the named edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// A framebuffer of `H` rows, each `W` bytes (so `W * 8` pixels) wide.
pub struct Framebuffer<const W: usize, const H: usize> {
    rows: [[AtomicU8; W]; H],
    mode: AtomicU8,
}

impl<const W: usize, const H: usize> Framebuffer<W, H> {
    /// Width in pixels.
    pub const WIDTH: usize = W * 8;
    /// Height in pixels.
    pub const HEIGHT: usize = H;

    /// Creates an all-black framebuffer in `ColorMode::Clear`.
    pub const fn new() -> Self {
        Framebuffer {
            rows: [const { [const { AtomicU8::new(0) }; W] }; H],
            mode: AtomicU8::new(ColorMode::Clear as u8),
        }
    }

    /// Selects what subsequent `set_pixel` calls do.
    pub fn set_color_mode(&self, mode: ColorMode) {
        self.mode.store(mode as u8, Ordering::Relaxed)
    }

    pub fn color_mode(&self) -> ColorMode {
        ColorMode::from_bits(self.mode.load(Ordering::Relaxed))
    }

    /// Applies the current color mode to pixel (x, y). Coordinates outside the
    /// framebuffer are ignored.
    pub fn set_pixel(&self, x: usize, y: usize) {
        if let Some((cell, mask)) = self.locate(x, y) {
            let old = cell.load(Ordering::Relaxed);
            let new = match self.color_mode() {
                ColorMode::Clear => old & !mask,
                ColorMode::Set => old | mask,
                ColorMode::Invert => old ^ mask,
            };
            cell.store(new, Ordering::Relaxed);
        }
    }

    /// Checks whether pixel (x, y) is on. Coordinates outside the framebuffer
    /// read as off.
    pub fn get_pixel(&self, x: usize, y: usize) -> bool {
        match self.locate(x, y) {
            Some((cell, mask)) => cell.load(Ordering::Relaxed) & mask != 0,
            None => false,
        }
    }

    /// Fills or inverts the entire framebuffer. This ignores the color mode.
    pub fn clear(&self, fill: Fill) {
        for cell in self.rows.iter().flat_map(|row| row.iter()) {
            let new = match fill {
                Fill::Black => 0x00,
                Fill::White => 0xFF,
                Fill::Invert => !cell.load(Ordering::Relaxed),
            };
            cell.store(new, Ordering::Relaxed);
        }
    }

    /// Returns the row starting at byte `offset` from the start of the
    /// framebuffer, or `None` past the end.
    ///
    /// This is the addressing the scanout uses: it steps through the
    /// framebuffer in units of `W` bytes.
    pub fn row_at(&self, offset: usize) -> Option<&[AtomicU8; W]> {
        if W == 0 {
            return None;
        }
        self.rows.get(offset / W)
    }

    /// Snapshots the framebuffer contents.
    pub fn copy_out(&self) -> [[u8; W]; H] {
        core::array::from_fn(|y| {
            core::array::from_fn(|x| self.rows[y][x].load(Ordering::Relaxed))
        })
    }

    /// Pans the contents `distance` pixels toward the edge named by `dir`.
    /// Pixels pushed off that edge are lost; the area uncovered at the
    /// opposite edge is black.
    pub fn shift(&self, distance: usize, dir: Direction) {
        match dir {
            Direction::Up => {
                for y in 0..H {
                    self.copy_row(y.checked_add(distance), y);
                }
            }
            Direction::Down => {
                for y in (0..H).rev() {
                    self.copy_row(y.checked_sub(distance), y);
                }
            }
            Direction::Left => {
                let (bytes, bits) = (distance / 8, (distance % 8) as u32);
                for row in &self.rows {
                    for i in 0..W {
                        let hi = byte_or_zero(row, i.checked_add(bytes));
                        let lo = byte_or_zero(row, i.checked_add(bytes + 1));
                        let v = hi.checked_shl(bits).unwrap_or(0)
                            | lo.checked_shr(8 - bits).unwrap_or(0);
                        row[i].store(v, Ordering::Relaxed);
                    }
                }
            }
            Direction::Right => {
                let (bytes, bits) = (distance / 8, (distance % 8) as u32);
                for row in &self.rows {
                    for i in (0..W).rev() {
                        let lo = byte_or_zero(row, i.checked_sub(bytes));
                        let hi = byte_or_zero(
                            row,
                            i.checked_sub(bytes).and_then(|j| j.checked_sub(1)),
                        );
                        let v = lo.checked_shr(bits).unwrap_or(0)
                            | hi.checked_shl(8 - bits).unwrap_or(0);
                        row[i].store(v, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    /// Copies row `src` over row `dst`, or blanks `dst` if `src` doesn't
    /// exist.
    fn copy_row(&self, src: Option<usize>, dst: usize) {
        let src = src.and_then(|s| self.rows.get(s));
        for (x, cell) in self.rows[dst].iter().enumerate() {
            let v = src.map(|row| row[x].load(Ordering::Relaxed)).unwrap_or(0);
            cell.store(v, Ordering::Relaxed);
        }
    }

    fn locate(&self, x: usize, y: usize) -> Option<(&AtomicU8, u8)> {
        if x < Self::WIDTH && y < H {
            Some((&self.rows[y][x >> 3], 0x80 >> (x & 7)))
        } else {
            None
        }
    }
}

fn byte_or_zero(row: &[AtomicU8], index: Option<usize>) -> u8 {
    index
        .and_then(|i| row.get(i))
        .map(|cell| cell.load(Ordering::Relaxed))
        .unwrap_or(0)
}

/// Drawing algorithms in `gfx` reach the framebuffer through `set_pixel`, and
/// so honor the current color mode.
impl<const W: usize, const H: usize> gfx::Canvas for Framebuffer<W, H> {
    fn width(&self) -> usize {
        Self::WIDTH
    }

    fn height(&self) -> usize {
        H
    }

    fn plot(&self, x: usize, y: usize) {
        self.set_pixel(x, y)
    }
}
