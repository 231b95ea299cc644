//! Monochrome drawing algorithms over a pixel-plotting canvas.
//!
//! This crate is deliberately architecture-independent to allow for testing on
//! the host. Everything here reduces to calls to `Canvas::plot`, so what
//! "plotting" means (set, clear, invert) is up to the canvas.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

/// A surface that can plot individual pixels.
///
/// Methods take `&self` so that canvases backed by shared memory (such as a
/// framebuffer being scanned out by an interrupt handler) can be drawn on
/// without exclusive access.
pub trait Canvas {
    /// Width in pixels.
    fn width(&self) -> usize;
    /// Height in pixels.
    fn height(&self) -> usize;
    /// Plots the pixel at `(x, y)`. Out-of-range coordinates must be ignored.
    fn plot(&self, x: usize, y: usize);

    /// Plots the pixel at signed coordinates, dropping it if it's off the
    /// canvas.
    fn plot_clipped(&self, x: isize, y: isize) {
        if x >= 0 && y >= 0 {
            let (x, y) = (x as usize, y as usize);
            if x < self.width() && y < self.height() {
                self.plot(x, y)
            }
        }
    }
}

/// Plots `len` pixels rightward from `(x, y)`. If any of the run would fall
/// off the canvas, nothing is drawn.
pub fn hline<C: Canvas + ?Sized>(c: &C, x: usize, y: usize, len: usize) {
    if y >= c.height() {
        return;
    }
    match x.checked_add(len) {
        Some(end) if end <= c.width() => {
            for x in x..end {
                c.plot(x, y)
            }
        }
        _ => (),
    }
}

/// Plots `len` pixels downward from `(x, y)`. If any of the run would fall
/// off the canvas, nothing is drawn.
pub fn vline<C: Canvas + ?Sized>(c: &C, x: usize, y: usize, len: usize) {
    if x >= c.width() {
        return;
    }
    match y.checked_add(len) {
        Some(end) if end <= c.height() => {
            for y in y..end {
                c.plot(x, y)
            }
        }
        _ => (),
    }
}

/// Fills the rectangle spanning `x0..x1` and `y0..y1`. The far edges are
/// exclusive. Coordinates past the canvas are pulled in to its last row or
/// column first, so a rectangle running off the edge stops one short of it.
pub fn rect<C: Canvas + ?Sized>(
    c: &C,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
) {
    let (w, h) = (c.width(), c.height());
    if w == 0 || h == 0 {
        return;
    }
    let clamp_x = |x: usize| x.min(w - 1);
    let clamp_y = |y: usize| y.min(h - 1);

    for y in clamp_y(y0)..clamp_y(y1) {
        for x in clamp_x(x0)..clamp_x(x1) {
            c.plot(x, y)
        }
    }
}

/// Draws a line from `(x0, y0)` to `(x1, y1)`, both ends included, using
/// Bresenham's algorithm. Pixels off the canvas are skipped.
pub fn line<C: Canvas + ?Sized>(
    c: &C,
    mut x0: isize,
    mut y0: isize,
    x1: isize,
    y1: isize,
) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        c.plot_clipped(x0, y0);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draws the outline of a circle centered on `(x0, y0)`.
///
/// The outermost pixels sit `radius - 1` from the center. Pixels off the
/// canvas are skipped.
pub fn circle<C: Canvas + ?Sized>(c: &C, x0: isize, y0: isize, radius: isize) {
    let mut x = radius - 1;
    let mut y = 0;
    let mut dx = 1;
    let mut dy = 1;
    let mut err = dx - 2 * radius;

    while x >= y {
        c.plot_clipped(x0 + x, y0 + y);
        c.plot_clipped(x0 + y, y0 + x);
        c.plot_clipped(x0 - y, y0 + x);
        c.plot_clipped(x0 - x, y0 + y);
        c.plot_clipped(x0 - x, y0 - y);
        c.plot_clipped(x0 - y, y0 - x);
        c.plot_clipped(x0 + y, y0 - x);
        c.plot_clipped(x0 + x, y0 - y);

        if err <= 0 {
            y += 1;
            err += dy;
            dy += 2;
        }
        if err > 0 {
            x -= 1;
            dx += 2;
            err += dx - 2 * radius;
        }
    }
}

/// Blits a packed 1bpp image with its top left corner at `(x0, y0)`.
///
/// Bits are consumed least significant first, `width` pixels per image row.
/// Only set bits are plotted; clear bits leave the canvas alone, as do
/// pixels that land off the canvas.
pub fn bitmap<C: Canvas + ?Sized>(
    c: &C,
    img: &[u8],
    x0: usize,
    y0: usize,
    width: usize,
) {
    if width == 0 {
        return;
    }
    for (i, byte) in img.iter().enumerate() {
        for bit in 0..8 {
            if *byte & (1u8 << bit) != 0 {
                let n = i * 8 + bit;
                let x = x0.checked_add(n % width);
                let y = y0.checked_add(n / width);
                if let (Some(x), Some(y)) = (x, y) {
                    if x < c.width() && y < c.height() {
                        c.plot(x, y)
                    }
                }
            }
        }
    }
}
