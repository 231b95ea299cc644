//! Composite (NTSC/PAL) video from one timer and two pins.
//!
//! The portable parts of the engine -- timing derivation, the scanline state
//! machine, the active-line emitters and the framebuffer -- build anywhere and
//! are tested on the host against a simulated output stage. The STM32F407
//! driver that wires them to real hardware is only built for bare-metal
//! targets.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod fb;
pub mod render;
pub mod scan;
pub mod scanout;
pub mod timing;
pub mod util;

#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use crate::fb::{ColorMode, Direction, Fill, Framebuffer};
pub use crate::timing::Standard;

/// Bytes per framebuffer row. Each byte holds eight pixels, MSB on the left.
pub const ROW_BYTES: usize = 20;

/// Visible pixels per line.
pub const ROW_PIXELS: usize = ROW_BYTES * 8;

/// Framebuffer rows. Each is repeated on `vscale + 1` consecutive scanlines to
/// fill the display area.
pub const ROWS: usize = 96;

/// Framebuffer type at the configured geometry.
pub type Frame = Framebuffer<ROW_BYTES, ROWS>;

/// The framebuffer scanned out by the driver.
///
/// Drawing into it from thread mode while video runs is fine, but not
/// synchronized with scanout: a row changed while it is being emitted may show
/// up torn for one frame. Use `sync_to_vblank` if that matters.
pub static FRAME: Frame = Frame::new();

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        mod driver;
        pub use driver::*;
    }
}
