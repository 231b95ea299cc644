//! The hardware output stage, as seen by the scanline machinery.
//!
//! Everything that decides *what* happens on a scanline is portable; the
//! operations here are the only things that touch pins and timers. An
//! implementation also publishes the cycle cost of the instruction sequences
//! it runs, so that the emitters in `render` can pad each pixel to an exact
//! length.

use core::sync::atomic::AtomicU8;

use crate::render::{self, Emitter};

/// A hardware output stage able to produce composite video.
///
/// # Timing contract
///
/// The associated constants are not hints. A pixel slot is one write plus
/// its padding: `WRITE_CYCLES` covers everything in the slot except the
/// stall, and `stall(n)` must take exactly `n` for any `n` no smaller than
/// `STALL_MIN_CYCLES`. If an implementation lies about these, pixels come out
/// the wrong width, and nothing will notice.
///
/// Adapters whose primitives can't be strung together at these costs from
/// Rust (real hardware, in practice) override `emit_line` with their own
/// fixed-latency sequence, and publish the costs of *that* sequence.
pub trait Scanout {
    /// Fixed cost of one pixel slot, excluding its stall.
    const WRITE_CYCLES: u32;
    /// Cost of fetching the next framebuffer byte.
    const LOAD_CYCLES: u32;
    /// Cost of the per-byte loop back-edge.
    const LOOP_CYCLES: u32;
    /// Cycles between sampling `counter` and the first pixel write, excluding
    /// the alignment stall itself.
    const ALIGN_CYCLES: u32;
    /// Shortest stall that can be burned exactly.
    const STALL_MIN_CYCLES: u32 = 0;

    /// Drives the video pin. `true` is the "set pixel" level.
    fn set_video(&mut self, level: bool);

    /// Reads the free-running line timer: cycles elapsed since the overflow
    /// that started the current scanline.
    fn counter(&self) -> u32;

    /// Programs the width of the sync pulse. The hardware latches the new
    /// width at the next overflow, so this affects the *next* scanline.
    fn set_sync_width(&mut self, cycles: u32);

    /// Burns exactly `cycles` cycles.
    fn stall(&mut self, cycles: u32);

    /// Accounts for `cycles` spent by instructions outside this trait, such as
    /// byte loads and loop branches. Hardware spends these implicitly, so the
    /// default does nothing; simulators use it to keep their clocks honest.
    #[inline(always)]
    fn elapse(&mut self, cycles: u32) {
        let _ = cycles;
    }

    /// Emits `row` so that its first pixel lands `output_start` cycles into
    /// the line, then forces the pin low one pixel time after the last pixel.
    ///
    /// The default builds the line out of the primitives above.
    fn emit_line(
        &mut self,
        row: &[AtomicU8],
        output_start: u32,
        emitter: Emitter,
    ) where
        Self: Sized,
    {
        render::emit_line(self, row, output_start, emitter)
    }
}
