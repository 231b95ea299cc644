//! The STM32F407 output stage: TIM4 for line timing and sync, PE8 for video.
//!
//! Active lines go out through the fixed-latency routines in `asm/scanout.S`;
//! the cost constants below are read off those instruction sequences, and
//! must change with them.

use core::sync::atomic::AtomicU8;

use stm32f4::stm32f407 as device;

use crate::render::Emitter;
use crate::scanout::Scanout;
use crate::util::stm32::AllWriteExt;

/// BSRR word that sets PE8.
const VIDEO_SET: u32 = 1 << 8;
/// BSRR word that resets PE8.
const VIDEO_RESET: u32 = 1 << (8 + 16);

/// Work between the last pixel of a row and the blanking store, excluding
/// the stall.
const TAIL_CYCLES: u32 = 6;

/// Hardware used by the scan ISR. Owns all of GPIOE: active lines are written
/// to the whole port.
pub(super) struct Stm32Scanout {
    pub(super) tim4: device::TIM4,
    pub(super) gpioe: device::GPIOE,
}

impl Stm32Scanout {
    /// Acknowledges the TIM4 update (overflow) event that started this
    /// scanline.
    pub(super) fn ack_overflow(&self) {
        // SR bits are write-zero-to-clear; writing back the ones we read
        // leaves any other pending flag alone.
        self.tim4.sr.modify(|_, w| w.uif().clear_bit());
    }
}

impl Scanout for Stm32Scanout {
    /// Shift, store, and loading the stall length.
    const WRITE_CYCLES: u32 = 3;
    const LOAD_CYCLES: u32 = 2;
    /// Count down, untaken exit branch, and the branch back.
    const LOOP_CYCLES: u32 = 4;
    /// Counter read across the APB1 bridge, the arithmetic and checks on it,
    /// the jump into the pixel loop, and the first shift.
    const ALIGN_CYCLES: u32 = 13;
    const STALL_MIN_CYCLES: u32 = 10;

    #[inline(always)]
    fn set_video(&mut self, level: bool) {
        let word = if level { VIDEO_SET } else { VIDEO_RESET };
        self.gpioe.bsrr.write(|w| w.bits_ext(word));
    }

    #[inline(always)]
    fn counter(&self) -> u32 {
        self.tim4.cnt.read().bits() & 0xFFFF
    }

    fn set_sync_width(&mut self, cycles: u32) {
        // PWM1 with an inverted output holds the pin low while CNT < CCR1, so
        // a width of `cycles` needs one extra count.
        self.tim4.ccr1.write(|w| w.ccr1().bits(cycles + 1));
    }

    /// Exact from the call instruction through the return. Requests shorter
    /// than `STALL_MIN_CYCLES` do nothing.
    fn stall(&mut self, cycles: u32) {
        if cycles >= Self::STALL_MIN_CYCLES {
            // Safety: the routine touches nothing but r0 and the flags, and
            // terminates for any count at or above the minimum.
            unsafe { m4tv_stall(cycles) }
        }
    }

    fn emit_line(
        &mut self,
        row: &[AtomicU8],
        output_start: u32,
        emitter: Emitter,
    ) {
        // The const checks in the driver rule out an emitter that doesn't
        // fit, but if one shows up anyway, a blank line beats a hung ISR.
        if row.is_empty() || !emitter.fits::<Self>() {
            self.set_video(false);
            return;
        }

        let cpp = emitter.cycles_per_pixel();
        let params = LineParams {
            odr: &self.gpioe.odr as *const _ as *mut u32,
            cnt: &self.tim4.cnt as *const _ as *const u32,
            start: output_start.saturating_sub(Self::ALIGN_CYCLES),
            inner: cpp - Self::WRITE_CYCLES,
            seam: cpp
                - (Self::WRITE_CYCLES + Self::LOAD_CYCLES + Self::LOOP_CYCLES),
            tail: cpp - TAIL_CYCLES,
        };

        // Safety: `row` is nonempty and `AtomicU8` has the layout of `u8`.
        // Both register pointers belong to peripherals we own, and `fits`
        // holding means every stall is at least `STALL_MIN_CYCLES`.
        unsafe {
            m4tv_scan_padded(row.as_ptr() as *const u8, row.len(), &params)
        }
    }
}

/// Mirrors `struct line_params` in `asm/scanout.S`.
#[repr(C)]
struct LineParams {
    odr: *mut u32,
    cnt: *const u32,
    start: u32,
    inner: u32,
    seam: u32,
    tail: u32,
}

extern "C" {
    fn m4tv_stall(cycles: u32);
    fn m4tv_scan_padded(row: *const u8, bytes: usize, params: *const LineParams);
}
