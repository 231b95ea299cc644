//! Static pattern for checking geometry on a set: a one-pixel border, a
//! checkerboard, and alternating single-pixel columns for checking pixel
//! width. Blinks once a second by inverting the whole frame.

#![no_std]
#![no_main]

#[cfg(feature = "panic-halt")]
extern crate panic_halt;
#[cfg(feature = "panic-itm")]
extern crate panic_itm;

use stm32f4::stm32f407::interrupt;

use m4tv::{ColorMode, Fill, Standard};

#[allow(unused_parens)] // TODO bug in cortex_m_rt
#[cortex_m_rt::entry]
fn main() -> ! {
    let tv = m4tv::take_hardware().begin(Standard::Pal);
    let fb = tv.frame();
    let (w, h) = (m4tv::ROW_PIXELS, m4tv::ROWS);

    fb.set_color_mode(ColorMode::Set);
    gfx::hline(fb, 0, 0, w);
    gfx::hline(fb, 0, h - 1, w);
    gfx::vline(fb, 0, 0, h);
    gfx::vline(fb, w - 1, 0, h);

    for y in (8..h / 2).step_by(8) {
        for x in (8..w / 2).step_by(8) {
            if (x / 8 + y / 8) % 2 == 0 {
                gfx::rect(fb, x, y, x + 8, y + 8);
            }
        }
    }
    for x in (w / 2 + 8..w - 8).step_by(2) {
        gfx::vline(fb, x, h / 2 + 8, h / 2 - 16);
    }

    let mut frame = 0;
    loop {
        tv.sync_to_vblank();
        frame += 1;
        // PAL runs at 50 frames per second.
        if frame % 50 == 0 {
            fb.clear(Fill::Invert);
        }
    }
}

/// Wires up the TIM4 handler expected by the driver.
#[interrupt]
fn TIM4() {
    m4tv::tim4_scan_isr()
}
