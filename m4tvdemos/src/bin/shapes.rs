//! Line art that scrolls off the top of the screen and is redrawn.

#![no_std]
#![no_main]

#[cfg(feature = "panic-halt")]
extern crate panic_halt;
#[cfg(feature = "panic-itm")]
extern crate panic_itm;

use cortex_m::iprintln;
use stm32f4::stm32f407::interrupt;

use m4tv::{ColorMode, Direction, Fill, Standard};

/// 16x8 pixel arrow, LSB first.
static ARROW: [u8; 16] = [
    0x80, 0x01, 0x80, 0x03, 0x80, 0x07, 0xFF, 0x0F, //
    0xFF, 0x0F, 0x80, 0x07, 0x80, 0x03, 0x80, 0x01,
];

fn draw_scene(fb: &m4tv::Frame, frame: usize) {
    let w = m4tv::ROW_PIXELS;
    let h = m4tv::ROWS;

    fb.set_color_mode(ColorMode::Set);
    gfx::rect(fb, 0, 0, w, 1);
    gfx::hline(fb, 0, h - 1, w);
    gfx::vline(fb, 0, 0, h);
    gfx::vline(fb, w - 1, 0, h);

    let (cx, cy) = ((w / 2) as isize, (h / 2) as isize);
    for r in (8..40).step_by(8) {
        gfx::circle(fb, cx, cy, r);
    }
    gfx::line(fb, 0, 0, w as isize - 1, h as isize - 1);
    gfx::line(fb, w as isize - 1, 0, 0, h as isize - 1);

    gfx::bitmap(fb, &ARROW, 8 + frame % 64, 8, 16);

    fb.set_color_mode(ColorMode::Invert);
    gfx::rect(fb, cx as usize - 12, cy as usize - 6, cx as usize + 12, cy as usize + 6);
}

#[allow(unused_parens)] // TODO bug in cortex_m_rt
#[cortex_m_rt::entry]
fn main() -> ! {
    let mut cp = cortex_m::peripheral::Peripherals::take().unwrap();
    let p = stm32f4::stm32f407::Peripherals::take().unwrap();

    let tv = m4tv::init(cp.NVIC, p.FLASH, &p.DBG, p.RCC, p.GPIOB, p.GPIOE, p.TIM4)
        .begin(Standard::Ntsc);

    let t = tv.timing();
    iprintln!(
        &mut cp.ITM.stim[0],
        "video started: {} lines, active {}..{}, vscale {}",
        t.lines_per_frame,
        t.start_render_line,
        t.end_render_line,
        t.vscale
    );

    let fb = tv.frame();
    let mut frame = 0;
    loop {
        tv.sync_to_vblank();
        if frame % 128 == 0 {
            fb.clear(Fill::Black);
            draw_scene(fb, frame / 128);
        } else {
            fb.shift(1, Direction::Up);
        }
        frame += 1;
    }
}

/// Wires up the TIM4 handler expected by the driver.
#[interrupt]
fn TIM4() {
    m4tv::tim4_scan_isr()
}
