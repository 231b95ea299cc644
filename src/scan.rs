//! The scanline state machine.
//!
//! A `Scanner` is advanced by exactly one scanline per timer overflow. Each
//! call to `tick` runs the handler for the current state, which may program the
//! sync width for the next line, emit a row of pixels, and pick the next state.
//!
//! Over one frame the handlers run in the order
//!
//! ```text
//! Vsync (0 .. vsync_end)
//!   -> Blank (vsync_end .. start_render)
//!   -> Active (start_render .. end_render)
//!   -> Blank (end_render .. lines_per_frame)
//!   -> Vsync (line 0 of the next frame)
//! ```
//!
//! Sync widths written here are latched by the timer at its next overflow, so
//! the width programmed by a tick belongs to the line that tick advances to.

use crate::fb::Framebuffer;
use crate::render::{self, Emitter};
use crate::scanout::Scanout;
use crate::timing::Timing;

/// Which part of the frame the scanner is in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Handler {
    /// Vertical sync pulse train.
    Vsync,
    /// Blank lines above or below the picture.
    Blank,
    /// Lines carrying framebuffer rows.
    Active,
}

/// Scanline state machine for one output device.
pub struct Scanner<'fb, const W: usize, const H: usize> {
    fb: &'fb Framebuffer<W, H>,
    timing: Timing,
    emitter: Emitter,

    scan_line: usize,
    /// Byte offset of the row being shown.
    render_offset: usize,
    /// Repeats left for the current row.
    vscale: usize,
    handler: Handler,
}

impl<'fb, const W: usize, const H: usize> Scanner<'fb, W, H> {
    /// Creates a scanner in its power-on state: past the end of a frame, in
    /// vertical sync, so that the first tick starts frame zero.
    pub fn new(
        fb: &'fb Framebuffer<W, H>,
        timing: Timing,
        emitter: Emitter,
    ) -> Self {
        Scanner {
            fb,
            timing,
            emitter,
            scan_line: timing.lines_per_frame + 1,
            render_offset: 0,
            vscale: timing.vscale,
            handler: Handler::Vsync,
        }
    }

    /// Runs the handler for one scanline. Call once per timer overflow.
    pub fn tick(&mut self, hw: &mut impl Scanout) {
        match self.handler {
            Handler::Vsync => self.vsync(hw),
            Handler::Blank => self.blank(hw),
            Handler::Active => self.active(hw),
        }
    }

    pub fn scan_line(&self) -> usize {
        self.scan_line
    }

    pub fn render_offset(&self) -> usize {
        self.render_offset
    }

    pub fn handler(&self) -> Handler {
        self.handler
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    fn vsync(&mut self, hw: &mut impl Scanout) {
        if self.scan_line >= self.timing.lines_per_frame {
            self.restart_frame(hw);
            return;
        }

        self.scan_line += 1;
        if self.scan_line == self.timing.vsync_end_line {
            hw.set_sync_width(self.timing.hsync_cycles);
            self.handler = Handler::Blank;
            self.maybe_begin_picture();
        }
    }

    fn blank(&mut self, hw: &mut impl Scanout) {
        self.scan_line += 1;
        if self.scan_line >= self.timing.lines_per_frame {
            self.restart_frame(hw);
        } else {
            self.maybe_begin_picture();
        }
    }

    fn active(&mut self, hw: &mut impl Scanout) {
        if let Some(row) = self.fb.row_at(self.render_offset) {
            render::scan_out(
                hw,
                row,
                self.timing.output_start_cycles,
                self.emitter,
            );
        }

        if self.vscale == 0 {
            self.vscale = self.timing.vscale;
            self.render_offset += W;
        } else {
            self.vscale -= 1;
        }

        self.scan_line += 1;
        if self.scan_line >= self.timing.lines_per_frame {
            self.restart_frame(hw);
        } else if self.scan_line >= self.timing.end_render_line {
            self.handler = Handler::Blank;
        }
    }

    fn maybe_begin_picture(&mut self) {
        if self.scan_line == self.timing.start_render_line
            && self.timing.start_render_line < self.timing.end_render_line
        {
            self.render_offset = 0;
            self.vscale = self.timing.vscale;
            self.handler = Handler::Active;
        }
    }

    fn restart_frame(&mut self, hw: &mut impl Scanout) {
        self.scan_line = 0;
        hw.set_sync_width(self.timing.vsync_cycles);
        self.handler = Handler::Vsync;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fb::ColorMode;
    use crate::sim::SimScanout;
    use crate::timing::{emission_ratio, Standard};

    const CPU_HZ: u32 = 16_000_000;
    type Fb = Framebuffer<20, 96>;

    fn setup(standard: Standard, fb: &Fb) -> (Scanner<'_, 20, 96>, SimScanout) {
        let timing = Timing::derive(standard, CPU_HZ, 96);
        let emitter = Emitter::for_ratio(emission_ratio(CPU_HZ, 20));
        (Scanner::new(fb, timing, emitter), SimScanout::new(40))
    }

    fn step(s: &mut Scanner<'_, 20, 96>, hw: &mut SimScanout) {
        hw.overflow();
        s.tick(hw);
    }

    /// Runs the first tick, which moves from the power-on state to line 0.
    fn power_on(s: &mut Scanner<'_, 20, 96>, hw: &mut SimScanout) {
        assert_eq!(s.scan_line(), s.timing().lines_per_frame + 1);
        assert_eq!(s.handler(), Handler::Vsync);
        step(s, hw);
        assert_eq!(s.scan_line(), 0);
        assert_eq!(s.handler(), Handler::Vsync);
    }

    #[test]
    fn ntsc_frame_sequence() {
        let fb = Fb::new();
        let (mut s, mut hw) = setup(Standard::Ntsc, &fb);
        power_on(&mut s, &mut hw);

        let start = s.timing().start_render_line;
        assert_eq!(start, 43);

        let mut states = vec![(0, s.handler())];
        for tick in 1..=262 {
            step(&mut s, &mut hw);
            states.push((tick, s.handler()));
            assert_eq!(s.scan_line(), tick % 262);
        }

        for &(line, handler) in &states {
            let expected = match line {
                0..=2 | 262 => Handler::Vsync,
                l if l < start => Handler::Blank,
                l if l < start + 192 => Handler::Active,
                _ => Handler::Blank,
            };
            assert_eq!(handler, expected, "line {}", line);
        }
    }

    #[test]
    fn each_handler_run_once_per_frame() {
        for &standard in &[Standard::Ntsc, Standard::Pal] {
            let fb = Fb::new();
            let (mut s, mut hw) = setup(standard, &fb);
            power_on(&mut s, &mut hw);

            let lines = s.timing().lines_per_frame;
            let mut runs = vec![s.handler()];
            for _ in 0..lines {
                step(&mut s, &mut hw);
                if runs.last() != Some(&s.handler()) {
                    runs.push(s.handler());
                }
                assert!(s.scan_line() < lines);
            }
            assert_eq!(
                runs,
                vec![
                    Handler::Vsync,
                    Handler::Blank,
                    Handler::Active,
                    Handler::Blank,
                    Handler::Vsync,
                ],
                "{:?}",
                standard
            );
            assert_eq!(s.scan_line(), 0);
        }
    }

    #[test]
    fn sync_widths_change_at_frame_edges() {
        let fb = Fb::new();
        let (mut s, mut hw) = setup(Standard::Ntsc, &fb);
        let (hsync, vsync) = (s.timing().hsync_cycles, s.timing().vsync_cycles);

        power_on(&mut s, &mut hw);
        assert_eq!(hw.take_sync_writes(), vec![vsync]);

        for _ in 0..3 {
            step(&mut s, &mut hw);
        }
        // The tick that leaves line 2 sets up line 3.
        assert_eq!(s.scan_line(), 3);
        assert_eq!(hw.take_sync_writes(), vec![hsync]);

        for _ in 3..261 {
            step(&mut s, &mut hw);
        }
        assert_eq!(s.scan_line(), 261);
        assert!(hw.sync_writes().is_empty());

        step(&mut s, &mut hw);
        assert_eq!(s.scan_line(), 0);
        assert_eq!(hw.take_sync_writes(), vec![vsync]);
    }

    #[test]
    fn rows_repeat_vscale_plus_one_times() {
        let fb = Fb::new();
        // Put a single dot on each row, marching right.
        fb.set_color_mode(ColorMode::Set);
        for y in 0..96 {
            fb.set_pixel(y, y);
        }

        let (mut s, mut hw) = setup(Standard::Ntsc, &fb);
        power_on(&mut s, &mut hw);
        let timing = *s.timing();
        assert_eq!(timing.vscale, 1);

        let mut shown = [0; 96];
        for _ in 0..timing.lines_per_frame {
            let line = s.scan_line();
            let was_active = s.handler() == Handler::Active;
            step(&mut s, &mut hw);

            if !was_active {
                assert!(hw.writes().is_empty(), "line {}", line);
                continue;
            }

            let row = (line - timing.start_render_line) / (timing.vscale + 1);
            let lit: Vec<usize> = hw
                .writes()
                .iter()
                .enumerate()
                .filter(|(_, w)| w.level)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(lit, vec![row], "line {}", line);
            shown[row] += 1;
        }
        assert!(shown.iter().all(|&n| n == timing.vscale + 1));
    }

    #[test]
    fn render_offset_advances_by_rows() {
        let fb = Fb::new();
        let (mut s, mut hw) = setup(Standard::Pal, &fb);
        power_on(&mut s, &mut hw);

        while s.handler() != Handler::Active {
            step(&mut s, &mut hw);
        }
        assert_eq!(s.scan_line(), 60);
        assert_eq!(s.render_offset(), 0);
        step(&mut s, &mut hw);
        assert_eq!(s.render_offset(), 0);
        step(&mut s, &mut hw);
        assert_eq!(s.render_offset(), 20);
        step(&mut s, &mut hw);
        step(&mut s, &mut hw);
        assert_eq!(s.render_offset(), 40);
    }

    #[test]
    fn empty_framebuffer_never_goes_active() {
        let fb = Framebuffer::<20, 0>::new();
        let timing = Timing::derive(Standard::Ntsc, CPU_HZ, 0);
        let mut s = Scanner::new(&fb, timing, Emitter::Shifted);
        let mut hw = SimScanout::new(40);

        for _ in 0..2 * 263 {
            hw.overflow();
            s.tick(&mut hw);
            assert_ne!(s.handler(), Handler::Active);
            assert!(hw.writes().is_empty());
            assert!(s.scan_line() < timing.lines_per_frame);
        }
    }

    #[test]
    fn picture_to_the_bottom_wraps_on_time() {
        // More rows than display lines: the picture runs to the last line.
        let fb = Framebuffer::<2, 300>::new();
        let timing = Timing::derive(Standard::Ntsc, CPU_HZ, 300);
        assert_eq!(timing.end_render_line, timing.lines_per_frame);
        let mut s = Scanner::new(&fb, timing, Emitter::Shifted);
        let mut hw = SimScanout::new(40);

        hw.overflow();
        s.tick(&mut hw);
        assert_eq!(s.scan_line(), 0);
        for _ in 0..timing.lines_per_frame - 1 {
            hw.overflow();
            s.tick(&mut hw);
        }
        assert_eq!(s.handler(), Handler::Active);
        assert_eq!(s.scan_line(), timing.lines_per_frame - 1);
        hw.overflow();
        s.tick(&mut hw);
        assert_eq!(s.scan_line(), 0);
        assert_eq!(s.handler(), Handler::Vsync);
    }

    /// Runs two whole frames of `standard` and checks that no tick, active
    /// lines included, is still working when the next overflow arrives.
    fn frames_finish_within_scanline<const W: usize>(
        standard: Standard,
        cpu_hz: u32,
        entry_latency: u32,
    ) -> Emitter {
        let fb = Framebuffer::<W, 96>::new();
        fb.set_color_mode(ColorMode::Set);
        for y in (0..96).step_by(3) {
            gfx::hline(&fb, 0, y, W * 8);
        }
        let timing = Timing::derive(standard, cpu_hz, 96);
        let emitter = Emitter::for_ratio(emission_ratio(cpu_hz, W));
        assert!(emitter.fits::<SimScanout>(), "{:?}", emitter);

        let mut s = Scanner::new(&fb, timing, emitter);
        let mut hw = SimScanout::new(entry_latency);
        let mut active = 0;
        for _ in 0..2 * timing.lines_per_frame + 1 {
            hw.overflow();
            let line = s.scan_line();
            let was_active = s.handler() == Handler::Active;
            s.tick(&mut hw);

            assert!(
                hw.counter() < timing.scanline_cycles,
                "{:?} line {} ran to {}",
                standard,
                line,
                hw.counter()
            );
            if was_active {
                active += 1;
                let writes = hw.writes();
                assert_eq!(writes.len(), W * 8 + 1);
                assert_eq!(writes[0].at, timing.output_start_cycles);
                let last = writes[W * 8];
                assert!(!last.level);
                assert!(last.at < timing.scanline_cycles);
            }
        }
        assert_eq!(active, 2 * timing.picture_lines());
        emitter
    }

    #[test]
    fn every_tick_fits_in_a_scanline() {
        for &standard in &[Standard::Ntsc, Standard::Pal] {
            for &latency in &[0, 40, 150] {
                assert_eq!(
                    frames_finish_within_scanline::<32>(standard, 16_000_000, latency),
                    Emitter::Unrolled
                );
                assert_eq!(
                    frames_finish_within_scanline::<23>(standard, 16_000_000, latency),
                    Emitter::Shifted
                );
                assert_eq!(
                    frames_finish_within_scanline::<18>(standard, 16_000_000, latency),
                    Emitter::BitCopy
                );
                assert_eq!(
                    frames_finish_within_scanline::<15>(standard, 16_000_000, latency),
                    Emitter::Padded(6)
                );
                assert_eq!(
                    frames_finish_within_scanline::<20>(standard, 80_000_000, latency),
                    Emitter::Padded(23)
                );
            }
        }
    }
}
