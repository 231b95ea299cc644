//! Definition of broadcast timing and its derivation in CPU cycles.
//!
//! Everything here is `const fn` so that a driver can resolve its timing at
//! build time; nothing in the interrupt path touches floating point.

/// Width of the horizontal sync pulse, shared by both standards.
pub const HSYNC_NS: u32 = 4_700;

/// Width of each pulse in the vertical sync train, shared by both standards.
pub const VSYNC_NS: u32 = 58_850;

/// Portion of each scanline used for picture data.
pub const ACTIVE_NS: u32 = 46_000;

/// Analog broadcast standards we can produce.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Standard {
    Ntsc,
    Pal,
}

impl Standard {
    /// Nominal timing table for this standard.
    pub const fn nominal(self) -> Nominal {
        match self {
            Standard::Ntsc => NTSC,
            Standard::Pal => PAL,
        }
    }
}

/// Nominal (wall-clock) timing of one standard, before conversion to cycles.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Nominal {
    /// Duration of one scanline, including sync and blanking.
    pub scanline_ns: u32,
    /// Delay from the start of a scanline to the first visible pixel.
    pub output_start_ns: u32,
    /// Total scanlines per frame.
    pub lines_per_frame: usize,
    /// First line *after* the vertical sync train.
    pub vsync_end_line: usize,
    /// Lines available for picture data.
    pub display_lines: usize,
    /// Lines added to the centered start of picture data. Used to nudge the
    /// image down on NTSC sets, which tend to overscan the top.
    pub render_offset: usize,
}

/// NTSC: 262 lines at 63.55us.
pub const NTSC: Nominal = Nominal {
    scanline_ns: 63_550,
    output_start_ns: 12_000,
    lines_per_frame: 262,
    vsync_end_line: 3,
    display_lines: 216,
    render_offset: 8,
};

/// PAL: 312 lines at 64us.
pub const PAL: Nominal = Nominal {
    scanline_ns: 64_000,
    output_start_ns: 12_500,
    lines_per_frame: 312,
    vsync_end_line: 7,
    display_lines: 260,
    render_offset: 0,
};

/// Timing for one standard, expressed in the units the driver consumes:
/// timer cycles for horizontal events, line numbers for vertical ones.
///
/// Cycle counts carry the `- 1` adjustment the timer wants for its period and
/// compare registers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timing {
    /// Timer period of one scanline.
    pub scanline_cycles: u32,
    /// Sync pulse width on ordinary lines.
    pub hsync_cycles: u32,
    /// Sync pulse width during the vertical sync train.
    pub vsync_cycles: u32,
    /// Cycles from the start of a line to its first pixel edge.
    pub output_start_cycles: u32,

    /// Total scanlines per frame.
    pub lines_per_frame: usize,
    /// First line after the vertical sync train.
    pub vsync_end_line: usize,
    /// Lines available for picture data.
    pub display_lines: usize,
    /// Number of *extra* times each framebuffer row is shown. A row appears on
    /// `vscale + 1` consecutive lines.
    pub vscale: usize,
    /// First line carrying picture data.
    pub start_render_line: usize,
    /// First line after picture data.
    pub end_render_line: usize,
}

impl Timing {
    /// Derives timing for `standard` on a CPU running at `cpu_hz`, displaying
    /// a framebuffer of `rows` rows.
    ///
    /// If `display_lines` is not a multiple of `rows`, the vertical scale is
    /// truncated and the picture comes out slightly shorter than the display
    /// area. This is deliberate: the resulting pixel mapping is what existing
    /// content was drawn against.
    pub const fn derive(standard: Standard, cpu_hz: u32, rows: usize) -> Self {
        let n = standard.nominal();

        let vscale = if rows == 0 {
            0
        } else {
            (n.display_lines / rows).saturating_sub(1)
        };
        let picture_lines = rows * (vscale + 1);

        let mid = (n.lines_per_frame - n.display_lines) / 2 + n.display_lines / 2;
        let start_render_line =
            mid.saturating_sub(picture_lines / 2) + n.render_offset;
        let end_render_line = min(
            start_render_line + picture_lines,
            n.lines_per_frame,
        );

        Timing {
            scanline_cycles: ns_to_cycles(n.scanline_ns, cpu_hz),
            hsync_cycles: ns_to_cycles(HSYNC_NS, cpu_hz),
            vsync_cycles: ns_to_cycles(VSYNC_NS, cpu_hz),
            output_start_cycles: ns_to_cycles(n.output_start_ns, cpu_hz),
            lines_per_frame: n.lines_per_frame,
            vsync_end_line: n.vsync_end_line,
            display_lines: n.display_lines,
            vscale,
            start_render_line,
            end_render_line,
        }
    }

    /// Number of lines carrying picture data.
    pub const fn picture_lines(&self) -> usize {
        self.end_render_line - self.start_render_line
    }
}

/// Whole CPU cycles per microsecond. Fractional megahertz are dropped, as
/// they would be by any integer clock configuration.
pub const fn cycles_per_us(cpu_hz: u32) -> u32 {
    cpu_hz / 1_000_000
}

/// Converts a nominal duration to a timer register value (cycles minus one).
pub const fn ns_to_cycles(ns: u32, cpu_hz: u32) -> u32 {
    (ns * cycles_per_us(cpu_hz) / 1000).saturating_sub(1)
}

/// Cycles available per displayed pixel when `row_bytes * 8` pixels are
/// spread over the active portion of the line. This selects the emitter; see
/// `render::Emitter::for_ratio`.
pub const fn emission_ratio(cpu_hz: u32, row_bytes: usize) -> u32 {
    let pixels = (row_bytes * 8) as u32;
    if pixels == 0 {
        0
    } else {
        ACTIVE_NS / 1000 * cycles_per_us(cpu_hz) / pixels
    }
}

const fn min(a: usize, b: usize) -> usize {
    if a < b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntsc_at_16mhz() {
        let t = Timing::derive(Standard::Ntsc, 16_000_000, 96);
        // 63.55 * 16 - 1 = 1015.8
        assert_eq!(t.scanline_cycles, 1015);
        // 4.7 * 16 - 1 = 74.2
        assert_eq!(t.hsync_cycles, 74);
        // 58.85 * 16 - 1 = 940.6
        assert_eq!(t.vsync_cycles, 940);
        assert_eq!(t.output_start_cycles, 191);
        assert_eq!(t.lines_per_frame, 262);
        assert_eq!(t.vsync_end_line, 3);
        assert_eq!(t.display_lines, 216);
        assert_eq!(t.vscale, 1);
        // Middle line is 23 + 108 = 131, minus half of 192, plus 8.
        assert_eq!(t.start_render_line, 43);
        assert_eq!(t.end_render_line, 43 + 192);
    }

    #[test]
    fn pal_at_16mhz() {
        let t = Timing::derive(Standard::Pal, 16_000_000, 96);
        assert_eq!(t.scanline_cycles, 1023);
        assert_eq!(t.output_start_cycles, 199);
        assert_eq!(t.lines_per_frame, 312);
        assert_eq!(t.vsync_end_line, 7);
        assert_eq!(t.vscale, 1);
        // Middle line is 26 + 130 = 156, minus half of 192.
        assert_eq!(t.start_render_line, 60);
        assert_eq!(t.picture_lines(), 192);
    }

    #[test]
    fn sync_widths_are_shared() {
        let ntsc = Timing::derive(Standard::Ntsc, 80_000_000, 96);
        let pal = Timing::derive(Standard::Pal, 80_000_000, 96);
        assert_eq!(ntsc.hsync_cycles, pal.hsync_cycles);
        assert_eq!(ntsc.vsync_cycles, pal.vsync_cycles);
        assert_eq!(ntsc.hsync_cycles, 375);
        assert_eq!(ntsc.scanline_cycles, 5083);
    }

    #[test]
    fn vscale_truncates() {
        // 216 / 100 = 2.16 -> each row shown twice, 200 lines used.
        let t = Timing::derive(Standard::Ntsc, 16_000_000, 100);
        assert_eq!(t.vscale, 1);
        assert_eq!(t.picture_lines(), 200);
        assert!(t.picture_lines() < t.display_lines);

        // 260 / 48 = 5.4 -> five repeats of each row.
        let t = Timing::derive(Standard::Pal, 16_000_000, 48);
        assert_eq!(t.vscale, 4);
        assert_eq!(t.picture_lines(), 240);
    }

    #[test]
    fn even_division_fills_display() {
        let t = Timing::derive(Standard::Ntsc, 16_000_000, 108);
        assert_eq!(t.vscale, 1);
        assert_eq!(t.picture_lines(), t.display_lines);
        let t = Timing::derive(Standard::Pal, 16_000_000, 130);
        assert_eq!(t.picture_lines(), t.display_lines);
    }

    #[test]
    fn oversized_framebuffer_is_clamped() {
        let t = Timing::derive(Standard::Ntsc, 16_000_000, 300);
        assert_eq!(t.vscale, 0);
        assert_eq!(t.end_render_line, t.lines_per_frame);
    }

    #[test]
    fn emission_ratios() {
        // 46us * 16 cycles / 160 pixels = 4.6
        assert_eq!(emission_ratio(16_000_000, 20), 4);
        assert_eq!(emission_ratio(20_000_000, 20), 5);
        assert_eq!(emission_ratio(16_000_000, 30), 3);
        assert_eq!(emission_ratio(80_000_000, 20), 23);
    }
}
