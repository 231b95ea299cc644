//! Active-line rendering: turning one framebuffer row into a timed waveform.
//!
//! A line is emitted in two steps. First we burn however many cycles it takes
//! to get from "now" (read off the line timer) to the fixed point where the
//! picture starts, which absorbs interrupt entry jitter. Then one of the
//! emitters below shifts the row out to the video pin, one write per pixel,
//! every write the same number of cycles after the one before it.
//!
//! Which emitter is used depends on how many CPU cycles each pixel gets. That
//! ratio is fixed by the clock and framebuffer width, so the choice is made
//! once, at build time, by `Emitter::for_ratio`.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::scanout::Scanout;
use crate::util::measurement;

/// Number of cycles to stall so that the first pixel lands `target` cycles
/// after the start of the line, given that `elapsed` cycles have passed
/// already and `overhead` more will pass between the counter sample and the
/// first write.
///
/// If we're already late, the answer is zero and the line starts late.
pub const fn alignment_stall(target: u32, elapsed: u32, overhead: u32) -> u32 {
    target.saturating_sub(elapsed.saturating_add(overhead))
}

/// Emits one row, starting at `output_start` cycles into the line, and leaves
/// the video pin low.
pub fn scan_out<H: Scanout>(
    hw: &mut H,
    row: &[AtomicU8],
    output_start: u32,
    emitter: Emitter,
) {
    measurement::sig_b_set();
    hw.emit_line(row, output_start, emitter);
    measurement::sig_b_clear();
}

/// Active line built from `H`'s primitives: align on the counter, run the
/// emitter, blank. This is what `Scanout::emit_line` does unless the adapter
/// brings its own sequence.
pub fn emit_line<H: Scanout>(
    hw: &mut H,
    row: &[AtomicU8],
    output_start: u32,
    emitter: Emitter,
) {
    let elapsed = hw.counter();
    hw.stall(alignment_stall(output_start, elapsed, H::ALIGN_CYCLES));

    emitter.emit(hw, row);
    // Blank before the next sync, whatever the last pixel was.
    hw.set_video(false);
}

/// Bit-emission strategies, from fastest to slowest.
///
/// Each one writes one pixel every `cycles_per_pixel()` cycles, and folds the
/// cost of loading the next byte and branching back into the last pixel of
/// each byte so the seam doesn't show.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Emitter {
    /// Three cycles per pixel, pulling pixels off the top of a shift
    /// register with no padding at all. Only adapters whose write, load and
    /// branch add up to three cycles can run it.
    Unrolled,
    /// Four cycles per pixel, shifting the byte out MSB first.
    Shifted,
    /// Five cycles per pixel, testing each bit in place.
    BitCopy,
    /// Any slower rate: bit tests padded out to the given number of cycles.
    Padded(u32),
}

impl Emitter {
    /// Picks the strategy for a given emission ratio (cycles available per
    /// pixel). Ratios under three can't be met; those get the fastest
    /// strategy we have, and the picture runs wide.
    pub const fn for_ratio(ratio: u32) -> Self {
        match ratio {
            0..=3 => Emitter::Unrolled,
            4 => Emitter::Shifted,
            5 => Emitter::BitCopy,
            n => Emitter::Padded(n),
        }
    }

    /// Cycles between consecutive pixel writes.
    pub const fn cycles_per_pixel(self) -> u32 {
        match self {
            Emitter::Unrolled => 3,
            Emitter::Shifted => 4,
            Emitter::BitCopy => 5,
            Emitter::Padded(n) => n,
        }
    }

    /// Checks that `H`'s instruction costs leave room for this strategy: the
    /// last pixel of a byte has to cover its own write, the next load, the
    /// loop branch, and a stall `H` can actually produce.
    pub const fn fits<H: Scanout>(self) -> bool {
        let seam_work = H::WRITE_CYCLES + H::LOAD_CYCLES + H::LOOP_CYCLES;
        let cpp = self.cycles_per_pixel();
        if cpp < seam_work {
            return false;
        }
        let seam = cpp - seam_work;
        let inner = cpp - H::WRITE_CYCLES;
        stall_ok::<H>(seam) && stall_ok::<H>(inner)
    }

    /// Writes every pixel of `row` to the video pin, MSB of the first byte
    /// first. Leaves the pin at the level of the last pixel, after holding it
    /// for a full pixel time.
    pub fn emit<H: Scanout>(self, hw: &mut H, row: &[AtomicU8]) {
        let slot = Slot::for_strategy::<H>(self);
        match self {
            Emitter::Unrolled | Emitter::Shifted => {
                emit_bytes(hw, row, slot, |shifter, _| {
                    let level = *shifter & 0x80 != 0;
                    *shifter <<= 1;
                    level
                })
            }
            Emitter::BitCopy | Emitter::Padded(_) => {
                emit_bytes(hw, row, slot, |byte, bit| {
                    *byte & (0x80u8 >> bit) != 0
                })
            }
        }
    }
}

/// A zero stall is skipped outright; anything else has to be long enough for
/// `H` to burn exactly.
const fn stall_ok<H: Scanout>(cycles: u32) -> bool {
    cycles == 0 || cycles >= H::STALL_MIN_CYCLES
}

/// Stall lengths that make every pixel slot come out the same width.
#[derive(Copy, Clone, Debug)]
struct Slot {
    /// After a write within a byte.
    inner: u32,
    /// After the last write of a byte that's followed by another.
    seam: u32,
}

impl Slot {
    fn for_strategy<H: Scanout>(e: Emitter) -> Self {
        let cpp = e.cycles_per_pixel();
        Slot {
            inner: cpp.saturating_sub(H::WRITE_CYCLES),
            seam: cpp.saturating_sub(
                H::WRITE_CYCLES + H::LOAD_CYCLES + H::LOOP_CYCLES,
            ),
        }
    }
}

fn emit_bytes<H: Scanout>(
    hw: &mut H,
    row: &[AtomicU8],
    slot: Slot,
    mut extract: impl FnMut(&mut u8, u32) -> bool,
) {
    let last = row.len().saturating_sub(1);
    for (n, cell) in row.iter().enumerate() {
        if n != 0 {
            hw.elapse(H::LOOP_CYCLES);
        }
        let mut byte = cell.load(Ordering::Relaxed);
        hw.elapse(H::LOAD_CYCLES);

        for bit in 0..8 {
            hw.set_video(extract(&mut byte, bit));
            hw.stall(if bit == 7 && n != last {
                slot.seam
            } else {
                slot.inner
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimScanout;

    fn row(bytes: &[u8]) -> Vec<AtomicU8> {
        bytes.iter().map(|&b| AtomicU8::new(b)).collect()
    }

    fn all() -> [Emitter; 5] {
        [
            Emitter::Unrolled,
            Emitter::Shifted,
            Emitter::BitCopy,
            Emitter::Padded(6),
            Emitter::Padded(23),
        ]
    }

    #[test]
    fn strategy_selection() {
        assert_eq!(Emitter::for_ratio(0), Emitter::Unrolled);
        assert_eq!(Emitter::for_ratio(3), Emitter::Unrolled);
        assert_eq!(Emitter::for_ratio(4), Emitter::Shifted);
        assert_eq!(Emitter::for_ratio(5), Emitter::BitCopy);
        assert_eq!(Emitter::for_ratio(6), Emitter::Padded(6));
        assert_eq!(Emitter::for_ratio(23), Emitter::Padded(23));
    }

    #[test]
    fn simulator_fits_every_strategy() {
        for &e in &all() {
            assert!(e.fits::<SimScanout>(), "{:?}", e);
        }
    }

    #[test]
    fn alignment_arithmetic() {
        assert_eq!(alignment_stall(191, 40, 2), 149);
        assert_eq!(alignment_stall(191, 189, 2), 0);
        // Late: start immediately.
        assert_eq!(alignment_stall(191, 250, 2), 0);
        assert_eq!(alignment_stall(10, u32::MAX, 2), 0);
    }

    #[test]
    fn pixels_come_out_msb_first() {
        let data = [0b1010_0000, 0xFF, 0x00, 0b0000_0001];
        for &e in &all() {
            let mut hw = SimScanout::new(30);
            hw.overflow();
            e.emit(&mut hw, &row(&data));
            let levels: Vec<bool> = hw.writes().iter().map(|w| w.level).collect();
            let expected: Vec<bool> = data
                .iter()
                .flat_map(|&b| (0..8).map(move |i| b & (0x80u8 >> i) != 0))
                .collect();
            assert_eq!(levels, expected, "{:?}", e);
        }
    }

    #[test]
    fn writes_are_evenly_spaced() {
        let data = [0x5A; 20];
        for &e in &all() {
            let mut hw = SimScanout::new(30);
            hw.overflow();
            e.emit(&mut hw, &row(&data));
            let writes = hw.writes();
            assert_eq!(writes.len(), 160);
            for pair in writes.windows(2) {
                assert_eq!(
                    pair[1].at - pair[0].at,
                    e.cycles_per_pixel(),
                    "{:?} at {}",
                    e,
                    pair[0].at
                );
            }
        }
    }

    #[test]
    fn scan_out_aligns_and_blanks() {
        let data = [0xFF; 20];
        for &e in &all() {
            for &latency in &[0, 17, 42, 90] {
                let mut hw = SimScanout::new(latency);
                hw.overflow();
                scan_out(&mut hw, &row(&data), 191, e);

                let writes = hw.writes();
                assert_eq!(writes.len(), 161);
                // First pixel lands on the mark regardless of entry latency.
                assert_eq!(writes[0].at, 191, "{:?} latency {}", e, latency);
                // The pin ends low, one full pixel after the last pixel.
                let blank = writes[160];
                assert!(!blank.level);
                assert_eq!(blank.at - writes[159].at, e.cycles_per_pixel());
                assert!(!hw.video());
            }
        }
    }

    #[test]
    fn late_lines_start_late() {
        let mut hw = SimScanout::new(250);
        hw.overflow();
        scan_out(&mut hw, &row(&[0xFF]), 191, Emitter::Shifted);
        assert_eq!(hw.writes()[0].at, 250 + SimScanout::ALIGN_CYCLES);
    }

    #[test]
    fn empty_row_just_blanks() {
        let mut hw = SimScanout::new(10);
        hw.overflow();
        scan_out(&mut hw, &row(&[]), 100, Emitter::BitCopy);
        assert_eq!(hw.writes().len(), 1);
        assert!(!hw.video());
    }

    /// Simulator with an adjustable loop branch cost, which also tallies the
    /// cycles spent outside writes and stalls.
    struct Branchy<const LOOP: u32> {
        sim: SimScanout,
        elapsed: u32,
    }

    impl<const LOOP: u32> Branchy<LOOP> {
        fn new() -> Self {
            let mut sim = SimScanout::new(0);
            sim.overflow();
            Branchy { sim, elapsed: 0 }
        }
    }

    impl<const LOOP: u32> Scanout for Branchy<LOOP> {
        const WRITE_CYCLES: u32 = SimScanout::WRITE_CYCLES;
        const LOAD_CYCLES: u32 = SimScanout::LOAD_CYCLES;
        const LOOP_CYCLES: u32 = LOOP;
        const ALIGN_CYCLES: u32 = SimScanout::ALIGN_CYCLES;

        fn set_video(&mut self, level: bool) {
            self.sim.set_video(level)
        }
        fn counter(&self) -> u32 {
            self.sim.counter()
        }
        fn set_sync_width(&mut self, cycles: u32) {
            self.sim.set_sync_width(cycles)
        }
        fn stall(&mut self, cycles: u32) {
            self.sim.stall(cycles)
        }
        fn elapse(&mut self, cycles: u32) {
            self.elapsed += cycles;
            self.sim.elapse(cycles)
        }
    }

    fn assert_even<const LOOP: u32>(e: Emitter, hw: &Branchy<LOOP>) {
        let writes = hw.sim.writes();
        for pair in writes.windows(2) {
            assert_eq!(pair[1].at - pair[0].at, e.cycles_per_pixel(), "{:?}", e);
        }
    }

    #[test]
    fn unrolled_pays_for_its_seams() {
        let data = [0xA5; 20];
        let mut hw = Branchy::<1>::new();
        assert!(Emitter::Unrolled.fits::<Branchy<1>>());
        Emitter::Unrolled.emit(&mut hw, &row(&data));

        assert_eq!(hw.sim.writes().len(), 160);
        assert_even(Emitter::Unrolled, &hw);
        // A load for each byte and a branch at each of the 19 seams.
        assert_eq!(hw.elapsed, 20 * SimScanout::LOAD_CYCLES + 19);
        // The first load comes before the first write.
        assert_eq!(hw.counter(), SimScanout::LOAD_CYCLES + 160 * 3);

        // One more cycle of branch and there's no room left.
        assert!(!Emitter::Unrolled.fits::<Branchy<2>>());
    }

    #[test]
    fn slow_branches_push_out_faster_strategies() {
        assert!(!Emitter::Unrolled.fits::<Branchy<3>>());
        assert!(!Emitter::Shifted.fits::<Branchy<3>>());
        assert!(Emitter::BitCopy.fits::<Branchy<3>>());

        let data = [0x3C, 0x00, 0xFF, 0x81];
        for &e in &[Emitter::BitCopy, Emitter::Padded(6)] {
            let mut hw = Branchy::<3>::new();
            e.emit(&mut hw, &row(&data));
            assert_eq!(hw.sim.writes().len(), 32);
            assert_even(e, &hw);
            assert_eq!(hw.elapsed, 4 * SimScanout::LOAD_CYCLES + 3 * 3);
            assert_eq!(
                hw.counter(),
                SimScanout::LOAD_CYCLES + 32 * e.cycles_per_pixel()
            );
        }
    }

    /// Adapter whose stalls can't be shorter than 10 cycles.
    struct Coarse(SimScanout);

    impl Scanout for Coarse {
        const WRITE_CYCLES: u32 = 3;
        const LOAD_CYCLES: u32 = 2;
        const LOOP_CYCLES: u32 = 4;
        const ALIGN_CYCLES: u32 = 11;
        const STALL_MIN_CYCLES: u32 = 10;

        fn set_video(&mut self, level: bool) {
            self.0.set_video(level);
            self.0.elapse(Self::WRITE_CYCLES - SimScanout::WRITE_CYCLES);
        }
        fn counter(&self) -> u32 {
            self.0.counter()
        }
        fn set_sync_width(&mut self, cycles: u32) {
            self.0.set_sync_width(cycles)
        }
        fn stall(&mut self, cycles: u32) {
            assert!(cycles == 0 || cycles >= Self::STALL_MIN_CYCLES);
            self.0.stall(cycles)
        }
        fn elapse(&mut self, cycles: u32) {
            self.0.elapse(cycles)
        }
    }

    #[test]
    fn minimum_stall_limits_strategies() {
        // The seam needs 9 cycles of work plus a stall of at least 10.
        assert!(!Emitter::Padded(9).fits::<Coarse>());
        assert!(!Emitter::Padded(18).fits::<Coarse>());
        assert!(Emitter::Padded(19).fits::<Coarse>());
        assert!(Emitter::Padded(23).fits::<Coarse>());

        let mut hw = Coarse(SimScanout::new(0));
        hw.0.overflow();
        Emitter::Padded(19).emit(&mut hw, &row(&[0x96, 0x69, 0x0F]));
        let writes = hw.0.writes();
        assert_eq!(writes.len(), 24);
        for pair in writes.windows(2) {
            assert_eq!(pair[1].at - pair[0].at, 19);
        }
    }
}
