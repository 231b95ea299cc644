//! A cycle-counting stand-in for the output hardware.
//!
//! `SimScanout` keeps a clock measured from the most recent timer overflow and
//! advances it by exactly what each operation is declared to cost, recording
//! every pin write and sync reprogramming along the way. That's enough to
//! check pixel spacing, alignment and frame sequencing on the host.

use crate::scanout::Scanout;

/// One write to the video pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Write {
    /// Cycles since the start of the scanline.
    pub at: u32,
    pub level: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SimScanout {
    /// Cycles between a timer overflow and the first instruction of the
    /// handler it triggers.
    entry_latency: u32,
    now: u32,
    video: bool,
    sync_width: Option<u32>,
    writes: Vec<Write>,
    sync_writes: Vec<u32>,
}

impl SimScanout {
    pub fn new(entry_latency: u32) -> Self {
        SimScanout {
            entry_latency,
            ..Self::default()
        }
    }

    /// Starts a new scanline: rewinds the clock to the handler entry point and
    /// forgets the previous line's pin writes.
    pub fn overflow(&mut self) {
        self.now = self.entry_latency;
        self.writes.clear();
    }

    /// Changes the entry latency for subsequent scanlines.
    pub fn set_entry_latency(&mut self, cycles: u32) {
        self.entry_latency = cycles;
    }

    /// Pin writes made since the last `overflow`.
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Current level of the video pin.
    pub fn video(&self) -> bool {
        self.video
    }

    /// Last sync width programmed, if any.
    pub fn sync_width(&self) -> Option<u32> {
        self.sync_width
    }

    /// Every sync width ever programmed, in order. Unlike `writes`, this is
    /// not reset by `overflow`; use `take_sync_writes` to drain it.
    pub fn sync_writes(&self) -> &[u32] {
        &self.sync_writes
    }

    pub fn take_sync_writes(&mut self) -> Vec<u32> {
        core::mem::replace(&mut self.sync_writes, Vec::new())
    }
}

impl Scanout for SimScanout {
    const WRITE_CYCLES: u32 = 1;
    const LOAD_CYCLES: u32 = 1;
    const LOOP_CYCLES: u32 = 1;
    // The first byte load.
    const ALIGN_CYCLES: u32 = 1;

    fn set_video(&mut self, level: bool) {
        self.writes.push(Write {
            at: self.now,
            level,
        });
        self.video = level;
        self.now += Self::WRITE_CYCLES;
    }

    fn counter(&self) -> u32 {
        self.now
    }

    fn set_sync_width(&mut self, cycles: u32) {
        self.sync_width = Some(cycles);
        self.sync_writes.push(cycles);
    }

    fn stall(&mut self, cycles: u32) {
        self.now += cycles;
    }

    fn elapse(&mut self, cycles: u32) {
        self.now += cycles;
    }
}
