//! NVIC operations with completion guarantees.
//!
//! `cortex_m`'s `NVIC::enable` and friends return as soon as the register
//! write is issued, which on a Cortex-M4 is not the same as the change taking
//! effect. These wrappers add the barriers recommended by *ARM Cortex-M
//! Programming Guide to Memory Barrier Instructions* so that the change is
//! visible to the very next instruction.

use cortex_m::interrupt::Nr;
use cortex_m::peripheral::NVIC;

fn settle() {
    cortex_m::asm::dmb();
    cortex_m::asm::isb();
}

/// Enables `i`. If it was pending (and priorities allow), its handler has run
/// by the time this returns.
pub fn enable_irq(nvic: &mut NVIC, i: impl Nr) {
    nvic.enable(i);
    settle();
}

/// Disables `i`. The caller can't be preempted by it after this returns.
pub fn disable_irq(nvic: &mut NVIC, i: impl Nr) {
    nvic.disable(i);
    settle();
}

/// Clears a pending `i`. A peripheral still asserting the IRQ will pend it
/// again.
pub fn clear_pending_irq(i: impl Nr) {
    NVIC::unpend(i);
    settle();
}
