//! Interrupt handler for the scanline timer.

use core::sync::atomic::Ordering;

use super::{acquire_hw, Shared, LINE, SHARED};
use crate::util::measurement;

/// Scanline ISR: call this from `TIM4`.
///
/// The driver does nothing without it. In the simplest case your application
/// needs code like the following:
///
/// ```ignore
/// use stm32f4::stm32f407::interrupt;
///
/// #[interrupt]
/// fn TIM4() {
///     m4tv::tim4_scan_isr()
/// }
/// ```
pub fn tim4_scan_isr() {
    measurement::sig_a_set();

    let mut shared = acquire_hw(&SHARED);
    let Shared { scanner, hw } = &mut *shared;

    hw.ack_overflow();
    scanner.tick(hw);
    LINE.store(scanner.scan_line(), Ordering::Relaxed);

    drop(shared);
    measurement::sig_a_clear();
}
