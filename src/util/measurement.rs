//! Timing measurement using GPIOs, compiled out unless the `measurement`
//! feature is set.
//!
//! Hook a logic analyzer to the pins below and the scan ISR shows up as pulses
//! next to the sync and video outputs:
//!
//! - A (C8): high for the duration of each scanline interrupt.
//! - B (C9): high while an active line is being emitted.
//!
//! This bypasses hardware ownership entirely. Don't use PC8/PC9 for anything
//! else with the feature on. On the host these are always no-ops.

/// Powers on GPIOC and makes the measurement pins outputs, if the feature is
/// enabled.
///
/// # Safety
///
/// Read-modify-writes RCC and GPIOC without any locking. Call it before
/// enabling interrupts that touch either.
pub unsafe fn init() {
    #[cfg(all(feature = "measurement", target_os = "none"))]
    {
        use stm32f4::stm32f407 as device;
        let rcc = &*device::RCC::ptr();
        let gpioc = &*device::GPIOC::ptr();

        rcc.ahb1enr.modify(|_, w| w.gpiocen().set_bit());

        gpioc
            .pupdr
            .modify(|_, w| w.pupdr8().floating().pupdr9().floating());
        gpioc.ospeedr.modify(|_, w| {
            w.ospeedr8().very_high_speed().ospeedr9().very_high_speed()
        });
        gpioc
            .moder
            .modify(|_, w| w.moder8().output().moder9().output());
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", feature = "measurement"))] {
        use stm32f4::stm32f407 as device;

        fn write_gpioc_bsrr<F>(op: F)
        where
            F: FnOnce(&mut device::gpioi::bsrr::W) -> &mut device::gpioi::bsrr::W,
        {
            // Safety: BSRR writes are atomic and only touch the named bits.
            unsafe { &*device::GPIOC::ptr() }.bsrr.write(op);
        }
    }
}

/// Raises signal A (scan ISR).
pub fn sig_a_set() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    write_gpioc_bsrr(|w| w.bs8().set_bit());
}

/// Lowers signal A.
pub fn sig_a_clear() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    write_gpioc_bsrr(|w| w.br8().set_bit());
}

/// Raises signal B (active-line emission).
pub fn sig_b_set() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    write_gpioc_bsrr(|w| w.bs9().set_bit());
}

/// Lowers signal B.
pub fn sig_b_clear() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    write_gpioc_bsrr(|w| w.br9().set_bit());
}
