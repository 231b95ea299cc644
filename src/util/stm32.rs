//! Augmented STM32 operations.
//!
//! Extensions and workarounds for the `stm32f4` crate, covering the pieces the
//! video driver needs: clock tree setup, and typed access to the timer and
//! GPIO fields the PAC leaves unmodeled or `unsafe`.

use stm32f4::stm32f407 as device;

/// Clock config parameters for the STM32F4 RCC when running from the High
/// Speed External oscillator through the PLL.
pub struct ClockConfig {
    pub crystal_hz: f32,
    pub crystal_divisor: u8,
    pub vco_multiplier: u16,
    pub general_divisor: device::rcc::pllcfgr::PLLPW,
    pub pll48_divisor: u8,

    pub ahb_divisor: device::rcc::cfgr::HPREW,
    pub apb1_divisor: device::rcc::cfgr::PPRE1W,
    pub apb2_divisor: device::rcc::cfgr::PPRE2W,

    pub flash_latency: device::flash::acr::LATENCYW,
}

impl ClockConfig {
    /// Rate of the clock feeding the APB1 timers (TIM2-7, TIM12-14), given the
    /// CPU rate this config produces. The RCC doubles it back up whenever APB1
    /// is divided.
    pub fn apb1_timer_hz(&self, cpu_hz: u32) -> u32 {
        let div = self.apb1_divisor.divisor() as u32;
        if div > 1 {
            cpu_hz * 2 / div
        } else {
            cpu_hz
        }
    }
}

macro_rules! block_while {
    ($condition:expr) => {
        while $condition {}
    };
}

macro_rules! block_until {
    ($condition:expr) => {
        block_while!(!$condition)
    };
}

/// Applies `cfg` to the `rcc` and `flash` (which needs its wait states
/// adjusted to match).
///
/// Runs from the internal oscillator while the PLL is reprogrammed, so this
/// works from any valid starting configuration.
pub fn configure_clocks(
    rcc: &device::RCC,
    flash: &device::FLASH,
    cfg: &ClockConfig,
) {
    rcc.cr.modify(|_, w| w.hsion().set_bit());
    block_until! { rcc.cr.read().hsirdy().bit() }
    rcc.cfgr
        .modify(|_, w| w.sw().variant(device::rcc::cfgr::SWW::HSI));
    block_until! { rcc.cfgr.read().sws() == device::rcc::cfgr::SWSR::HSI }

    rcc.cr.modify(|_, w| w.pllon().clear_bit());
    block_while! { rcc.cr.read().pllrdy().bit() }

    // Divisors first, so the buses never see the new rate undivided.
    rcc.cfgr.modify(|_, w| {
        w.hpre()
            .variant(cfg.ahb_divisor.copy_hack())
            .ppre1()
            .variant(cfg.apb1_divisor.copy_hack())
            .ppre2()
            .variant(cfg.apb2_divisor.copy_hack())
    });

    flash
        .acr
        .modify(|_, w| w.latency().variant(cfg.flash_latency.copy_hack()));

    rcc.cr.modify(|_, w| w.hseon().set_bit());
    block_until! { rcc.cr.read().hserdy().bit() }

    rcc.pllcfgr.modify(|_, w| {
        // Safety: these fields are marked unsafe in the PAC but accept any
        // value in range, and ClockConfig values are in range.
        unsafe {
            w.pllm().bits(cfg.crystal_divisor);
            w.plln().bits(cfg.vco_multiplier);
            w.pllq().bits(cfg.pll48_divisor);
        }
        w.pllp()
            .variant(cfg.general_divisor.copy_hack())
            .pllsrc()
            .variant(device::rcc::pllcfgr::PLLSRCW::HSE)
    });

    rcc.cr.modify(|_, w| w.pllon().set_bit());
    block_until! { rcc.cr.read().pllrdy().bit() }

    rcc.cfgr
        .modify(|_, w| w.sw().variant(device::rcc::cfgr::SWW::PLL));
    block_until! { rcc.cfgr.read().sws() == device::rcc::cfgr::SWSR::PLL }
}

/// Numeric value of an svd2rust divisor enum.
pub trait UsefulDivisor {
    fn divisor(&self) -> usize;
}

impl UsefulDivisor for device::rcc::cfgr::PPRE2W {
    fn divisor(&self) -> usize {
        use device::rcc::cfgr::PPRE2W;
        match self {
            PPRE2W::DIV1 => 1,
            PPRE2W::DIV2 => 2,
            PPRE2W::DIV4 => 4,
            PPRE2W::DIV8 => 8,
            PPRE2W::DIV16 => 16,
        }
    }
}

/// Copy for svd2rust enums, which aren't.
///
/// `unsafe` because implementing it for a type with ownership semantics would
/// duplicate the owned thing.
pub unsafe trait CopyHack: Sized {
    fn copy_hack(&self) -> Self {
        // Safety: implementors are plain-old-data.
        unsafe { core::ptr::read(self) }
    }
}

unsafe impl CopyHack for device::rcc::cfgr::HPREW {}
unsafe impl CopyHack for device::rcc::cfgr::PPRE2W {}
unsafe impl CopyHack for device::flash::acr::LATENCYW {}
unsafe impl CopyHack for device::rcc::pllcfgr::PLLPW {}
unsafe impl CopyHack for device::Interrupt {}

/// Trait for welding variant support onto an un-modeled register field.
pub trait VariantExt<V> {
    type W;
    fn variant(self, variant: V) -> Self::W;
}

/// Trait for welding safe whole-value writes onto a register or field.
pub trait AllWriteExt<T> {
    type W;
    fn bits_ext(self, value: T) -> Self::W;
}

/// General-purpose timers. TIM4 shares TIM3's register block in the PAC.
pub mod tim3 {
    pub mod psc {
        use stm32f4::stm32f407::tim3::psc as device;

        impl<'a> crate::util::stm32::AllWriteExt<u16> for device::_PSCW<'a> {
            type W = &'a mut device::W;
            fn bits_ext(self, value: u16) -> Self::W {
                unsafe { self.bits(value) }
            }
        }
    }
    pub mod ccmr1_output {
        use stm32f4::stm32f407::tim3::ccmr1_output as device;

        /// Output compare 1 mode. Only the mode the driver uses is listed.
        #[derive(Copy, Clone, Debug)]
        pub enum OC1MW {
            /// PWM mode 1: OC1REF is high while CNT < CCR1, low afterwards.
            Pwm1 = 0b110,
        }

        impl<'a> crate::util::stm32::VariantExt<OC1MW> for device::_OC1MW<'a> {
            type W = &'a mut device::W;
            fn variant(self, variant: OC1MW) -> Self::W {
                unsafe { self.bits(variant as u8) }
            }
        }

        /// Capture/compare 1 direction.
        #[derive(Copy, Clone, Debug)]
        pub enum CC1SW {
            Output = 0b00,
        }

        impl<'a> crate::util::stm32::VariantExt<CC1SW> for device::_CC1SW<'a> {
            type W = &'a mut device::W;
            fn variant(self, variant: CC1SW) -> Self::W {
                unsafe { self.bits(variant as u8) }
            }
        }
    }
}

/// GPIOC through GPIOI, which share GPIOI's register block in the PAC.
pub mod gpioi {
    pub mod bsrr {
        use stm32f4::stm32f407::gpioi::bsrr as device;

        impl<'a> crate::util::stm32::AllWriteExt<u32> for &'a mut device::W {
            type W = &'a mut device::W;
            fn bits_ext(self, value: u32) -> Self::W {
                // Safety: every bit pattern is a valid BSRR write.
                unsafe { self.bits(value) }
            }
        }
    }
}
