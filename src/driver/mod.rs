//! STM32F407 driver: clock and pin setup, TIM4 configuration, and the handle
//! applications use to start video.

mod hw;
mod isr;

use stm32f4::stm32f407 as device;
use cortex_m::peripheral as cm;

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::render::Emitter;
use crate::scan::Scanner;
use crate::scanout::Scanout;
use crate::timing::{self, Standard, Timing};
use crate::util::armv7m::{clear_pending_irq, disable_irq, enable_irq};
use crate::util::measurement;
use crate::util::loan::{Borrowed, Loan, LoanError};
use crate::util::stm32::{configure_clocks, ClockConfig, CopyHack};
use crate::{Frame, FRAME, ROWS, ROW_BYTES, ROW_PIXELS};

use self::hw::Stm32Scanout;

pub use self::isr::tim4_scan_isr;

/// CPU (and TIM4) clock rate produced by `CLOCKS`.
pub const CPU_HZ: u32 = 80_000_000;

/// Clock tree applied by `Tv::begin`.
///
/// This produces an 80MHz CPU clock. APB1 is divided by two, which the RCC
/// undoes for the timers, so TIM4 counts CPU cycles.
pub static CLOCKS: ClockConfig = ClockConfig {
    crystal_hz: 8000000.0, // external crystal Hz
    crystal_divisor: 4,    // divide down to 2Mhz
    vco_multiplier: 160,   // multiply up to 320MHz VCO
    // divide by 4 for 80MHz CPU clock
    general_divisor: device::rcc::pllcfgr::PLLPW::DIV4,
    pll48_divisor: 7, // divide by 7 for 48MHz-ish SDIO clock
    // divide CPU clock by 1 for 80MHz AHB clock
    ahb_divisor: device::rcc::cfgr::HPREW::DIV1,
    // divide CPU clock by 2 for 40MHz APB1 clock.
    apb1_divisor: device::rcc::cfgr::PPRE2W::DIV2,
    // divide CPU clock by 1 for 80MHz APB2 clock.
    apb2_divisor: device::rcc::cfgr::PPRE2W::DIV1,

    // 2 wait states for 80MHz at 3.3V.
    flash_latency: device::flash::acr::LATENCYW::WS2,
};

/// Emission strategy for this clock and row width.
pub const EMITTER: Emitter =
    Emitter::for_ratio(timing::emission_ratio(CPU_HZ, ROW_BYTES));

/// Checks that a full active line, plus its trailing blank, ends before the
/// next sync pulse.
const fn line_fits(standard: Standard) -> bool {
    let t = Timing::derive(standard, CPU_HZ, ROWS);
    t.output_start_cycles
        + Stm32Scanout::ALIGN_CYCLES
        + (ROW_PIXELS as u32 + 1) * EMITTER.cycles_per_pixel()
        < t.scanline_cycles
}

const _: () = {
    assert!(EMITTER.fits::<Stm32Scanout>());
    assert!(line_fits(Standard::Ntsc));
    assert!(line_fits(Standard::Pal));
};

/// Driver handle.
///
/// Get one from [`init`] or [`take_hardware`]. Only one exists; asking for a
/// second panics.
///
/// The handle uses the typestate pattern: `Tv<Idle>` can only be started, and
/// only a started `Tv<Running>` offers operations that assume a video signal,
/// such as waiting for vertical blank.
///
/// [`init`]: fn.init.html
/// [`take_hardware`]: fn.take_hardware.html
pub struct Tv<S> {
    rcc: device::RCC,
    flash: device::FLASH,
    gpiob: device::GPIOB,
    nvic: cm::NVIC,

    mode_state: S,
}

/// Driver mode after [`init`], before video starts.
///
/// [`init`]: fn.init.html
pub struct Idle {
    hw: Stm32Scanout,
}

/// Driver mode while video is being generated.
pub struct Running {
    standard: Standard,
    timing: Timing,
}

impl Tv<Idle> {
    /// Starts generating `standard` video from [`FRAME`].
    ///
    /// Switches to the [`CLOCKS`] configuration, sets up TIM4 to produce sync
    /// on PB6 and interrupt at the start of each scanline, and hands the
    /// scanline state machine to [`tim4_scan_isr`].
    ///
    /// [`FRAME`]: static.FRAME.html
    /// [`CLOCKS`]: static.CLOCKS.html
    /// [`tim4_scan_isr`]: fn.tim4_scan_isr.html
    pub fn begin(mut self, standard: Standard) -> Tv<Running> {
        let timing = Timing::derive(standard, CPU_HZ, ROWS);

        disable_scan_timer(&mut self.nvic, &self.rcc);
        configure_clocks(&self.rcc, &self.flash, &CLOCKS);

        let Idle { hw } = self.mode_state;
        configure_scan_timer(&timing, &hw.tim4, &self.rcc, &CLOCKS);
        hw.tim4.dier.write(|w| w.uie().set_bit());

        video_on(&hw.gpioe);
        sync_on(&self.gpiob);

        // Start counting. The first overflow pends TIM4, which stays masked
        // until the scanner is in place below.
        hw.tim4.cr1.modify(|_, w| w.cen().set_bit());

        LINE.store(0, Ordering::Relaxed);
        SHARED
            .lend(Shared {
                scanner: Scanner::new(&FRAME, timing, EMITTER),
                hw,
            })
            .expect("scan state borrowed before start");

        let mut new_self = Tv {
            rcc: self.rcc,
            flash: self.flash,
            gpiob: self.gpiob,
            nvic: self.nvic,
            mode_state: Running { standard, timing },
        };
        enable_irq(&mut new_self.nvic, device::Interrupt::TIM4);

        new_self
    }
}

impl Tv<Running> {
    /// The framebuffer being displayed.
    pub fn frame(&self) -> &'static Frame {
        &FRAME
    }

    pub fn standard(&self) -> Standard {
        self.mode_state.standard
    }

    pub fn timing(&self) -> &Timing {
        &self.mode_state.timing
    }

    /// Busy-waits for the start of a new frame, i.e. the transition into line
    /// zero at the top of vertical sync. Because this waits for the
    /// *transition*, calling it on line zero waits a whole frame.
    pub fn sync_to_vblank(&self) {
        // Wait to leave line zero first, so that
        //
        // ```
        // loop {
        //   tv.sync_to_vblank();
        //   draw();
        // }
        // ```
        //
        // runs `draw` once per frame even when it's quick.
        while LINE.load(Ordering::Relaxed) == 0 {
            cortex_m::asm::wfi()
        }
        while LINE.load(Ordering::Relaxed) != 0 {
            cortex_m::asm::wfi()
        }
    }
}

/// Initializes the driver using the given hardware capabilities.
///
/// You can get the capabilities from the `cortex_m` and `stm32f4` crates like
/// so:
///
/// ```ignore
/// let cp = cortex_m::peripheral::Peripherals::take().unwrap();
/// let p = stm32f4::stm32f407::Peripherals::take().unwrap();
///
/// let tv = m4tv::init(
///     cp.NVIC,
///     p.FLASH,
///     &p.DBG,
///     p.RCC,
///     p.GPIOB,
///     p.GPIOE,
///     p.TIM4,
/// );
/// ```
///
/// The driver is returned in [`Idle`] state with both output pins parked.
/// Call [`begin`] to start video.
///
/// This variant is useful if you want to *retain* peripherals the driver
/// doesn't use. Otherwise, [`take_hardware`] is simpler.
///
/// # Panics
///
/// If called more than once.
///
/// [`take_hardware`]: fn.take_hardware.html
/// [`Idle`]: struct.Idle.html
/// [`begin`]: struct.Tv.html#method.begin
pub fn init(
    mut nvic: cm::NVIC,
    flash: device::FLASH,
    dbg: &device::DBG,
    rcc: device::RCC,
    gpiob: device::GPIOB,
    gpioe: device::GPIOE,
    tim4: device::TIM4,
) -> Tv<Idle> {
    unsafe {
        measurement::init();
    }

    let previous_instance = DRIVER_INIT_FLAG.swap(true, Ordering::SeqCst);
    assert_eq!(previous_instance, false);

    disable_irq(&mut nvic, device::Interrupt::TIM4);

    rcc.ahb1enr
        .modify(|_, w| w.gpioben().enabled().gpioeen().enabled());
    cortex_m::asm::dmb();

    // Safety: the TIM4 interrupt is disabled, so changing its priority can't
    // affect a handler in flight.
    unsafe {
        nvic.set_priority(device::Interrupt::TIM4, 0x00);
    }

    // Flash cache and prefetch reduce fetch jitter in the emitters.
    flash
        .acr
        .modify(|_, w| w.dcen().enabled().icen().enabled().prften().enabled());

    // Freeze the line timer on debug halt.
    dbg.dbgmcu_apb1_fz
        .modify(|_, w| w.dbg_tim4_stop().set_bit());

    sync_off(&gpiob);
    video_off(&gpioe);

    Tv {
        rcc,
        flash,
        gpiob,
        nvic,
        mode_state: Idle {
            hw: Stm32Scanout { tim4, gpioe },
        },
    }
}

/// Starts up the driver, taking possession of all hardware peripherals.
///
/// ```ignore
/// let tv = m4tv::take_hardware();
/// ```
///
/// Shorthand for [`init`] when video is the only hardware you use.
///
/// [`init`]: fn.init.html
pub fn take_hardware() -> Tv<Idle> {
    let cp = cortex_m::peripheral::Peripherals::take().unwrap();
    let p = device::Peripherals::take().unwrap();

    init(cp.NVIC, p.FLASH, &p.DBG, p.RCC, p.GPIOB, p.GPIOE, p.TIM4)
}

/// Records when a driver instance has been initialized. Only allowed once,
/// since there's no teardown.
static DRIVER_INIT_FLAG: AtomicBool = AtomicBool::new(false);

/// State loaned to the scan ISR.
struct Shared {
    scanner: Scanner<'static, ROW_BYTES, ROWS>,
    hw: Stm32Scanout,
}

static SHARED: Loan<Shared> = Loan::empty();

/// Current scan line, published by the ISR after every tick so that thread
/// code can synchronize with the frame.
static LINE: AtomicUsize = AtomicUsize::new(0);

/// Pattern for acquiring hardware resources loaned to an ISR in a static.
///
/// # Panics
///
/// If the loan is busy, which means the IRQ was enabled while the hardware
/// was still being provisioned, or a previous invocation leaked the guard.
/// Also if the hardware hasn't been lent at all.
fn acquire_hw<T: Send>(loan: &Loan<T>) -> Borrowed<T> {
    match loan.borrow() {
        Ok(hw) => hw,
        Err(LoanError::Busy) => panic!("HW loan busy at ISR"),
        Err(LoanError::Empty) => panic!("ISR fired without HW available"),
    }
}

/// Parks the sync output: PB6 as an input, pulled down.
fn sync_off(gpiob: &device::GPIOB) {
    gpiob.moder.modify(|_, w| w.moder6().input());
    gpiob.pupdr.modify(|_, w| w.pupdr6().pull_down());
}

/// Hands PB6 to TIM4 channel 1.
fn sync_on(gpiob: &device::GPIOB) {
    gpiob.ospeedr.modify(|_, w| w.ospeedr6().high_speed());
    gpiob.pupdr.modify(|_, w| w.pupdr6().floating());
    gpiob.afrl.modify(|_, w| w.afrl6().af2());
    gpiob.moder.modify(|_, w| w.moder6().alternate());
}

/// Parks the video output: PE8 as an input, pulled down.
fn video_off(gpioe: &device::GPIOE) {
    gpioe.moder.modify(|_, w| w.moder8().input());
    gpioe.pupdr.modify(|_, w| w.pupdr8().pull_down());
}

/// Makes PE8 a fast push-pull output, starting low.
fn video_on(gpioe: &device::GPIOE) {
    gpioe.bsrr.write(|w| w.br8().set_bit());
    gpioe.pupdr.modify(|_, w| w.pupdr8().floating());
    // Sharpest edges available.
    gpioe.ospeedr.modify(|_, w| w.ospeedr8().very_high_speed());
    gpioe.moder.modify(|_, w| w.moder8().output());
}

/// Puts TIM4 in reset with its interrupt disabled and not pending.
fn disable_scan_timer(nvic: &mut cm::NVIC, rcc: &device::RCC) {
    let i = device::Interrupt::TIM4;
    disable_irq(nvic, i.copy_hack());
    rcc.apb1rstr.modify(|_, w| w.tim4rst().set_bit());
    cortex_m::asm::dsb();
    clear_pending_irq(i);
}

/// Brings TIM4 out of reset as the line timer: it overflows once per
/// scanline, and channel 1 drives an active-low sync pulse. The counter is
/// left stopped.
fn configure_scan_timer(
    timing: &Timing,
    tim: &device::tim3::RegisterBlock,
    rcc: &device::RCC,
    clocks: &ClockConfig,
) {
    rcc.apb1enr.modify(|_, w| w.tim4en().set_bit());
    cortex_m::asm::dsb();
    rcc.apb1rstr.modify(|_, w| w.tim4rst().clear_bit());
    cortex_m::asm::dsb();

    // Count CPU cycles. APB1 timers run at twice the bus clock whenever the
    // bus is divided, so the prescaler undoes that.
    let prescale = clocks.apb1_timer_hz(CPU_HZ) / CPU_HZ;
    tim.psc.write(|w| {
        use crate::util::stm32::AllWriteExt;
        w.psc().bits_ext((prescale - 1) as u16)
    });

    tim.arr.write(|w| w.arr().bits(timing.scanline_cycles));
    // Start in vertical sync; the scanner picks the width from here on.
    tim.ccr1.write(|w| w.ccr1().bits(timing.vsync_cycles + 1));

    tim.ccmr1_output.write(|w| {
        use crate::util::stm32 as device;
        use crate::util::stm32::VariantExt;

        w.oc1m()
            .variant(device::tim3::ccmr1_output::OC1MW::Pwm1)
            .cc1s()
            .variant(device::tim3::ccmr1_output::CC1SW::Output)
            .oc1pe()
            .set_bit()
    });

    // Active-low output.
    tim.ccer.write(|w| w.cc1e().set_bit().cc1p().set_bit());

    // Preload ARR too, then force an update to latch everything.
    tim.cr1.write(|w| w.arpe().set_bit());
    tim.egr.write(|w| w.ug().set_bit());
    tim.sr.write(|w| w.uif().clear_bit());
}
