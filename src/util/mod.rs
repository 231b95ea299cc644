//! Support code that isn't specific to video.

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        pub mod armv7m;
        pub mod stm32;
    }
}

pub mod measurement;
pub mod loan;
