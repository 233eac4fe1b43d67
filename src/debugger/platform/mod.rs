//! Uniform surface over the OS process primitives: task identifiers,
//! last-error stringification, process liveness, feature probes.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
pub use linux::{clear_last_error, is_process_running, last_error, TaskId};
#[cfg(windows)]
pub use windows::{clear_last_error, is_process_running, last_error, TaskId};

/// Probe the CPU for an x87 FPU. Non-x86 targets are assumed to have one.
pub fn is_fpu_present() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        let leaf = unsafe { core::arch::x86_64::__cpuid(1) };
        leaf.edx & 1 != 0
    }
    #[cfg(target_arch = "x86")]
    {
        let leaf = unsafe { core::arch::x86::__cpuid(1) };
        leaf.edx & 1 != 0
    }
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        true
    }
}
