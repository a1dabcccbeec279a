//! Wall-Clock Timing
//!
//! Monotonic timer used around the compile batch, plus CPU pinning so a
//! worker process is not migrated between cores mid-measurement.

use std::time::{Duration, Instant};

/// Timer for a single compile batch
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since `start`
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in fractional milliseconds
    #[inline(always)]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

/// Set CPU affinity to pin the current thread to a specific core
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), std::io::Error> {
    use std::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        libc::CPU_SET(cpu, set_ref);

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// CPU pinning is not supported on this platform
#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), std::io::Error> {
    Ok(())
}

/// CPUs this process may run on, in ascending order
#[cfg(target_os = "linux")]
pub fn available_cpus() -> Vec<usize> {
    use std::mem::MaybeUninit;

    let allowed = unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();
        if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref) != 0 {
            None
        } else {
            Some(
                (0..libc::CPU_SETSIZE as usize)
                    .filter(|&cpu| libc::CPU_ISSET(cpu, set_ref))
                    .collect::<Vec<_>>(),
            )
        }
    };

    match allowed {
        Some(cpus) if !cpus.is_empty() => cpus,
        _ => (0..parallelism()).collect(),
    }
}

/// CPUs this process may run on, in ascending order
#[cfg(not(target_os = "linux"))]
pub fn available_cpus() -> Vec<usize> {
    (0..parallelism()).collect()
}

fn parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_elapsed() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();

        assert!(elapsed >= 5.0);
        assert!(elapsed < 1000.0);
    }

    #[test]
    fn test_timer_never_negative() {
        let timer = Timer::start();
        assert!(timer.elapsed_ms() >= 0.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pin_to_available_cpu() {
        let cpus = available_cpus();
        let cpu = *cpus.last().unwrap();
        pin_to_cpu(cpu).unwrap();
        assert_eq!(unsafe { libc::sched_getcpu() }, cpu as i32);
    }

    #[test]
    fn test_available_cpus_sorted_and_unique() {
        let cpus = available_cpus();
        assert!(!cpus.is_empty());
        assert!(cpus.windows(2).all(|w| w[0] < w[1]));
    }
}
