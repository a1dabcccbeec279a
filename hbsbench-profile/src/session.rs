//! Profiler Handle
//!
//! The sampling profiler is process-wide. [`Profiler`] is the only way in:
//! at most one handle is alive at a time, and a CPU session mutably borrows
//! it, so two sessions cannot overlap.

use crate::cpu::CpuProfile;
use crate::heap::HeapSnapshot;
use crate::{DEFAULT_FREQUENCY, ProfileError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Owned access to the process profiler, released on drop
#[derive(Debug)]
pub struct Profiler {
    frequency: i32,
}

impl Profiler {
    /// Acquire the profiler with the default sampling frequency
    pub fn new() -> Result<Self, ProfileError> {
        Self::with_frequency(DEFAULT_FREQUENCY)
    }

    /// Acquire the profiler sampling at `frequency` Hz
    pub fn with_frequency(frequency: i32) -> Result<Self, ProfileError> {
        ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProfileError::AlreadyActive)?;
        Ok(Self {
            frequency: frequency.max(1),
        })
    }

    /// Sampling frequency in Hz
    pub fn frequency(&self) -> i32 {
        self.frequency
    }

    /// Start CPU sampling
    pub fn cpu_session(&mut self) -> Result<CpuSession<'_>, ProfileError> {
        let guard = pprof::ProfilerGuardBuilder::default()
            .frequency(self.frequency)
            .blocklist(&["libc", "libgcc", "pthread", "vdso"])
            .build()?;
        tracing::debug!(frequency = self.frequency, "CPU sampling started");
        Ok(CpuSession {
            guard,
            _profiler: self,
        })
    }

    /// Write a heap snapshot to `path`, streaming it in chunks
    pub fn take_heap_snapshot(&self, path: &Path) -> Result<HeapSnapshot, ProfileError> {
        let snapshot = HeapSnapshot::capture();
        snapshot.write_to(path)?;
        Ok(snapshot)
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Release);
    }
}

/// A running CPU sampling session
pub struct CpuSession<'a> {
    guard: pprof::ProfilerGuard<'static>,
    _profiler: &'a mut Profiler,
}

impl CpuSession<'_> {
    /// Stop sampling and collect the profile
    pub fn finish(self, label: &str) -> Result<CpuProfile, ProfileError> {
        let report = self.guard.report().build()?;
        let profile = CpuProfile::from_report(label, &report);
        tracing::debug!(label, stacks = profile.samples.len(), "CPU sampling stopped");
        Ok(profile)
    }
}
