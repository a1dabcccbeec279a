#![warn(missing_docs)]
//! hbsbench Profile - Profiler Bridge
//!
//! Wraps a single compile batch in a CPU sampling session and writes the
//! result as a `.cpuprofile` JSON artifact. Heap snapshots are taken from the
//! counters of [`TrackingAllocator`], which the binary installs as its global
//! allocator.

mod allocator;
mod cpu;
mod heap;
mod session;

pub use allocator::{AllocationStats, TrackingAllocator, allocation_stats, reset_peak};
pub use cpu::{CpuProfile, CpuSample, write_cpu_profile, write_cpu_profile_at};
pub use heap::{HeapSnapshot, stream_json_chunks};
pub use session::{CpuSession, Profiler};

use thiserror::Error;

/// Default CPU sampling frequency in Hz
pub const DEFAULT_FREQUENCY: i32 = 1000;

/// Profiler errors
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Another [`Profiler`] handle is alive in this process
    #[error("a profiler is already active in this process")]
    AlreadyActive,

    /// The sampling profiler failed to start or report
    #[error("CPU profiler error: {0}")]
    Sampler(#[from] pprof::Error),

    /// Artifact could not be written
    #[error("failed to write {path}: {source}")]
    Write {
        /// Artifact path
        path: std::path::PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be serialized
    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Timestamp used in artifact names: `YYYY-M-D-HHmm`, local time, month and
/// day without padding
pub fn artifact_timestamp<Tz>(now: &chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y-%-m-%-d-%H%M").to_string()
}

/// [`artifact_timestamp`] for the current local time
pub fn current_timestamp() -> String {
    artifact_timestamp(&chrono::Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_timestamp_format() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(artifact_timestamp(&at), "2024-3-7-0905");

        let at = chrono::Utc.with_ymd_and_hms(2024, 11, 23, 17, 42, 0).unwrap();
        assert_eq!(artifact_timestamp(&at), "2024-11-23-1742");
    }
}
