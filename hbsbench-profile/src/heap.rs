//! Heap Snapshots
//!
//! A snapshot is serialized as JSON and handed out in chunks; the file writer
//! is just one chunk consumer.

use crate::ProfileError;
use crate::allocator::{AllocationStats, allocation_stats};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Allocator state at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    /// Process the snapshot was taken in
    pub pid: u32,
    /// Wall clock time of the snapshot
    pub taken_at_unix_ms: u64,
    /// False when the tracking allocator is not installed; counters are then
    /// all zero
    pub tracking: bool,
    /// Allocator counters
    pub stats: AllocationStats,
}

impl HeapSnapshot {
    /// Capture the current allocator counters
    pub fn capture() -> Self {
        let stats = allocation_stats();
        let taken_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            pid: std::process::id(),
            taken_at_unix_ms,
            tracking: stats.is_tracking(),
            stats,
        }
    }

    /// Create `path` and stream the snapshot into it
    pub fn write_to(&self, path: &Path) -> Result<(), ProfileError> {
        let write_err = |source| ProfileError::Write {
            path: path.to_path_buf(),
            source,
        };

        if !self.tracking {
            tracing::warn!("tracking allocator is not installed; heap snapshot counters are zero");
        }

        let file = File::create(path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        stream_json_chunks(self, |chunk| writer.write_all(chunk))?;
        writer.flush().map_err(write_err)?;

        tracing::info!(path = %path.display(), live_bytes = self.stats.live_bytes, "wrote heap snapshot");
        Ok(())
    }
}

/// Serialize `value` as JSON, passing each produced chunk to `on_chunk`
pub fn stream_json_chunks<T, F>(value: &T, on_chunk: F) -> Result<(), ProfileError>
where
    T: Serialize,
    F: FnMut(&[u8]) -> io::Result<()>,
{
    let mut sink = ChunkSink { on_chunk };
    serde_json::to_writer_pretty(&mut sink, value)?;
    Ok(())
}

struct ChunkSink<F> {
    on_chunk: F,
}

impl<F> Write for ChunkSink<F>
where
    F: FnMut(&[u8]) -> io::Result<()>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.on_chunk)(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_reassemble() {
        let snapshot = HeapSnapshot::capture();
        let mut chunks = Vec::new();
        stream_json_chunks(&snapshot, |chunk| {
            chunks.push(chunk.to_vec());
            Ok(())
        })
        .unwrap();

        assert!(chunks.len() > 1);
        let joined: Vec<u8> = chunks.concat();
        let parsed: HeapSnapshot = serde_json::from_slice(&joined).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_chunk_error_propagates() {
        let snapshot = HeapSnapshot::capture();
        let result = stream_json_chunks(&snapshot, |_| {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        });
        assert!(matches!(result, Err(ProfileError::Serialize(_))));
    }

    #[test]
    fn test_write_to_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.heapsnapshot");
        let err = HeapSnapshot::capture().write_to(&path).unwrap_err();
        assert!(matches!(err, ProfileError::Write { .. }));
    }
}
