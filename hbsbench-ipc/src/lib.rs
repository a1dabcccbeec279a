#![warn(missing_docs)]
//! hbsbench IPC Protocol
//!
//! Length-prefixed rkyv frames carried from an isolated `measure` worker back
//! to the supervisor over an inherited pipe. The worker announces itself with
//! `Hello` and then sends exactly one outcome: `Complete` or `Failure`.

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{FailureKind, WorkerCapabilities, WorkerMessage};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable naming the inherited pipe fd in the worker
pub const IPC_FD_ENV: &str = "HBSBENCH_IPC_FD";

/// Fd number the supervisor wires the message pipe to in the worker
pub const WORKER_MESSAGE_FD: i32 = 3;
