//! Length-Prefixed Frame Encoding
//!
//! Gives reliable message boundaries over the worker's stream pipe.

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Maximum frame size (1 MB); worker messages are small
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors that can occur during frame encoding/decoding
#[derive(Debug, Error)]
pub enum FrameError {
    /// Reading or writing the pipe failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A frame did not hold a valid message
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Length prefix above [`MAX_FRAME_SIZE`]
    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge {
        /// Announced length
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Malformed frame, such as a zero length prefix
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The writer closed the pipe
    #[error("End of stream")]
    EndOfStream,
}

/// Write a message with length prefix to a writer
///
/// Frame format:
/// ```text
/// +----------------+------------------+
/// | length (4 LE)  | rkyv payload     |
/// +----------------+------------------+
/// ```
pub fn write_frame<W, T>(writer: &mut BufWriter<W>, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize<AllocSerializer<256>>,
{
    let bytes =
        rkyv::to_bytes::<_, 256>(message).map_err(|e| FrameError::Serialization(e.to_string()))?;

    let len = bytes.len();
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_le_bytes())?;
    writer.write_all(&bytes)?;
    // The worker may exit right after its last frame
    writer.flush()?;

    Ok(())
}

/// Read a message with length prefix from a reader
pub fn read_frame<R, T>(reader: &mut BufReader<R>) -> Result<T, FrameError>
where
    R: Read,
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len == 0 {
        return Err(FrameError::InvalidFrame("zero-length frame".to_string()));
    }

    let mut buf = rkyv::AlignedVec::with_capacity(len);
    buf.resize(len, 0);
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::InvalidFrame(format!("truncated frame, expected {} bytes", len))
        } else {
            FrameError::Io(e)
        }
    })?;

    let archived = rkyv::check_archived_root::<T>(&buf)
        .map_err(|e| FrameError::Deserialization(e.to_string()))?;

    archived
        .deserialize(&mut Infallible)
        .map_err(|_| FrameError::Deserialization("infallible deserializer failed".to_string()))
}

/// Frame writer wrapper for convenient message sending
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Create a new frame writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(8 * 1024, writer),
        }
    }

    /// Write a message
    pub fn write<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        write_frame(&mut self.writer, message)
    }
}

/// Frame reader wrapper for convenient message receiving
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Create a new frame reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(8 * 1024, reader),
        }
    }

    /// Read a message
    pub fn read<T>(&mut self) -> Result<T, FrameError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        read_frame(&mut self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FailureKind, WorkerMessage};
    use std::io::Cursor;

    #[test]
    fn test_outcome_after_hello() {
        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer
                .write(&WorkerMessage::Hello(crate::WorkerCapabilities::current()))
                .unwrap();
            writer
                .write(&WorkerMessage::Complete {
                    label: "handlebars-6".to_string(),
                    elapsed_ms: 12.5,
                    templates: 40,
                })
                .unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let hello: WorkerMessage = reader.read().unwrap();
        assert!(matches!(hello, WorkerMessage::Hello(_)));

        match reader.read::<WorkerMessage>().unwrap() {
            WorkerMessage::Complete {
                label,
                elapsed_ms,
                templates,
            } => {
                assert_eq!(label, "handlebars-6");
                assert_eq!(elapsed_ms, 12.5);
                assert_eq!(templates, 40);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let end: Result<WorkerMessage, _> = reader.read();
        assert!(matches!(end, Err(FrameError::EndOfStream)));
    }

    #[test]
    fn test_failure_message() {
        let mut buffer = Vec::new();
        FrameWriter::new(&mut buffer)
            .write(&WorkerMessage::Failure {
                kind: FailureKind::Compile,
                message: "templates/broken.hbs: unclosed block".to_string(),
            })
            .unwrap();

        let mut reader = FrameReader::new(Cursor::new(buffer));
        match reader.read::<WorkerMessage>().unwrap() {
            WorkerMessage::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Compile);
                assert!(message.contains("broken.hbs"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_zero_length_frame_rejected() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8, 0, 0, 0]));
        let result: Result<WorkerMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::InvalidFrame(_))));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let len = (MAX_FRAME_SIZE as u32 + 1).to_le_bytes();
        let mut reader = FrameReader::new(Cursor::new(len.to_vec()));
        let result: Result<WorkerMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_truncated_frame() {
        let mut bytes = 64u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let result: Result<WorkerMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::InvalidFrame(_))));
    }
}
