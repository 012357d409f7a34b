//! Chunked file copy with cancellation checkpoints.

use std::io;
use std::io::Read;
use std::io::Write;

use super::CancellationToken;
use crate::BuildError;
use crate::Result;

/// Size of one copy chunk (64KB).
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Reusable buffer for [`copy_with_buffer`].
///
/// One buffer is allocated per build and reused for every file.
#[derive(Debug)]
pub struct CopyBuffer {
    buf: Box<[u8]>,
}

impl CopyBuffer {
    /// Allocates a zeroed buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; COPY_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Buffer size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `reader` into `writer`, checking `cancel` before every chunk.
///
/// Returns the number of bytes copied.
///
/// # Errors
///
/// - [`BuildError::Cancelled`] when the token fires mid-copy
/// - [`BuildError::Io`] on read or write failure
///
/// # Examples
///
/// ```
/// use safedeb_core::CancellationToken;
/// use safedeb_core::build::copy::{CopyBuffer, copy_with_buffer};
/// use std::io::Cursor;
///
/// let mut buffer = CopyBuffer::new();
/// let mut input = Cursor::new(b"payload".to_vec());
/// let mut output = Vec::new();
///
/// let copied = copy_with_buffer(&mut input, &mut output, &mut buffer, &CancellationToken::new())
///     .unwrap();
/// assert_eq!(copied, 7);
/// assert_eq!(output, b"payload");
/// ```
pub fn copy_with_buffer<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut CopyBuffer,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut total: u64 = 0;

    loop {
        cancel.check()?;
        let bytes_read = match reader.read(&mut buffer.buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(BuildError::Io(e)),
        };
        writer.write_all(&buffer.buf[..bytes_read])?;
        total = total.saturating_add(bytes_read as u64);
    }

    writer.flush()?;
    Ok(total)
}
