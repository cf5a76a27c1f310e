//! Nested tagged-chunk framing for descriptor persistence.
//!
//! A chunk is `tag: u16 LE | payload_len: u32 LE | payload`. Container
//! chunks hold concatenated sub-chunks as their payload. Readers skip
//! unknown tags by seeking past the recorded length, which is what keeps
//! old builds able to walk newer files.

use dynattr_error::{DynattrError, PersistErrorKind, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Container chunk holding one descriptor.
pub const DESC_CHUNK: u16 = 0x0002;
/// Header sub-chunk: the descriptor's 2-byte block id.
pub const DESC_HDR_CHUNK: u16 = 0x0004;
/// Parameter sub-chunk: 4-byte type tag followed by the 2-byte param id.
pub const DESC_PARAM_CHUNK: u16 = 0x0008;

/// Writes nested chunks, backpatching each length on `end_chunk`.
pub struct ChunkWriter<W: Write + Seek> {
    out: W,
    /// Payload start positions of open chunks.
    open: Vec<u64>,
}

impl<W: Write + Seek> ChunkWriter<W> {
    pub fn new(out: W) -> Self {
        ChunkWriter {
            out,
            open: Vec::new(),
        }
    }

    pub fn begin_chunk(&mut self, tag: u16) -> Result<()> {
        self.out.write_all(&tag.to_le_bytes())?;
        self.out.write_all(&0u32.to_le_bytes())?;
        self.open.push(self.out.stream_position()?);
        Ok(())
    }

    pub fn end_chunk(&mut self) -> Result<()> {
        let start = self.open.pop().ok_or_else(|| {
            DynattrError::persist("end_chunk without begin_chunk", PersistErrorKind::ChunkOrder)
        })?;
        let end = self.out.stream_position()?;
        let len = u32::try_from(end - start).map_err(|_| {
            DynattrError::persist("chunk payload too large", PersistErrorKind::ChunkOrder)
        })?;
        self.out.seek(SeekFrom::Start(start - 4))?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Flush and hand the stream back. Every chunk must be closed.
    pub fn finish(mut self) -> Result<W> {
        debug_assert!(self.open.is_empty(), "unclosed chunks at finish");
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Walks nested chunks. `open_chunk` / `close_chunk` bracket each chunk;
/// closing seeks past any unread payload.
pub struct ChunkReader<R: Read + Seek> {
    input: R,
    /// Payload end offsets of open chunks.
    open: Vec<u64>,
}

impl<R: Read + Seek> ChunkReader<R> {
    pub fn new(input: R) -> Self {
        ChunkReader {
            input,
            open: Vec::new(),
        }
    }

    /// Open the next sub-chunk of the current container (or the next
    /// top-level chunk). `None` when the container's payload — or, at top
    /// level, the stream — is exhausted.
    pub fn open_chunk(&mut self) -> Result<Option<u16>> {
        if let Some(&end) = self.open.last() {
            if self.input.stream_position()? >= end {
                return Ok(None);
            }
        }

        let mut tag_bytes = [0u8; 2];
        match self.input.read_exact(&mut tag_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && self.open.is_empty() => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        let mut len_bytes = [0u8; 4];
        self.input.read_exact(&mut len_bytes).map_err(|_| {
            DynattrError::persist("chunk header cut short", PersistErrorKind::TruncatedStream)
        })?;

        let tag = u16::from_le_bytes(tag_bytes);
        let len = u32::from_le_bytes(len_bytes) as u64;
        let end = self.input.stream_position()? + len;
        self.open.push(end);
        Ok(Some(tag))
    }

    /// Leave the current chunk, skipping whatever payload was not read.
    pub fn close_chunk(&mut self) -> Result<()> {
        let end = self.open.pop().ok_or_else(|| {
            DynattrError::persist("close_chunk without open_chunk", PersistErrorKind::ChunkOrder)
        })?;
        self.input.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.input.read_exact(&mut buf).map_err(|_| {
            DynattrError::persist("payload cut short", PersistErrorKind::TruncatedStream)
        })?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.input.read_exact(&mut buf).map_err(|_| {
            DynattrError::persist("payload cut short", PersistErrorKind::TruncatedStream)
        })?;
        Ok(u32::from_le_bytes(buf))
    }
}
