//! Bidirectional byte stream with endianness control.
//!
//! Every serializer in this crate is written once as a directionless `rw`
//! routine over a [`Stream`]: in read mode the routine fills the caller's
//! fields from the buffer, in write mode it emits the caller's fields into
//! the buffer. Because both directions share a single routine, the read and
//! write paths of each record are inverses by construction.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Byte order of a stream or an audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// Least-significant byte first.
    Little,
    /// Most-significant byte first.
    Big,
}

impl Endianness {
    /// The byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// Direction of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `rw` operations copy out of the buffer into the caller.
    Read,
    /// `rw` operations copy from the caller into the buffer.
    Write,
}

/// A seekable cursor over a byte buffer.
///
/// Read streams wrap an existing buffer; write streams own a growable one
/// and support back-patching through [`Stream::seek`].
#[derive(Debug)]
pub struct Stream {
    buf: Vec<u8>,
    pos: usize,
    mode: Mode,
    endianness: Endianness,
}

impl Stream {
    /// Create a read-mode stream over an existing buffer.
    pub fn reader(buf: Vec<u8>, endianness: Endianness) -> Self {
        Self {
            buf,
            pos: 0,
            mode: Mode::Read,
            endianness,
        }
    }

    /// Create an empty write-mode stream. The buffer grows on demand.
    pub fn writer(endianness: Endianness) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            mode: Mode::Write,
            endianness,
        }
    }

    /// The stream direction.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The stream byte order.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Current cursor position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Total buffer length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Move the cursor to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Move the cursor forward. In write mode the skipped region is
    /// zero-filled so the buffer stays contiguous.
    pub fn advance(&mut self, offset: usize) {
        self.pos += offset;
        if self.mode == Mode::Write && self.pos > self.buf.len() {
            self.buf.resize(self.pos, 0);
        }
    }

    /// Consume the stream, returning the underlying buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Read or write `data.len()` raw bytes at the cursor.
    pub fn rw(&mut self, data: &mut [u8]) -> Result<()> {
        let end = self.pos + data.len();
        match self.mode {
            Mode::Read => {
                let src = self.buf.get(self.pos..end).ok_or(Error::UnexpectedEof)?;
                data.copy_from_slice(src);
            }
            Mode::Write => {
                if end > self.buf.len() {
                    self.buf.resize(end, 0);
                }
                self.buf[self.pos..end].copy_from_slice(data);
            }
        }
        self.pos = end;
        Ok(())
    }

    /// Read or write a single byte.
    pub fn rw8(&mut self, value: &mut u8) -> Result<()> {
        let mut buf = [*value];
        self.rw(&mut buf)?;
        *value = buf[0];
        Ok(())
    }

    /// Read or write a 16-bit word in the stream byte order.
    pub fn rw16(&mut self, value: &mut u16) -> Result<()> {
        let mut buf = [0u8; 2];
        match self.endianness {
            Endianness::Big => BigEndian::write_u16(&mut buf, *value),
            Endianness::Little => LittleEndian::write_u16(&mut buf, *value),
        }
        self.rw(&mut buf)?;
        *value = match self.endianness {
            Endianness::Big => BigEndian::read_u16(&buf),
            Endianness::Little => LittleEndian::read_u16(&buf),
        };
        Ok(())
    }

    /// Read or write a signed 16-bit word in the stream byte order.
    pub fn rw_i16(&mut self, value: &mut i16) -> Result<()> {
        let mut raw = *value as u16;
        self.rw16(&mut raw)?;
        *value = raw as i16;
        Ok(())
    }

    /// Read or write a 32-bit word in the stream byte order.
    pub fn rw32(&mut self, value: &mut u32) -> Result<()> {
        let mut buf = [0u8; 4];
        match self.endianness {
            Endianness::Big => BigEndian::write_u32(&mut buf, *value),
            Endianness::Little => LittleEndian::write_u32(&mut buf, *value),
        }
        self.rw(&mut buf)?;
        *value = match self.endianness {
            Endianness::Big => BigEndian::read_u32(&buf),
            Endianness::Little => LittleEndian::read_u32(&buf),
        };
        Ok(())
    }

    /// Read or write a 32-bit float as its raw bit pattern.
    pub fn rw_f32(&mut self, value: &mut f32) -> Result<()> {
        let mut bits = value.to_bits();
        self.rw32(&mut bits)?;
        *value = f32::from_bits(bits);
        Ok(())
    }

    /// Read or write a 64-bit CUUID: the high word is serialized first,
    /// then the low word, independently of the stream byte order.
    pub fn rw_cuuid(&mut self, value: &mut u64) -> Result<()> {
        let mut high = (*value >> 32) as u32;
        let mut low = (*value & 0xFFFF_FFFF) as u32;
        self.rw32(&mut high)?;
        self.rw32(&mut low)?;
        *value = (u64::from(high) << 32) | u64::from(low);
        Ok(())
    }
}
