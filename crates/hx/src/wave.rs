//! RIFF/WAVE envelope.
//!
//! The container stores each audio payload behind a fixed 44-byte RIFF
//! header. Inline payloads use the standard `data` subchunk; external
//! payloads use a `datx` stub whose 8-byte body holds the size and offset
//! of the stream in the sibling file.

use crate::error::{Error, Result};
use crate::stream::Stream;

/// `"RIFF"` chunk magic.
pub const RIFF_CHUNK_ID: u32 = 0x46464952;
/// `"WAVE"` chunk magic.
pub const WAVE_CHUNK_ID: u32 = 0x45564157;
/// `"fmt "` chunk magic.
pub const FORMAT_CHUNK_ID: u32 = 0x20746D66;
/// `"data"` subchunk id for inline payloads.
pub const DATA_CHUNK_ID: u32 = 0x61746164;
/// `"datx"` subchunk id for external-reference stubs.
pub const EXT_DATA_CHUNK_ID: u32 = 0x78746164;
/// `"cue "` chunk magic.
pub const CUE_CHUNK_ID: u32 = 0x63756520;

/// The 44-byte RIFF/WAVE header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveHeader {
    pub riff_id: u32,
    pub riff_length: u32,
    pub wave_id: u32,
    pub format_id: u32,
    pub chunk_size: u32,
    pub format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bytes_per_second: u32,
    pub block_alignment: u16,
    pub bits_per_sample: u16,
    pub subchunk2_id: u32,
    pub subchunk2_size: u32,
}

impl Default for WaveHeader {
    /// Mono 16-bit PCM at 22050 Hz with an empty `data` subchunk.
    fn default() -> Self {
        Self {
            riff_id: RIFF_CHUNK_ID,
            riff_length: 0,
            wave_id: WAVE_CHUNK_ID,
            format_id: FORMAT_CHUNK_ID,
            chunk_size: 16,
            format: 1,
            num_channels: 1,
            sample_rate: 22050,
            bytes_per_second: 0,
            block_alignment: 16,
            bits_per_sample: 16,
            subchunk2_id: DATA_CHUNK_ID,
            subchunk2_size: 0,
        }
    }
}

impl WaveHeader {
    /// Serialized size of the header in bytes.
    pub const SIZE: usize = 44;

    /// Read or write the header at the stream cursor.
    ///
    /// Validates the RIFF, WAVE and fmt magic numbers and fails with
    /// [`Error::WaveHeaderInvalid`] on mismatch.
    pub fn rw(&mut self, s: &mut Stream) -> Result<()> {
        s.rw32(&mut self.riff_id)?;
        s.rw32(&mut self.riff_length)?;
        s.rw32(&mut self.wave_id)?;
        s.rw32(&mut self.format_id)?;
        s.rw32(&mut self.chunk_size)?;
        s.rw16(&mut self.format)?;
        s.rw16(&mut self.num_channels)?;
        s.rw32(&mut self.sample_rate)?;
        s.rw32(&mut self.bytes_per_second)?;
        s.rw16(&mut self.block_alignment)?;
        s.rw16(&mut self.bits_per_sample)?;
        s.rw32(&mut self.subchunk2_id)?;
        s.rw32(&mut self.subchunk2_size)?;

        if self.riff_id != RIFF_CHUNK_ID {
            return Err(Error::WaveHeaderInvalid(format!(
                "bad RIFF magic 0x{:08X}",
                self.riff_id
            )));
        }
        if self.wave_id != WAVE_CHUNK_ID {
            return Err(Error::WaveHeaderInvalid(format!(
                "bad WAVE magic 0x{:08X}",
                self.wave_id
            )));
        }
        if self.format_id != FORMAT_CHUNK_ID {
            return Err(Error::WaveHeaderInvalid(format!(
                "bad fmt magic 0x{:08X}",
                self.format_id
            )));
        }
        Ok(())
    }
}
