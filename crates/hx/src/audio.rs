//! Audio stream types and format conversion.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::codec;
use crate::container::FileIo;
use crate::error::{Error, Result};
use crate::stream::{Endianness, Stream};
use crate::types::Cuuid;
use crate::wave::WaveHeader;

/// Audio payload format code, as stored in the wave `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Signed 16-bit PCM.
    Pcm = 0x01,
    /// Ubisoft ADPCM.
    Ubi = 0x02,
    /// Sony PlayStation ADPCM.
    Psx = 0x03,
    /// Nintendo GameCube 4-bit DSP-ADPCM.
    Dsp = 0x04,
    /// Microsoft IMA ADPCM.
    Ima = 0x05,
    /// MPEG layer 3.
    Mp3 = 0x55,
}

impl AudioFormat {
    /// Resolve a format from its wave-chunk code.
    pub fn from_code(code: u16) -> Option<AudioFormat> {
        match code {
            0x01 => Some(AudioFormat::Pcm),
            0x02 => Some(AudioFormat::Ubi),
            0x03 => Some(AudioFormat::Psx),
            0x04 => Some(AudioFormat::Dsp),
            0x05 => Some(AudioFormat::Ima),
            0x55 => Some(AudioFormat::Mp3),
            _ => None,
        }
    }

    /// The wave-chunk code of this format.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Human-readable codec name.
    pub fn name(self) -> &'static str {
        match self {
            AudioFormat::Pcm => "pcm",
            AudioFormat::Ubi => "ubi-adpcm",
            AudioFormat::Psx => "psx-adpcm",
            AudioFormat::Dsp => "dsp-adpcm",
            AudioFormat::Ima => "ima-adpcm",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        AudioFormat::Pcm
    }
}

/// Parameters of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamInfo {
    pub num_channels: u8,
    /// Byte order of the payload samples.
    pub endianness: Endianness,
    /// Usually 11025 or 22050 Hz.
    pub sample_rate: u32,
    pub num_samples: u32,
    pub format: AudioFormat,
    /// CUUID of the wave-file entry that owns this stream.
    pub wavefile_cuuid: Cuuid,
}

impl Default for AudioStreamInfo {
    fn default() -> Self {
        Self {
            num_channels: 0,
            endianness: Endianness::native(),
            sample_rate: 0,
            num_samples: 0,
            format: AudioFormat::Pcm,
            wavefile_cuuid: 0,
        }
    }
}

/// An audio payload with its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStream {
    pub info: AudioStreamInfo,
    /// Raw payload bytes in `info.format` / `info.endianness`.
    pub data: Vec<u8>,
}

impl AudioStream {
    /// Payload size in bytes.
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// The size of this stream once decoded to PCM: the payload size for
    /// PCM streams, the frame-rounded size for DSP streams (the sample
    /// count sits in the first word of the channel header), zero for
    /// formats without a size query.
    pub fn pcm_size(&self) -> u32 {
        match self.info.format {
            AudioFormat::Pcm => self.size(),
            AudioFormat::Dsp => {
                if self.data.len() < 4 {
                    return 0;
                }
                let num_samples = match self.info.endianness {
                    Endianness::Big => BigEndian::read_u32(&self.data),
                    Endianness::Little => LittleEndian::read_u32(&self.data),
                };
                codec::dsp_pcm_size(num_samples)
            }
            _ => 0,
        }
    }

    /// Wrap the payload in a RIFF/WAVE envelope and emit it through the
    /// host write callback. The produced file is always little-endian.
    pub fn write_wav(&self, io: &mut dyn FileIo, filename: &str) -> Result<()> {
        let bits_per_sample = 16u32;
        let mut header = WaveHeader {
            sample_rate: self.info.sample_rate,
            num_channels: self.info.num_channels as u16,
            bits_per_sample: bits_per_sample as u16,
            bytes_per_second: self.info.num_channels as u32 * self.info.sample_rate
                * bits_per_sample
                / 8,
            block_alignment: (self.info.num_channels as u32 * bits_per_sample / 8) as u16,
            subchunk2_size: self.size(),
            ..WaveHeader::default()
        };
        header.riff_length = header.subchunk2_size + WaveHeader::SIZE as u32 - 8;

        let mut s = Stream::writer(Endianness::Little);
        header.rw(&mut s)?;
        let mut data = self.data.clone();
        s.rw(&mut data)?;
        io.write(filename, &s.into_inner(), 0)?;
        Ok(())
    }
}

/// Convert audio data between formats.
///
/// The desired output parameters are taken from `output.info`; the decoded
/// or encoded payload is stored in `output.data`. A PCM to PCM conversion
/// is a plain copy. Anything outside PCM <-> DSP and PSX -> PCM fails with
/// [`Error::UnsupportedConversion`].
pub fn convert(input: &AudioStream, output: &mut AudioStream) -> Result<()> {
    match (input.info.format, output.info.format) {
        (AudioFormat::Pcm, AudioFormat::Pcm) => {
            output.info = input.info;
            output.data = input.data.clone();
            Ok(())
        }
        (AudioFormat::Dsp, AudioFormat::Pcm) => codec::dsp_decode(input, output),
        (AudioFormat::Pcm, AudioFormat::Dsp) => codec::dsp_encode(input, output),
        (AudioFormat::Psx, AudioFormat::Pcm) => codec::psx_decode(input, output),
        (from, to) => Err(Error::UnsupportedConversion { from, to }),
    }
}
