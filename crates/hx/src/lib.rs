//! # hx
//!
//! Reader/writer for the `.hx` audio resource containers used by Ubisoft
//! games (Rayman 3, Largo Winch) across their console ports.
//!
//! A container is a self-describing bundle of typed entries addressed by
//! 64-bit CUUIDs. Entries form a directed graph: `EventResData` entries
//! name playback events and link to resource sets (`WavResData`,
//! `SwitchResData`, `RandomResData`, `ProgramResData`), whose leaves are
//! `WaveFileIdObj` entries wrapping platform audio streams in RIFF/WAVE
//! envelopes. Payloads are either inline or referenced in sibling stream
//! files.
//!
//! ## Supported variants
//!
//! | Extension | Platform | Byte order |
//! |-----------|----------|------------|
//! | `.hxd` | PC (Largo Winch) | big-endian |
//! | `.hxc` | PC | little-endian |
//! | `.hx2` | PlayStation 2 | little-endian |
//! | `.hxg` | GameCube | big-endian |
//! | `.hxx` | Xbox | big-endian |
//! | `.hx3` | PlayStation 3 | little-endian |
//!
//! ## Audio
//!
//! GameCube DSP-ADPCM streams decode to (and encode from) 16-bit PCM;
//! PlayStation PSX-ADPCM streams decode to PCM. Other formats pass
//! through opaquely.
//!
//! ## File access
//!
//! The library performs no file I/O of its own. Callers supply a
//! [`FileIo`] implementation; the container file, external stream files
//! and extracted `.wav` output all go through it.

pub mod audio;
pub mod codec;
pub mod container;
pub mod error;
pub mod stream;
pub mod types;
pub mod wave;

pub use audio::{convert, AudioFormat, AudioStream, AudioStreamInfo};
pub use container::{Container, FileIo, INDEX_MAGIC};
pub use error::{Error, Result};
pub use stream::{Endianness, Mode, Stream};
pub use types::{
    Body, Class, Cuuid, Entry, EventResData, IdObjPtr, Language, LanguageLink,
    ProgramResData, RandomResData, RandomResDataLink, SwitchResData, SwitchResDataLink,
    Version, WavResData, WavResDataLink, WavResObj, WaveFileIdObj, ID_OBJ_FLAG_EXTERNAL,
    INVALID_CUUID, STRING_MAX_LENGTH, WAV_RES_DATA_FLAG_MULTIPLE,
};
pub use wave::WaveHeader;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{dsp_decode, dsp_encode, psx_decode, DspHeader};
    use std::collections::HashMap;
    use std::io;

    /// In-memory file store standing in for the host callbacks.
    #[derive(Default)]
    struct MemoryIo {
        files: HashMap<String, Vec<u8>>,
    }

    impl FileIo for MemoryIo {
        fn read(
            &mut self,
            filename: &str,
            offset: u64,
            size: Option<usize>,
        ) -> io::Result<Vec<u8>> {
            let file = self
                .files
                .get(filename)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, filename.to_string()))?;
            let start = offset as usize;
            let end = size.map(|s| start + s).unwrap_or(file.len());
            file.get(start..end)
                .map(|bytes| bytes.to_vec())
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "short read"))
        }

        fn write(&mut self, filename: &str, data: &[u8], offset: u64) -> io::Result<()> {
            let file = self.files.entry(filename.to_string()).or_default();
            let start = offset as usize;
            let end = start + data.len();
            if file.len() < end {
                file.resize(end, 0);
            }
            file[start..end].copy_from_slice(data);
            Ok(())
        }
    }

    fn le_samples(data: &[u8]) -> Vec<i16> {
        data.chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    fn dsp_input(num_samples: u32, frames: &[u8]) -> AudioStream {
        let mut s = Stream::writer(Endianness::Big);
        let mut header = DspHeader {
            num_samples,
            sample_rate: 22050,
            ..DspHeader::default()
        };
        header.rw(&mut s).unwrap();
        let mut payload = frames.to_vec();
        s.rw(&mut payload).unwrap();

        AudioStream {
            info: AudioStreamInfo {
                num_channels: 1,
                endianness: Endianness::Big,
                sample_rate: 22050,
                num_samples,
                format: AudioFormat::Dsp,
                wavefile_cuuid: 0,
            },
            data: s.into_inner(),
        }
    }

    // ==================== AUDIO CODEC TESTS ====================

    #[test]
    fn test_dsp_zero_frame_decodes_to_silence() {
        let input = dsp_input(14, &[0u8; 8]);
        let mut output = AudioStream::default();
        dsp_decode(&input, &mut output).unwrap();

        assert_eq!(output.info.format, AudioFormat::Pcm);
        assert_eq!(output.info.num_samples, 14);
        assert_eq!(output.data.len(), 28);
        assert!(output.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_dsp_partial_frame_is_zero_padded() {
        // Scale exponent 0 with zero coefficients decodes each nibble to
        // its own value. Seven samples: 1..=7, then frame padding.
        let input = dsp_input(7, &[0x00, 0x12, 0x34, 0x56, 0x70, 0x00, 0x00, 0x00]);
        let mut output = AudioStream::default();
        dsp_decode(&input, &mut output).unwrap();

        assert_eq!(output.data.len(), 28);
        assert_eq!(
            le_samples(&output.data),
            vec![1, 2, 3, 4, 5, 6, 7, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_dsp_decode_saturates() {
        // Scale exponent 15 drives samples far past the 16-bit range.
        let input = dsp_input(14, &[0x0F, 0x77, 0x77, 0x77, 0x88, 0x88, 0x88, 0x77]);
        let mut output = AudioStream::default();
        dsp_decode(&input, &mut output).unwrap();

        let samples = le_samples(&output.data);
        assert!(samples.iter().all(|&s| s == i16::MAX || s == i16::MIN));
    }

    #[test]
    fn test_dsp_encode_decode_exact_on_grid() {
        // Multiples of the quantization step survive the roundtrip
        // bit-exactly.
        let pcm: Vec<i16> = vec![
            0, 64, -64, 128, -128, 192, -192, 256, -256, 320, -320, 384, -384, 448,
        ];
        let mut data = vec![0u8; pcm.len() * 2];
        for (chunk, sample) in data.chunks_exact_mut(2).zip(&pcm) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }

        let input = AudioStream {
            info: AudioStreamInfo {
                num_channels: 1,
                endianness: Endianness::Little,
                sample_rate: 22050,
                num_samples: pcm.len() as u32,
                format: AudioFormat::Pcm,
                wavefile_cuuid: 0,
            },
            data,
        };

        let mut encoded = AudioStream::default();
        dsp_encode(&input, &mut encoded).unwrap();
        assert_eq!(encoded.info.format, AudioFormat::Dsp);
        assert_eq!(encoded.info.endianness, Endianness::Big);
        assert_eq!(encoded.data.len(), 96 + 8);
        // The header leads with the sample count, big-endian.
        assert_eq!(&encoded.data[0..4], &14u32.to_be_bytes());

        let mut decoded = AudioStream::default();
        dsp_decode(&encoded, &mut decoded).unwrap();
        assert_eq!(le_samples(&decoded.data), pcm);
    }

    #[test]
    fn test_dsp_encode_decode_error_is_bounded() {
        let pcm: Vec<i16> = vec![
            1000, -2000, 3000, -4000, 5000, -6000, 7000, -8000, 9000, -10000, 11000,
            -12000, 13000, -14000,
        ];
        let mut data = vec![0u8; pcm.len() * 2];
        for (chunk, sample) in data.chunks_exact_mut(2).zip(&pcm) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }

        let input = AudioStream {
            info: AudioStreamInfo {
                num_channels: 1,
                endianness: Endianness::Little,
                sample_rate: 22050,
                num_samples: pcm.len() as u32,
                format: AudioFormat::Pcm,
                wavefile_cuuid: 0,
            },
            data,
        };

        let mut encoded = AudioStream::default();
        dsp_encode(&input, &mut encoded).unwrap();
        let mut decoded = AudioStream::default();
        dsp_decode(&encoded, &mut decoded).unwrap();

        // 14000 needs scale 11, so the quantization step is 2048.
        let step = 2048i32;
        for (orig, back) in pcm.iter().zip(le_samples(&decoded.data)) {
            assert!((*orig as i32 - back as i32).abs() <= step);
        }
    }

    #[test]
    fn test_psx_coefficient_one_decays() {
        // Frame 1 (predictor 0, shift 2) leaves history at 1024; frame 2
        // (predictor 1) multiplies it by 0.9375 per sample.
        let mut data = vec![0u8; 32];
        data[0] = 0x02; // predictor 0, shift 2
        data[15] = 0x10; // last sample nibble = 1 -> (1 << 12) >> 2 = 1024
        data[16] = 0x10; // predictor 1, shift 0

        let input = AudioStream {
            info: AudioStreamInfo {
                num_channels: 1,
                endianness: Endianness::Little,
                sample_rate: 22050,
                num_samples: 0,
                format: AudioFormat::Psx,
                wavefile_cuuid: 0,
            },
            data,
        };

        let mut output = AudioStream::default();
        psx_decode(&input, &mut output).unwrap();
        assert_eq!(output.info.num_samples, 56);
        assert_eq!(output.data.len(), 112);

        let samples = le_samples(&output.data);
        assert_eq!(samples[27], 1024);
        assert_eq!(&samples[28..32], &[960, 900, 843, 790]);
    }

    #[test]
    fn test_psx_predictor_out_of_range_fails() {
        let mut data = vec![0u8; 16];
        data[0] = 0x50; // predictor 5
        let input = AudioStream {
            info: AudioStreamInfo {
                num_channels: 1,
                endianness: Endianness::Little,
                sample_rate: 22050,
                num_samples: 0,
                format: AudioFormat::Psx,
                wavefile_cuuid: 0,
            },
            data,
        };
        let mut output = AudioStream::default();
        assert!(matches!(
            psx_decode(&input, &mut output),
            Err(Error::MalformedFrame { predictor: 5 })
        ));

        // Predictor 4 is the last valid index.
        let mut data = vec![0u8; 16];
        data[0] = 0x40;
        let input = AudioStream { data, ..input };
        assert!(psx_decode(&input, &mut output).is_ok());
    }

    #[test]
    fn test_convert_dispatch() {
        let input = AudioStream {
            info: AudioStreamInfo {
                num_channels: 1,
                endianness: Endianness::Little,
                sample_rate: 22050,
                num_samples: 2,
                format: AudioFormat::Pcm,
                wavefile_cuuid: 0,
            },
            data: vec![1, 0, 2, 0],
        };

        let mut output = AudioStream::default();
        convert(&input, &mut output).unwrap();
        assert_eq!(output.data, input.data);

        let mut mp3 = AudioStream::default();
        mp3.info.format = AudioFormat::Mp3;
        assert!(matches!(
            convert(&input, &mut mp3),
            Err(Error::UnsupportedConversion {
                from: AudioFormat::Pcm,
                to: AudioFormat::Mp3,
            })
        ));
    }

    #[test]
    fn test_dsp_stream_pcm_size_query() {
        let input = dsp_input(14, &[0u8; 8]);
        assert_eq!(input.pcm_size(), 28);
    }

    #[test]
    fn test_wav_output_is_little_endian() {
        let stream = AudioStream {
            info: AudioStreamInfo {
                num_channels: 1,
                endianness: Endianness::Little,
                sample_rate: 22050,
                num_samples: 2,
                format: AudioFormat::Pcm,
                wavefile_cuuid: 0,
            },
            data: vec![0x01, 0x02, 0x03, 0x04],
        };

        let mut io = MemoryIo::default();
        stream.write_wav(&mut io, "out.wav").unwrap();

        let file = &io.files["out.wav"];
        assert_eq!(file.len(), 44 + 4);
        assert_eq!(&file[0..4], b"RIFF");
        assert_eq!(&file[4..8], &40u32.to_le_bytes()); // riff length
        assert_eq!(&file[24..28], &22050u32.to_le_bytes()); // sample rate
        assert_eq!(&file[40..44], &4u32.to_le_bytes()); // subchunk2 size
        assert_eq!(&file[44..], &[0x01, 0x02, 0x03, 0x04]);
    }

    // ==================== CONTAINER TESTS ====================

    fn raw_container(endianness: Endianness, magic: u32, index_type: u32, count: u32) -> Vec<u8> {
        let mut s = Stream::writer(endianness);
        let mut offset = 4u32;
        s.rw32(&mut offset).unwrap();
        let (mut magic, mut index_type, mut count) = (magic, index_type, count);
        s.rw32(&mut magic).unwrap();
        s.rw32(&mut index_type).unwrap();
        s.rw32(&mut count).unwrap();
        s.into_inner()
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let data = raw_container(Endianness::Little, INDEX_MAGIC, 2, 0);
        let mut io = MemoryIo::default();
        assert!(matches!(
            Container::from_bytes(data, Version::Hxc, &mut io),
            Err(Error::EmptyFile)
        ));
    }

    #[test]
    fn test_bad_index_magic_is_rejected() {
        let data = raw_container(Endianness::Little, 0x12345678, 2, 1);
        let mut io = MemoryIo::default();
        assert!(matches!(
            Container::from_bytes(data, Version::Hxc, &mut io),
            Err(Error::InvalidHeader { actual: 0x12345678, .. })
        ));
    }

    #[test]
    fn test_bad_index_type_is_rejected() {
        let data = raw_container(Endianness::Little, INDEX_MAGIC, 3, 1);
        let mut io = MemoryIo::default();
        assert!(matches!(
            Container::from_bytes(data, Version::Hxc, &mut io),
            Err(Error::InvalidIndexType(3))
        ));
    }

    #[test]
    fn test_unknown_class_is_skipped() {
        let mut s = Stream::writer(Endianness::Little);
        let mut offset = 4u32;
        s.rw32(&mut offset).unwrap();
        let mut magic = INDEX_MAGIC;
        let mut index_type = 2u32;
        let mut count = 1u32;
        s.rw32(&mut magic).unwrap();
        s.rw32(&mut index_type).unwrap();
        s.rw32(&mut count).unwrap();

        let name = b"CFooResData";
        let mut length = name.len() as u32;
        s.rw32(&mut length).unwrap();
        s.rw(&mut name.to_vec()).unwrap();
        let mut cuuid = 0xABu64;
        s.rw_cuuid(&mut cuuid).unwrap();
        let mut words = [4u32, 0, 0, 0, 0]; // offset, size, zero, links, languages
        for word in &mut words {
            s.rw32(word).unwrap();
        }

        let mut io = MemoryIo::default();
        let container = Container::from_bytes(s.into_inner(), Version::Hxc, &mut io).unwrap();
        assert_eq!(container.num_entries(), 0);
    }

    fn build_hxg_container() -> Container {
        let event_cuuid = 0x0000_0001_0000_0001;
        let wav_cuuid = 0x0000_0002_0000_0001;
        let wavefile_cuuid = 0x0000_0003_0000_0001;

        let event = EventResData {
            kind: 2,
            name: "Play_jump".into(),
            flags: 0,
            link: wav_cuuid,
            params: [0.0, 1.0, 0.5, 2.0],
        };

        let wav = WavResData {
            obj: WavResObj {
                id: 7,
                size: 28,
                c: [0.0; 3],
                flags: WAV_RES_DATA_FLAG_MULTIPLE,
                name: String::new(),
            },
            default_cuuid: 0,
            links: vec![WavResDataLink {
                language_code: u32::from_be_bytes(*b"en  "),
                cuuid: wavefile_cuuid,
            }],
        };

        let pcm: Vec<u8> = (0..28).collect();
        let wave_header = WaveHeader {
            riff_length: 28 + 36,
            subchunk2_size: 28,
            ..WaveHeader::default()
        };
        let wavefile = WaveFileIdObj {
            wave_header,
            audio: AudioStream {
                info: AudioStreamInfo {
                    num_channels: 1,
                    endianness: Endianness::Big,
                    sample_rate: 22050,
                    num_samples: 0,
                    format: AudioFormat::Pcm,
                    wavefile_cuuid,
                },
                data: pcm,
            },
            ..WaveFileIdObj::default()
        };

        let mut container = Container::new(Version::Hxg);
        let mut event_entry = Entry::new(event_cuuid, Body::Event(event));
        event_entry.links = vec![wav_cuuid];
        container.push_entry(event_entry);
        container.push_entry(Entry::new(wav_cuuid, Body::Wav(wav)));
        container.push_entry(Entry::new(wavefile_cuuid, Body::WaveFile(Box::new(wavefile))));
        container
    }

    #[test]
    fn test_hxg_roundtrip_preserves_graph_and_names() {
        let mut io = MemoryIo::default();
        let mut container = build_hxg_container();
        let data = container.to_bytes(&mut io).unwrap();

        // HXG files end with 32 bytes of zero padding.
        assert!(data.len() > 32);
        assert!(data[data.len() - 32..].iter().all(|&b| b == 0));

        let first = Container::from_bytes(data, Version::Hxg, &mut io).unwrap();
        assert_eq!(first.num_entries(), 3);

        let event = first.find_entry(0x0000_0001_0000_0001).unwrap();
        let Body::Event(event_data) = &event.body else {
            panic!("expected event body");
        };
        assert_eq!(event_data.name, "Play_jump");
        assert_eq!(event_data.link, 0x0000_0002_0000_0001);
        assert_eq!(event_data.params, [0.0, 1.0, 0.5, 2.0]);

        // The HXG post-read pass copies the event name to the linked
        // WavResData and derives localized wave-file names.
        let wav = first.find_entry(0x0000_0002_0000_0001).unwrap();
        let Body::Wav(wav_data) = &wav.body else {
            panic!("expected wav body");
        };
        assert_eq!(wav_data.obj.name, "Play_jump");
        assert_eq!(wav_data.links.len(), 1);
        assert_eq!(wav_data.links[0].language(), Language::En);

        let wavefile = first.find_entry(0x0000_0003_0000_0001).unwrap();
        let Body::WaveFile(wavefile_data) = &wavefile.body else {
            panic!("expected wave-file body");
        };
        assert_eq!(wavefile_data.name, "Play_jump_EN");
        assert_eq!(wavefile_data.audio.data, (0..28).collect::<Vec<u8>>());
        assert_eq!(wavefile_data.audio.info.wavefile_cuuid, 0x0000_0003_0000_0001);

        // A second write/read cycle reproduces the same entries.
        let mut first = first;
        let data = first.to_bytes(&mut io).unwrap();
        let second = Container::from_bytes(data, Version::Hxg, &mut io).unwrap();
        assert_eq!(first.entries(), second.entries());
    }

    #[test]
    fn test_hxg_multi_link_default_cuuid_must_be_zero() {
        let mut container = build_hxg_container();
        let entry = container.find_entry_mut(0x0000_0002_0000_0001).unwrap();
        let Body::Wav(wav) = &mut entry.body else {
            panic!("expected wav body");
        };
        wav.default_cuuid = 0xDEAD;

        let mut io = MemoryIo::default();
        assert!(matches!(
            container.to_bytes(&mut io),
            Err(Error::HeaderMismatch(_))
        ));
    }

    #[test]
    fn test_open_resolves_version_from_extension() {
        let mut io = MemoryIo::default();
        let mut container = build_hxg_container();
        container.write("jungle.hxg", &mut io).unwrap();

        let back = Container::open("jungle.hxg", &mut io).unwrap();
        assert_eq!(back.version(), Version::Hxg);
        assert_eq!(back.num_entries(), 3);

        assert!(matches!(
            Container::open("jungle.wav", &mut io),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Container::open("", &mut io),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_hx2_external_stream_roundtrip() {
        let payload: Vec<u8> = (0..16).map(|i| i * 3).collect();
        let mut io = MemoryIo::default();
        io.files.insert("stream.bin".into(), payload.clone());

        let wavefile = WaveFileIdObj {
            id_obj: IdObjPtr {
                id: 1,
                unknown: 0.0,
                flags: ID_OBJ_FLAG_EXTERNAL,
                unknown2: 0,
            },
            ext_stream_filename: ".\\stream.bin".into(),
            ext_stream_size: payload.len() as u32,
            ext_stream_offset: 0,
            wave_header: WaveHeader {
                riff_length: 44,
                subchunk2_id: wave::EXT_DATA_CHUNK_ID,
                subchunk2_size: 8,
                ..WaveHeader::default()
            },
            audio: AudioStream {
                info: AudioStreamInfo {
                    num_channels: 1,
                    endianness: Endianness::Little,
                    sample_rate: 22050,
                    num_samples: 0,
                    format: AudioFormat::Pcm,
                    wavefile_cuuid: 0x0000_0003_0000_0042,
                },
                data: payload.clone(),
            },
            extra_wave_data: vec![0xAA, 0xBB, 0xCC, 0xDD],
            ..WaveFileIdObj::default()
        };

        let mut container = Container::new(Version::Hx2);
        container.push_entry(Entry::new(
            0x0000_0003_0000_0042,
            Body::WaveFile(Box::new(wavefile)),
        ));

        let data = container.to_bytes(&mut io).unwrap();
        // HX2 files also end with the 32-byte zero padding.
        assert!(data[data.len() - 32..].iter().all(|&b| b == 0));
        // The write path placed the payload into the sibling file under
        // the unstripped name.
        assert_eq!(io.files[".\\stream.bin"], payload);
        io.files.insert(".\\stream.bin".into(), payload.clone());

        let back = Container::from_bytes(data, Version::Hx2, &mut io).unwrap();
        let entry = back.find_entry(0x0000_0003_0000_0042).unwrap();
        let Body::WaveFile(obj) = &entry.body else {
            panic!("expected wave-file body");
        };
        // The legacy ".\" prefix is stripped on read.
        assert_eq!(obj.ext_stream_filename, "stream.bin");
        assert_eq!(obj.ext_stream_size, payload.len() as u32);
        assert_eq!(obj.audio.data, payload);
        assert_eq!(obj.extra_wave_data, vec![0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_program_link_scan_recovers_references() {
        let mut blob = vec![0x00, 0x01];
        blob.push(b'E');
        blob.extend_from_slice(&[0, 0, 0, 3]); // high word 3
        blob.extend_from_slice(&[0, 0, 0, 7]); // low word
        blob.push(b'E'); // truncated reference, ignored
        blob.extend_from_slice(&[0, 0]);

        let program = ProgramResData {
            data: blob.clone(),
            links: Vec::new(),
        };

        let mut container = Container::new(Version::Hxg);
        container.push_entry(Entry::new(
            0x0000_0005_0000_0001,
            Body::Program(program),
        ));

        let mut io = MemoryIo::default();
        let data = container.to_bytes(&mut io).unwrap();
        let back = Container::from_bytes(data, Version::Hxg, &mut io).unwrap();

        let entry = back.find_entry(0x0000_0005_0000_0001).unwrap();
        let Body::Program(program) = &entry.body else {
            panic!("expected program body");
        };
        assert_eq!(program.data, blob);
        assert_eq!(program.links, vec![0x0000_0003_0000_0007]);
    }

    #[test]
    fn test_header_cuuid_mismatch_is_detected() {
        let mut io = MemoryIo::default();
        let mut container = build_hxg_container();
        let mut data = container.to_bytes(&mut io).unwrap();

        // Corrupt the CUUID inside the first entry body (right after the
        // 4-byte length and the "CEventResData" class name).
        let cuuid_pos = 4 + 4 + "CEventResData".len();
        data[cuuid_pos] ^= 0xFF;

        assert!(matches!(
            Container::from_bytes(data, Version::Hxg, &mut io),
            Err(Error::HeaderMismatch(_))
        ));
    }
}
