//! Core container data types.
//!
//! A `.hx` file is a bundle of typed entries addressed by 64-bit CUUIDs.
//! Entries reference each other by CUUID only, forming a directed graph:
//! events link to resource sets, resource sets link to wave-file objects,
//! wave-file objects wrap the platform audio streams.

use crate::audio::{AudioFormat, AudioStream};
use crate::error::{Error, Result};
use crate::stream::Endianness;
use crate::wave::WaveHeader;

/// 64-bit unique entry identifier. Serialized high word first.
pub type Cuuid = u64;

/// The null CUUID.
pub const INVALID_CUUID: Cuuid = 0;

/// Upper bound for every length-prefixed name in the container.
pub const STRING_MAX_LENGTH: usize = 256;

/// File format variant, one per target platform.
///
/// The variant fixes the byte order of the container, the platform tag
/// injected into non-cross-version class names, and the audio formats the
/// platform shipped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Largo Winch (PC), big-endian.
    Hxd,
    /// Rayman 3 PC, little-endian.
    Hxc,
    /// Rayman 3 PlayStation 2, little-endian.
    Hx2,
    /// Rayman 3 GameCube, big-endian.
    Hxg,
    /// Rayman 3 Xbox (and HD), big-endian.
    Hxx,
    /// Rayman 3 PlayStation 3 HD, little-endian.
    Hx3,
}

impl Version {
    /// All known variants, in declaration order.
    pub const ALL: [Version; 6] = [
        Version::Hxd,
        Version::Hxc,
        Version::Hx2,
        Version::Hxg,
        Version::Hxx,
        Version::Hx3,
    ];

    /// Resolve a variant from a file extension (case-insensitive, without
    /// the leading dot).
    pub fn from_extension(ext: &str) -> Option<Version> {
        Version::ALL
            .into_iter()
            .find(|v| v.extension().eq_ignore_ascii_case(ext))
    }

    /// The file extension of this variant.
    pub fn extension(self) -> &'static str {
        match self {
            Version::Hxd => "hxd",
            Version::Hxc => "hxc",
            Version::Hx2 => "hx2",
            Version::Hxg => "hxg",
            Version::Hxx => "hxx",
            Version::Hx3 => "hx3",
        }
    }

    /// The platform tag injected into non-cross-version class names.
    pub fn platform(self) -> &'static str {
        match self {
            Version::Hxd | Version::Hxc => "PC",
            Version::Hx2 => "PS2",
            Version::Hxg => "GC",
            Version::Hxx => "XBox",
            Version::Hx3 => "PS3",
        }
    }

    /// Container byte order of this variant.
    pub fn endianness(self) -> Endianness {
        match self {
            Version::Hxd | Version::Hxg | Version::Hxx => Endianness::Big,
            Version::Hxc | Version::Hx2 | Version::Hx3 => Endianness::Little,
        }
    }

    /// The audio formats the platform shipped with. Carried as data; the
    /// codec dispatch does not enforce it.
    pub fn supported_formats(self) -> &'static [AudioFormat] {
        match self {
            Version::Hxc => &[AudioFormat::Ubi, AudioFormat::Pcm],
            Version::Hx2 => &[AudioFormat::Psx],
            Version::Hxg => &[AudioFormat::Dsp],
            Version::Hxd | Version::Hxx | Version::Hx3 => &[],
        }
    }
}

/// Entry class tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    EventResData,
    WavResData,
    SwitchResData,
    RandomResData,
    ProgramResData,
    WaveFileIdObj,
}

impl Class {
    /// The class-name fragment after the `C` prefix and the platform tag.
    pub fn fragment(self) -> &'static str {
        match self {
            Class::EventResData => "EventResData",
            Class::WavResData => "WavResData",
            Class::SwitchResData => "SwitchResData",
            Class::RandomResData => "RandomResData",
            Class::ProgramResData => "ProgramResData",
            Class::WaveFileIdObj => "WaveFileIdObj",
        }
    }

    /// Whether the serialized name omits the platform tag.
    pub fn cross_version(self) -> bool {
        match self {
            Class::EventResData
            | Class::SwitchResData
            | Class::RandomResData
            | Class::ProgramResData => true,
            Class::WavResData | Class::WaveFileIdObj => false,
        }
    }

    /// Format the serialized class name for a variant:
    /// `"C" + platform_tag? + fragment`.
    pub fn name(self, version: Version) -> String {
        if self.cross_version() {
            format!("C{}", self.fragment())
        } else {
            format!("C{}{}", version.platform(), self.fragment())
        }
    }

    /// Parse a serialized class name: require the leading `C`, strip a
    /// platform tag if one is present, then match the fragment.
    pub fn from_name(name: &str) -> Result<Class> {
        let mut rest = name
            .strip_prefix('C')
            .ok_or_else(|| Error::UnknownClass(name.to_string()))?;
        for tag in ["PC", "GC", "PS2", "PS3", "XBox"] {
            if let Some(stripped) = rest.strip_prefix(tag) {
                rest = stripped;
                break;
            }
        }
        match rest {
            "EventResData" => Ok(Class::EventResData),
            "WavResData" => Ok(Class::WavResData),
            "SwitchResData" => Ok(Class::SwitchResData),
            "RandomResData" => Ok(Class::RandomResData),
            "ProgramResData" => Ok(Class::ProgramResData),
            "WaveFileIdObj" => Ok(Class::WaveFileIdObj),
            _ => Err(Error::UnknownClass(name.to_string())),
        }
    }
}

/// Localization tag of a language link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    De,
    En,
    Es,
    Fr,
    It,
    Unknown,
}

impl Language {
    /// Map a raw 32-bit language code (as read from the container) to a
    /// tag. The four code bytes spell e.g. `"en  "`; depending on the
    /// container byte order they land in the word in either direction, so
    /// both are accepted.
    pub fn from_code(code: u32) -> Language {
        let be = code.to_be_bytes();
        let le = code.to_le_bytes();
        for bytes in [be, le] {
            match &bytes {
                b"de  " => return Language::De,
                b"en  " => return Language::En,
                b"es  " => return Language::Es,
                b"fr  " => return Language::Fr,
                b"it  " => return Language::It,
                _ => {}
            }
        }
        Language::Unknown
    }

    /// The canonical four-byte code of this tag.
    pub fn code(self) -> Option<[u8; 4]> {
        match self {
            Language::De => Some(*b"de  "),
            Language::En => Some(*b"en  "),
            Language::Es => Some(*b"es  "),
            Language::Fr => Some(*b"fr  "),
            Language::It => Some(*b"it  "),
            Language::Unknown => None,
        }
    }

    /// Uppercase display tag used when deriving wave-file names.
    pub fn tag(self) -> &'static str {
        match self {
            Language::De => "DE",
            Language::En => "EN",
            Language::Es => "ES",
            Language::Fr => "FR",
            Language::It => "IT",
            Language::Unknown => "Unknown Language",
        }
    }
}

/// An event called by the game to start or stop audio playback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventResData {
    /// Event type code.
    pub kind: u32,
    /// The name of the event. Usually starts with `Play_` or `Stop_`.
    pub name: String,
    pub flags: u32,
    /// The linked resource entry (WavResData, Switch/Random/Program).
    pub link: Cuuid,
    /// Unknown parameters.
    pub params: [f32; 4],
}

/// Superclass data embedded at the front of [`WavResData`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WavResObj {
    pub id: u32,
    /// Only serialized on HXG/HX2.
    pub size: u32,
    /// Unknown parameters.
    pub c: [f32; 3],
    pub flags: u8,
    /// Resource name. Only serialized on HXC; derived on HXG.
    pub name: String,
}

/// WavResData flag: the entry carries a language link table instead of a
/// single default CUUID.
pub const WAV_RES_DATA_FLAG_MULTIPLE: u8 = 1 << 1;

/// A per-language link from a [`WavResData`] to a [`WaveFileIdObj`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WavResDataLink {
    /// Raw language code as stored in the file.
    pub language_code: u32,
    pub cuuid: Cuuid,
}

impl WavResDataLink {
    /// Decoded language tag of this link.
    pub fn language(&self) -> Language {
        Language::from_code(self.language_code)
    }
}

/// A set of [`WaveFileIdObj`] links, one per language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WavResData {
    pub obj: WavResObj,
    /// The single link when the multiple flag is absent. Must be zero on
    /// HXG when the multiple flag is set.
    pub default_cuuid: Cuuid,
    pub links: Vec<WavResDataLink>,
}

/// One case of a [`SwitchResData`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchResDataLink {
    pub case_index: u32,
    pub cuuid: Cuuid,
}

/// A switch statement over entry links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwitchResData {
    pub flag: u32,
    pub unknown: u32,
    pub unknown2: u32,
    pub start_index: u32,
    pub links: Vec<SwitchResDataLink>,
}

/// One weighted link of a [`RandomResData`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RandomResDataLink {
    pub probability: f32,
    pub cuuid: Cuuid,
}

/// A set of resource links with playback probabilities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RandomResData {
    pub flags: u32,
    /// Unknown offset.
    pub offset: f32,
    /// The probability of not playing at all.
    pub throw_probability: f32,
    pub links: Vec<RandomResDataLink>,
}

/// An interpreted program with embedded resource links.
///
/// The program bytecode is kept verbatim; `links` is recovered by a
/// heuristic scan and is advisory only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramResData {
    pub data: Vec<u8>,
    pub links: Vec<Cuuid>,
}

/// IdObjPtr flag: the payload lives in an external stream file.
pub const ID_OBJ_FLAG_EXTERNAL: u32 = 1 << 0;
/// IdObjPtr flag: the payload lives in the shared big file.
pub const ID_OBJ_FLAG_BIG_FILE: u32 = 1 << 1;

/// Location data for a resource, embedded at the front of
/// [`WaveFileIdObj`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdObjPtr {
    pub id: u32,
    pub unknown: f32,
    /// 8 bits on every variant except HXG, where it is a full 32-bit word.
    pub flags: u32,
    /// Only serialized on HXG.
    pub unknown2: u32,
}

/// References an audio stream and its location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveFileIdObj {
    pub id_obj: IdObjPtr,
    /// Derived name (set by the post-read pass, not serialized).
    pub name: String,
    /// Filename of the external stream file.
    pub ext_stream_filename: String,
    /// Size of the payload in the external stream file.
    pub ext_stream_size: u32,
    /// Offset of the payload in the external stream file.
    pub ext_stream_offset: u32,
    pub wave_header: WaveHeader,
    pub audio: AudioStream,
    /// Trailing wave bytes after the payload (padding or unknown chunks).
    pub extra_wave_data: Vec<u8>,
}

/// Class-specific entry body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Event(EventResData),
    Wav(WavResData),
    Switch(SwitchResData),
    Random(RandomResData),
    Program(ProgramResData),
    WaveFile(Box<WaveFileIdObj>),
}

impl Body {
    /// The class tag of this body.
    pub fn class(&self) -> Class {
        match self {
            Body::Event(_) => Class::EventResData,
            Body::Wav(_) => Class::WavResData,
            Body::Switch(_) => Class::SwitchResData,
            Body::Random(_) => Class::RandomResData,
            Body::Program(_) => Class::ProgramResData,
            Body::WaveFile(_) => Class::WaveFileIdObj,
        }
    }

    /// An empty body of the given class, ready to be filled by a reader.
    pub fn empty(class: Class) -> Body {
        match class {
            Class::EventResData => Body::Event(EventResData::default()),
            Class::WavResData => Body::Wav(WavResData::default()),
            Class::SwitchResData => Body::Switch(SwitchResData::default()),
            Class::RandomResData => Body::Random(RandomResData::default()),
            Class::ProgramResData => Body::Program(ProgramResData::default()),
            Class::WaveFileIdObj => Body::WaveFile(Box::default()),
        }
    }
}

/// A language link record of an index entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LanguageLink {
    /// Raw language code as stored in the file.
    pub code: u32,
    pub unknown: u32,
    pub cuuid: Cuuid,
}

impl LanguageLink {
    /// Decoded language tag of this link.
    pub fn language(&self) -> Language {
        Language::from_code(self.code)
    }
}

/// One typed record of a container, addressed by CUUID.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Unique identifier. May be shared across resource files.
    pub cuuid: Cuuid,
    /// Class-specific body data.
    pub body: Body,
    /// Linked entry CUUIDs (index type 2 only).
    pub links: Vec<Cuuid>,
    /// Language links (index type 2 only).
    pub language_links: Vec<LanguageLink>,
    /// Byte offset of the entry body within the file.
    pub file_offset: u32,
    /// Byte size of the entry body within the file.
    pub file_size: u32,
}

impl Entry {
    /// Create an entry with the given identifier and body.
    pub fn new(cuuid: Cuuid, body: Body) -> Self {
        Self {
            cuuid,
            body,
            links: Vec::new(),
            language_links: Vec::new(),
            file_offset: 0,
            file_size: 0,
        }
    }

    /// The class tag of this entry.
    pub fn class(&self) -> Class {
        self.body.class()
    }
}
