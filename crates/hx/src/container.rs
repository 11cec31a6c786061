//! Container reading and writing.
//!
//! A `.hx` file starts with a 32-bit offset to the index table. Entry
//! bodies follow; the index sits at the recorded offset and catalogs every
//! entry (class name, CUUID, body offset and size, links). Reading scans
//! the index first, then parses each body at its recorded offset and runs
//! a post-read pass to propagate names through the graph. Writing emits
//! bodies first, builds the index in a side stream, appends it and
//! back-patches the leading offset word.

use tracing::warn;

use crate::audio::AudioFormat;
use crate::error::{Error, Result};
use crate::stream::{Mode, Stream};
use crate::types::{
    Body, Class, Cuuid, Entry, EventResData, IdObjPtr, LanguageLink, ProgramResData,
    RandomResData, RandomResDataLink, SwitchResData, SwitchResDataLink, Version,
    WavResData, WavResDataLink, WavResObj, WaveFileIdObj, ID_OBJ_FLAG_EXTERNAL,
    STRING_MAX_LENGTH, WAV_RES_DATA_FLAG_MULTIPLE,
};
use crate::wave;

/// `"INDX"` index table magic.
pub const INDEX_MAGIC: u32 = 0x58444E49;

/// Host file access.
///
/// The library never touches the filesystem itself: the container file,
/// the external stream files it references and the extracted `.wav` output
/// all go through this seam. Implementations are free to cache handles
/// (shared archives like `RAYMAN3.HST` are read many times at different
/// offsets) or to serve buffers from memory.
pub trait FileIo {
    /// Read `size` bytes from `filename` starting at `offset`, or the rest
    /// of the file when `size` is `None`. Short data is an error.
    fn read(&mut self, filename: &str, offset: u64, size: Option<usize>)
        -> std::io::Result<Vec<u8>>;

    /// Write `data` to `filename` at `offset`.
    fn write(&mut self, filename: &str, data: &[u8], offset: u64) -> std::io::Result<()>;
}

/// An in-memory mapping of CUUIDs to typed entries, preserving file order.
#[derive(Debug)]
pub struct Container {
    version: Version,
    index_offset: u32,
    index_type: u32,
    entries: Vec<Entry>,
}

impl Container {
    /// Create an empty container for the given variant.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            index_offset: 0,
            index_type: 2,
            entries: Vec::new(),
        }
    }

    /// Open a container file. The variant is resolved from the filename
    /// extension; the file and any external streams it references are
    /// pulled through `io`.
    pub fn open(filename: &str, io: &mut dyn FileIo) -> Result<Self> {
        if filename.is_empty() {
            return Err(Error::InvalidArgument("empty filename".into()));
        }
        let version = filename
            .rsplit_once('.')
            .and_then(|(_, ext)| Version::from_extension(ext))
            .ok_or_else(|| {
                Error::InvalidArgument(format!("unrecognized file extension: {filename}"))
            })?;
        let data = io.read(filename, 0, None)?;
        Self::from_bytes(data, version, io)
    }

    /// Parse a container from a buffer of the given variant. External
    /// streams referenced by wave-file entries are pulled through `io`.
    pub fn from_bytes(data: Vec<u8>, version: Version, io: &mut dyn FileIo) -> Result<Self> {
        let mut container = Container::new(version);
        container.read(data, io)?;
        Ok(container)
    }

    /// The container variant.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The entries in file order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Mutable access to the entries.
    pub fn entries_mut(&mut self) -> &mut Vec<Entry> {
        &mut self.entries
    }

    /// Total number of entries.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Append an entry.
    pub fn push_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Find an entry by CUUID.
    pub fn find_entry(&self, cuuid: Cuuid) -> Option<&Entry> {
        self.entries.iter().find(|e| e.cuuid == cuuid)
    }

    /// Find an entry by CUUID, mutably.
    pub fn find_entry_mut(&mut self, cuuid: Cuuid) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.cuuid == cuuid)
    }

    /// Serialize the container and emit it through the host write
    /// callback. External wave streams are written to their own files.
    pub fn write(&mut self, filename: &str, io: &mut dyn FileIo) -> Result<()> {
        let data = self.to_bytes(io)?;
        io.write(filename, &data, 0)?;
        Ok(())
    }

    fn read(&mut self, data: Vec<u8>, io: &mut dyn FileIo) -> Result<()> {
        let mut s = Stream::reader(data, self.version.endianness());

        let mut index_offset = 0u32;
        s.rw32(&mut index_offset)?;
        s.seek(index_offset as usize);

        let mut index_code = 0u32;
        let mut index_type = 0u32;
        let mut num_entries = 0u32;
        s.rw32(&mut index_code)?;
        s.rw32(&mut index_type)?;
        s.rw32(&mut num_entries)?;

        if index_code != INDEX_MAGIC {
            return Err(Error::InvalidHeader {
                expected: INDEX_MAGIC,
                actual: index_code,
            });
        }
        if index_type != 1 && index_type != 2 {
            return Err(Error::InvalidIndexType(index_type));
        }
        if num_entries == 0 {
            return Err(Error::EmptyFile);
        }

        self.index_offset = index_offset;
        self.index_type = index_type;
        self.entries = Vec::with_capacity(num_entries as usize);

        for _ in 0..num_entries {
            let mut classname = String::new();
            rw_name(&mut s, &mut classname)?;

            let mut cuuid: Cuuid = 0;
            let mut file_offset = 0u32;
            let mut file_size = 0u32;
            let mut zero = 0u32;
            let mut num_links = 0u32;
            s.rw_cuuid(&mut cuuid)?;
            s.rw32(&mut file_offset)?;
            s.rw32(&mut file_size)?;
            s.rw32(&mut zero)?;
            s.rw32(&mut num_links)?;

            if zero != 0 {
                return Err(Error::HeaderMismatch(format!(
                    "reserved index word is 0x{zero:08X}, expected zero"
                )));
            }

            let mut links = Vec::new();
            let mut language_links = Vec::new();
            if index_type == 2 {
                links = vec![0 as Cuuid; num_links as usize];
                for link in &mut links {
                    s.rw_cuuid(link)?;
                }

                let mut num_languages = 0u32;
                s.rw32(&mut num_languages)?;
                language_links = vec![LanguageLink::default(); num_languages as usize];
                for link in &mut language_links {
                    s.rw32(&mut link.code)?;
                    s.rw32(&mut link.unknown)?;
                    s.rw_cuuid(&mut link.cuuid)?;
                }
            }

            let class = match Class::from_name(&classname) {
                Ok(class) => class,
                Err(_) => {
                    warn!(class = %classname, "skipping entry with unknown class");
                    continue;
                }
            };

            let mut entry = Entry {
                cuuid,
                body: Body::empty(class),
                links,
                language_links,
                file_offset,
                file_size,
            };

            let saved = s.pos();
            s.seek(file_offset as usize);
            entry_body_rw(&mut entry, &mut s, self.version, io)?;
            s.seek(saved);

            self.entries.push(entry);
        }

        self.postread();
        Ok(())
    }

    /// Propagate human-readable names down the entry graph. Both passes
    /// are idempotent and independent of entry order.
    fn postread(&mut self) {
        // The HXG WavResObj carries no name of its own; derive it from the
        // EventResData entries that link to it.
        if self.version == Version::Hxg {
            let mut renames: Vec<(Cuuid, String)> = Vec::new();
            for entry in &self.entries {
                if let Body::Event(event) = &entry.body {
                    renames.push((event.link, event.name.clone()));
                }
            }
            for (cuuid, name) in renames {
                if let Some(entry) = self.find_entry_mut(cuuid) {
                    if let Body::Wav(wav) = &mut entry.body {
                        wav.obj.name = name;
                    }
                }
            }
        }

        let mut renames: Vec<(Cuuid, String)> = Vec::new();
        for entry in &self.entries {
            if let Body::Wav(wav) = &entry.body {
                for link in &wav.links {
                    renames.push((
                        link.cuuid,
                        format!("{}_{}", wav.obj.name, link.language().tag()),
                    ));
                }
            }
        }
        for (cuuid, name) in renames {
            if let Some(entry) = self.find_entry_mut(cuuid) {
                if let Body::WaveFile(obj) = &mut entry.body {
                    obj.name = name;
                }
            }
        }
    }

    /// Serialize the container to a buffer. Entry offsets and sizes are
    /// recorded as the bodies are emitted; the index is always written as
    /// type 2.
    pub fn to_bytes(&mut self, io: &mut dyn FileIo) -> Result<Vec<u8>> {
        let endianness = self.version.endianness();
        let mut s = Stream::writer(endianness);
        let mut index = Stream::writer(endianness);

        // Reserve the leading index-offset word.
        s.advance(4);

        let mut index_code = INDEX_MAGIC;
        let mut index_type = 2u32;
        let mut num_entries = self.entries.len() as u32;
        index.rw32(&mut index_code)?;
        index.rw32(&mut index_type)?;
        index.rw32(&mut num_entries)?;

        for entry in &mut self.entries {
            entry.file_offset = s.pos() as u32;
            entry.file_size = entry_body_rw(entry, &mut s, self.version, io)?;

            let mut classname = entry.class().name(self.version);
            rw_name(&mut index, &mut classname)?;

            let mut zero = 0u32;
            let mut num_links = entry.links.len() as u32;
            index.rw_cuuid(&mut entry.cuuid)?;
            index.rw32(&mut entry.file_offset)?;
            index.rw32(&mut entry.file_size)?;
            index.rw32(&mut zero)?;
            index.rw32(&mut num_links)?;

            for link in &mut entry.links {
                index.rw_cuuid(link)?;
            }
            let mut num_languages = entry.language_links.len() as u32;
            index.rw32(&mut num_languages)?;
            for link in &mut entry.language_links {
                index.rw32(&mut link.code)?;
                index.rw32(&mut link.unknown)?;
                index.rw_cuuid(&mut link.cuuid)?;
            }
        }

        // Append the index and back-patch the offset word.
        let mut index_offset = s.pos() as u32;
        s.rw(&mut index.into_inner())?;

        if self.version == Version::Hxg || self.version == Version::Hx2 {
            let mut padding = [0u8; 32];
            s.rw(&mut padding)?;
        }

        s.seek(0);
        s.rw32(&mut index_offset)?;

        self.index_offset = index_offset;
        self.index_type = 2;
        Ok(s.into_inner())
    }
}

/// Read or write a length-prefixed name at the stream cursor.
fn rw_name(s: &mut Stream, name: &mut String) -> Result<()> {
    let mut length = name.len() as u32;
    s.rw32(&mut length)?;
    if length as usize > STRING_MAX_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "string length {length} exceeds maximum"
        )));
    }
    let mut buf = vec![0u8; length as usize];
    if s.mode() == Mode::Write {
        buf.copy_from_slice(name.as_bytes());
    }
    s.rw(&mut buf)?;
    if s.mode() == Mode::Read {
        *name = String::from_utf8_lossy(&buf).into_owned();
    }
    Ok(())
}

/// Read or write one entry body: class name, CUUID, then the
/// class-specific record. Returns the number of bytes traversed. In read
/// mode the class name and CUUID must agree with the index record.
fn entry_body_rw(
    entry: &mut Entry,
    s: &mut Stream,
    version: Version,
    io: &mut dyn FileIo,
) -> Result<u32> {
    let start = s.pos();
    let class = entry.class();

    let mut classname = class.name(version);
    rw_name(s, &mut classname)?;
    if s.mode() == Mode::Read {
        let parsed = Class::from_name(&classname)?;
        if parsed != class {
            return Err(Error::HeaderMismatch(format!(
                "body class name {classname:?} does not match index class {class:?}"
            )));
        }
    }

    let mut cuuid = entry.cuuid;
    s.rw_cuuid(&mut cuuid)?;
    if cuuid != entry.cuuid {
        return Err(Error::HeaderMismatch(format!(
            "body cuuid {:016X} does not match index cuuid {:016X}",
            cuuid, entry.cuuid
        )));
    }

    let cuuid = entry.cuuid;
    let file_size = entry.file_size;
    let classname_length = classname.len();
    match &mut entry.body {
        Body::Event(data) => event_res_data_rw(data, s)?,
        Body::Wav(data) => wav_res_data_rw(data, s, version)?,
        Body::Switch(data) => switch_res_data_rw(data, s)?,
        Body::Random(data) => random_res_data_rw(data, s)?,
        Body::Program(data) => {
            program_res_data_rw(data, s, version, file_size, classname_length)?
        }
        Body::WaveFile(data) => wave_file_id_obj_rw(data, s, version, cuuid, io)?,
    }

    Ok((s.pos() - start) as u32)
}

fn event_res_data_rw(data: &mut EventResData, s: &mut Stream) -> Result<()> {
    s.rw32(&mut data.kind)?;
    rw_name(s, &mut data.name)?;
    s.rw32(&mut data.flags)?;
    s.rw_cuuid(&mut data.link)?;
    for param in &mut data.params {
        s.rw_f32(param)?;
    }
    Ok(())
}

fn wav_res_obj_rw(data: &mut WavResObj, s: &mut Stream, version: Version) -> Result<()> {
    s.rw32(&mut data.id)?;

    if version == Version::Hxc {
        rw_name(s, &mut data.name)?;
    }
    if version == Version::Hxg || version == Version::Hx2 {
        // These variants carry no name; the post-read pass derives one.
        if s.mode() == Mode::Read {
            data.name.clear();
        }
        s.rw32(&mut data.size)?;
    }

    for c in &mut data.c {
        s.rw_f32(c)?;
    }
    s.rw8(&mut data.flags)?;
    Ok(())
}

fn wav_res_data_rw(data: &mut WavResData, s: &mut Stream, version: Version) -> Result<()> {
    wav_res_obj_rw(&mut data.obj, s, version)?;
    if s.mode() == Mode::Read {
        data.links.clear();
    }

    s.rw_cuuid(&mut data.default_cuuid)?;

    if data.obj.flags & WAV_RES_DATA_FLAG_MULTIPLE != 0 {
        if version == Version::Hxg && data.default_cuuid != 0 {
            return Err(Error::HeaderMismatch(format!(
                "multi-link WavResData has nonzero default cuuid {:016X}",
                data.default_cuuid
            )));
        }

        let mut num_links = data.links.len() as u32;
        s.rw32(&mut num_links)?;
        if s.mode() == Mode::Read {
            data.links = vec![WavResDataLink::default(); num_links as usize];
        }
    }

    for link in &mut data.links {
        s.rw32(&mut link.language_code)?;
        s.rw_cuuid(&mut link.cuuid)?;
    }
    Ok(())
}

fn switch_res_data_rw(data: &mut SwitchResData, s: &mut Stream) -> Result<()> {
    s.rw32(&mut data.flag)?;
    s.rw32(&mut data.unknown)?;
    s.rw32(&mut data.unknown2)?;
    s.rw32(&mut data.start_index)?;

    let mut num_links = data.links.len() as u32;
    s.rw32(&mut num_links)?;
    if s.mode() == Mode::Read {
        data.links = vec![SwitchResDataLink::default(); num_links as usize];
    }
    for link in &mut data.links {
        s.rw32(&mut link.case_index)?;
        s.rw_cuuid(&mut link.cuuid)?;
    }
    Ok(())
}

fn random_res_data_rw(data: &mut RandomResData, s: &mut Stream) -> Result<()> {
    s.rw32(&mut data.flags)?;
    s.rw_f32(&mut data.offset)?;
    s.rw_f32(&mut data.throw_probability)?;

    let mut num_links = data.links.len() as u32;
    s.rw32(&mut num_links)?;
    if s.mode() == Mode::Read {
        data.links = vec![RandomResDataLink::default(); num_links as usize];
    }
    for link in &mut data.links {
        s.rw_f32(&mut link.probability)?;
        s.rw_cuuid(&mut link.cuuid)?;
    }
    Ok(())
}

fn program_res_data_rw(
    data: &mut ProgramResData,
    s: &mut Stream,
    version: Version,
    file_size: u32,
    classname_length: usize,
) -> Result<()> {
    // The body is everything after the classname header and the CUUID.
    if s.mode() == Mode::Read {
        let body_size = (file_size as usize)
            .checked_sub(4 + classname_length + 8)
            .ok_or(Error::UnexpectedEof)?;
        data.data = vec![0u8; body_size];
    }
    let mut blob = std::mem::take(&mut data.data);
    s.rw(&mut blob)?;
    data.data = blob;

    // The program grammar is not decoded; scan the blob for what look
    // like embedded entry references. The result is advisory.
    if s.mode() == Mode::Read {
        data.links.clear();
        let mut i = 0usize;
        while i < data.data.len() {
            if data.data[i] == b'E' {
                let mut p = i + 1;
                if version == Version::Hxc {
                    p += 1;
                }
                if let Some(bytes) = data.data.get(p..p + 8) {
                    let mut cs = Stream::reader(bytes.to_vec(), s.endianness());
                    let mut cuuid: Cuuid = 0;
                    cs.rw_cuuid(&mut cuuid)?;
                    if version == Version::Hx2 {
                        let high = ((cuuid >> 32) as u32).swap_bytes();
                        let low = (cuuid as u32).swap_bytes();
                        cuuid = (u64::from(high) << 32) | u64::from(low);
                    }
                    if (cuuid >> 32) == 3 {
                        data.links.push(cuuid);
                    }
                }
            }
            i += 1;
        }
    }
    Ok(())
}

fn id_obj_ptr_rw(data: &mut IdObjPtr, s: &mut Stream, version: Version) -> Result<()> {
    s.rw32(&mut data.id)?;
    s.rw_f32(&mut data.unknown)?;
    if version == Version::Hxg {
        s.rw32(&mut data.flags)?;
        s.rw32(&mut data.unknown2)?;
    } else {
        let mut flags = data.flags as u8;
        s.rw8(&mut flags)?;
        data.flags = flags as u32;
    }
    Ok(())
}

fn wave_file_id_obj_rw(
    data: &mut WaveFileIdObj,
    s: &mut Stream,
    version: Version,
    cuuid: Cuuid,
    io: &mut dyn FileIo,
) -> Result<()> {
    id_obj_ptr_rw(&mut data.id_obj, s, version)?;
    let external = data.id_obj.flags & ID_OBJ_FLAG_EXTERNAL != 0;

    if external {
        rw_name(s, &mut data.ext_stream_filename)?;
    } else {
        data.ext_stream_offset = 0;
        data.ext_stream_size = 0;
    }

    data.wave_header.rw(s)?;

    if s.mode() == Mode::Read {
        data.audio.info.format =
            AudioFormat::from_code(data.wave_header.format).ok_or_else(|| {
                Error::WaveHeaderInvalid(format!(
                    "unknown format code 0x{:04X}",
                    data.wave_header.format
                ))
            })?;
        data.audio.info.num_channels = data.wave_header.num_channels as u8;
        data.audio.info.endianness = s.endianness();
        data.audio.info.sample_rate = data.wave_header.sample_rate;
    }
    data.audio.info.wavefile_cuuid = cuuid;

    if external {
        if data.wave_header.subchunk2_id != wave::EXT_DATA_CHUNK_ID {
            return Err(Error::WaveHeaderInvalid(format!(
                "external stream subchunk id 0x{:08X} is not \"datx\"",
                data.wave_header.subchunk2_id
            )));
        }
        if data.wave_header.subchunk2_size != 8 {
            return Err(Error::WaveHeaderInvalid(format!(
                "external stream stub size {} is not 8",
                data.wave_header.subchunk2_size
            )));
        }

        s.rw32(&mut data.ext_stream_size)?;
        s.rw32(&mut data.ext_stream_offset)?;

        if s.mode() == Mode::Read {
            // Some files carry a legacy ".\" filename prefix.
            if let Some(stripped) = data.ext_stream_filename.strip_prefix(".\\") {
                data.ext_stream_filename = stripped.to_string();
            }
            data.audio.data = io.read(
                &data.ext_stream_filename,
                data.ext_stream_offset as u64,
                Some(data.ext_stream_size as usize),
            )?;
        } else {
            io.write(
                &data.ext_stream_filename,
                &data.audio.data,
                data.ext_stream_offset as u64,
            )?;
        }
    } else {
        if data.wave_header.subchunk2_id != wave::DATA_CHUNK_ID {
            return Err(Error::WaveHeaderInvalid(format!(
                "inline stream subchunk id 0x{:08X} is not \"data\"",
                data.wave_header.subchunk2_id
            )));
        }
        if s.mode() == Mode::Read {
            data.audio.data = vec![0u8; data.wave_header.subchunk2_size as usize];
            s.rw(&mut data.audio.data)?;
        } else {
            let mut payload = data.audio.data.clone();
            payload.resize(data.wave_header.subchunk2_size as usize, 0);
            s.rw(&mut payload)?;
        }
    }

    if s.mode() == Mode::Read {
        // Whatever the RIFF length says is left after the payload is kept
        // verbatim: padding or chunk types the reader does not know.
        let mut extra_length = (data.wave_header.riff_length as i64 + 8)
            - data.wave_header.subchunk2_size as i64
            - crate::wave::WaveHeader::SIZE as i64;
        if external {
            extra_length += 4;
        }
        data.extra_wave_data.clear();
        if extra_length > 0 {
            if !external {
                extra_length += 1;
            }
            let mut buf = vec![0u8; extra_length as usize];
            s.rw(&mut buf)?;
            data.extra_wave_data = buf;
        }
    } else if !data.extra_wave_data.is_empty() {
        let mut buf = data.extra_wave_data.clone();
        s.rw(&mut buf)?;
    }

    // HX2 files repeat the external stream offset at the end of the entry.
    if s.mode() == Mode::Write && version == Version::Hx2 && external {
        let mut offset = data.ext_stream_offset;
        s.rw32(&mut offset)?;
    }

    Ok(())
}
