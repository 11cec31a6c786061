//! hxtool - inspect and extract audio from .hx resource containers.

use clap::Parser;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hx::{
    convert, AudioFormat, AudioStream, Body, Container, Entry, FileIo, ID_OBJ_FLAG_EXTERNAL,
};

/// Shared stream archives referenced by many entries; their handles are
/// kept open across reads.
const SHARED_ARCHIVES: [&str; 2] = ["RAYMAN3.HST", "Data.hst"];

#[derive(Parser)]
#[command(name = "hxtool")]
#[command(version, about = "Inspect and extract audio from .hx resource containers", long_about = None)]
struct Cli {
    /// Input .hx file
    input: PathBuf,

    /// Print container information
    #[arg(long)]
    info: bool,

    /// List all entries
    #[arg(long)]
    list: bool,

    /// Extract every wave-file entry to the output directory
    #[arg(long, alias = "extract-archive")]
    extract_all: bool,

    /// Extract a single entry by CUUID (hexadecimal)
    #[arg(long, value_name = "CUUID")]
    extract: Option<String>,

    /// Output directory for extracted .wav files
    #[arg(short, long, default_value = "Output")]
    output: PathBuf,
}

/// Filesystem-backed implementation of the library's I/O seam.
#[derive(Default)]
struct DiskIo {
    archives: HashMap<String, fs::File>,
}

impl FileIo for DiskIo {
    fn read(
        &mut self,
        filename: &str,
        offset: u64,
        size: Option<usize>,
    ) -> io::Result<Vec<u8>> {
        if SHARED_ARCHIVES.contains(&filename) {
            let file = match self.archives.entry(filename.to_string()) {
                MapEntry::Occupied(entry) => entry.into_mut(),
                MapEntry::Vacant(entry) => entry.insert(fs::File::open(filename)?),
            };
            read_at(file, offset, size)
        } else {
            let mut file = fs::File::open(filename)?;
            read_at(&mut file, offset, size)
        }
    }

    fn write(&mut self, filename: &str, data: &[u8], offset: u64) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(filename)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)
    }
}

fn read_at(file: &mut fs::File, offset: u64, size: Option<usize>) -> io::Result<Vec<u8>> {
    let file_len = file.metadata()?.len();
    file.seek(SeekFrom::Start(offset))?;
    match size {
        Some(size) => {
            // Clamp to the file length; entries may claim more than the
            // archive holds.
            let size = size.min(file_len.saturating_sub(offset) as usize);
            let mut buf = vec![0u8; size];
            file.read_exact(&mut buf)?;
            Ok(buf)
        }
        None => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();
    let cli = Cli::parse();

    let mut io = DiskIo::default();
    let input = cli
        .input
        .to_str()
        .ok_or("input path is not valid UTF-8")?;
    let container = Container::open(input, &mut io)?;

    let no_action = !cli.info && !cli.list && !cli.extract_all && cli.extract.is_none();
    if cli.info || no_action {
        print_info(&container, input);
    }

    if cli.list {
        print_list(&container);
    }

    if cli.extract_all {
        fs::create_dir_all(&cli.output)?;
        let mut count = 0usize;
        for entry in container.entries() {
            if matches!(entry.body, Body::WaveFile(_)) {
                extract_entry(entry, &cli.output, &mut io)?;
                count += 1;
            }
        }
        println!("Extracted {} stream(s) to {}", count, cli.output.display());
    }

    if let Some(cuuid) = &cli.extract {
        let cuuid = u64::from_str_radix(cuuid.trim_start_matches("0x"), 16)?;
        let entry = container
            .find_entry(cuuid)
            .ok_or_else(|| format!("no entry with cuuid {cuuid:016X}"))?;
        fs::create_dir_all(&cli.output)?;
        extract_entry(entry, &cli.output, &mut io)?;
    }

    Ok(())
}

fn print_info(container: &Container, input: &str) {
    let version = container.version();
    println!("File: {}", input);
    println!(
        "Version: {} ({})",
        version.extension(),
        version.platform()
    );
    println!("Entries: {}", container.num_entries());

    let mut streams = 0usize;
    let mut stream_bytes = 0usize;
    for entry in container.entries() {
        if let Body::WaveFile(obj) = &entry.body {
            streams += 1;
            stream_bytes += obj.audio.data.len();
        }
    }
    println!("Audio streams: {} ({} bytes)", streams, stream_bytes);
}

fn print_list(container: &Container) {
    let version = container.version();
    for (index, entry) in container.entries().iter().enumerate() {
        let classname = entry.class().name(version);
        let detail = match &entry.body {
            Body::Event(event) => event.name.clone(),
            Body::Wav(wav) => wav.obj.name.clone(),
            Body::WaveFile(obj) => format!(
                "{} ({}, {} Hz, {} ch)",
                obj.name,
                obj.audio.info.format.name(),
                obj.audio.info.sample_rate,
                obj.audio.info.num_channels
            ),
            Body::Switch(switch) => format!("{} case(s)", switch.links.len()),
            Body::Random(random) => format!("{} link(s)", random.links.len()),
            Body::Program(program) => format!("{} byte(s)", program.data.len()),
        };
        println!(
            "[{index}] {classname} ({:016X}) {}",
            entry.cuuid, detail
        );
    }
}

fn extract_entry(
    entry: &Entry,
    output_dir: &Path,
    io: &mut DiskIo,
) -> Result<(), Box<dyn std::error::Error>> {
    let Body::WaveFile(obj) = &entry.body else {
        return Err(format!("entry {:016X} is not a wave file", entry.cuuid).into());
    };

    let external = obj.id_obj.flags & ID_OBJ_FLAG_EXTERNAL != 0;
    let filename = if external {
        format!("EXT-{:016X}.wav", entry.cuuid)
    } else {
        format!("{:016X}.wav", entry.cuuid)
    };
    let path = output_dir.join(filename);
    let path = path.to_str().ok_or("output path is not valid UTF-8")?;

    let audio = &obj.audio;
    match audio.info.format {
        AudioFormat::Dsp | AudioFormat::Psx => {
            let mut decoded = AudioStream::default();
            convert(audio, &mut decoded)?;
            decoded.write_wav(io, path)?;
        }
        _ => audio.write_wav(io, path)?,
    }
    println!("{} -> {}", obj.name, path);
    Ok(())
}
