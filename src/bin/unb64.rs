use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use regex::bytes::Regex;

use unb64::DecodeError;
use unb64::alphabet::{Alphabet, PadPolicy};
use unb64::common::io::{FileData, read_file, read_stdin};
use unb64::common::{io_error_msg, reset_sigpipe};
use unb64::decode;
use unb64::extract::{Extractor, parse_field_path};
use unb64::pipeline::{self, Options, RunReport};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// The whole input is one base64 stream
    Raw,
    /// Delimited blocks located by --begin/--end marker regexes
    Block,
    /// A JSON string field addressed by --field
    Json,
    /// data:<mime>;base64, URIs
    DataUri,
    /// Bodies of MIME parts declaring Content-Transfer-Encoding: base64
    Mime,
}

#[derive(Parser)]
#[command(
    name = "unb64",
    about = "Locate and decode Base64 payloads embedded in FILE, or standard input.",
    after_help = "With no FILE, or when FILE is -, read standard input.\n\n\
        In raw mode the whole input is decoded as one whitespace-tolerant\n\
        base64 stream. The other formats scan the input for embedded payloads\n\
        and decode each one independently: a malformed payload is reported on\n\
        stderr without aborting the rest.\n\n\
        Exit status is 0 if every payload decoded, 1 if some payload failed,\n\
        and 2 if no payload was found or the source was unreadable.",
    version
)]
struct Cli {
    /// Source format to scan
    #[arg(short = 'f', long = "format", value_enum, default_value = "raw")]
    format: Format,

    /// Start marker regex (--format block)
    #[arg(long = "begin", value_name = "REGEX")]
    begin: Option<String>,

    /// End marker regex (--format block); blocks end at a blank line if omitted
    #[arg(long = "end", value_name = "REGEX")]
    end: Option<String>,

    /// Dot-separated field path (--format json), e.g. "payload.data.0"
    #[arg(long = "field", value_name = "PATH")]
    field: Option<String>,

    /// Use the URL-safe alphabet (- and _ instead of + and /)
    #[arg(short = 'u', long = "url-safe")]
    url_safe: bool,

    /// Repair missing padding instead of rejecting it
    #[arg(long = "repair")]
    repair: bool,

    /// Write decoded output to FILE instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write one payloadNNN.bin per payload under DIR
    #[arg(long = "output-dir", value_name = "DIR", conflicts_with = "output")]
    output_dir: Option<PathBuf>,

    /// Decode payloads in parallel (requires --output-dir)
    #[arg(short = 'j', long = "jobs", requires = "output_dir")]
    jobs: bool,

    /// Encode instead of decode (raw format only)
    #[arg(short = 'e', long = "encode")]
    encode: bool,

    /// Wrap encoded lines after COLS characters; 0 disables wrapping
    #[arg(short = 'w', long = "wrap", value_name = "COLS", default_value = "76")]
    wrap: usize,

    /// File to process (reads stdin if omitted or -)
    file: Option<String>,
}

/// Enlarge pipe buffers on Linux: larger reads/writes per syscall for the
/// streaming paths.
#[cfg(target_os = "linux")]
fn enlarge_pipes() {
    const PIPE_SIZE: i32 = 8 * 1024 * 1024;
    unsafe {
        libc::fcntl(0, libc::F_SETPIPE_SZ, PIPE_SIZE);
        libc::fcntl(1, libc::F_SETPIPE_SZ, PIPE_SIZE);
    }
}

fn main() {
    reset_sigpipe();

    #[cfg(target_os = "linux")]
    enlarge_pipes();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("unb64: {:#}", e);
            process::exit(2);
        }
    }
}

fn alphabet(cli: &Cli) -> Alphabet {
    if cli.url_safe {
        Alphabet::UrlSafe
    } else {
        Alphabet::Standard
    }
}

fn padding(cli: &Cli) -> PadPolicy {
    if cli.repair {
        PadPolicy::Repair
    } else {
        PadPolicy::Strict
    }
}

fn open_source(cli: &Cli) -> io::Result<Box<dyn Read>> {
    match cli.file.as_deref() {
        None | Some("-") => Ok(Box::new(io::stdin().lock())),
        Some(path) => Ok(Box::new(File::open(path)?)),
    }
}

fn source_name(cli: &Cli) -> &str {
    cli.file.as_deref().unwrap_or("-")
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    if cli.encode {
        if cli.format != Format::Raw {
            bail!("--encode only applies to --format raw");
        }
        return encode(cli);
    }

    if cli.format == Format::Raw {
        return decode_raw(cli);
    }

    let extractor = build_extractor(cli)?;

    // Extraction needs the whole source in memory (mmap'd for large files);
    // the per-payload decode stays bounded.
    let source = match cli.file.as_deref() {
        None | Some("-") => read_stdin().map(FileData::Owned),
        Some(path) => read_file(Path::new(path)),
    };
    let source = match source {
        Ok(data) => data,
        Err(e) => {
            // Source-read errors are fatal to the whole run.
            eprintln!("unb64: {}: {}", source_name(cli), io_error_msg(&e));
            return Ok(2);
        }
    };

    let opts = Options {
        alphabet: alphabet(cli),
        padding: padding(cli),
    };

    let report = if let Some(dir) = &cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory '{}'", dir.display()))?;
        pipeline::run_to_dir(&source, &extractor, opts, dir, cli.jobs)
    } else if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("cannot create '{}'", path.display()))?;
        let mut out = BufWriter::new(file);
        let report = pipeline::run_to_sink(&source, &extractor, opts, &mut out);
        flush_sink(&mut out)?;
        report
    } else {
        let stdout = io::stdout();
        let mut out = BufWriter::with_capacity(1024 * 1024, stdout.lock());
        let report = pipeline::run_to_sink(&source, &extractor, opts, &mut out);
        flush_sink(&mut out)?;
        report
    };

    Ok(report_and_exit_code(cli, &report))
}

fn build_extractor(cli: &Cli) -> anyhow::Result<Extractor> {
    match cli.format {
        Format::Block => {
            let Some(begin) = &cli.begin else {
                bail!("--format block requires --begin");
            };
            let begin = Regex::new(begin)
                .with_context(|| format!("invalid --begin regex '{}'", begin))?;
            let end = cli
                .end
                .as_deref()
                .map(|e| Regex::new(e).with_context(|| format!("invalid --end regex '{}'", e)))
                .transpose()?;
            Ok(Extractor::DelimitedBlock { begin, end })
        }
        Format::Json => {
            let Some(field) = &cli.field else {
                bail!("--format json requires --field");
            };
            let path = parse_field_path(field).map_err(|e| anyhow::anyhow!(e))?;
            Ok(Extractor::StructuredField { path })
        }
        Format::DataUri => Ok(Extractor::DataUri),
        Format::Mime => Ok(Extractor::MimeHeaderBlock),
        Format::Raw => unreachable!("raw mode does not extract"),
    }
}

/// Print per-payload diagnostics and map the report to an exit code:
/// 0 all decoded, 1 partial failure, 2 nothing found.
fn report_and_exit_code(cli: &Cli, report: &RunReport) -> i32 {
    if report.nothing_found() {
        eprintln!("unb64: {}: no base64 payload found", source_name(cli));
        return 2;
    }
    for r in &report.results {
        if let Err(e) = &r.outcome {
            eprintln!(
                "unb64: {}: payload {} (bytes {}..{}): {}",
                source_name(cli),
                r.index,
                r.range.start,
                r.range.end,
                e
            );
        }
    }
    if report.all_ok() { 0 } else { 1 }
}

/// Raw mode: the whole input is one payload, stream-decoded in bounded
/// memory straight from the source to the sink.
fn decode_raw(cli: &Cli) -> anyhow::Result<i32> {
    let mut reader = match open_source(cli) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("unb64: {}: {}", source_name(cli), io_error_msg(&e));
            return Ok(2);
        }
    };

    let result = if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("cannot create '{}'", path.display()))?;
        let mut out = BufWriter::new(file);
        let r = decode::decode_stream(&mut reader, alphabet(cli), padding(cli), &mut out);
        flush_sink(&mut out)?;
        r
    } else {
        let stdout = io::stdout();
        let mut out = BufWriter::with_capacity(1024 * 1024, stdout.lock());
        let r = decode::decode_stream(&mut reader, alphabet(cli), padding(cli), &mut out);
        flush_sink(&mut out)?;
        r
    };

    match result {
        Ok(_) => Ok(0),
        Err(DecodeError::SinkWrite(e)) if e.kind() == io::ErrorKind::BrokenPipe => Ok(0),
        Err(e @ DecodeError::SourceRead(_)) => {
            eprintln!("unb64: {}: {}", source_name(cli), e);
            Ok(2)
        }
        Err(e) => {
            eprintln!("unb64: {}: {}", source_name(cli), e);
            Ok(1)
        }
    }
}

fn encode(cli: &Cli) -> anyhow::Result<i32> {
    let mut reader = match open_source(cli) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("unb64: {}: {}", source_name(cli), io_error_msg(&e));
            return Ok(2);
        }
    };

    let result = if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("cannot create '{}'", path.display()))?;
        let mut out = BufWriter::new(file);
        decode::encode_stream(&mut reader, alphabet(cli), cli.wrap, &mut out)
    } else {
        let stdout = io::stdout();
        let mut out = BufWriter::with_capacity(1024 * 1024, stdout.lock());
        decode::encode_stream(&mut reader, alphabet(cli), cli.wrap, &mut out)
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(0),
        Err(e) => {
            eprintln!("unb64: {}: {}", source_name(cli), io_error_msg(&e));
            Ok(2)
        }
    }
}

/// Flush a sink, tolerating a reader that went away.
fn flush_sink(out: &mut impl Write) -> anyhow::Result<()> {
    match out.flush() {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(anyhow::anyhow!("write error: {}", io_error_msg(&e))),
    }
}
