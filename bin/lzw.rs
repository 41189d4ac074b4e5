#![forbid(unsafe_code)]
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::{ffi, fs};

use lzwpack::{decode::Decoder, encode::Encoder};
use tracing::Level;

fn main() -> CodingResult {
    let flags = Flags::from_args(std::env::args_os());
    init_logging(flags.verbosity);
    CodingResult::catch_panic(move || run_coding(flags))
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // `RUST_LOG` takes precedence over the verbosity flags.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_coding(flags: Flags) -> Result<(), io::Error> {
    let input: Box<dyn BufRead> = match &flags.input {
        Input::File(file) => {
            let data = fs::File::open(file)?;
            Box::new(io::BufReader::with_capacity(1 << 20, data))
        }
        Input::Stdin => Box::new(io::BufReader::with_capacity(1 << 20, io::stdin())),
    };

    let mut output: Box<dyn Write> = match &flags.output {
        Some(file) => Box::new(io::BufWriter::new(fs::File::create(file)?)),
        None => Box::new(io::BufWriter::new(io::stdout())),
    };

    tracing::info!(operation = ?flags.operation, input = ?flags.input, "starting");
    let result = match flags.operation {
        Operation::Compress => {
            let mut encoder = Encoder::new();
            encoder.into_stream(&mut output).encode_all(input)
        }
        Operation::Decompress => {
            let mut decoder = Decoder::new();
            decoder.into_stream(&mut output).decode_all(input)
        }
    };

    tracing::info!(
        bytes_read = result.bytes_read,
        bytes_written = result.bytes_written,
        "finished"
    );
    result.status?;
    output.flush()
}

struct Flags {
    input: Input,
    output: Option<PathBuf>,
    operation: Operation,
    verbosity: u8,
}

#[derive(Debug)]
enum Input {
    File(PathBuf),
    Stdin,
}

#[derive(Debug)]
enum Operation {
    Compress,
    Decompress,
}

fn command() -> clap::Command {
    clap::Command::new("lzw")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compress and decompress with 9 to 15 bit LZW codes")
        .arg(
            clap::Arg::new("compress")
                .short('c')
                .long("compress")
                .action(clap::ArgAction::SetTrue)
                .help("Compress the input (default)"),
        )
        .arg(
            clap::Arg::new("decompress")
                .short('d')
                .long("decompress")
                .action(clap::ArgAction::SetTrue)
                .help("Decompress the input"),
        )
        .group(
            clap::ArgGroup::new("operation")
                .args(["compress", "decompress"])
                .multiple(false),
        )
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("File to read, '-' or nothing for stdin"),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("File to write, stdout if omitted"),
        )
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("Log more, repeat for even more detail"),
        )
}

impl Flags {
    fn from_args(args: impl IntoIterator<Item = ffi::OsString>) -> Self {
        let matches = command().get_matches_from(args);

        let operation = if matches.get_flag("decompress") {
            Operation::Decompress
        } else {
            Operation::Compress
        };

        let input = match matches.get_one::<PathBuf>("input") {
            None => Input::Stdin,
            Some(p) if *p == PathBuf::from("-") => Input::Stdin,
            Some(p) => Input::File(p.clone()),
        };

        Flags {
            input,
            output: matches.get_one::<PathBuf>("output").cloned(),
            operation,
            verbosity: matches.get_count("verbose"),
        }
    }
}

enum CodingResult {
    Ok,
    Err(io::Error),
    Panic,
}

impl CodingResult {
    fn catch_panic(op: impl FnOnce() -> Result<(), io::Error> + std::panic::UnwindSafe) -> Self {
        std::panic::catch_unwind(|| match op() {
            Ok(()) => CodingResult::Ok,
            Err(err) => CodingResult::Err(err),
        })
        .unwrap_or(CodingResult::Panic)
    }
}

impl std::process::Termination for CodingResult {
    fn report(self) -> std::process::ExitCode {
        match self {
            CodingResult::Ok => std::process::ExitCode::SUCCESS,
            CodingResult::Err(err) => {
                eprintln!("lzw: {}", err);
                std::process::ExitCode::FAILURE
            }
            CodingResult::Panic => {
                eprintln!(
                    "The process failed irrecoverably! This should never happen and is a bug."
                );
                std::process::ExitCode::from(128)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{command, Flags, Input, Operation};

    fn parse(args: &[&str]) -> Flags {
        Flags::from_args(args.iter().map(|arg| std::ffi::OsString::from(*arg)))
    }

    #[test]
    fn command_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn compress_from_stdin_by_default() {
        let flags = parse(&["lzw"]);
        assert!(matches!(flags.operation, Operation::Compress));
        assert!(matches!(flags.input, Input::Stdin));
        assert!(flags.output.is_none());
        assert_eq!(flags.verbosity, 0);
    }

    #[test]
    fn decompress_between_files() {
        let flags = parse(&["lzw", "-d", "-i", "in.lzw", "-o", "out", "-vv"]);
        assert!(matches!(flags.operation, Operation::Decompress));
        assert!(matches!(flags.input, Input::File(ref p) if p.as_os_str() == "in.lzw"));
        assert_eq!(flags.output.as_deref(), Some(std::path::Path::new("out")));
        assert_eq!(flags.verbosity, 2);
    }

    #[test]
    fn operations_are_exclusive() {
        assert!(command()
            .try_get_matches_from(["lzw", "-c", "-d"])
            .is_err());
    }
}
