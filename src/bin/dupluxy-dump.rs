#![deny(unsafe_code)]

//! Walks a directory tree and prints every captured entry as one JSON line.

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command, builder::OsStringValueParser, value_parser};
use logging::LogConfig;
use metadata::Privilege;
use mimalloc::MiMalloc;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use walk::{DEFAULT_CHANNEL_CAPACITY, ListOptions, WalkConfig, WalkOutcome, walk_tree};

/// High-performance memory allocator for improved allocation throughput.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const PROGRAM_NAME: &str = "dupluxy-dump";

/// Every entry was captured.
const EXIT_OK: i32 = 0;
/// Usage error or the walk could not run at all.
const EXIT_FATAL: i32 = 1;
/// The walk finished but some directories could not be listed.
const EXIT_PARTIAL: i32 = 3;

fn main() -> ExitCode {
    let config = LogConfig::new().ansi(false);
    // A subscriber installed by an embedding harness wins.
    let _ = logging::init(&config);

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    let status = run_with(std::env::args_os(), &mut stdout, &mut stderr);
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}

fn clap_command() -> Command {
    Command::new(PROGRAM_NAME)
        .about("Walk a directory tree and print its entries in canonical order.")
        .arg(
            Arg::new("root")
                .value_name("DIR")
                .help("Directory to walk.")
                .required(true)
                .value_parser(OsStringValueParser::new()),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .short('j')
                .value_name("N")
                .help("Number of listing threads (default: available parallelism).")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("capacity")
                .long("capacity")
                .value_name("N")
                .help("Bound of the entry channel between workers and collector.")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("exclude-by-attribute")
                .long("exclude-by-attribute")
                .short('x')
                .help("Skip objects carrying the backup exclusion marker.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-attributes")
                .long("no-attributes")
                .help("Do not capture extended attributes or flag words.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-hardlinks")
                .long("no-hardlinks")
                .help("Treat every hardlink as an independent file.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .help("Print walk counters to stderr when done.")
                .action(ArgAction::SetTrue),
        )
}

struct DumpArgs {
    root: PathBuf,
    options: ListOptions,
    config: WalkConfig,
    summary: bool,
}

fn parse_args(matches: &ArgMatches) -> DumpArgs {
    let root = matches
        .get_one::<OsString>("root")
        .map(PathBuf::from)
        .unwrap_or_default();
    let options = ListOptions::new()
        .privilege(Privilege::detect())
        .exclude_by_attribute(matches.get_flag("exclude-by-attribute"))
        .read_attributes(!matches.get_flag("no-attributes"))
        .track_hardlinks(!matches.get_flag("no-hardlinks"));

    let mut config = WalkConfig::new().channel_capacity(
        matches
            .get_one::<usize>("capacity")
            .copied()
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
    );
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config = config.workers(*workers);
    }

    DumpArgs {
        root,
        options,
        config,
        summary: matches.get_flag("summary"),
    }
}

/// Parses `args`, walks the tree and writes the entries to `stdout`.
///
/// Returns the process exit status.
fn run_with<I, Out, Err>(args: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
    Out: Write,
    Err: Write,
{
    let matches = match clap_command().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(error) => {
            let informational = matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            let rendered = error.render().to_string();
            if informational {
                let _ = stdout.write_all(rendered.as_bytes());
                return EXIT_OK;
            }
            let _ = stderr.write_all(rendered.as_bytes());
            return EXIT_FATAL;
        }
    };

    let args = parse_args(&matches);
    let outcome = match walk_tree(&args.root, args.options, args.config) {
        Ok(outcome) => outcome,
        Err(error) => {
            let _ = writeln!(stderr, "{PROGRAM_NAME}: {error}");
            return EXIT_FATAL;
        }
    };

    if let Err(error) = write_entries(&outcome, stdout) {
        let _ = writeln!(stderr, "{PROGRAM_NAME}: failed to write output: {error}");
        return EXIT_FATAL;
    }

    for error in &outcome.errors {
        let _ = writeln!(stderr, "{PROGRAM_NAME}: {error}");
    }
    if args.summary {
        let _ = writeln!(
            stderr,
            "{PROGRAM_NAME}: {} directories, {} entries, {} excluded, {} skipped",
            outcome.stats.directories,
            outcome.entries.len(),
            outcome.stats.listing.excluded,
            outcome.stats.listing.skipped.len()
        );
    }

    if outcome.errors.is_empty() {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}

fn write_entries<Out: Write>(outcome: &WalkOutcome, stdout: &mut Out) -> io::Result<()> {
    let mut out = io::BufWriter::new(stdout);
    for entry in &outcome.entries {
        serde_json::to_writer(&mut out, entry)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}
