//! Command-line front end: print the elements of an XML file whose paths
//! match one or more regular expressions.

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use xmlreg::reader::XmlCursor;
use xmlreg::serial::{serialize_node_with_options, SerializeOptions};
use xmlreg::{Callback, Error, ReaderOptions, RegReader, Value, XmlReader};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// xmlreg -- stream an XML file and print elements whose path matches.
///
/// Paths look like `/root/person[1]/firstname`. Patterns are regular
/// expressions matched against the whole path.
#[derive(Parser, Debug)]
#[command(name = "xmlreg", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// XML file to read (use `-` for stdin).
    file: String,

    /// Path pattern to match; may be given more than once.
    #[arg(short = 'm', long = "match", value_name = "PATTERN", required = true)]
    patterns: Vec<String>,

    /// Value type handed to each match: `string` or `element`.
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "string")]
    value_type: String,

    /// Do not add `[n]` indexes for repeated sibling names.
    #[arg(long)]
    no_array_notation: bool,

    /// Build paths from local names, ignoring namespace prefixes.
    #[arg(long)]
    local_names: bool,

    /// Remove namespace declarations and prefixes from printed values.
    #[arg(long)]
    strip_namespaces: bool,

    /// Stop after this many matches.
    #[arg(long, value_name = "N")]
    stop_after: Option<usize>,

    /// Pretty-print element values.
    #[arg(long)]
    format: bool,

    /// Log progress to stderr (same as `RUST_LOG=debug`).
    #[arg(long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_PATTERN_ERROR: u8 = 2;
const EXIT_NO_MATCH: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let options = ReaderOptions::default()
        .array_notation(!cli.no_array_notation)
        .use_namespaces(!cli.local_names)
        .output_namespace(!cli.strip_namespaces);

    let result = if cli.file == "-" {
        let stdin = io::stdin();
        run(&cli, RegReader::with_options(XmlReader::new(stdin.lock()), options))
    } else {
        match XmlReader::from_file(&cli.file) {
            Ok(reader) => run(&cli, RegReader::with_options(reader, options)),
            Err(e) => Err(Error::Io(e)),
        }
    };

    match result {
        Ok(0) => ExitCode::from(EXIT_NO_MATCH),
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{}: {e}", cli.file);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(error: &Error) -> u8 {
    match error {
        Error::Registration(_) | Error::Pattern { .. } => EXIT_PATTERN_ERROR,
        Error::Parse(_) | Error::Io(_) | Error::Callback { .. } => EXIT_PARSE_ERROR,
    }
}

/// Runs every pattern over the input and prints the matches.
/// Returns the number of matches printed.
fn run<C: XmlCursor>(cli: &Cli, mut reader: RegReader<C>) -> Result<usize, Error> {
    let stop = reader.stop_handle();
    let serialize_options = SerializeOptions::default().indent(cli.format);
    let printed = Cell::new(0usize);
    let out = RefCell::new(io::stdout().lock());

    let callbacks = cli.patterns.iter().map(|pattern| {
        let (stop, printed, out) = (stop.clone(), &printed, &out);
        let serialize_options = &serialize_options;
        let callback = Callback::declared(cli.value_type.as_str(), move |value, caps| {
            let label = caps.get(1).unwrap_or_else(|| caps.path());
            let text = match value {
                Value::Node(node) => {
                    serialize_node_with_options(node.document(), node.id(), serialize_options)
                }
                Value::Text(text) => text,
            };
            writeln!(out.borrow_mut(), "{label}\t{text}")?;
            printed.set(printed.get() + 1);
            if cli.stop_after.is_some_and(|n| printed.get() >= n) {
                stop.request_stop();
            }
            Ok(())
        });
        (pattern.as_str(), callback)
    });

    let stats = reader.process(callbacks)?;
    debug!(
        "{} event(s), {} element(s), {} match(es)",
        stats.events, stats.elements, stats.matches
    );
    out.borrow_mut().flush()?;
    Ok(printed.get())
}
