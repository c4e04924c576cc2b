//! deptrack CLI: runs dependency-tracking batches and inspects their records.
//!
//! Provides `deptrack typecheck` for checking a batch of primary files and
//! emitting one reference-dependency record per primary, `deptrack normalize`
//! for printing a record in its order-independent form, and
//! `deptrack compare` for checking two records for equivalence.

#![warn(missing_docs)]

mod records;
mod typecheck;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// deptrack: fine-grained dependency tracking for incremental builds.
#[derive(Parser, Debug)]
#[command(name = "deptrack", version, about = "Fine-grained dependency tracker")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `deptrack.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a batch of files and emit their dependency records.
    Typecheck(TypecheckArgs),
    /// Print the normalized form of a record.
    Normalize {
        /// Record file to read.
        record: String,
    },
    /// Compare two records; exits 1 and prints the difference if they differ.
    Compare {
        /// First record.
        left: String,
        /// Second record.
        right: String,
    },
}

/// Arguments for the `deptrack typecheck` subcommand.
#[derive(Parser, Debug)]
pub struct TypecheckArgs {
    /// Files checked in this batch. Without any, every `--file` is checked.
    #[arg(long = "primary-file")]
    pub primary_files: Vec<String>,

    /// Files whose declarations are visible but which are not checked.
    #[arg(long = "file")]
    pub files: Vec<String>,

    /// Record output paths, paired with the primary files in order.
    #[arg(long = "emit-reference-dependencies-path")]
    pub emit_paths: Vec<String>,

    /// Where to write the emission manifest.
    #[arg(long = "emit-manifest-path")]
    pub manifest: Option<String>,

    /// Worker threads (overrides `batch.jobs`).
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var("TERM").is_ok(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    init_logging(cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Typecheck(ref args) => typecheck::run(args, &global),
        Command::Normalize { ref record } => records::normalize(record),
        Command::Compare {
            ref left,
            ref right,
        } => records::compare(left, right, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
