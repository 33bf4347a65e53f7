//! Replay analyzer that runs in a terminal and produces text output,
//! optionally rendering a playback animation alongside it.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use decoder::CancellationToken;

use cli::reporting::{Json, Markdown};
use cli::run_analyzer;

fn main() {
    let args = Args::parse();

    stderrlog::new()
        .module(module_path!())
        .module("cli")
        .module("analysis")
        .module("decoder")
        .quiet(false)
        .verbosity(args.verbose as usize)
        .timestamp(stderrlog::Timestamp::Off)
        .init()
        .expect("logger already initialized");

    let cancel = CancellationToken::new();

    let output = match run_analyzer(
        &args.demo_path,
        args.background.as_deref(),
        args.unit_catalog.as_deref(),
        cancel,
    ) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(exit_code_for(&e));
        }
    };

    match args.output_format {
        OutputFormat::Markdown => println!("{}", Markdown(&output)),
        OutputFormat::Json => println!("{}", Json(&output)),
    }

    if let (Some(path), Some(bytes)) = (&args.animation_out, &output.animation) {
        if let Err(e) = std::fs::write(path, bytes) {
            eprintln!("error: could not write animation to {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn exit_code_for(e: &cli::CliError) -> i32 {
    use cli::CliError::*;
    match e {
        Open { .. } | ReadFile { .. } => 2,
        Decode(_) => 3,
        Collaborator(_) => 4,
        Cancelled => 5,
    }
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the replay file to analyze
    demo_path: PathBuf,

    /// Path to a background map image; when given, a playback animation
    /// is rendered alongside the report
    #[arg(long)]
    background: Option<PathBuf>,

    /// Path to write the rendered animation GIF to
    #[arg(long, requires = "background")]
    animation_out: Option<PathBuf>,

    /// Path to a `net_id,name` text file used to resolve unit type names
    /// in the unit-count report; unresolved types print their raw id
    #[arg(long)]
    unit_catalog: Option<PathBuf>,

    /// The kind of string output to produce from an analysis
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    output_format: OutputFormat,

    /// Increase logging verbosity; may be repeated
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    /// Markdown document best used in combination with a Markdown renderer
    Markdown,

    /// JSON string for automated tools or custom visualization
    Json,
}
