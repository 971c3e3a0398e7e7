mod extract;
mod render;

use clap::Parser;
use extract::ExtractError;
use std::path::{Path, PathBuf};

/// A Rust CLI tool that parses an ApacheBench summary report and renders
/// two charts into one PNG: a mean-latency breakdown bar and a request
/// outcome donut.
#[derive(Parser, Debug)]
#[command(name = "ab-charts", version, about)]
struct Cli {
    /// Path to the ApacheBench summary text file
    #[arg(value_name = "SUMMARY_FILE")]
    summary: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let Some(input) = cli.summary else {
        eprintln!("Usage: ab-charts <summary.txt>");
        std::process::exit(1);
    };

    tracing::debug!(path = %input.display(), "parsing summary report");

    let metrics = match extract::parse_summary(&input) {
        Ok(metrics) => metrics,
        Err(ExtractError::NotFound(path)) => {
            eprintln!("Error: The file '{}' was not found.", path.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Unexpected error: {e}");
            std::process::exit(1);
        }
    };

    println!("Parsed metrics:");
    for (name, value) in metrics.display_rows() {
        println!("  {name}: {value}");
    }

    let out_name = render::output_name(chrono::Local::now());
    let input_name = input.display().to_string();
    if let Err(e) = render::render_charts(&metrics, &input_name, Path::new(&out_name)) {
        eprintln!("Unexpected error: {e}");
        std::process::exit(1);
    }
    println!("Chart saved as {out_name}");

    if !metrics.diagnostic_lines.is_empty() {
        println!("Debug lines containing failed/errors:");
        for ln in &metrics.diagnostic_lines {
            println!("  {ln}");
        }
    }
}
