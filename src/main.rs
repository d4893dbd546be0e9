//! Main entry point for the blockpipe CLI app

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use blockpipe::cli::{self, Commands, Tuning};
use blockpipe::{CancelToken, PipelineBuilder, PipelineError, PipelineStatus, ProcessingMode};

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run_app() {
        if e.downcast_ref::<clap::Error>().is_none() {
            eprintln!("Error: {}", e);
        }
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    let command = cli::run()?;

    match command {
        Commands::Copy { input, output, tuning } => {
            execute(ProcessingMode::Copy, &input, &output, &tuning)
        }
        Commands::Compress { input, output, level, tuning } => {
            execute(ProcessingMode::Compress { level }, &input, &output, &tuning)
        }
        Commands::Decompress { input, output, tuning } => {
            execute(ProcessingMode::Decompress, &input, &output, &tuning)
        }
    }
}

fn execute(
    mode: ProcessingMode,
    input: &Path,
    output: &Path,
    tuning: &Tuning,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = File::open(input).map_err(|source| PipelineError::Open {
        source,
        path: input.to_path_buf(),
    })?;
    let target = File::create(output).map_err(|source| PipelineError::Open {
        source,
        path: output.to_path_buf(),
    })?;
    let mut source = BufReader::new(source);
    let mut target = BufWriter::new(target);

    let summary = PipelineBuilder::for_mode(mode)
        .workers(tuning.threads)
        .chunk_size(tuning.chunk_size_kib * 1024)
        .pressure_threshold(tuning.memory_threshold as f64 / 100.0)
        .run(&mut source, &mut target, &CancelToken::new())?;

    match summary.status {
        PipelineStatus::Completed => {
            println!(
                "[blockpipe] Done | Blocks: {} | {:.2} → {:.2} MiB | Time: {:.2}s | ⏩ {:.1} MB/s",
                summary.blocks_written,
                summary.bytes_read as f64 / (1024.0 * 1024.0),
                summary.bytes_written as f64 / (1024.0 * 1024.0),
                summary.elapsed.as_secs_f64(),
                throughput_mbps(summary.bytes_read, summary.elapsed),
            );
        }
        PipelineStatus::Canceled => {
            println!("[blockpipe] Canceled after {} blocks", summary.blocks_written);
        }
    }
    Ok(())
}

fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() > 0.0 {
        (bytes as f64 / (1024.0 * 1024.0)) / elapsed.as_secs_f64()
    } else {
        0.0
    }
}
