// File: crates/nometa-cli/src/main.rs

mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use nometa_core::encode::DEFAULT_JPEG_QUALITY;
use nometa_core::{
    BatchRunner, FileList, PathCollector, StripOptions, inspect_metadata, split_drop_payload,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

/// Directory name used when `--output` is not given.
const DEFAULT_OUTPUT_DIR_NAME: &str = "No Metadata";

/// Remove EXIF and other embedded metadata from images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// View metadata for a file
    View {
        /// The path to the file
        #[arg(required = true)]
        file_path: PathBuf,
    },
    /// Write metadata-free copies of images
    Clean {
        /// Image files or folders to search recursively
        #[arg(required_unless_present = "drop_payload")]
        inputs: Vec<String>,

        /// Paths as dropped or pasted from a file manager, e.g.
        /// `{/photos/my trip} "/tmp/a b.jpg" /tmp/c.png`
        #[arg(long = "drop", value_name = "PAYLOAD")]
        drop_payload: Option<String>,

        /// Where cleaned copies go [default: "No Metadata" next to the executable]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JPEG quality for re-encoded JPEG files
        #[arg(
            long,
            default_value_t = DEFAULT_JPEG_QUALITY,
            value_parser = clap::value_parser!(u8).range(1..=100)
        )]
        jpeg_quality: u8,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Commands::View { file_path } => view(&file_path).await,
        Commands::Clean {
            mut inputs,
            drop_payload,
            output,
            jpeg_quality,
        } => {
            if let Some(payload) = drop_payload {
                inputs.extend(split_drop_payload(&payload));
            }
            let output_dir = output.unwrap_or_else(default_output_dir);
            clean(inputs, output_dir, StripOptions { jpeg_quality }).await
        }
    }
}

async fn view(file_path: &Path) -> Result<ExitCode> {
    let file_bytes = tokio::fs::read(file_path)
        .await
        .with_context(|| format!("Failed to read file: {}", file_path.display()))?;

    let metadata = inspect_metadata(&file_bytes)
        .with_context(|| format!("Failed to inspect {}", file_path.display()))?;

    if metadata.is_empty() {
        println!("No metadata found in {}.", file_path.display());
    } else {
        println!("Metadata for {}:", file_path.display());
        for entry in metadata {
            println!("  - {}: {} = {}", entry.category, entry.key, entry.value);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn clean(
    inputs: Vec<String>,
    output_dir: PathBuf,
    options: StripOptions,
) -> Result<ExitCode> {
    let mut files = FileList::new();
    let outcome = PathCollector::new().add_paths(&mut files, &inputs);
    println!("{}", outcome.status_message());
    if files.is_empty() {
        return Ok(ExitCode::FAILURE);
    }

    let runner = BatchRunner::new(options);
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current file");
            cancel.cancel();
        }
    });

    let progress_bar = ProgressBar::new(files.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    // Decoding and encoding block, so the batch runs on the blocking pool.
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let batch_output_dir = output_dir.clone();
    let batch = tokio::task::spawn_blocking(move || {
        runner.run(&mut files, &batch_output_dir, |progress| {
            let _ = progress_tx.send(progress);
        })
    });

    while let Some(progress) = progress_rx.recv().await {
        progress_bar.set_position(progress.index as u64);
        progress_bar.set_message(format!("{} done", progress.succeeded));
    }
    progress_bar.finish_and_clear();

    let result = batch
        .await
        .context("Batch worker panicked")?
        .with_context(|| format!("Nothing was processed into {}", output_dir.display()))?;

    println!("{}", result.summary());
    Ok(if result.is_complete_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn default_output_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_OUTPUT_DIR_NAME)
}
