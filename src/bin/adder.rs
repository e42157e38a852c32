//! Insert one host file into an existing MiniVSFS image.

use anyhow::{Context, Result};
use clap::Parser;
use minivsfs::io;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "adder")]
#[command(about = "Add a file to a MiniVSFS image as a new root directory entry")]
struct Args {
    /// Existing image to read
    #[arg(long)]
    input: PathBuf,

    /// Where to write the updated image
    #[arg(long)]
    output: PathBuf,

    /// Host file to insert
    #[arg(long)]
    file: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut image = io::load_image(&args.input)
        .with_context(|| format!("loading image '{}'", args.input.display()))?;
    let data = fs::read(&args.file)
        .with_context(|| format!("reading source file '{}'", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .context("source path has no usable file name")?;

    let summary = image.insert_file(&data, name)?;
    io::store_image(&args.output, &image)?;

    info!(
        "added '{}' ({} bytes) as inode #{} using {} block(s), output '{}'",
        summary.stored_name,
        data.len(),
        summary.inode_no,
        summary.blocks.len(),
        args.output.display()
    );
    Ok(())
}
