//! Create an empty MiniVSFS image.

use anyhow::Result;
use clap::Parser;
use minivsfs::{io, FormatParams, Image};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mkfs")]
#[command(about = "Create an empty MiniVSFS image")]
struct Args {
    /// Output image path
    #[arg(long)]
    image: PathBuf,

    /// Image size in KiB (180..=4096, multiple of 4)
    #[arg(long = "size-kib")]
    size_kib: u64,

    /// Inode capacity (128..=512)
    #[arg(long)]
    inodes: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let params = FormatParams {
        size_kib: args.size_kib,
        inode_count: args.inodes,
    };

    let image = Image::format(&params)?;
    let sb = image.superblock();
    info!(
        "size: {} KiB -> {} blocks (block size {})",
        args.size_kib, sb.total_blocks, sb.block_size
    );
    info!(
        "inodes: {}, inode table blocks: {}",
        sb.inode_count, sb.inode_table_blocks
    );
    info!(
        "inode bitmap at block {}, data bitmap at block {}",
        sb.inode_bitmap_start, sb.data_bitmap_start
    );
    info!(
        "data region starts at block {} ({} blocks)",
        sb.data_region_start, sb.data_region_blocks
    );

    io::store_image(&args.image, &image)?;
    info!(
        "created image '{}' with {} blocks",
        args.image.display(),
        sb.total_blocks
    );
    Ok(())
}
