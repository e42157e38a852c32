//! MiniVSFS: a minimal Unix-like flat filesystem image format.
//!
//! A volume is a single contiguous buffer of 4096-byte blocks:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Block 0: Superblock (116 bytes + CRC32)      │
//! │ Block 1: Inode bitmap (1 bit per inode)      │
//! │ Block 2: Data bitmap (1 bit per data block)  │
//! │ Blocks 3..: Inode table (128-byte inodes)    │
//! │ Remaining: Data region (root dir + files)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Two operations are supported: [`Image::format`] creates a fresh,
//! empty, internally consistent volume, and [`Image::insert_file`] adds
//! one file to the single-level root directory, allocating an inode and
//! up to 12 direct data blocks. Every mutable metadata record — the
//! superblock, each inode, each directory entry — carries a checksum
//! that is re-finalized as the last step of any mutation.
//!
//! The core never touches the host filesystem; [`io`] provides the
//! whole-image load/store helpers the bundled `mkfs` and `adder` tools
//! are built on.
//!
//! ```no_run
//! use minivsfs::{FormatParams, Image};
//!
//! let mut image = Image::format(&FormatParams {
//!     size_kib: 1024,
//!     inode_count: 128,
//! })?;
//! let summary = image.insert_file(b"hello, volume", "hello.txt")?;
//! assert_eq!(summary.inode_no, 2);
//! image.verify()?;
//! # Ok::<(), minivsfs::VsfsError>(())
//! ```

pub mod bitmap;
mod bytes;
pub mod checksum;
pub mod dirent;
pub mod error;
pub mod image;
pub mod inode;
pub mod io;
pub mod layout;
pub mod superblock;

pub use dirent::{DirEntry, EntryName, EntryType, DIRENTS_PER_BLOCK, NAME_LEN};
pub use error::{Result, VsfsError};
pub use image::{Image, InsertSummary};
pub use inode::{Inode, DIRECT_MAX, INODES_PER_BLOCK, INODE_SIZE};
pub use layout::{FormatParams, Layout, LayoutError};
pub use superblock::{Superblock, BLOCK_SIZE, MAGIC, ROOT_INO};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
