use crate::inode::DIRECT_MAX;
use crate::layout::LayoutError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VsfsError {
    #[error("invalid magic number in superblock")]
    InvalidMagic,

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid block size: {0}")]
    InvalidBlockSize(u32),

    #[error("inconsistent superblock: {0}")]
    InvalidSuperblock(String),

    #[error("{record} checksum mismatch: stored {stored:#x}, computed {computed:#x}")]
    ChecksumMismatch {
        record: String,
        stored: u64,
        computed: u64,
    },

    #[error("image is {actual} bytes, expected {expected}")]
    TruncatedImage { expected: u64, actual: u64 },

    #[error("invalid directory entry type: {0}")]
    InvalidEntryType(u8),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("no free inode available")]
    NoFreeInode,

    #[error("not enough free data blocks: needed {needed}, found {found}")]
    NoFreeSpace { needed: u64, found: u64 },

    #[error("file spans {blocks} blocks, more than the {max} direct blocks an inode holds", max = DIRECT_MAX)]
    FileTooLarge { blocks: u64 },

    #[error("entry '{0}' already exists in the root directory")]
    DuplicateName(String),

    #[error("root directory has no free entry slot")]
    DirectoryFull,

    #[error("name is {0} bytes, longer than the {max}-byte name field", max = crate::dirent::NAME_LEN)]
    NameTooLong(usize),

    #[error("no entry named '{0}' in the root directory")]
    NotFound(String),

    #[error("image inconsistency: {0}")]
    Inconsistent(String),

    #[error("block {0} out of range")]
    BlockOutOfRange(u64),

    #[error("inode {0} out of range")]
    InodeOutOfRange(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VsfsError>;
