use crate::bytes::{get_u32, put_u32};
use crate::error::{Result, VsfsError};
use crate::superblock::BLOCK_SIZE;
use tracing::warn;

/// On-disk size of one directory entry.
pub const DIRENT_SIZE: usize = 64;

/// Entries packed per directory block.
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

/// Width of the fixed name field. Names are NUL-padded and need not be
/// NUL-terminated when they fill the field.
pub const NAME_LEN: usize = 58;

/// Directory entry type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryType {
    File = 1,
    Dir = 2,
}

impl EntryType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(EntryType::File),
            2 => Ok(EntryType::Dir),
            _ => Err(VsfsError::InvalidEntryType(value)),
        }
    }
}

/// Fixed-width, NUL-padded entry name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryName([u8; NAME_LEN]);

impl EntryName {
    /// Strict constructor: rejects names longer than the field.
    pub fn new(name: &str) -> Result<Self> {
        if name.len() > NAME_LEN {
            return Err(VsfsError::NameTooLong(name.len()));
        }
        Ok(Self::copy_clipped(name.as_bytes()))
    }

    /// Clip a name to the field width, silently dropping the tail.
    pub fn truncating(name: &str) -> Self {
        if name.len() > NAME_LEN {
            warn!(
                name,
                clipped_to = NAME_LEN,
                "entry name longer than the name field, truncating"
            );
        }
        Self::copy_clipped(name.as_bytes())
    }

    fn copy_clipped(bytes: &[u8]) -> Self {
        let mut field = [0u8; NAME_LEN];
        let len = bytes.len().min(NAME_LEN);
        field[..len].copy_from_slice(&bytes[..len]);
        EntryName(field)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    /// The stored name without its NUL padding.
    pub fn display(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

/// Fixed-size record mapping a name to an inode within one directory
/// block. `inode_no == 0` marks a free, reusable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_no: u32,
    pub entry_type: u8,
    pub name: [u8; NAME_LEN],
    /// XOR of bytes 0..63.
    pub checksum: u8,
}

impl DirEntry {
    pub fn new_file(inode_no: u32, name: EntryName) -> Self {
        DirEntry {
            inode_no,
            entry_type: EntryType::File as u8,
            name: *name.as_bytes(),
            checksum: 0,
        }
    }

    pub fn new_dir(inode_no: u32, name: EntryName) -> Self {
        DirEntry {
            inode_no,
            entry_type: EntryType::Dir as u8,
            name: *name.as_bytes(),
            checksum: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.inode_no == 0
    }

    pub fn kind(&self) -> Result<EntryType> {
        EntryType::from_u8(self.entry_type)
    }

    /// The stored name without its NUL padding.
    pub fn display_name(&self) -> String {
        EntryName(self.name).display()
    }

    pub fn to_bytes(&self) -> [u8; DIRENT_SIZE] {
        let mut raw = [0u8; DIRENT_SIZE];
        put_u32(&mut raw, 0, self.inode_no);
        raw[4] = self.entry_type;
        raw[5..5 + NAME_LEN].copy_from_slice(&self.name);
        raw[DIRENT_SIZE - 1] = self.checksum;
        raw
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DIRENT_SIZE {
            return Err(VsfsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "insufficient bytes for directory entry",
            )));
        }
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[5..5 + NAME_LEN]);
        Ok(DirEntry {
            inode_no: get_u32(bytes, 0),
            entry_type: bytes[4],
            name,
            checksum: bytes[DIRENT_SIZE - 1],
        })
    }
}
