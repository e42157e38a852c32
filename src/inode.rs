use crate::bytes::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64};
use crate::error::{Result, VsfsError};
use crate::superblock::BLOCK_SIZE;

/// On-disk size of one inode record.
pub const INODE_SIZE: usize = 128;

/// Inodes packed per table block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// Direct data-block pointers per inode; files are capped at this many
/// blocks.
pub const DIRECT_MAX: usize = 12;

/// Byte offset of the trailing checksum field; the CRC covers everything
/// before it.
pub const INODE_CRC_OFFSET: usize = 120;

/// Directory mode word.
pub const MODE_DIR: u16 = 0o040000;

/// Regular-file mode word.
pub const MODE_FILE: u16 = 0o100000;

/// Project tag stamped into every inode this crate creates.
pub const DEFAULT_PROJ_ID: u32 = 2;

/// Fixed-size record describing one file or directory.
///
/// A zeroed-but-checksummed record marks a formatted, unallocated table
/// slot. `direct` holds absolute block numbers; 0 means unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inode {
    pub mode: u16,
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    pub size_bytes: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub direct: [u32; DIRECT_MAX],
    pub reserved: [u32; 3],
    pub proj_id: u32,
    pub uid16_gid16: u32,
    /// Extended-attribute pointer; unused, must stay 0.
    pub xattr_ptr: u64,
    /// Low 4 bytes carry the CRC32 of bytes 0..120; high 4 bytes are 0.
    pub inode_crc: u64,
}

impl Inode {
    /// Root directory inode as stamped at format time: one block of
    /// directory entries, two links (`.` and `..`).
    pub fn new_root(data_region_start: u64, now: u64) -> Self {
        let mut direct = [0u32; DIRECT_MAX];
        direct[0] = data_region_start as u32;
        Inode {
            mode: MODE_DIR,
            links: 2,
            size_bytes: BLOCK_SIZE as u64,
            atime: now,
            mtime: now,
            ctime: now,
            direct,
            proj_id: DEFAULT_PROJ_ID,
            ..Inode::default()
        }
    }

    /// Regular-file inode over a set of already-allocated blocks.
    pub fn new_file(size_bytes: u64, direct: [u32; DIRECT_MAX], now: u64) -> Self {
        Inode {
            mode: MODE_FILE,
            links: 1,
            size_bytes,
            atime: now,
            mtime: now,
            ctime: now,
            direct,
            proj_id: DEFAULT_PROJ_ID,
            ..Inode::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode == MODE_DIR
    }

    pub fn is_file(&self) -> bool {
        self.mode == MODE_FILE
    }

    /// Number of populated direct pointers.
    pub fn block_count(&self) -> usize {
        self.direct.iter().filter(|&&b| b != 0).count()
    }

    pub fn to_bytes(&self) -> [u8; INODE_SIZE] {
        let mut raw = [0u8; INODE_SIZE];
        put_u16(&mut raw, 0, self.mode);
        put_u16(&mut raw, 2, self.links);
        put_u32(&mut raw, 4, self.uid);
        put_u32(&mut raw, 8, self.gid);
        put_u64(&mut raw, 12, self.size_bytes);
        put_u64(&mut raw, 20, self.atime);
        put_u64(&mut raw, 28, self.mtime);
        put_u64(&mut raw, 36, self.ctime);
        for (i, block) in self.direct.iter().enumerate() {
            put_u32(&mut raw, 44 + i * 4, *block);
        }
        for (i, word) in self.reserved.iter().enumerate() {
            put_u32(&mut raw, 92 + i * 4, *word);
        }
        put_u32(&mut raw, 104, self.proj_id);
        put_u32(&mut raw, 108, self.uid16_gid16);
        put_u64(&mut raw, 112, self.xattr_ptr);
        put_u64(&mut raw, INODE_CRC_OFFSET, self.inode_crc);
        raw
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INODE_SIZE {
            return Err(VsfsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "insufficient bytes for inode",
            )));
        }
        let mut direct = [0u32; DIRECT_MAX];
        for (i, block) in direct.iter_mut().enumerate() {
            *block = get_u32(bytes, 44 + i * 4);
        }
        let mut reserved = [0u32; 3];
        for (i, word) in reserved.iter_mut().enumerate() {
            *word = get_u32(bytes, 92 + i * 4);
        }
        Ok(Inode {
            mode: get_u16(bytes, 0),
            links: get_u16(bytes, 2),
            uid: get_u32(bytes, 4),
            gid: get_u32(bytes, 8),
            size_bytes: get_u64(bytes, 12),
            atime: get_u64(bytes, 20),
            mtime: get_u64(bytes, 28),
            ctime: get_u64(bytes, 36),
            direct,
            reserved,
            proj_id: get_u32(bytes, 104),
            uid16_gid16: get_u32(bytes, 108),
            xattr_ptr: get_u64(bytes, 112),
            inode_crc: get_u64(bytes, INODE_CRC_OFFSET),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;

    #[test]
    fn test_serialization_round_trip() {
        let mut ino = Inode::new_file(9000, [0u32; DIRECT_MAX], 1_700_000_000);
        ino.direct[0] = 7;
        ino.direct[1] = 9;
        ino.inode_crc = 0xDEAD_BEEF;
        let raw = ino.to_bytes();
        assert_eq!(Inode::from_bytes(&raw).unwrap(), ino);
    }

    #[test]
    fn test_field_offsets() {
        let mut ino = Inode::new_root(42, 1_700_000_000);
        ino.links = 3;
        let raw = ino.to_bytes();
        assert_eq!(u16::from_le_bytes([raw[0], raw[1]]), MODE_DIR);
        assert_eq!(u16::from_le_bytes([raw[2], raw[3]]), 3);
        assert_eq!(
            u32::from_le_bytes([raw[44], raw[45], raw[46], raw[47]]),
            42
        );
        assert_eq!(
            u32::from_le_bytes([raw[104], raw[105], raw[106], raw[107]]),
            DEFAULT_PROJ_ID
        );
    }

    #[test]
    fn test_root_inode_shape() {
        let root = Inode::new_root(5, 1_700_000_000);
        assert!(root.is_dir());
        assert_eq!(root.links, 2);
        assert_eq!(root.size_bytes, BLOCK_SIZE as u64);
        assert_eq!(root.direct[0], 5);
        assert_eq!(root.block_count(), 1);
        assert_eq!(root.xattr_ptr, 0);
    }

    #[test]
    fn test_zeroed_inode_still_checksums() {
        let mut raw = Inode::default().to_bytes();
        let crc = checksum::finalize_inode(&mut raw);
        assert_eq!(crc, checksum::crc32(&[0u8; INODE_CRC_OFFSET]));
        let parsed = Inode::from_bytes(&raw).unwrap();
        assert_eq!(parsed.inode_crc, crc as u64);
    }
}
