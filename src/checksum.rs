//! Checksum engine for the three mutable metadata records.
//!
//! The superblock and inodes are guarded by CRC32, directory entries by a
//! one-byte XOR fold. Each `finalize_*` stamps the checksum into the raw
//! record and must be the last mutation before the record is persisted;
//! each is a pure function of the record bytes and is idempotent.

use crate::dirent::DIRENT_SIZE;
use crate::inode::{INODE_CRC_OFFSET, INODE_SIZE};
use crate::superblock::{BLOCK_SIZE, SB_CHECKSUM_OFFSET};

/// CRC32 over an arbitrary byte range (reflected polynomial 0xEDB88320,
/// init and xor-out 0xFFFFFFFF).
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// CRC of a superblock block with the checksum field read as zero.
///
/// Coverage is the entire 4096-byte block, checksum field included.
pub fn superblock_crc(block: &[u8]) -> u32 {
    debug_assert_eq!(block.len(), BLOCK_SIZE);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&block[..SB_CHECKSUM_OFFSET]);
    hasher.update(&[0u8; 4]);
    hasher.update(&block[SB_CHECKSUM_OFFSET + 4..]);
    hasher.finalize()
}

/// Stamp the superblock checksum into its block.
pub fn finalize_superblock(block: &mut [u8]) -> u32 {
    let crc = superblock_crc(block);
    block[SB_CHECKSUM_OFFSET..SB_CHECKSUM_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
    crc
}

/// CRC of a raw inode record: bytes 0..120, excluding the trailing
/// 8-byte checksum field.
pub fn inode_crc(raw: &[u8]) -> u32 {
    debug_assert_eq!(raw.len(), INODE_SIZE);
    crc32(&raw[..INODE_CRC_OFFSET])
}

/// Stamp the inode checksum: the CRC lands in the low 4 bytes of the
/// trailing field, the high 4 bytes stay zero.
pub fn finalize_inode(raw: &mut [u8]) -> u32 {
    let crc = inode_crc(raw);
    raw[INODE_CRC_OFFSET..INODE_SIZE].copy_from_slice(&(crc as u64).to_le_bytes());
    crc
}

/// XOR fold of a raw directory entry: bytes 0..63, excluding the
/// trailing checksum byte.
pub fn dirent_checksum(raw: &[u8]) -> u8 {
    debug_assert_eq!(raw.len(), DIRENT_SIZE);
    raw[..DIRENT_SIZE - 1].iter().fold(0u8, |acc, b| acc ^ b)
}

/// Stamp the directory entry checksum byte.
pub fn finalize_dirent(raw: &mut [u8]) -> u8 {
    let sum = dirent_checksum(raw);
    raw[DIRENT_SIZE - 1] = sum;
    sum
}
