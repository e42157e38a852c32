//! The in-memory image buffer and the two operations over it: formatting
//! a fresh volume and inserting a file into the root directory.
//!
//! Every mutation sequence ends by finalizing the checksum of each record
//! it touched; the buffer handed back to the caller is always whole and
//! internally consistent, except for the documented allocation sharp edge
//! on [`Image::insert_file`].

use crate::bitmap;
use crate::checksum;
use crate::dirent::{DirEntry, EntryName, EntryType, DIRENTS_PER_BLOCK, DIRENT_SIZE};
use crate::error::{Result, VsfsError};
use crate::inode::{Inode, DIRECT_MAX, INODE_SIZE};
use crate::layout::{FormatParams, Layout};
use crate::superblock::{Superblock, BLOCK_SIZE, ROOT_INO};
use chrono::Utc;
use tracing::debug;

/// Outcome of a successful insertion, for caller-side reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertSummary {
    pub inode_no: u32,
    /// Absolute block numbers holding the file's content, in order.
    pub blocks: Vec<u32>,
    /// The name as stored, after any truncation.
    pub stored_name: String,
}

/// One complete volume held as a contiguous buffer.
///
/// The core performs no host I/O; callers load and persist the buffer
/// through [`crate::io`] or their own transport.
pub struct Image {
    buf: Vec<u8>,
    sb: Superblock,
}

fn block_span(block_no: u64) -> std::ops::Range<usize> {
    let start = block_no as usize * BLOCK_SIZE;
    start..start + BLOCK_SIZE
}

impl Image {
    /// Produce a fresh, empty volume: finalized superblock, both bitmaps
    /// with bit 0 reserved for the root, a fully checksummed inode table
    /// whose slot 0 is the root directory, and a data region whose first
    /// block holds the `.` and `..` entries.
    pub fn format(params: &FormatParams) -> Result<Image> {
        let layout = Layout::plan(params)?;
        let now = Utc::now().timestamp() as u64;
        let mut buf = vec![0u8; layout.total_blocks as usize * BLOCK_SIZE];
        let mut sb = layout.superblock(now);

        // Reserve the root inode and the root directory's data block.
        bitmap::set_bit(&mut buf[block_span(sb.inode_bitmap_start)], 0);
        bitmap::set_bit(&mut buf[block_span(sb.data_bitmap_start)], 0);

        // Inode table: root at index 0, every other slot zeroed but
        // checksummed so a formatted slot is distinguishable from garbage.
        let table_base = sb.inode_table_start as usize * BLOCK_SIZE;
        for index in 0..layout.inode_count as usize {
            let ino = if index == 0 {
                Inode::new_root(layout.data_region_start, now)
            } else {
                Inode::default()
            };
            let mut raw = ino.to_bytes();
            checksum::finalize_inode(&mut raw);
            let offset = table_base + index * INODE_SIZE;
            buf[offset..offset + INODE_SIZE].copy_from_slice(&raw);
        }

        // Root directory block: `.` and `..`, both the root itself.
        let root_block = layout.data_region_start;
        for (slot, name) in [".", ".."].into_iter().enumerate() {
            let entry = DirEntry::new_dir(ROOT_INO, EntryName::new(name)?);
            let mut raw = entry.to_bytes();
            checksum::finalize_dirent(&mut raw);
            let offset = root_block as usize * BLOCK_SIZE + slot * DIRENT_SIZE;
            buf[offset..offset + DIRENT_SIZE].copy_from_slice(&raw);
        }

        // The superblock checksum is the last stamp on the new volume.
        sb.write_to_block(&mut buf[block_span(0)]);
        sb.checksum = checksum::finalize_superblock(&mut buf[block_span(0)]);

        debug!(
            total_blocks = layout.total_blocks,
            inode_count = layout.inode_count,
            inode_table_blocks = layout.inode_table_blocks,
            data_region_start = layout.data_region_start,
            "formatted image"
        );
        Ok(Image { buf, sb })
    }

    /// Adopt an existing image buffer, validating its superblock
    /// (identity fields, region invariants, length, checksum).
    pub fn from_bytes(buf: Vec<u8>) -> Result<Image> {
        if buf.len() < BLOCK_SIZE {
            return Err(VsfsError::TruncatedImage {
                expected: BLOCK_SIZE as u64,
                actual: buf.len() as u64,
            });
        }
        let sb = Superblock::from_bytes(&buf[..BLOCK_SIZE])?;
        sb.validate()?;
        let expected = sb.total_blocks * BLOCK_SIZE as u64;
        if buf.len() as u64 != expected {
            return Err(VsfsError::TruncatedImage {
                expected,
                actual: buf.len() as u64,
            });
        }
        let computed = checksum::superblock_crc(&buf[..BLOCK_SIZE]);
        if computed != sb.checksum {
            return Err(VsfsError::ChecksumMismatch {
                record: "superblock".to_string(),
                stored: sb.checksum as u64,
                computed: computed as u64,
            });
        }
        Ok(Image { buf, sb })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Insert one file as a new root directory entry.
    ///
    /// The name is the supplied file name truncated to the 58-byte field.
    /// Allocation is not rolled back on failure: the inode bit, and any
    /// data-block bits taken before an error, stay set. The image remains
    /// structurally valid; the reservations are simply leaked.
    pub fn insert_file(&mut self, source: &[u8], file_name: &str) -> Result<InsertSummary> {
        let blocks_needed = (source.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
        if blocks_needed > DIRECT_MAX {
            return Err(VsfsError::FileTooLarge {
                blocks: blocks_needed as u64,
            });
        }
        let name = EntryName::truncating(file_name);
        let now = Utc::now().timestamp() as u64;

        // Inode first, then data blocks, each in ascending bitmap order.
        let inode_count = self.sb.inode_count;
        let inode_index = bitmap::find_and_set_first_free(self.inode_bitmap_mut(), inode_count)
            .ok_or(VsfsError::NoFreeInode)?;
        let inode_no = inode_index as u32 + 1;

        let data_region_start = self.sb.data_region_start;
        let data_region_blocks = self.sb.data_region_blocks;
        let mut direct = [0u32; DIRECT_MAX];
        for (i, slot) in direct.iter_mut().take(blocks_needed).enumerate() {
            match bitmap::find_and_set_first_free(self.data_bitmap_mut(), data_region_blocks) {
                Some(bit) => *slot = (data_region_start + bit) as u32,
                None => {
                    return Err(VsfsError::NoFreeSpace {
                        needed: blocks_needed as u64,
                        found: i as u64,
                    })
                }
            }
        }

        // Content, zero-padding the tail of the final block.
        for (chunk, &block_no) in source.chunks(BLOCK_SIZE).zip(direct.iter()) {
            let block = self.block_mut(block_no as u64)?;
            block[..chunk.len()].copy_from_slice(chunk);
            block[chunk.len()..].fill(0);
        }

        let ino = Inode::new_file(source.len() as u64, direct, now);
        self.write_inode(inode_no, &ino)?;

        // Root directory: names must stay unique; the first free slot
        // (inode number 0) takes the new entry.
        let root_block = self.root_dir_block()?;
        let mut free_slot = None;
        for slot in 0..DIRENTS_PER_BLOCK {
            let entry = self.read_dirent(root_block, slot)?;
            if entry.is_free() {
                if free_slot.is_none() {
                    free_slot = Some(slot);
                }
            } else if entry.name == *name.as_bytes() {
                return Err(VsfsError::DuplicateName(name.display()));
            }
        }
        let slot = free_slot.ok_or(VsfsError::DirectoryFull)?;
        self.write_dirent(root_block, slot, &DirEntry::new_file(inode_no, name))?;

        let mut root = self.read_inode(ROOT_INO)?;
        root.links += 1;
        self.write_inode(ROOT_INO, &root)?;

        self.finalize_superblock();

        debug!(
            inode_no,
            blocks = blocks_needed,
            name = %name.display(),
            "inserted file into root directory"
        );
        Ok(InsertSummary {
            inode_no,
            blocks: direct[..blocks_needed].to_vec(),
            stored_name: name.display(),
        })
    }

    /// Find a root directory entry by name (after truncation).
    pub fn lookup(&self, name: &str) -> Result<Option<DirEntry>> {
        let target = EntryName::truncating(name);
        let root_block = self.root_dir_block()?;
        for slot in 0..DIRENTS_PER_BLOCK {
            let entry = self.read_dirent(root_block, slot)?;
            if !entry.is_free() && entry.name == *target.as_bytes() {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Reassemble a file's contents by walking its direct blocks and
    /// truncating to its recorded size.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .lookup(name)?
            .ok_or_else(|| VsfsError::NotFound(name.to_string()))?;
        let ino = self.read_inode(entry.inode_no)?;
        let mut out = Vec::with_capacity(ino.size_bytes as usize);
        let mut remaining = ino.size_bytes as usize;
        for &block_no in &ino.direct {
            if block_no == 0 || remaining == 0 {
                break;
            }
            let block = self.block(block_no as u64)?;
            let take = remaining.min(BLOCK_SIZE);
            out.extend_from_slice(&block[..take]);
            remaining -= take;
        }
        Ok(out)
    }

    /// All 64 root directory slots, free ones included.
    pub fn root_entries(&self) -> Result<Vec<DirEntry>> {
        let root_block = self.root_dir_block()?;
        (0..DIRENTS_PER_BLOCK)
            .map(|slot| self.read_dirent(root_block, slot))
            .collect()
    }

    /// Read an inode by its 1-based number.
    pub fn read_inode(&self, inode_no: u32) -> Result<Inode> {
        if inode_no == 0 {
            return Err(VsfsError::InodeOutOfRange(0));
        }
        let offset = self.inode_offset(inode_no as u64 - 1)?;
        Inode::from_bytes(&self.buf[offset..offset + INODE_SIZE])
    }

    /// Independently re-check every checksummed record plus the root
    /// directory's referential consistency.
    pub fn verify(&self) -> Result<()> {
        self.sb.validate()?;
        let computed = checksum::superblock_crc(self.block(0)?);
        if computed != self.sb.checksum {
            return Err(VsfsError::ChecksumMismatch {
                record: "superblock".to_string(),
                stored: self.sb.checksum as u64,
                computed: computed as u64,
            });
        }

        // Every table slot carries a valid checksum, allocated or not.
        for index in 0..self.sb.inode_count {
            let offset = self.inode_offset(index)?;
            let raw = &self.buf[offset..offset + INODE_SIZE];
            let stored = Inode::from_bytes(raw)?.inode_crc;
            let computed = checksum::inode_crc(raw) as u64;
            if stored != computed {
                return Err(VsfsError::ChecksumMismatch {
                    record: format!("inode {}", index + 1),
                    stored,
                    computed,
                });
            }
        }

        // Direct pointers of allocated inodes must land on allocated
        // blocks inside the data region.
        let inode_bitmap = self.block(self.sb.inode_bitmap_start)?;
        let data_bitmap = self.block(self.sb.data_bitmap_start)?;
        for index in 0..self.sb.inode_count {
            if !bitmap::test_bit(inode_bitmap, index) {
                continue;
            }
            let ino = self.read_inode(index as u32 + 1)?;
            for &block_no in &ino.direct {
                if block_no == 0 {
                    continue;
                }
                let rel = (block_no as u64)
                    .checked_sub(self.sb.data_region_start)
                    .filter(|rel| *rel < self.sb.data_region_blocks)
                    .ok_or(VsfsError::BlockOutOfRange(block_no as u64))?;
                if !bitmap::test_bit(data_bitmap, rel) {
                    return Err(VsfsError::Inconsistent(format!(
                        "inode {} references unallocated block {}",
                        index + 1,
                        block_no
                    )));
                }
            }
        }

        // Root directory: entry checksums, type tags, unique names, link
        // agreement, and allocated referents.
        let root = self.read_inode(ROOT_INO)?;
        if !root.is_dir() {
            return Err(VsfsError::Inconsistent(
                "root inode is not a directory".to_string(),
            ));
        }
        let root_block = self.root_dir_block()?;
        let block = self.block(root_block)?;
        let mut live = 0u16;
        let mut names: Vec<[u8; crate::dirent::NAME_LEN]> = Vec::new();
        for slot in 0..DIRENTS_PER_BLOCK {
            let raw = &block[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE];
            let stored = raw[DIRENT_SIZE - 1];
            let computed = checksum::dirent_checksum(raw);
            if stored != computed {
                return Err(VsfsError::ChecksumMismatch {
                    record: format!("directory entry {}", slot),
                    stored: stored as u64,
                    computed: computed as u64,
                });
            }
            let entry = DirEntry::from_bytes(raw)?;
            if entry.is_free() {
                continue;
            }
            live += 1;
            entry.kind()?;
            if names.contains(&entry.name) {
                return Err(VsfsError::Inconsistent(format!(
                    "duplicate name '{}' in root directory",
                    entry.display_name()
                )));
            }
            names.push(entry.name);
            if entry.inode_no as u64 > self.sb.inode_count {
                return Err(VsfsError::InodeOutOfRange(entry.inode_no as u64));
            }
            if !bitmap::test_bit(inode_bitmap, entry.inode_no as u64 - 1) {
                return Err(VsfsError::Inconsistent(format!(
                    "entry '{}' references unallocated inode {}",
                    entry.display_name(),
                    entry.inode_no
                )));
            }
            if matches!(entry.kind()?, EntryType::Dir) && entry.inode_no != ROOT_INO {
                return Err(VsfsError::Inconsistent(format!(
                    "unexpected subdirectory entry '{}'",
                    entry.display_name()
                )));
            }
        }
        if root.links != live {
            return Err(VsfsError::Inconsistent(format!(
                "root link count {} does not match {} live entries",
                root.links, live
            )));
        }
        Ok(())
    }

    fn block(&self, block_no: u64) -> Result<&[u8]> {
        if block_no >= self.sb.total_blocks {
            return Err(VsfsError::BlockOutOfRange(block_no));
        }
        Ok(&self.buf[block_span(block_no)])
    }

    fn block_mut(&mut self, block_no: u64) -> Result<&mut [u8]> {
        if block_no >= self.sb.total_blocks {
            return Err(VsfsError::BlockOutOfRange(block_no));
        }
        Ok(&mut self.buf[block_span(block_no)])
    }

    fn inode_bitmap_mut(&mut self) -> &mut [u8] {
        &mut self.buf[block_span(self.sb.inode_bitmap_start)]
    }

    fn data_bitmap_mut(&mut self) -> &mut [u8] {
        &mut self.buf[block_span(self.sb.data_bitmap_start)]
    }

    fn inode_offset(&self, index: u64) -> Result<usize> {
        if index >= self.sb.inode_count {
            return Err(VsfsError::InodeOutOfRange(index + 1));
        }
        Ok(self.sb.inode_table_start as usize * BLOCK_SIZE + index as usize * INODE_SIZE)
    }

    /// Write an inode into its table slot, finalizing its checksum.
    fn write_inode(&mut self, inode_no: u32, ino: &Inode) -> Result<()> {
        if inode_no == 0 {
            return Err(VsfsError::InodeOutOfRange(0));
        }
        let offset = self.inode_offset(inode_no as u64 - 1)?;
        let mut raw = ino.to_bytes();
        checksum::finalize_inode(&mut raw);
        self.buf[offset..offset + INODE_SIZE].copy_from_slice(&raw);
        Ok(())
    }

    fn root_dir_block(&self) -> Result<u64> {
        let root = self.read_inode(ROOT_INO)?;
        Ok(root.direct[0] as u64)
    }

    fn read_dirent(&self, block_no: u64, slot: usize) -> Result<DirEntry> {
        let block = self.block(block_no)?;
        DirEntry::from_bytes(&block[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE])
    }

    /// Write a directory entry into a slot, finalizing its checksum.
    fn write_dirent(&mut self, block_no: u64, slot: usize, entry: &DirEntry) -> Result<()> {
        let mut raw = entry.to_bytes();
        checksum::finalize_dirent(&mut raw);
        let block = self.block_mut(block_no)?;
        block[slot * DIRENT_SIZE..(slot + 1) * DIRENT_SIZE].copy_from_slice(&raw);
        Ok(())
    }

    fn finalize_superblock(&mut self) {
        self.sb.checksum = checksum::finalize_superblock(&mut self.buf[block_span(0)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirent::NAME_LEN;
    use crate::inode::MODE_FILE;

    fn small_image() -> Image {
        Image::format(&FormatParams {
            size_kib: 180,
            inode_count: 128,
        })
        .unwrap()
    }

    #[test]
    fn test_format_reserves_root_bits() {
        let image = small_image();
        let sb = *image.superblock();
        assert!(bitmap::test_bit(
            image.block(sb.inode_bitmap_start).unwrap(),
            0
        ));
        assert!(bitmap::test_bit(
            image.block(sb.data_bitmap_start).unwrap(),
            0
        ));
        assert!(!bitmap::test_bit(
            image.block(sb.data_bitmap_start).unwrap(),
            1
        ));
    }

    #[test]
    fn test_format_then_verify() {
        small_image().verify().unwrap();
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let image = small_image();
        let reopened = Image::from_bytes(image.into_bytes()).unwrap();
        reopened.verify().unwrap();
        assert_eq!(reopened.superblock().total_blocks, 45);
    }

    #[test]
    fn test_from_bytes_rejects_corrupted_superblock() {
        let mut bytes = small_image().into_bytes();
        bytes[20] ^= 0xFF;
        assert!(Image::from_bytes(bytes).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let mut bytes = small_image().into_bytes();
        bytes.truncate(bytes.len() - BLOCK_SIZE);
        assert!(matches!(
            Image::from_bytes(bytes),
            Err(VsfsError::TruncatedImage { .. })
        ));
    }

    #[test]
    fn test_insert_allocates_sequential_inodes() {
        let mut image = small_image();
        for expected in 2..10u32 {
            let summary = image
                .insert_file(b"x", &format!("file{}.bin", expected))
                .unwrap();
            assert_eq!(summary.inode_no, expected);
        }
        image.verify().unwrap();
    }

    #[test]
    fn test_insert_no_free_inode() {
        let mut image = small_image();
        let count = image.sb.inode_count;
        for idx in 1..count {
            bitmap::set_bit(image.inode_bitmap_mut(), idx);
        }
        assert!(matches!(
            image.insert_file(b"data", "full.bin"),
            Err(VsfsError::NoFreeInode)
        ));
    }

    #[test]
    fn test_insert_failure_leaves_bits_set() {
        let mut image = small_image();
        // Claim every data block except two, straight on the bitmap.
        let region_blocks = image.sb.data_region_blocks;
        for idx in 1..region_blocks - 2 {
            bitmap::set_bit(image.data_bitmap_mut(), idx);
        }
        let err = image.insert_file(&[7u8; 3 * BLOCK_SIZE], "big.bin");
        assert!(matches!(
            err,
            Err(VsfsError::NoFreeSpace {
                needed: 3,
                found: 2
            })
        ));
        // The two bits taken before space ran out stay set, as does the
        // inode bit claimed up front.
        let data_bitmap = image.block(image.sb.data_bitmap_start).unwrap();
        assert!(bitmap::test_bit(data_bitmap, region_blocks - 2));
        assert!(bitmap::test_bit(data_bitmap, region_blocks - 1));
        let inode_bitmap = image.block(image.sb.inode_bitmap_start).unwrap();
        assert!(bitmap::test_bit(inode_bitmap, 1));
        // Nothing reached the directory.
        assert!(image.lookup("big.bin").unwrap().is_none());
    }

    #[test]
    fn test_insert_truncated_names_collide() {
        let mut image = small_image();
        let base = "n".repeat(NAME_LEN);
        let first = format!("{}AAA", base);
        let second = format!("{}BBB", base);
        let summary = image.insert_file(b"1", &first).unwrap();
        assert_eq!(summary.stored_name, base);
        assert!(matches!(
            image.insert_file(b"2", &second),
            Err(VsfsError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_inserted_inode_shape() {
        let mut image = small_image();
        let summary = image.insert_file(&[0xAB; 5000], "blob").unwrap();
        let ino = image.read_inode(summary.inode_no).unwrap();
        assert_eq!(ino.mode, MODE_FILE);
        assert_eq!(ino.links, 1);
        assert_eq!(ino.size_bytes, 5000);
        assert_eq!(ino.block_count(), 2);
        assert_eq!(&ino.direct[..2], summary.blocks.as_slice());
    }

    #[test]
    fn test_verify_detects_flipped_content_byte_in_metadata() {
        let mut image = small_image();
        image.insert_file(b"hello", "h.txt").unwrap();
        let table_offset = image.sb.inode_table_start as usize * BLOCK_SIZE;
        image.buf[table_offset + 2] ^= 0x01; // root link count
        assert!(matches!(
            image.verify(),
            Err(VsfsError::ChecksumMismatch { .. })
        ));
    }
}
