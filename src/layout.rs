//! Region planning for new images.
//!
//! The metadata regions sit at fixed blocks: superblock at 0, inode
//! bitmap at 1, data bitmap at 2, inode table from 3. Only the inode
//! table length and therefore the data region boundary vary with the
//! requested inode capacity.

use crate::inode::INODES_PER_BLOCK;
use crate::superblock::{Superblock, BLOCK_SIZE, MAGIC, ROOT_INO, VERSION};
use thiserror::Error;

pub const MIN_SIZE_KIB: u64 = 180;
pub const MAX_SIZE_KIB: u64 = 4096;
pub const SIZE_KIB_MULTIPLE: u64 = 4;
pub const MIN_INODES: u64 = 128;
pub const MAX_INODES: u64 = 512;

pub const INODE_BITMAP_START: u64 = 1;
pub const INODE_BITMAP_BLOCKS: u64 = 1;
pub const DATA_BITMAP_START: u64 = 2;
pub const DATA_BITMAP_BLOCKS: u64 = 1;
pub const INODE_TABLE_START: u64 = 3;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("image size {0} KiB outside the accepted {min}..={max} KiB range", min = MIN_SIZE_KIB, max = MAX_SIZE_KIB)]
    SizeOutOfRange(u64),

    #[error("image size {0} KiB is not a multiple of {multiple} KiB", multiple = SIZE_KIB_MULTIPLE)]
    SizeNotAligned(u64),

    #[error("inode count {0} outside the accepted {min}..={max} range", min = MIN_INODES, max = MAX_INODES)]
    InodeCountOutOfRange(u64),

    #[error("no room for a data region: metadata ends at block {metadata_end} of {total_blocks}")]
    NoDataRegion {
        metadata_end: u64,
        total_blocks: u64,
    },
}

/// Requested image geometry, as supplied by the CLI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatParams {
    /// Image size in KiB; must be a multiple of the block size in KiB.
    pub size_kib: u64,
    /// Inode capacity of the volume.
    pub inode_count: u64,
}

/// Planned region boundaries for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub total_blocks: u64,
    pub inode_count: u64,
    pub inode_table_blocks: u64,
    pub data_region_start: u64,
    pub data_region_blocks: u64,
}

impl Layout {
    /// Validate the requested geometry and derive the region boundaries.
    pub fn plan(params: &FormatParams) -> Result<Layout, LayoutError> {
        if !(MIN_SIZE_KIB..=MAX_SIZE_KIB).contains(&params.size_kib) {
            return Err(LayoutError::SizeOutOfRange(params.size_kib));
        }
        if params.size_kib % SIZE_KIB_MULTIPLE != 0 {
            return Err(LayoutError::SizeNotAligned(params.size_kib));
        }
        if !(MIN_INODES..=MAX_INODES).contains(&params.inode_count) {
            return Err(LayoutError::InodeCountOutOfRange(params.inode_count));
        }

        let total_blocks = params.size_kib * 1024 / BLOCK_SIZE as u64;
        let inode_table_blocks =
            (params.inode_count + INODES_PER_BLOCK as u64 - 1) / INODES_PER_BLOCK as u64;
        let data_region_start = INODE_TABLE_START + inode_table_blocks;
        if data_region_start >= total_blocks {
            return Err(LayoutError::NoDataRegion {
                metadata_end: data_region_start,
                total_blocks,
            });
        }

        Ok(Layout {
            total_blocks,
            inode_count: params.inode_count,
            inode_table_blocks,
            data_region_start,
            data_region_blocks: total_blocks - data_region_start,
        })
    }

    /// Populated superblock for this layout; the checksum field is left
    /// zero for the finalizer.
    pub fn superblock(&self, mtime_epoch: u64) -> Superblock {
        Superblock {
            magic: MAGIC,
            version: VERSION,
            block_size: BLOCK_SIZE as u32,
            total_blocks: self.total_blocks,
            inode_count: self.inode_count,
            inode_bitmap_start: INODE_BITMAP_START,
            inode_bitmap_blocks: INODE_BITMAP_BLOCKS,
            data_bitmap_start: DATA_BITMAP_START,
            data_bitmap_blocks: DATA_BITMAP_BLOCKS,
            inode_table_start: INODE_TABLE_START,
            inode_table_blocks: self.inode_table_blocks,
            data_region_start: self.data_region_start,
            data_region_blocks: self.data_region_blocks,
            root_inode: ROOT_INO as u64,
            mtime_epoch,
            flags: 0,
            checksum: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_minimal_image() {
        let layout = Layout::plan(&FormatParams {
            size_kib: 180,
            inode_count: 128,
        })
        .unwrap();
        assert_eq!(layout.total_blocks, 45);
        assert_eq!(layout.inode_table_blocks, 4);
        assert_eq!(layout.data_region_start, 7);
        assert_eq!(layout.data_region_blocks, 38);
    }

    #[test]
    fn test_plan_partial_table_block_rounds_up() {
        // 129 inodes need 5 table blocks at 32 per block.
        let layout = Layout::plan(&FormatParams {
            size_kib: 1024,
            inode_count: 129,
        })
        .unwrap();
        assert_eq!(layout.inode_table_blocks, 5);
        assert_eq!(layout.data_region_start, 8);
    }

    #[test]
    fn test_plan_rejects_size_out_of_range() {
        for size_kib in [0, 176, 4100] {
            assert!(matches!(
                Layout::plan(&FormatParams {
                    size_kib,
                    inode_count: 128
                }),
                Err(LayoutError::SizeOutOfRange(_))
            ));
        }
    }

    #[test]
    fn test_plan_rejects_unaligned_size() {
        assert!(matches!(
            Layout::plan(&FormatParams {
                size_kib: 181,
                inode_count: 128
            }),
            Err(LayoutError::SizeNotAligned(181))
        ));
    }

    #[test]
    fn test_plan_rejects_inode_count_out_of_range() {
        for inode_count in [0, 127, 513] {
            assert!(matches!(
                Layout::plan(&FormatParams {
                    size_kib: 1024,
                    inode_count
                }),
                Err(LayoutError::InodeCountOutOfRange(_))
            ));
        }
    }

    #[test]
    fn test_superblock_reflects_layout() {
        let layout = Layout::plan(&FormatParams {
            size_kib: 512,
            inode_count: 256,
        })
        .unwrap();
        let sb = layout.superblock(1_700_000_000);
        assert!(sb.validate().is_ok());
        assert_eq!(sb.total_blocks, 128);
        assert_eq!(sb.inode_table_blocks, 8);
        assert_eq!(sb.data_region_start, 11);
        assert_eq!(sb.mtime_epoch, 1_700_000_000);
        assert_eq!(sb.checksum, 0);
    }

    #[test]
    fn test_region_chain_invariants_hold_across_range() {
        for size_kib in (MIN_SIZE_KIB..=MAX_SIZE_KIB).step_by(SIZE_KIB_MULTIPLE as usize * 16) {
            for inode_count in [MIN_INODES, 200, 333, MAX_INODES] {
                let layout = Layout::plan(&FormatParams {
                    size_kib,
                    inode_count,
                })
                .unwrap();
                let sb = layout.superblock(0);
                sb.validate().unwrap();
                assert_eq!(
                    sb.data_region_start,
                    sb.inode_table_start + sb.inode_table_blocks
                );
                assert!(sb.data_region_start < sb.total_blocks);
            }
        }
    }
}
