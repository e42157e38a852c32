//! Whole-image host I/O for the CLI layer.
//!
//! The core operates purely on in-memory buffers; these helpers move a
//! complete image between the host filesystem and [`Image`].

use crate::error::Result;
use crate::image::Image;
use std::fs;
use std::path::Path;

/// Load and validate an image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image> {
    let buf = fs::read(path)?;
    Image::from_bytes(buf)
}

/// Persist an image, replacing any existing file.
pub fn store_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<()> {
    fs::write(path, image.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FormatParams;

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.img");

        let image = Image::format(&FormatParams {
            size_kib: 256,
            inode_count: 128,
        })
        .unwrap();
        store_image(&path, &image).unwrap();

        let loaded = load_image(&path).unwrap();
        loaded.verify().unwrap();
        assert_eq!(loaded.superblock(), image.superblock());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.img");
        fs::write(&path, vec![0xA5u8; 8192]).unwrap();
        assert!(load_image(&path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_image("/nonexistent/path.img").is_err());
    }
}
