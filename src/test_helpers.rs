//! Shared test utilities for the photo-feed test suite.
//!
//! Provides encoded image payloads and a throwaway store rooted in a temp
//! directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (_tmp, store) = temp_store();
//! let post = store.save("Dawn #early", Some(&png_bytes(4, 3))).unwrap();
//! assert_eq!(post.labels(), vec!["early"]);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;

use crate::blob::BlobStore;
use crate::store::PostStore;

/// Encode a `width`×`height` gradient as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 40 % 256) as u8, (y * 40 % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// A file-backed store in a fresh temp directory. Keep the `TempDir` alive.
pub fn temp_store() -> (TempDir, PostStore) {
    let tmp = TempDir::new().unwrap();
    let blobs = BlobStore::open(tmp.path().join("blobs")).unwrap();
    let store = PostStore::open(&tmp.path().join("feed.db"), blobs).unwrap();
    (tmp, store)
}
