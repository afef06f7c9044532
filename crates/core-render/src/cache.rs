use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use image::RgbaImage;
use tracing::{debug, warn};

/// Path-keyed cache of decoded images.
///
/// Failed decodes are reported and not cached, so a file that gets
/// repaired on the next sync loads normally afterwards.
#[derive(Default)]
pub struct AssetCache {
    entries: HashMap<PathBuf, Arc<RgbaImage>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded pixels for `path`, from cache or disk. `None` means the
    /// file is unreadable or not a decodable image; the caller renders a
    /// placeholder instead.
    pub fn load(&mut self, path: &Path) -> Option<Arc<RgbaImage>> {
        if let Some(image) = self.entries.get(path) {
            return Some(image.clone());
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(target: "render.cache", path = %path.display(), error = %err, "asset_read_failed");
                return None;
            }
        };
        let image = match image::load_from_memory(&bytes) {
            Ok(image) => Arc::new(image.to_rgba8()),
            Err(err) => {
                warn!(target: "render.cache", path = %path.display(), error = %err, "asset_decode_failed");
                return None;
            }
        };
        debug!(
            target: "render.cache",
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "asset_decoded"
        );
        self.entries.insert(path.to_path_buf(), image.clone());
        Some(image)
    }

    /// Drops every entry whose path is not in `keep`.
    pub fn retain_only(&mut self, keep: &[PathBuf]) {
        self.entries.retain(|path, _| keep.iter().any(|k| k == path));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads the given files on a short-lived background thread so the next
/// navigation finds them in the OS page cache. Unreadable files are
/// ignored; this is purely advisory.
pub fn warm_paths(paths: Vec<PathBuf>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cache-warm".to_string())
        .spawn(move || {
            for path in paths {
                if let Err(err) = fs::read(&path) {
                    debug!(target: "render.cache", path = %path.display(), error = %err, "warm_read_failed");
                }
            }
        })
}
