//! On-disk asset store: one flat directory of image files.
//!
//! Files follow the pair convention `<id>_<1|2>.<ext>` where `1` is the
//! left half and `2` the right half. Scanning groups files into complete
//! pairs and drops anything that does not parse or has a missing half.
//! Reconciliation diffs the directory against the server's id list and
//! applies the difference, always downloading before deleting.
//!
//! Every filesystem failure below the directory root is logged and
//! skipped; a bad file never takes the kiosk down.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use core_gallery::{Item, ItemId};
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

// -------------------------------------------------------------------------------------------------
// Filename convention
// -------------------------------------------------------------------------------------------------

/// Extensions the store treats as displayable images.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

static PAIR_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_([12])\.([A-Za-z0-9]+)$").expect("valid pair file pattern")
});

/// Splits `00384_1.jpg` into `("00384", 1)`. Extension matching is
/// case-insensitive; anything outside the convention yields `None`.
fn parse_pair_name(name: &str) -> Option<(String, u8)> {
    let caps = PAIR_FILE.captures(name)?;
    let ext = caps[3].to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let slot: u8 = caps[2].parse().ok()?;
    Some((caps[1].to_string(), slot))
}

/// Downloads are always stored under the server's jpg naming scheme.
fn pair_file_name(id: &str, slot: u8) -> String {
    format!("{id}_{slot}.jpg")
}

// -------------------------------------------------------------------------------------------------
// AssetStore
// -------------------------------------------------------------------------------------------------

/// Handle to the flat asset directory.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the asset directory if it does not exist yet.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn files(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(target: "store.scan", error = %err, "directory_entry_skipped");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
    }

    /// Scans the directory into complete pairs, ordered by id.
    ///
    /// Files outside the pair convention are ignored and ids with a
    /// missing half are dropped from the result.
    pub fn scan_pairs(&self) -> Vec<Item> {
        let mut sides: BTreeMap<String, [Option<PathBuf>; 2]> = BTreeMap::new();
        for path in self.files() {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((id, slot)) = parse_pair_name(name) else {
                continue;
            };
            sides.entry(id).or_default()[usize::from(slot) - 1] = Some(path);
        }

        let mut items = Vec::new();
        let mut incomplete = 0usize;
        for (id, slots) in sides {
            match slots {
                [Some(left), Some(right)] => items.push(Item::Pair {
                    id: ItemId::new(id),
                    left,
                    right,
                }),
                _ => {
                    incomplete += 1;
                    debug!(target: "store.scan", id = %id, "incomplete_pair_skipped");
                }
            }
        }
        info!(target: "store.scan", pairs = items.len(), incomplete, "pair_scan_finished");
        items
    }

    /// Scan plus a seeded shuffle, the order the gallery actually shows.
    pub fn load_pairs<R: Rng>(&self, rng: &mut R) -> Vec<Item> {
        let mut items = self.scan_pairs();
        items.shuffle(rng);
        items
    }

    /// Every displayable image as a standalone item, ordered by file stem.
    /// Pair halves show up individually here; slideshow mode wants that.
    pub fn scan_singles(&self) -> Vec<Item> {
        let mut items = Vec::new();
        for path in self.files() {
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let ext = ext.to_ascii_lowercase();
            if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            items.push(Item::Single {
                id: ItemId::new(stem),
                path,
            });
        }
        items.sort_by(|a, b| a.id().cmp(b.id()));
        info!(target: "store.scan", count = items.len(), "single_scan_finished");
        items
    }

    // ---------------------------------------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------------------------------------

    /// Diffs the directory against the server's id list.
    ///
    /// Ids are compared as zero-padded strings, the same form the server
    /// uses in filenames. An id counts as locally present when any of its
    /// files exists, so a pair with one half missing is not re-fetched.
    pub fn plan_reconcile(&self, server_ids: &[u32]) -> ReconcilePlan {
        let server: BTreeSet<String> = server_ids.iter().map(|id| format!("{id:05}")).collect();

        let mut local: BTreeSet<String> = BTreeSet::new();
        let mut files_by_id: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for path in self.files() {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((id, _)) = parse_pair_name(name) else {
                continue;
            };
            local.insert(id.clone());
            files_by_id.entry(id).or_default().push(path);
        }

        let mut fetch = Vec::new();
        for id in server.difference(&local) {
            for slot in [1, 2] {
                fetch.push((id.clone(), slot));
            }
        }

        let mut remove = Vec::new();
        for id in local.difference(&server) {
            if let Some(paths) = files_by_id.get(id) {
                remove.extend(paths.iter().cloned());
            }
        }
        remove.sort();

        debug!(
            target: "store.sync",
            fetch = fetch.len(),
            remove = remove.len(),
            "reconcile_planned"
        );
        ReconcilePlan { fetch, remove }
    }

    /// Applies a plan: the whole download phase runs before any file is
    /// deleted, and every per-file failure is logged and skipped.
    pub fn apply_reconcile<F>(&self, plan: &ReconcilePlan, fetch: F) -> SyncSummary
    where
        F: Fn(&str, u8) -> Result<Vec<u8>>,
    {
        let mut summary = SyncSummary::default();

        for (id, slot) in &plan.fetch {
            let name = pair_file_name(id, *slot);
            match fetch(id, *slot) {
                Ok(bytes) => match fs::write(self.root.join(&name), bytes) {
                    Ok(()) => {
                        summary.downloaded += 1;
                        debug!(target: "store.sync", file = %name, "asset_downloaded");
                    }
                    Err(err) => {
                        summary.failed += 1;
                        warn!(target: "store.sync", file = %name, error = %err, "asset_write_failed");
                    }
                },
                Err(err) => {
                    summary.failed += 1;
                    warn!(target: "store.sync", file = %name, error = %err, "asset_fetch_failed");
                }
            }
        }

        for path in &plan.remove {
            match fs::remove_file(path) {
                Ok(()) => {
                    summary.removed += 1;
                    debug!(target: "store.sync", path = %path.display(), "asset_removed");
                }
                Err(err) => {
                    warn!(target: "store.sync", path = %path.display(), error = %err, "asset_remove_failed");
                }
            }
        }

        info!(
            target: "store.sync",
            downloaded = summary.downloaded,
            failed = summary.failed,
            removed = summary.removed,
            "store_reconciled"
        );
        summary
    }
}

/// Work order produced by [`AssetStore::plan_reconcile`]: `fetch` holds
/// `(id, slot)` downloads, `remove` the stale files. Both are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub fetch: Vec<(String, u8)>,
    pub remove: Vec<PathBuf>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.fetch.is_empty() && self.remove.is_empty()
    }
}

/// Counts from one [`AssetStore::apply_reconcile`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub downloaded: usize,
    pub failed: usize,
    pub removed: usize,
}
