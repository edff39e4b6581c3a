//! Keep-set bookkeeping for the prune phase

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use parking_lot::RwLock;

use crate::paths::{ancestors_between, canonical_root, normalize_path, relative_to};

/// Destination paths a run produced or preserved, per destination root.
///
/// Shared by every in-flight pair; inserts take a write lock. The prune
/// phase only reads it after all pairs have settled.
#[derive(Debug, Default)]
pub struct DestinationTracker {
    roots: RwLock<BTreeMap<PathBuf, HashSet<PathBuf>>>,
}

impl DestinationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a destination root. The first registration wins; later calls
    /// never reset what was already kept.
    pub fn keep_root(&self, root: &Path) -> PathBuf {
        let root = canonical_root(root);
        self.roots
            .write()
            .entry(root.clone())
            .or_insert_with(|| HashSet::from([root.clone()]));
        root
    }

    /// Keep `path` and every directory between `root` and it.
    ///
    /// Paths outside `root` are ignored: they can never show up in the
    /// root's listing.
    pub fn keep(&self, root: &Path, path: &Path) {
        let root = canonical_root(root);
        let path = normalize_path(path);

        let Some(parents) = ancestors_between(&root, &path) else {
            tracing::debug!(root = %root.display(), path = %path.display(), "kept path is outside its root");
            return;
        };

        let mut roots = self.roots.write();
        let kept = roots
            .entry(root.clone())
            .or_insert_with(|| HashSet::from([root.clone()]));
        kept.extend(parents);
        kept.insert(path);
    }

    /// Registered roots, sorted
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.read().keys().cloned().collect()
    }

    /// Everything that must survive pruning `root`: its own keep set plus the
    /// keep sets of any registered root nested inside it or enclosing it.
    pub fn keep_set(&self, root: &Path) -> HashSet<PathBuf> {
        let root = canonical_root(root);
        let roots = self.roots.read();

        roots
            .iter()
            .filter(|(candidate, _)| {
                relative_to(&root, candidate).is_some() || relative_to(candidate, &root).is_some()
            })
            .flat_map(|(_, kept)| kept.iter().cloned())
            .collect()
    }

    /// Whether `path` is kept under `root` (own keep set only)
    pub fn is_kept(&self, root: &Path, path: &Path) -> bool {
        let root = canonical_root(root);
        self.roots
            .read()
            .get(&root)
            .map(|kept| kept.contains(&normalize_path(path)))
            .unwrap_or(false)
    }
}
