//! The local content store.
//!
//! ```text
//! <root>/
//!   <bundle-id>/          one directory per bundle, named by its id
//!     index.html
//!     img/logo.png
//! ```
//!
//! The HTTP layer serves straight out of this tree. Writers only ever
//! create: the ingestor fills a freshly created bundle directory and the
//! puller adds files that were missing, so no file-level locking is needed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use arcade_types::{Bundle, BundleId};
use tracing::info;

use crate::error::{StoreError, StoreResult};

/// Page served when a bundle is requested without an asset path.
pub const INDEX_PAGE: &str = "index.html";

/// Handle on the local content directory tree.
#[derive(Clone, Debug)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    pub fn ensure_root(&self) -> StoreResult<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Directory a bundle occupies (whether or not it exists).
    pub fn bundle_dir(&self, id: &BundleId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Create the directory for a new bundle.
    ///
    /// Fails with [`StoreError::BundleExists`] if the directory is already
    /// present: a bundle is only ever written by the ingestion that created it.
    pub fn create_bundle(&self, id: BundleId) -> StoreResult<Bundle> {
        self.ensure_root()?;
        let dir = self.bundle_dir(&id);
        match std::fs::create_dir(&dir) {
            Ok(()) => Ok(Bundle::new(id, dir)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::BundleExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn contains(&self, id: &BundleId) -> bool {
        self.bundle_dir(id).is_dir()
    }

    pub fn open_bundle(&self, id: BundleId) -> Option<Bundle> {
        let dir = self.bundle_dir(&id);
        dir.is_dir().then(|| Bundle::new(id, dir))
    }

    /// All bundles present locally, oldest first.
    ///
    /// Directories whose names are not bundle ids are ignored.
    pub fn list_bundles(&self) -> StoreResult<Vec<Bundle>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut bundles = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Ok(id) = BundleId::parse(&name) {
                bundles.push(Bundle::new(id, entry.path()));
            }
        }
        bundles.sort_by_key(|b| b.id());
        Ok(bundles)
    }

    /// Delete a bundle's directory tree. Returns `true` if it existed.
    pub fn remove_bundle(&self, id: &BundleId) -> StoreResult<bool> {
        match std::fs::remove_dir_all(self.bundle_dir(id)) {
            Ok(()) => {
                info!(bundle = %id, "bundle removed from content store");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a requested asset of a bundle to the file that serves it.
    ///
    /// An empty asset maps to the bundle's `index.html`. Otherwise the asset
    /// must already be a clean relative path (no `.`/`..`/empty segments, no
    /// leading or trailing slash) and must not name a hidden file.
    pub fn resolve_asset(&self, id: &BundleId, asset: &str) -> StoreResult<PathBuf> {
        let dir = self.bundle_dir(id);
        if asset.is_empty() {
            return Ok(dir.join(INDEX_PAGE));
        }
        let invalid = |reason: &str| StoreError::InvalidAsset {
            asset: asset.to_string(),
            reason: reason.to_string(),
        };
        if asset.contains('\\') || asset.contains('\0') {
            return Err(invalid("unsupported character"));
        }
        let mut path = dir;
        for segment in asset.split('/') {
            match segment {
                "" | "." | ".." => return Err(invalid("not a clean path")),
                s => path.push(s),
            }
        }
        if asset.rsplit('/').next().is_some_and(|base| base.starts_with('.')) {
            return Err(invalid("hidden file"));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path().join("games"));
        (dir, store)
    }

    #[test]
    fn create_bundle_makes_directory() {
        let (_dir, store) = store();
        let id = BundleId::new();
        let bundle = store.create_bundle(id).unwrap();
        assert!(bundle.root().is_dir());
        assert_eq!(bundle.root().file_name().unwrap().to_str().unwrap(), id.to_string());
        assert!(store.contains(&id));
    }

    #[test]
    fn create_bundle_twice_fails() {
        let (_dir, store) = store();
        let id = BundleId::new();
        store.create_bundle(id).unwrap();
        assert!(matches!(store.create_bundle(id), Err(StoreError::BundleExists(e)) if e == id));
    }

    #[test]
    fn list_bundles_sorted_and_filtered() {
        let (_dir, store) = store();
        let a = BundleId::new();
        let b = BundleId::new();
        store.create_bundle(b).unwrap();
        store.create_bundle(a).unwrap();
        std::fs::create_dir(store.root().join("not-a-bundle")).unwrap();
        std::fs::write(store.root().join(BundleId::new().to_string()), b"file").unwrap();

        let ids: Vec<BundleId> = store.list_bundles().unwrap().iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn list_bundles_without_root() {
        let (_dir, store) = store();
        assert!(store.list_bundles().unwrap().is_empty());
    }

    #[test]
    fn remove_bundle_deletes_tree() {
        let (_dir, store) = store();
        let id = BundleId::new();
        let bundle = store.create_bundle(id).unwrap();
        std::fs::create_dir_all(bundle.root().join("img")).unwrap();
        std::fs::write(bundle.root().join("img/logo.png"), b"png").unwrap();

        assert!(store.remove_bundle(&id).unwrap());
        assert!(!store.contains(&id));
        assert!(!store.remove_bundle(&id).unwrap());
    }

    #[test]
    fn resolve_asset_rules() {
        let (_dir, store) = store();
        let id = BundleId::new();
        let base = store.bundle_dir(&id);

        assert_eq!(store.resolve_asset(&id, "").unwrap(), base.join("index.html"));
        assert_eq!(
            store.resolve_asset(&id, "img/logo.png").unwrap(),
            base.join("img").join("logo.png")
        );
        for bad in ["../x", "a/../b", "./a", "a//b", "/a", "a/", ".env", "img/.secret", "a\\b"] {
            assert!(store.resolve_asset(&id, bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn open_bundle_only_when_present() {
        let (_dir, store) = store();
        let id = BundleId::new();
        assert!(store.open_bundle(id).is_none());
        store.create_bundle(id).unwrap();
        assert_eq!(store.open_bundle(id).unwrap().id(), id);
    }
}
