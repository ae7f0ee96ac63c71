use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::BiddingError;

pub fn hash_file(path: &Path) -> Result<String, BiddingError> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

/// Compares output files against the hashes recorded at the last push.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    stored: BTreeMap<PathBuf, String>,
    pending: BTreeMap<PathBuf, String>,
}

impl ChangeTracker {
    pub fn new(stored: BTreeMap<PathBuf, String>) -> Self {
        Self {
            stored,
            pending: BTreeMap::new(),
        }
    }

    /// Existing candidates whose content differs from the stored hash.
    pub fn changed_files(&mut self, candidates: &[PathBuf]) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        for path in candidates {
            if !path.is_file() {
                continue;
            }
            let hash = match hash_file(path) {
                Ok(hash) => hash,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Unable to hash file");
                    continue;
                }
            };
            if self.stored.get(path) == Some(&hash) {
                debug!(path = %path.display(), "File not changed");
            } else {
                changed.push(path.clone());
            }
            self.pending.insert(path.clone(), hash);
        }
        changed
    }

    /// Adopt the hashes computed by the last [`ChangeTracker::changed_files`] call.
    pub fn commit(&mut self) {
        self.stored.extend(std::mem::take(&mut self.pending));
    }

    /// Forget hashes of files that no longer exist.
    pub fn forget_missing(&mut self) {
        self.stored.retain(|path, _| path.exists());
    }

    pub fn stored(&self) -> &BTreeMap<PathBuf, String> {
        &self.stored
    }

    pub fn into_stored(self) -> BTreeMap<PathBuf, String> {
        self.stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn identical_content_is_not_changed_after_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t001.html");
        fs::write(&path, "<html></html>").unwrap();
        let candidates = vec![path.clone(), dir.path().join("missing.txt")];

        let mut tracker = ChangeTracker::default();
        assert_eq!(tracker.changed_files(&candidates), vec![path.clone()]);
        tracker.commit();

        fs::write(&path, "<html></html>").unwrap();
        assert!(tracker.changed_files(&candidates).is_empty());

        fs::write(&path, "<html><head></head></html>").unwrap();
        assert_eq!(tracker.changed_files(&candidates), vec![path]);
    }

    #[test]
    fn uncommitted_hashes_are_not_stored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        let mut tracker = ChangeTracker::default();
        tracker.changed_files(std::slice::from_ref(&path));
        assert!(tracker.stored().is_empty());
        assert_eq!(tracker.changed_files(std::slice::from_ref(&path)), vec![path]);
    }

    #[test]
    fn hash_is_url_safe_base64_sha256() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
        );
    }
}
