use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BiddingError;
use crate::output::write_atomic;

pub const STATE_VERSION: u32 = 1;

/// What survives between runs: the fragments and bundles we own and the last pushed hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub generated_files: BTreeSet<PathBuf>,
    /// Per-page JSON bundles written by earlier runs.
    #[serde(default)]
    pub bundles: BTreeSet<PathBuf>,
    #[serde(default)]
    pub file_hashes: BTreeMap<PathBuf, String>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl RunState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, BiddingError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No run state yet");
                return Ok(Self::new());
            }
            Err(err) => return Err(err.into()),
        };
        let state: RunState = serde_json::from_str(&contents)?;
        if state.version != STATE_VERSION {
            return Err(BiddingError::message(format!(
                "unsupported run state version {} in {}",
                state.version,
                path.display()
            )));
        }
        debug!(
            path = %path.display(),
            generated = state.generated_files.len(),
            bundles = state.bundles.len(),
            hashes = state.file_hashes.len(),
            "Loaded run state"
        );
        Ok(state)
    }

    /// Like [`RunState::load`], but an unreadable state starts over.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "Ignoring unreadable run state");
            Self::new()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), BiddingError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())?;
        debug!(path = %path.display(), "Saved run state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_state_starts_empty() {
        let dir = tempdir().unwrap();
        let state = RunState::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state, RunState::new());
    }

    #[test]
    fn state_survives_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = RunState::new();
        state.generated_files.insert(dir.path().join("t_bidding_001_1_2.txt"));
        state
            .bundles
            .insert(dir.path().join("bidding-data").join("t_bidding_001.json"));
        state
            .file_hashes
            .insert(dir.path().join("t001.html"), "abc".to_string());
        state.save(&path).unwrap();
        assert_eq!(RunState::load(&path).unwrap(), state);
    }

    #[test]
    fn corrupt_state_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(RunState::load(&path).is_err());
        assert_eq!(RunState::load_or_default(&path), RunState::new());
    }
}
