use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::BiddingError;
use crate::layout::TournamentLayout;
use crate::model::{BoardKey, RangeDeclaration};

/// Published pages found next to the tournament page, keyed by board number.
pub fn discover_pages(layout: &TournamentLayout) -> Result<BTreeMap<u32, PathBuf>, BiddingError> {
    let mut pages = BTreeMap::new();
    for entry in fs::read_dir(layout.directory())? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some(number) = layout.page_number(&name) {
            if entry.path().is_file() {
                pages.insert(number, entry.path());
            }
        }
    }
    debug!(pages = pages.len(), directory = %layout.directory().display(), "Found board pages");
    Ok(pages)
}

/// Internal board → published board number, `None` once pruned.
#[derive(Debug, Clone, Default)]
pub struct BoardNumberMapping {
    entries: BTreeMap<BoardKey, Option<u32>>,
}

impl BoardNumberMapping {
    pub fn build(declarations: &[RangeDeclaration]) -> Self {
        let mut entries = BTreeMap::new();
        for declaration in declarations {
            let span = declaration
                .internal_end
                .saturating_sub(declaration.internal_start);
            if declaration.external_start.checked_add(span).is_none() {
                warn!(
                    round = declaration.round,
                    table = %declaration.table,
                    external_start = declaration.external_start,
                    "Board numbers out of range, ignoring declaration"
                );
                continue;
            }
            for internal in declaration.internal_start..=declaration.internal_end {
                let key = BoardKey {
                    board: internal,
                    round: declaration.round,
                    table: declaration.table.clone(),
                };
                let external = declaration.external_start + (internal - declaration.internal_start);
                debug!(board = %key, external, "Mapped board");
                entries.insert(key, Some(external));
            }
        }
        Self { entries }
    }

    /// Drop every mapping whose published number has no page.
    pub fn prune_to_pages(&mut self, pages: &BTreeMap<u32, PathBuf>) {
        for (key, external) in self.entries.iter_mut() {
            if let Some(number) = *external {
                if !pages.contains_key(&number) {
                    debug!(board = %key, external = number, "Board page not found, ignoring");
                    *external = None;
                }
            }
        }
    }

    pub fn contains(&self, key: &BoardKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn external_number(&self, key: &BoardKey) -> Option<u32> {
        self.entries.get(key).copied().flatten()
    }

    pub fn live_numbers(&self) -> BTreeSet<u32> {
        self.entries.values().filter_map(|number| *number).collect()
    }

    /// Pages referenced by at least one live mapping, ascending.
    pub fn live_pages(&self, pages: &BTreeMap<u32, PathBuf>) -> Vec<(u32, PathBuf)> {
        let live = self.live_numbers();
        pages
            .iter()
            .filter(|(number, _)| live.contains(number))
            .map(|(number, path)| (*number, path.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
