//! Output file lifecycle: per-pair fragments, page scripts, listing links,
//! garbage collection of stale fragments and per-page bundles.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::auction::CompiledAuctions;
use crate::error::BiddingError;
use crate::layout::{TournamentLayout, fragment_pair_key};
use crate::lineup::LineupIndex;
use crate::mapping::BoardNumberMapping;
use crate::markup::{
    ListingDocument, PageDocument, bidding_link_html, has_bidding_link, strip_bidding_links,
};
use crate::model::PairNumbers;
use crate::state::RunState;
use crate::table::BiddingTable;

pub const BIDDING_SCRIPT_ASSET: &str = include_str!("../assets/bidding.js");

/// Score rows of a traveller listing have exactly this many cells.
const SCORE_ROW_CELLS: usize = 11;
const PAIR_CELLS: (usize, usize) = (1, 2);
const CONTRACT_CELL: usize = 3;

/// Replace `path` with `contents` through a temp file in the same directory.
///
/// Returns `false` without touching the file when it already holds `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == contents => return Ok(false),
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(directory)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(true)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub written: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptsReport {
    pub pages_updated: usize,
    pub pages_skipped: usize,
    pub script_installed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub links: usize,
    pub missing: usize,
    pub listings_updated: usize,
    /// Listings that were read, whether rewritten or not.
    pub listings: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressReport {
    pub bundles: Vec<PathBuf>,
    pub fragments_merged: usize,
    pub pages_linked: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleCleanup {
    pub deleted: Vec<PathBuf>,
    /// Pages whose `bidding-file` link was removed.
    pub pages_unlinked: Vec<PathBuf>,
}

/// Tracks which fragments this run produced and which ones the listings point at.
#[derive(Debug)]
pub struct OutputManager<'a> {
    layout: &'a TournamentLayout,
    generated: BTreeSet<PathBuf>,
    used: BTreeSet<PathBuf>,
}

impl<'a> OutputManager<'a> {
    pub fn new(layout: &'a TournamentLayout) -> Self {
        Self {
            layout,
            generated: BTreeSet::new(),
            used: BTreeSet::new(),
        }
    }

    pub fn generated(&self) -> &BTreeSet<PathBuf> {
        &self.generated
    }

    pub fn used(&self) -> &BTreeSet<PathBuf> {
        &self.used
    }

    /// Write one fragment per mapped board with a known lineup.
    pub fn generate(
        &mut self,
        auctions: &CompiledAuctions,
        lineup: &LineupIndex,
        mapping: &BoardNumberMapping,
    ) -> GenerateReport {
        let mut report = GenerateReport::default();
        for (key, sequence) in auctions.iter() {
            if !mapping.contains(key) {
                info!(board = %key, "Mapping for board not found");
                report.skipped += 1;
                continue;
            }
            let Some(external) = mapping.external_number(key) else {
                debug!(board = %key, "Board has no published page");
                report.skipped += 1;
                continue;
            };
            if !lineup.has_round(key.round) {
                info!(board = %key, round = key.round, "Lineup for round not found");
                report.skipped += 1;
                continue;
            }
            let Some(pairs) = lineup.pairs(key.round, &key.table) else {
                info!(board = %key, table = %key.table, round = key.round, "Lineup for table not found");
                report.skipped += 1;
                continue;
            };
            let Some(table) = BiddingTable::from_sequence(sequence) else {
                report.skipped += 1;
                continue;
            };

            let path = self.layout.fragment_path(external, pairs);
            match write_atomic(&path, table.render_html().as_bytes()) {
                Ok(true) => {
                    info!(board = %key, path = %path.display(), rows = table.rows.len(), "Written bidding table");
                    report.written += 1;
                }
                Ok(false) => {
                    debug!(board = %key, path = %path.display(), "Bidding table unchanged");
                    report.unchanged += 1;
                }
                Err(err) => {
                    error!(board = %key, path = %path.display(), error = %err, "Unable to write bidding table");
                    report.failed += 1;
                    continue;
                }
            }
            self.generated.insert(path);
        }
        report
    }

    /// Make every live page load jQuery, the bidding script and its stylesheet.
    pub fn install_scripts(&self, pages: &[(u32, PathBuf)]) -> ScriptsReport {
        let mut report = ScriptsReport::default();
        if !pages.is_empty() {
            report.script_installed = self.install_script_asset();
        }
        for (number, page) in pages {
            let html = match fs::read_to_string(page) {
                Ok(html) => html,
                Err(err) => {
                    error!(page = %page.display(), error = %err, "Unable to read board page");
                    report.pages_skipped += 1;
                    continue;
                }
            };
            let mut document = PageDocument::parse(html);
            if let Err(err) = document.ensure_bidding_scripts() {
                warn!(page = %page.display(), board = number, error = %err, "Unable to add bidding scripts");
                report.pages_skipped += 1;
                continue;
            }
            match write_atomic(page, document.render().as_bytes()) {
                Ok(true) => {
                    info!(page = %page.display(), "Written scripts into board page");
                    report.pages_updated += 1;
                }
                Ok(false) => debug!(page = %page.display(), "Board page scripts unchanged"),
                Err(err) => {
                    error!(page = %page.display(), error = %err, "Unable to write board page");
                    report.pages_skipped += 1;
                }
            }
        }
        report
    }

    fn install_script_asset(&self) -> bool {
        let target = self.layout.scripts_directory().join("bidding.js");
        if target.exists() {
            return false;
        }
        let result = fs::create_dir_all(self.layout.scripts_directory())
            .and_then(|_| write_atomic(&target, BIDDING_SCRIPT_ASSET.as_bytes()));
        match result {
            Ok(_) => {
                info!(path = %target.display(), "Installed bidding script");
                true
            }
            Err(err) => {
                error!(path = %target.display(), error = %err, "Unable to install bidding script");
                false
            }
        }
    }

    /// Point every score row of every live listing at its pair's fragment.
    pub fn link(&mut self, pages: &[(u32, PathBuf)]) -> LinkReport {
        let mut report = LinkReport::default();
        for (number, _) in pages {
            let listing_path = self.layout.listing_path(*number);
            if !listing_path.is_file() {
                debug!(listing = %listing_path.display(), "Traveller listing not found");
                continue;
            }
            let source = match fs::read_to_string(&listing_path) {
                Ok(source) => source,
                Err(err) => {
                    error!(listing = %listing_path.display(), error = %err, "Unable to read traveller listing");
                    continue;
                }
            };
            info!(board = number, listing = %listing_path.display(), "Writing traveller links");
            let mut document = ListingDocument::parse(source);
            self.link_listing(*number, &mut document, &mut report);

            match write_atomic(&listing_path, document.render().as_bytes()) {
                Ok(true) => report.listings_updated += 1,
                Ok(false) => debug!(listing = %listing_path.display(), "Traveller listing unchanged"),
                Err(err) => {
                    error!(listing = %listing_path.display(), error = %err, "Unable to write traveller listing");
                    continue;
                }
            }
            report.listings.push(listing_path);
        }
        report
    }

    fn link_listing(&mut self, number: u32, document: &mut ListingDocument, report: &mut LinkReport) {
        for row in 0..document.rows().len() {
            if document.rows()[row].cell_count() != SCORE_ROW_CELLS {
                continue;
            }
            let pairs = match (
                parse_pair(document.cell_text(row, PAIR_CELLS.0)),
                parse_pair(document.cell_text(row, PAIR_CELLS.1)),
            ) {
                (Some(first), Some(second)) => PairNumbers::new(first, second),
                _ => {
                    debug!(board = number, row, "Invalid pair numbers, skipping row");
                    continue;
                }
            };
            let Some(contract) = document.cell_inner(row, CONTRACT_CELL).map(str::to_string) else {
                continue;
            };

            let fragment = self.layout.fragment_path(number, pairs);
            if self.generated.contains(&fragment) && fragment.is_file() {
                let linked = format!("{}{}", strip_bidding_links(&contract), bidding_link_html(pairs));
                document.replace_cell_inner(row, CONTRACT_CELL, linked);
                debug!(board = number, pairs = %pairs, "Linked bidding table");
                self.used.insert(fragment);
                report.links += 1;
            } else {
                warn!(board = number, pairs = %pairs, path = %fragment.display(), "Bidding table for pairs not found");
                report.missing += 1;
                if has_bidding_link(&contract) {
                    document.replace_cell_inner(row, CONTRACT_CELL, strip_bidding_links(&contract));
                }
            }
        }
    }

    /// Register this run's fragments and delete registered ones nothing links to.
    pub fn reconcile(&self, state: &mut RunState) -> Vec<PathBuf> {
        reconcile_registry(&mut state.generated_files, &self.generated, &self.used)
    }
}

fn parse_pair(text: Option<String>) -> Option<u32> {
    text?.trim().parse().ok()
}

/// `registry ∪= generated`, then drop and delete everything not `used`.
pub fn reconcile_registry(
    registry: &mut BTreeSet<PathBuf>,
    generated: &BTreeSet<PathBuf>,
    used: &BTreeSet<PathBuf>,
) -> Vec<PathBuf> {
    registry.extend(generated.iter().cloned());
    let stale: Vec<PathBuf> = registry.difference(used).cloned().collect();
    let mut deleted = Vec::new();
    for path in stale {
        registry.remove(&path);
        match fs::remove_file(&path) {
            Ok(()) => {
                warn!(path = %path.display(), "Bidding file not used, deleted");
                deleted.push(path);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Unused bidding file already gone");
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "Unable to delete unused bidding file");
            }
        }
    }
    deleted
}

/// Merge each page's registered fragments into one JSON bundle the page links to.
pub fn compress(
    layout: &TournamentLayout,
    pages: &[(u32, PathBuf)],
    state: &mut RunState,
) -> CompressReport {
    let mut report = CompressReport::default();
    let bundle_directory = layout.bundle_directory();
    if let Err(err) = fs::create_dir_all(&bundle_directory) {
        error!(directory = %bundle_directory.display(), error = %err, "Unable to create directory for bidding data");
        return report;
    }

    for (number, page) in pages {
        let prefix = layout.fragment_prefix(*number);
        let fragments: Vec<PathBuf> = state
            .generated_files
            .iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
                    && path.is_file()
            })
            .cloned()
            .collect();

        let bundle_path = layout.bundle_path(*number);
        match write_bundle(&bundle_path, &fragments) {
            Ok(written) => {
                debug!(bundle = %bundle_path.display(), fragments = fragments.len(), written, "Compressed bidding files");
                state.bundles.insert(bundle_path.clone());
            }
            Err(err) => {
                error!(bundle = %bundle_path.display(), error = %err, "Unable to write bidding bundle");
                continue;
            }
        }

        for fragment in &fragments {
            if let Err(err) = fs::remove_file(fragment) {
                error!(path = %fragment.display(), error = %err, "Unable to remove compressed bidding file");
                continue;
            }
            state.generated_files.remove(fragment);
            report.fragments_merged += 1;
        }
        report.bundles.push(bundle_path);

        if link_bundle(layout, *number, page) {
            report.pages_linked += 1;
        }
    }
    info!(
        bundles = report.bundles.len(),
        fragments = report.fragments_merged,
        "Compressed bidding files"
    );
    report
}

/// Delete registered bundles this run did not write and unlink every page
/// that still points at a bundle it no longer has.
pub fn reconcile_bundles(
    layout: &TournamentLayout,
    pages: &BTreeMap<u32, PathBuf>,
    written: &[PathBuf],
    state: &mut RunState,
) -> BundleCleanup {
    let mut cleanup = BundleCleanup::default();
    let written: BTreeSet<&PathBuf> = written.iter().collect();

    let stale: Vec<PathBuf> = state
        .bundles
        .iter()
        .filter(|path| !written.contains(path))
        .cloned()
        .collect();
    for path in stale {
        match fs::remove_file(&path) {
            Ok(()) => {
                warn!(path = %path.display(), "Bidding bundle not rewritten, deleted");
                cleanup.deleted.push(path.clone());
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Stale bidding bundle already gone");
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "Unable to delete stale bidding bundle");
                continue;
            }
        }
        state.bundles.remove(&path);
    }

    for (number, page) in pages {
        if written.contains(&layout.bundle_path(*number)) {
            continue;
        }
        let html = match fs::read_to_string(page) {
            Ok(html) => html,
            Err(err) => {
                error!(page = %page.display(), error = %err, "Unable to read board page");
                continue;
            }
        };
        let mut document = PageDocument::parse(html);
        if !document.clear_bidding_file() {
            continue;
        }
        match write_atomic(page, document.render().as_bytes()) {
            Ok(_) => {
                info!(page = %page.display(), "Removed bidding bundle link from board page");
                cleanup.pages_unlinked.push(page.clone());
            }
            Err(err) => error!(page = %page.display(), error = %err, "Unable to write board page"),
        }
    }
    cleanup
}

fn write_bundle(path: &Path, fragments: &[PathBuf]) -> Result<bool, BiddingError> {
    let mut bundle = BTreeMap::new();
    for fragment in fragments {
        let Some(key) = fragment_pair_key(fragment) else {
            continue;
        };
        bundle.insert(key, fs::read_to_string(fragment)?);
    }
    let json = serde_json::to_string(&bundle)?;
    Ok(write_atomic(path, json.as_bytes())?)
}

fn link_bundle(layout: &TournamentLayout, number: u32, page: &Path) -> bool {
    let html = match fs::read_to_string(page) {
        Ok(html) => html,
        Err(err) => {
            error!(page = %page.display(), error = %err, "Unable to read board page");
            return false;
        }
    };
    let mut document = PageDocument::parse(html);
    if let Err(err) = document.set_bidding_file(&layout.bundle_href(number)) {
        warn!(page = %page.display(), error = %err, "Board page lacks bidding script, skipping");
        return false;
    }
    match write_atomic(page, document.render().as_bytes()) {
        Ok(_) => true,
        Err(err) => {
            error!(page = %page.display(), error = %err, "Unable to write board page");
            false
        }
    }
}
