//! Where every published and derived file lives, relative to the tournament prefix.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::BiddingError;
use crate::model::PairNumbers;

pub const BUNDLE_DIR_NAME: &str = "bidding-data";

/// Paths derived from `<prefix>.html`, the tournament page given on the command line.
#[derive(Debug, Clone)]
pub struct TournamentLayout {
    directory: PathBuf,
    basename: String,
    page_pattern: Regex,
}

impl TournamentLayout {
    pub fn from_page_path(page: &Path) -> Result<Self, BiddingError> {
        let resolved = fs::canonicalize(page).unwrap_or_else(|_| page.to_path_buf());
        let basename = resolved
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| BiddingError::InvalidPrefix(page.to_path_buf()))?
            .to_string();
        let directory = match resolved.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            Some(_) => PathBuf::from("."),
            None => return Err(BiddingError::InvalidPrefix(page.to_path_buf())),
        };
        let page_pattern = Regex::new(&format!(r"^{}(\d{{3}})\.html$", regex::escape(&basename)))
            .map_err(|err| BiddingError::message(format!("page pattern: {err}")))?;
        Ok(Self {
            directory,
            basename,
            page_pattern,
        })
    }

    /// Directory holding the published pages.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Prefix path without extension.
    pub fn prefix(&self) -> PathBuf {
        self.directory.join(&self.basename)
    }

    /// Board number of a published page file name, `None` for any other file.
    pub fn page_number(&self, file_name: &str) -> Option<u32> {
        self.page_pattern
            .captures(file_name)
            .and_then(|captures| captures[1].parse().ok())
    }

    pub fn page_path(&self, number: u32) -> PathBuf {
        self.directory
            .join(format!("{}{:03}.html", self.basename, number))
    }

    /// Traveller listing accompanying a page.
    pub fn listing_path(&self, number: u32) -> PathBuf {
        self.directory.join(format!("{}{:03}.txt", self.basename, number))
    }

    pub fn fragment_prefix(&self, number: u32) -> String {
        format!("{}_bidding_{:03}_", self.basename, number)
    }

    pub fn fragment_path(&self, number: u32, pairs: PairNumbers) -> PathBuf {
        self.directory
            .join(format!("{}{}.txt", self.fragment_prefix(number), pairs))
    }

    pub fn bundle_directory(&self) -> PathBuf {
        self.directory.join(BUNDLE_DIR_NAME)
    }

    pub fn bundle_path(&self, number: u32) -> PathBuf {
        self.bundle_directory()
            .join(format!("{}_bidding_{:03}.json", self.basename, number))
    }

    /// Bundle reference as written into a page: relative, `/`-separated.
    pub fn bundle_href(&self, number: u32) -> String {
        format!(
            "{}/{}_bidding_{:03}.json",
            BUNDLE_DIR_NAME, self.basename, number
        )
    }

    pub fn state_path(&self) -> PathBuf {
        self.directory
            .join(format!(".{}_bidding_state.json", self.basename))
    }

    pub fn scripts_directory(&self) -> PathBuf {
        self.directory.join("javas")
    }

    /// Working directory announced to the push receiver, with a trailing separator.
    pub fn working_directory(&self) -> String {
        let mut directory = self.directory.display().to_string();
        if !directory.ends_with(std::path::MAIN_SEPARATOR) {
            directory.push(std::path::MAIN_SEPARATOR);
        }
        directory
    }
}

/// Pair key of a fragment file name (`…_bidding_NNN_a_b.txt` → `a_b`).
pub fn fragment_pair_key(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.rsplitn(3, '_');
    let high = parts.next()?;
    let low = parts.next()?;
    Some(format!("{low}_{high}"))
}
