//! Just enough of an HTML document model for result pages and traveller listings.
//!
//! Listings are parsed into rows and cells that keep their byte spans in the
//! original text, so a rewrite only touches the cells that were replaced.
//! Pages are edited at the tag level inside `<head>`. Every insertion is a
//! newline followed by the tag, and every removal swallows that newline
//! again, so applying the same edit twice leaves the document unchanged.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::BiddingError;
use crate::model::PairNumbers;

pub const JQUERY_SRC: &str = "javas/jquery.js";
pub const BIDDING_SCRIPT_SRC: &str = "javas/bidding.js";
pub const BIDDING_STYLESHEET_HREF: &str = "css/bidding.css";

fn row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap())
}

fn cell_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td\s*>").unwrap())
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<[^>]*>").unwrap())
}

fn bidding_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?is)<a\b[^>]*\bclass\s*=\s*["'][^"']*\bbiddingLink\b[^"']*["'][^>]*>.*?</a\s*>"#,
        )
        .unwrap()
    })
}

fn head_close_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)</head\s*>").unwrap())
}

fn script_pattern(src: &str) -> Regex {
    Regex::new(&format!(
        r#"(?is)\n?[ \t]*<script\b[^>]*\bsrc\s*=\s*["']{}["'][^>]*>\s*</script\s*>"#,
        regex::escape(src)
    ))
    .unwrap()
}

fn stylesheet_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r#"(?is)<link\b[^>]*\bhref\s*=\s*["']{}["'][^>]*>"#,
            regex::escape(BIDDING_STYLESHEET_HREF)
        ))
        .unwrap()
    })
}

fn bidding_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?is)\n?[ \t]*<link\b[^>]*\brel\s*=\s*["']bidding-file["'][^>]*>"#).unwrap()
    })
}

/// Markup of the link a traveller row gets for a pair's auction.
pub fn bidding_link_html(pairs: PairNumbers) -> String {
    format!(r##"<a class="biddingLink" href="#" data-bidding-link="{pairs}"> </a>"##)
}

/// Remove every `a.biddingLink` from a cell's markup.
pub fn strip_bidding_links(inner: &str) -> String {
    bidding_link_pattern().replace_all(inner, "").into_owned()
}

pub fn has_bidding_link(inner: &str) -> bool {
    bidding_link_pattern().is_match(inner)
}

/// Visible text of a markup fragment.
pub fn text_content(markup: &str) -> String {
    let stripped = tag_pattern().replace_all(markup, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .trim()
        .to_string()
}

#[derive(Debug, Clone)]
pub struct ListingRow {
    cells: Vec<Range<usize>>,
}

impl ListingRow {
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// A traveller listing: the score table of one board.
#[derive(Debug, Clone)]
pub struct ListingDocument {
    source: String,
    rows: Vec<ListingRow>,
    replacements: BTreeMap<usize, (Range<usize>, String)>,
}

impl ListingDocument {
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut rows = Vec::new();
        for row in row_pattern().captures_iter(&source) {
            let Some(body) = row.get(1) else { continue };
            let cells = cell_pattern()
                .captures_iter(body.as_str())
                .filter_map(|cell| cell.get(1))
                .map(|inner| body.start() + inner.start()..body.start() + inner.end())
                .collect();
            rows.push(ListingRow { cells });
        }
        Self {
            source,
            rows,
            replacements: BTreeMap::new(),
        }
    }

    pub fn rows(&self) -> &[ListingRow] {
        &self.rows
    }

    /// Current markup inside a cell, including earlier replacements.
    pub fn cell_inner(&self, row: usize, cell: usize) -> Option<&str> {
        let span = self.rows.get(row)?.cells.get(cell)?;
        match self.replacements.get(&span.start) {
            Some((_, replaced)) => Some(replaced.as_str()),
            None => self.source.get(span.clone()),
        }
    }

    pub fn cell_text(&self, row: usize, cell: usize) -> Option<String> {
        self.cell_inner(row, cell).map(text_content)
    }

    pub fn replace_cell_inner(&mut self, row: usize, cell: usize, inner: String) {
        let Some(span) = self.rows.get(row).and_then(|row| row.cells.get(cell)).cloned() else {
            return;
        };
        self.replacements.insert(span.start, (span, inner));
    }

    pub fn render(&self) -> String {
        let mut output = String::with_capacity(self.source.len() + self.replacements.len() * 64);
        let mut cursor = 0;
        for (span, inner) in self.replacements.values() {
            output.push_str(&self.source[cursor..span.start]);
            output.push_str(inner);
            cursor = span.end;
        }
        output.push_str(&self.source[cursor..]);
        output
    }
}

/// A published board page; only its head section is edited.
#[derive(Debug, Clone)]
pub struct PageDocument {
    html: String,
}

impl PageDocument {
    pub fn parse(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn render(&self) -> String {
        self.html.clone()
    }

    pub fn into_html(self) -> String {
        self.html
    }

    pub fn has_bidding_script(&self) -> bool {
        script_pattern(BIDDING_SCRIPT_SRC).is_match(&self.html)
    }

    /// jQuery present, exactly one bidding script right after it, bidding stylesheet present.
    pub fn ensure_bidding_scripts(&mut self) -> Result<(), BiddingError> {
        let jquery = script_pattern(JQUERY_SRC);
        if !jquery.is_match(&self.html) {
            self.insert_before_head_close(&script_tag(JQUERY_SRC))?;
        }

        self.html = script_pattern(BIDDING_SCRIPT_SRC)
            .replace_all(&self.html, "")
            .into_owned();
        let jquery_end = jquery
            .find(&self.html)
            .map(|found| found.end())
            .ok_or_else(|| BiddingError::message("jQuery script missing after insertion"))?;
        self.html
            .insert_str(jquery_end, &format!("\n{}", script_tag(BIDDING_SCRIPT_SRC)));

        if !stylesheet_pattern().is_match(&self.html) {
            self.insert_before_head_close(&format!(
                r#"<link rel="stylesheet" href="{BIDDING_STYLESHEET_HREF}"/>"#
            ))?;
        }
        Ok(())
    }

    /// Point the page at its bundle: old `link[rel=bidding-file]` tags go, one new
    /// tag follows the bidding script.
    pub fn set_bidding_file(&mut self, href: &str) -> Result<(), BiddingError> {
        let without_links = bidding_file_pattern().replace_all(&self.html, "").into_owned();
        let script_end = script_pattern(BIDDING_SCRIPT_SRC)
            .find(&without_links)
            .map(|found| found.end())
            .ok_or_else(|| BiddingError::message("page lacks the bidding script"))?;
        let mut html = without_links;
        html.insert_str(
            script_end,
            &format!("\n<link rel=\"bidding-file\" src=\"{href}\"/>"),
        );
        self.html = html;
        Ok(())
    }

    /// Drop every `link[rel=bidding-file]`; returns whether any was present.
    pub fn clear_bidding_file(&mut self) -> bool {
        if !bidding_file_pattern().is_match(&self.html) {
            return false;
        }
        self.html = bidding_file_pattern().replace_all(&self.html, "").into_owned();
        true
    }

    fn insert_before_head_close(&mut self, tag: &str) -> Result<(), BiddingError> {
        let position = head_close_pattern()
            .find(&self.html)
            .map(|found| found.start())
            .ok_or_else(|| BiddingError::message("page has no </head>"))?;
        self.html.insert_str(position, &format!("\n{tag}"));
        Ok(())
    }
}

fn script_tag(src: &str) -> String {
    format!(r#"<script src="{src}" type="text/javascript"></script>"#)
}
