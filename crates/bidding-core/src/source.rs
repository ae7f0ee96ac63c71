//! Loading the tournament export: seating, call log and board retractions.
//!
//! The scoring database itself is not read here. [`CsvExportSource`] reads the
//! `RoundData`, `BiddingData` and `ReceivedData` tables exported as CSV files
//! (header row with the database column names). Any other backend can plug in
//! through [`TournamentSource`].

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::error::BiddingError;
use crate::model::{BoardRetraction, CallEntry, Direction, LineupRow};

pub const ROUND_DATA_FILE: &str = "RoundData.csv";
pub const BIDDING_DATA_FILE: &str = "BiddingData.csv";
pub const RECEIVED_DATA_FILE: &str = "ReceivedData.csv";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

/// Restricts what is read from the export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    /// Only this section; `None` reads every section.
    pub section: Option<String>,
    /// Ignore rounds above this number; `None` reads every round.
    pub max_round: Option<u32>,
}

impl SourceFilter {
    fn accepts(&self, section: &str, round: u32) -> bool {
        if let Some(wanted) = self.section.as_deref() {
            if section.trim() != wanted.trim() {
                return false;
            }
        }
        match self.max_round {
            Some(max_round) => round <= max_round,
            None => true,
        }
    }
}

/// Everything one run needs from the tournament database.
#[derive(Debug, Clone, Default)]
pub struct TournamentData {
    pub lineup: Vec<LineupRow>,
    /// Call log in log order.
    pub calls: Vec<CallEntry>,
    pub retractions: Vec<BoardRetraction>,
}

pub trait TournamentSource {
    /// Human-readable origin, used in log messages.
    fn describe(&self) -> String;

    /// Load the filtered snapshot. Any error here is fatal for the run.
    fn load(&self, filter: &SourceFilter) -> Result<TournamentData, BiddingError>;
}

/// Directory holding the CSV export of the scoring database tables.
#[derive(Debug, Clone)]
pub struct CsvExportSource {
    directory: PathBuf,
}

impl CsvExportSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn reader(&self, file_name: &str) -> Result<csv::Reader<File>, BiddingError> {
        let path = self.directory.join(file_name);
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&path)
            .map_err(|err| BiddingError::source_unavailable(path, err))
    }
}

#[derive(Debug, Deserialize)]
struct RoundDataRecord {
    #[serde(rename = "Section")]
    section: String,
    #[serde(rename = "Table")]
    table: String,
    #[serde(rename = "Round", default, deserialize_with = "csv::invalid_option")]
    round: Option<u32>,
    #[serde(rename = "NSPair")]
    ns_pair: u32,
    #[serde(rename = "EWPair")]
    ew_pair: u32,
    #[serde(rename = "LowBoard", default, deserialize_with = "csv::invalid_option")]
    low_board: Option<u32>,
    #[serde(rename = "HighBoard", default, deserialize_with = "csv::invalid_option")]
    high_board: Option<u32>,
    #[serde(
        rename = "CustomBoardNumber",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    custom_board_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BiddingDataRecord {
    #[serde(rename = "Section")]
    section: String,
    #[serde(rename = "Table")]
    table: String,
    #[serde(rename = "Round")]
    round: u32,
    #[serde(rename = "Board")]
    board: u32,
    #[serde(rename = "Counter")]
    counter: u32,
    #[serde(rename = "Direction")]
    direction: String,
    #[serde(rename = "Bid")]
    bid: String,
    #[serde(rename = "DateLog")]
    date_log: String,
    #[serde(rename = "TimeLog")]
    time_log: String,
    #[serde(rename = "Erased", default, deserialize_with = "deserialize_flag")]
    erased: bool,
}

#[derive(Debug, Deserialize)]
struct ReceivedDataRecord {
    #[serde(rename = "Section")]
    section: String,
    #[serde(rename = "Table")]
    table: String,
    #[serde(rename = "Round")]
    round: u32,
    #[serde(rename = "Board")]
    board: u32,
    #[serde(rename = "DateLog")]
    date_log: String,
    #[serde(rename = "TimeLog")]
    time_log: String,
    #[serde(rename = "Erased", default, deserialize_with = "deserialize_flag")]
    erased: bool,
}

impl TournamentSource for CsvExportSource {
    fn describe(&self) -> String {
        self.directory.display().to_string()
    }

    fn load(&self, filter: &SourceFilter) -> Result<TournamentData, BiddingError> {
        if !self.directory.is_dir() {
            return Err(BiddingError::source_unavailable(
                &self.directory,
                "export directory does not exist",
            ));
        }

        let mut lineup = Vec::new();
        for record in self.reader(ROUND_DATA_FILE)?.deserialize() {
            let record: RoundDataRecord = record?;
            let round = record.round.unwrap_or(0);
            if !filter.accepts(&record.section, round) {
                continue;
            }
            lineup.push(LineupRow {
                sector: record.section,
                table: record.table,
                round,
                ns_pair: record.ns_pair,
                ew_pair: record.ew_pair,
                low_board: record.low_board,
                high_board: record.high_board,
                custom_board_number: record.custom_board_number,
            });
        }
        debug!(entries = lineup.len(), "Parsed lineup data");

        let mut calls = Vec::new();
        for record in self.reader(BIDDING_DATA_FILE)?.deserialize() {
            let record: BiddingDataRecord = record?;
            if !filter.accepts(&record.section, record.round) {
                continue;
            }
            let direction = record.direction.parse::<Direction>().map_err(|err| {
                BiddingError::source_unavailable(
                    self.directory.join(BIDDING_DATA_FILE),
                    format!(
                        "call {} of board {} (round {}, section {}, table {}): {err}",
                        record.counter, record.board, record.round, record.section, record.table
                    ),
                )
            })?;
            calls.push(CallEntry {
                inserted_at: merge_timestamps(&record.date_log, &record.time_log)?,
                sector: record.section,
                table: record.table,
                round: record.round,
                board: record.board,
                sequence: record.counter,
                direction,
                call: record.bid,
                erased: record.erased,
            });
        }
        debug!(entries = calls.len(), "Parsed bidding data");

        let mut retractions = Vec::new();
        for record in self.reader(RECEIVED_DATA_FILE)?.deserialize() {
            let record: ReceivedDataRecord = record?;
            if !record.erased || !filter.accepts(&record.section, record.round) {
                continue;
            }
            retractions.push(BoardRetraction {
                retracted_at: merge_timestamps(&record.date_log, &record.time_log)?,
                sector: record.section,
                table: record.table,
                round: record.round,
                board: record.board,
            });
        }
        debug!(entries = retractions.len(), "Parsed erased boards");

        info!(
            source = %self.describe(),
            lineup = lineup.len(),
            calls = calls.len(),
            retractions = retractions.len(),
            "Loaded tournament export"
        );

        Ok(TournamentData {
            lineup,
            calls,
            retractions,
        })
    }
}

/// Combine the date part of `date_stamp` with the time part of `time_stamp`.
///
/// The database stores both as full timestamps (`2017-03-04 00:00:00`,
/// `1899-12-30 14:23:11`); a bare date or a bare time is accepted as well.
pub fn merge_timestamps(date_stamp: &str, time_stamp: &str) -> Result<NaiveDateTime, BiddingError> {
    let invalid = || BiddingError::Timestamp {
        date: date_stamp.to_string(),
        time: time_stamp.to_string(),
    };

    let date_part = date_stamp
        .split(|ch: char| ch == ' ' || ch == 'T')
        .find(|part| !part.is_empty())
        .ok_or_else(invalid)?;
    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .ok_or_else(invalid)?;

    let time_part = time_stamp
        .split(|ch: char| ch == ' ' || ch == 'T')
        .filter(|part| part.contains(':'))
        .last()
        .ok_or_else(invalid)?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(time_part, format).ok())
        .ok_or_else(invalid)?;

    Ok(date.and_time(time))
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "-1" | "true" | "yes" => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "invalid boolean flag '{other}'"
        ))),
    }
}
