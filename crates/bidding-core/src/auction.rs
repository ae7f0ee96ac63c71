//! Replays the raw call log into one authoritative call sequence per board.
//!
//! The log is append-only: corrections arrive as erasures of an earlier
//! sequence number, and a board that was scored again arrives as a retraction
//! voiding everything recorded for it up to a timestamp. The replay is a fold
//! over the log ordered by insertion time (ties keep log order).

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::model::{BoardKey, BoardRetraction, CallEntry, Direction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionCall {
    pub direction: Direction,
    pub call: String,
}

/// Sequence number → call, ascending order is chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuctionSequence {
    calls: BTreeMap<u32, AuctionCall>,
}

impl AuctionSequence {
    pub fn from_calls<I>(calls: I) -> Self
    where
        I: IntoIterator<Item = (u32, Direction, String)>,
    {
        Self {
            calls: calls
                .into_iter()
                .map(|(sequence, direction, call)| (sequence, AuctionCall { direction, call }))
                .collect(),
        }
    }

    /// Direction of the first call.
    pub fn dealer(&self) -> Option<Direction> {
        self.calls.values().next().map(|call| call.direction)
    }

    /// Direction of the latest call.
    pub fn last_caller(&self) -> Option<Direction> {
        self.calls.values().next_back().map(|call| call.direction)
    }

    pub fn get(&self, sequence: u32) -> Option<&AuctionCall> {
        self.calls.get(&sequence)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &AuctionCall)> {
        self.calls.iter().map(|(sequence, call)| (*sequence, call))
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// What a single log entry asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionOp {
    Insert { direction: Direction, call: String },
    /// Remove the call at the sequence number, but only if it was made by
    /// `expected_direction`.
    Erase { expected_direction: Direction },
}

impl AuctionOp {
    pub fn from_entry(entry: &CallEntry) -> Self {
        if entry.erased {
            AuctionOp::Erase {
                expected_direction: entry.direction,
            }
        } else {
            AuctionOp::Insert {
                direction: entry.direction,
                call: entry.call.clone(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub applied: usize,
    pub erased: usize,
    /// Entries voided by a later board retraction.
    pub superseded: usize,
    /// Erasures pointing at a missing call or at a call by another direction.
    pub ignored_erasures: usize,
}

/// Result of replaying the call log.
#[derive(Debug, Clone, Default)]
pub struct CompiledAuctions {
    auctions: BTreeMap<BoardKey, AuctionSequence>,
    pub stats: CompileStats,
}

impl CompiledAuctions {
    pub fn get(&self, key: &BoardKey) -> Option<&AuctionSequence> {
        self.auctions.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoardKey, &AuctionSequence)> {
        self.auctions.iter()
    }

    pub fn len(&self) -> usize {
        self.auctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auctions.is_empty()
    }

    fn apply(&mut self, key: BoardKey, sequence: u32, op: AuctionOp) {
        match op {
            AuctionOp::Insert { direction, call } => {
                debug!(board = %key, sequence, call = %call, direction = %direction, "Recorded call");
                self.auctions
                    .entry(key)
                    .or_default()
                    .calls
                    .insert(sequence, AuctionCall { direction, call });
                self.stats.applied += 1;
            }
            AuctionOp::Erase { expected_direction } => {
                let Some(auction) = self.auctions.get_mut(&key) else {
                    debug!(board = %key, sequence, "Erasure for board without calls, ignoring");
                    self.stats.ignored_erasures += 1;
                    return;
                };
                match auction.calls.get(&sequence) {
                    Some(existing) if existing.direction == expected_direction => {
                        auction.calls.remove(&sequence);
                        self.stats.erased += 1;
                        debug!(board = %key, sequence, "Erased call");
                        if auction.calls.is_empty() {
                            debug!(board = %key, "Auction empty after erasure, removing");
                            self.auctions.remove(&key);
                        }
                    }
                    Some(existing) => {
                        debug!(
                            board = %key,
                            sequence,
                            recorded = %existing.direction,
                            erasing = %expected_direction,
                            "Erasure direction does not match, not removing"
                        );
                        self.stats.ignored_erasures += 1;
                    }
                    None => {
                        debug!(board = %key, sequence, "Erasure of unknown call, ignoring");
                        self.stats.ignored_erasures += 1;
                    }
                }
            }
        }
    }
}

/// Latest retraction timestamp per board.
pub fn collapse_retractions(retractions: &[BoardRetraction]) -> HashMap<BoardKey, NaiveDateTime> {
    let mut latest: HashMap<BoardKey, NaiveDateTime> = HashMap::new();
    for retraction in retractions {
        latest
            .entry(retraction.board_key())
            .and_modify(|current| {
                if *current < retraction.retracted_at {
                    *current = retraction.retracted_at;
                }
            })
            .or_insert(retraction.retracted_at);
    }
    latest
}

pub fn compile_auctions(calls: &[CallEntry], retractions: &[BoardRetraction]) -> CompiledAuctions {
    let retracted = collapse_retractions(retractions);

    let mut ordered: Vec<&CallEntry> = calls.iter().collect();
    ordered.sort_by_key(|entry| entry.inserted_at);

    let mut compiled = CompiledAuctions::default();
    for entry in ordered {
        let key = entry.board_key();
        if let Some(retracted_at) = retracted.get(&key) {
            if entry.inserted_at <= *retracted_at {
                info!(
                    board = entry.board,
                    round = entry.round,
                    sector = %entry.sector,
                    table = %entry.table,
                    sequence = entry.sequence,
                    call = %entry.call,
                    direction = %entry.direction,
                    "Call from retracted board skipped"
                );
                compiled.stats.superseded += 1;
                continue;
            }
        }
        compiled.apply(key, entry.sequence, AuctionOp::from_entry(entry));
    }

    info!(
        boards = compiled.len(),
        applied = compiled.stats.applied,
        erased = compiled.stats.erased,
        superseded = compiled.stats.superseded,
        ignored_erasures = compiled.stats.ignored_erasures,
        "Compiled auctions"
    );
    compiled
}
