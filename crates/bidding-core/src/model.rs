//! Records shared by the source loader, the auction compiler and the output stages.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

/// Seat at the table, in bidding-table column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    W,
    N,
    E,
    S,
}

impl Direction {
    /// Column order of the rendered bidding table.
    pub const ALL: [Direction; 4] = [Direction::W, Direction::N, Direction::E, Direction::S];

    pub const fn index(self) -> usize {
        match self {
            Direction::W => 0,
            Direction::N => 1,
            Direction::E => 2,
            Direction::S => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::W => "W",
            Direction::N => "N",
            Direction::E => "E",
            Direction::S => "S",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "W" => Ok(Direction::W),
            "N" => Ok(Direction::N),
            "E" => Ok(Direction::E),
            "S" => Ok(Direction::S),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Composite `sector_table` identifier used by the lineup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId {
    pub sector: String,
    pub table: String,
}

impl TableId {
    pub fn new(sector: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            sector: sector.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.sector, self.table)
    }
}

/// One physical board played at one table in one round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoardKey {
    pub board: u32,
    pub round: u32,
    pub table: TableId,
}

impl BoardKey {
    pub fn new(board: u32, round: u32, sector: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            board,
            round,
            table: TableId::new(sector, table),
        }
    }
}

impl fmt::Display for BoardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.board, self.round, self.table.sector, self.table.table
        )
    }
}

/// Two pair numbers, always stored ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairNumbers {
    low: u32,
    high: u32,
}

impl PairNumbers {
    pub fn new(first: u32, second: u32) -> Self {
        Self {
            low: first.min(second),
            high: first.max(second),
        }
    }

    pub const fn low(&self) -> u32 {
        self.low
    }

    pub const fn high(&self) -> u32 {
        self.high
    }
}

impl fmt::Display for PairNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.low, self.high)
    }
}

/// A seating row as exported by the scoring database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineupRow {
    pub sector: String,
    pub table: String,
    pub round: u32,
    pub ns_pair: u32,
    pub ew_pair: u32,
    pub low_board: Option<u32>,
    pub high_board: Option<u32>,
    /// Published number of the first board played in this row, if any.
    pub custom_board_number: Option<u32>,
}

impl LineupRow {
    pub fn table_id(&self) -> TableId {
        TableId::new(self.sector.clone(), self.table.clone())
    }

    pub fn range_declaration(&self) -> Option<RangeDeclaration> {
        let external_start = self.custom_board_number.filter(|number| *number > 0)?;
        if self.round == 0 {
            return None;
        }
        Some(RangeDeclaration {
            round: self.round,
            table: self.table_id(),
            internal_start: self.low_board?,
            internal_end: self.high_board?,
            external_start,
        })
    }
}

/// Declares that internal boards `internal_start..=internal_end` played at a
/// table in a round are published from `external_start` on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeDeclaration {
    pub round: u32,
    pub table: TableId,
    pub internal_start: u32,
    pub internal_end: u32,
    pub external_start: u32,
}

/// A raw entry of the call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEntry {
    pub sector: String,
    pub table: String,
    pub round: u32,
    pub board: u32,
    pub sequence: u32,
    pub direction: Direction,
    pub call: String,
    pub inserted_at: NaiveDateTime,
    pub erased: bool,
}

impl CallEntry {
    pub fn board_key(&self) -> BoardKey {
        BoardKey::new(self.board, self.round, self.sector.clone(), self.table.clone())
    }
}

/// Whole-board invalidation: everything recorded up to `retracted_at` is void.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRetraction {
    pub sector: String,
    pub table: String,
    pub round: u32,
    pub board: u32,
    pub retracted_at: NaiveDateTime,
}

impl BoardRetraction {
    pub fn board_key(&self) -> BoardKey {
        BoardKey::new(self.board, self.round, self.sector.clone(), self.table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_key_display_matches_composite_identity() {
        let key = BoardKey::new(5, 1, "A", "3");
        assert_eq!(key.to_string(), "5_1_A_3");
    }

    #[test]
    fn pair_numbers_are_sorted() {
        let pairs = PairNumbers::new(12, 3);
        assert_eq!(pairs.low(), 3);
        assert_eq!(pairs.high(), 12);
        assert_eq!(pairs.to_string(), "3_12");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("n".parse::<Direction>().unwrap(), Direction::N);
        assert_eq!(" W ".parse::<Direction>().unwrap(), Direction::W);
        assert!("X".parse::<Direction>().is_err());
    }

    #[test]
    fn range_declaration_requires_external_start_and_round() {
        let mut row = LineupRow {
            sector: "1".to_string(),
            table: "2".to_string(),
            round: 1,
            ns_pair: 4,
            ew_pair: 7,
            low_board: Some(1),
            high_board: Some(3),
            custom_board_number: Some(10),
        };
        let declaration = row.range_declaration().expect("declaration");
        assert_eq!(declaration.internal_start, 1);
        assert_eq!(declaration.internal_end, 3);
        assert_eq!(declaration.external_start, 10);

        row.custom_board_number = Some(0);
        assert!(row.range_declaration().is_none());

        row.custom_board_number = Some(10);
        row.round = 0;
        assert!(row.range_declaration().is_none());
    }
}
