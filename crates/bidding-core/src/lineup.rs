use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{LineupRow, PairNumbers, TableId};

/// (round, `sector_table`) → the two pairs seated there.
#[derive(Debug, Clone, Default)]
pub struct LineupIndex {
    rounds: BTreeMap<u32, BTreeMap<TableId, PairNumbers>>,
}

impl LineupIndex {
    pub fn from_rows(rows: &[LineupRow]) -> Self {
        let mut rounds: BTreeMap<u32, BTreeMap<TableId, PairNumbers>> = BTreeMap::new();
        for row in rows {
            let pairs = PairNumbers::new(row.ns_pair, row.ew_pair);
            let table = row.table_id();
            debug!(round = row.round, table = %table, pairs = %pairs, "Registered lineup");
            rounds.entry(row.round).or_default().insert(table, pairs);
        }
        Self { rounds }
    }

    pub fn has_round(&self, round: u32) -> bool {
        self.rounds.contains_key(&round)
    }

    pub fn pairs(&self, round: u32, table: &TableId) -> Option<PairNumbers> {
        self.rounds.get(&round)?.get(table).copied()
    }

    pub fn len(&self) -> usize {
        self.rounds.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sector: &str, table: &str, round: u32, ns: u32, ew: u32) -> LineupRow {
        LineupRow {
            sector: sector.to_string(),
            table: table.to_string(),
            round,
            ns_pair: ns,
            ew_pair: ew,
            low_board: None,
            high_board: None,
            custom_board_number: None,
        }
    }

    #[test]
    fn pairs_are_sorted_and_keyed_by_round_and_table() {
        let index = LineupIndex::from_rows(&[row("1", "2", 1, 9, 4), row("1", "2", 2, 1, 6)]);
        assert_eq!(
            index.pairs(1, &TableId::new("1", "2")),
            Some(PairNumbers::new(4, 9))
        );
        assert_eq!(index.pairs(2, &TableId::new("1", "2")).unwrap().low(), 1);
        assert_eq!(index.pairs(3, &TableId::new("1", "2")), None);
        assert!(index.has_round(2));
        assert!(!index.has_round(3));
        assert_eq!(index.len(), 2);
    }
}
