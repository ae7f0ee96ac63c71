use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::auction::AuctionSequence;
use crate::model::Direction;

const SKIPPED_TURN: &str = "SkipBid";
const SKIPPED_TURN_DISPLAY: &str = "( - )";

fn contract_call() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d)([SHDCN])").expect("valid call pattern"))
}

/// Calls laid out in W, N, E, S columns, one row per bidding round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiddingTable {
    pub rows: Vec<[String; 4]>,
    pub dealer: Direction,
    pub last_caller: Direction,
}

impl BiddingTable {
    /// `None` for an empty sequence.
    pub fn from_sequence(sequence: &AuctionSequence) -> Option<Self> {
        let dealer = sequence.dealer()?;
        let last_caller = sequence.last_caller()?;

        let mut columns: [Vec<String>; 4] = Default::default();
        for direction in Direction::ALL.iter().take(dealer.index()) {
            columns[direction.index()].push(String::new());
        }
        for (_, call) in sequence.iter() {
            columns[call.direction.index()].push(call.call.clone());
        }

        let height = columns.iter().map(Vec::len).max().unwrap_or(0);
        for column in columns.iter_mut() {
            column.resize(height, String::new());
        }

        let mut rows = Vec::with_capacity(height);
        for row in 0..height {
            rows.push(std::array::from_fn(|column| columns[column][row].clone()));
        }

        debug!(
            calls = sequence.len(),
            rows = rows.len(),
            dealer = %dealer,
            last_caller = %last_caller,
            "Formatted bidding table"
        );
        Some(Self {
            rows,
            dealer,
            last_caller,
        })
    }

    pub fn render_html(&self) -> String {
        let mut html = String::from("<table><tr>");
        for direction in Direction::ALL {
            html.push_str("<th>");
            html.push_str(direction.as_str());
            html.push_str("</th>");
        }
        html.push_str("</tr>");
        for row in &self.rows {
            html.push_str("<tr>");
            for cell in row {
                html.push_str("<td>");
                html.push_str(&render_call(cell));
                html.push_str("</td>");
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        html
    }
}

fn render_call(call: &str) -> String {
    if let Some(captures) = contract_call().captures(call) {
        return format!(
            "{}<img src=\"images/{}.gif\"/>",
            &captures[1], &captures[2]
        );
    }
    if call == SKIPPED_TURN {
        return SKIPPED_TURN_DISPLAY.to_string();
    }
    escape_html(call)
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
