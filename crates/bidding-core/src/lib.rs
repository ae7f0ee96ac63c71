//! Core library for publishing bidding records on JFR Pary result pages.

pub mod auction;
pub mod config;
pub mod error;
pub mod layout;
pub mod lineup;
pub mod logging;
pub mod mapping;
pub mod markup;
pub mod model;
pub mod output;
pub mod push;
pub mod runtime;
pub mod source;
pub mod state;
pub mod table;
pub mod tracker;

pub use auction::{AuctionOp, AuctionSequence, CompileStats, CompiledAuctions, compile_auctions};
pub use config::{
    ConfigError, ConfigLoadResult, ConfigSource, FileConfig, RuntimeOverrides, RuntimePreferences,
    apply_runtime_overrides, config_directory, config_path, load_config, save_config,
};
pub use error::BiddingError;
pub use layout::TournamentLayout;
pub use model::{BoardKey, Direction, PairNumbers};
pub use push::{GoniecTarget, PushClient, PushState};
pub use runtime::{RunConfig, RunSummary, run_with_config, run_with_source};
pub use source::{CsvExportSource, SourceFilter, TournamentData, TournamentSource};
pub use state::RunState;
pub use table::BiddingTable;
