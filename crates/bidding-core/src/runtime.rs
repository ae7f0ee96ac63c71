use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::auction::{CompileStats, compile_auctions};
use crate::config::RuntimePreferences;
use crate::error::BiddingError;
use crate::layout::TournamentLayout;
use crate::lineup::LineupIndex;
use crate::logging::event_counts;
use crate::mapping::{BoardNumberMapping, discover_pages};
use crate::output::{OutputManager, compress, reconcile_bundles};
use crate::push::{GoniecTarget, PushClient, PushState};
use crate::source::{CsvExportSource, SourceFilter, TournamentSource};
use crate::state::RunState;
use crate::tracker::ChangeTracker;

/// Everything a single run needs, after config and CLI flags are merged.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory with the CSV export of the scoring database.
    pub source_dir: PathBuf,
    /// `<prefix>.html` of the tournament.
    pub tournament_page: PathBuf,
    pub filter: SourceFilter,
    pub compress: bool,
    /// Receiver for changed files; `None` disables pushing.
    pub goniec: Option<GoniecTarget>,
    pub force_resend: bool,
    pub push_timeout: Duration,
}

impl RunConfig {
    pub fn from_preferences(
        source_dir: impl Into<PathBuf>,
        tournament_page: impl Into<PathBuf>,
        preferences: &RuntimePreferences,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            tournament_page: tournament_page.into(),
            filter: SourceFilter {
                section: preferences.section.clone(),
                max_round: preferences.max_round,
            },
            compress: preferences.compress,
            goniec: preferences.goniec_enabled.then(|| GoniecTarget {
                host: preferences.goniec_host.clone(),
                port: preferences.goniec_port,
            }),
            force_resend: preferences.force_resend,
            push_timeout: Duration::from_secs(preferences.push_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub boards_compiled: usize,
    pub auction_stats: CompileStats,
    pub fragments_written: usize,
    pub fragments_unchanged: usize,
    pub boards_skipped: usize,
    pub pages_updated: usize,
    pub links_injected: usize,
    pub links_missing: usize,
    pub files_deleted: usize,
    pub bundles_written: usize,
    pub bundles_deleted: usize,
    pub pages_unlinked: usize,
    pub files_changed: usize,
    pub files_pushed: usize,
    pub push_state: Option<PushState>,
    pub warnings: usize,
    pub errors: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Auctions: {} boards ({} calls applied, {} erased, {} superseded)",
            self.boards_compiled,
            self.auction_stats.applied,
            self.auction_stats.erased,
            self.auction_stats.superseded
        )?;
        writeln!(
            f,
            "Bidding tables: {} written, {} unchanged, {} skipped",
            self.fragments_written, self.fragments_unchanged, self.boards_skipped
        )?;
        writeln!(
            f,
            "Pages: {} updated, {} links, {} without bidding",
            self.pages_updated, self.links_injected, self.links_missing
        )?;
        writeln!(
            f,
            "Cleanup: {} files deleted, {} bundles written, {} bundles deleted, {} pages unlinked",
            self.files_deleted, self.bundles_written, self.bundles_deleted, self.pages_unlinked
        )?;
        match self.push_state {
            Some(state) => writeln!(
                f,
                "Goniec: {} of {} changed files sent ({state:?})",
                self.files_pushed, self.files_changed
            )?,
            None => writeln!(f, "Goniec: disabled ({} files changed)", self.files_changed)?,
        }
        write!(f, "{} warnings, {} errors", self.warnings, self.errors)
    }
}

struct StageLogger {
    program_start: Instant,
    stage_start: Instant,
}

impl StageLogger {
    fn new(start: Instant) -> Self {
        Self {
            program_start: start,
            stage_start: start,
        }
    }

    fn begin(&mut self, name: &str) {
        info!(stage = name, elapsed_ms = %format_ms(self.program_start.elapsed()), "BEGIN");
        self.stage_start = Instant::now();
    }

    fn end(&mut self, name: &str) {
        info!(
            stage = name,
            elapsed_ms = %format_ms(self.program_start.elapsed()),
            stage_ms = %format_ms(self.stage_start.elapsed()),
            "END"
        );
    }
}

fn format_ms(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1_000.0;
    format!("{:.3}", ms)
}

/// Run against the CSV export named in the config.
pub async fn run_with_config(config: RunConfig) -> Result<RunSummary, BiddingError> {
    let source = CsvExportSource::new(config.source_dir.clone());
    run_with_source(&source, &config).await
}

/// Run the whole pipeline. Only source and layout problems are returned as
/// errors; everything after the first write is best-effort and logged.
pub async fn run_with_source(
    source: &dyn TournamentSource,
    config: &RunConfig,
) -> Result<RunSummary, BiddingError> {
    let counts = event_counts();
    let (warnings_before, errors_before) = (counts.warnings(), counts.errors());
    let mut logger = StageLogger::new(Instant::now());
    let mut summary = RunSummary::default();

    logger.begin("Load tournament data");
    let layout = TournamentLayout::from_page_path(&config.tournament_page)?;
    info!(source = %source.describe(), prefix = %layout.prefix().display(), "Reading tournament");
    let data = source.load(&config.filter)?;
    let pages = discover_pages(&layout)?;
    logger.end("Load tournament data");

    logger.begin("Compile auctions");
    let lineup = LineupIndex::from_rows(&data.lineup);
    let auctions = compile_auctions(&data.calls, &data.retractions);
    summary.boards_compiled = auctions.len();
    summary.auction_stats = auctions.stats;
    let declarations: Vec<_> = data
        .lineup
        .iter()
        .filter_map(|row| row.range_declaration())
        .collect();
    let mut mapping = BoardNumberMapping::build(&declarations);
    mapping.prune_to_pages(&pages);
    let live_pages = mapping.live_pages(&pages);
    info!(
        boards = auctions.len(),
        mapped = mapping.len(),
        pages = live_pages.len(),
        "Mapped boards to pages"
    );
    logger.end("Compile auctions");

    let state_path = layout.state_path();
    let mut state = RunState::load_or_default(&state_path);
    let mut output = OutputManager::new(&layout);

    logger.begin("Write bidding tables");
    let generated = output.generate(&auctions, &lineup, &mapping);
    summary.fragments_written = generated.written;
    summary.fragments_unchanged = generated.unchanged;
    summary.boards_skipped = generated.skipped;
    logger.end("Write bidding tables");

    logger.begin("Write page scripts");
    let scripts = output.install_scripts(&live_pages);
    summary.pages_updated = scripts.pages_updated;
    logger.end("Write page scripts");

    logger.begin("Write traveller links");
    let links = output.link(&live_pages);
    summary.links_injected = links.links;
    summary.links_missing = links.missing;
    let deleted = output.reconcile(&mut state);
    summary.files_deleted = deleted.len();
    logger.end("Write traveller links");

    let mut bundles = Vec::new();
    if config.compress {
        logger.begin("Compress bidding files");
        let report = compress(&layout, &live_pages, &mut state);
        summary.bundles_written = report.bundles.len();
        bundles = report.bundles;
        logger.end("Compress bidding files");
    }

    logger.begin("Remove stale bundles");
    let cleanup = reconcile_bundles(&layout, &pages, &bundles, &mut state);
    summary.bundles_deleted = cleanup.deleted.len();
    summary.pages_unlinked = cleanup.pages_unlinked.len();
    logger.end("Remove stale bundles");

    logger.begin("Detect changed files");
    let mut candidates: Vec<PathBuf> = live_pages.iter().map(|(_, page)| page.clone()).collect();
    candidates.extend(links.listings);
    candidates.extend(bundles);
    candidates.extend(
        cleanup
            .pages_unlinked
            .into_iter()
            .filter(|page| !live_pages.iter().any(|(_, live)| live == page)),
    );
    candidates.extend(state.generated_files.iter().cloned());
    candidates.push(layout.scripts_directory().join("bidding.js"));
    let mut tracker = ChangeTracker::new(state.file_hashes.clone());
    let changed = tracker.changed_files(&candidates);
    summary.files_changed = changed.len();
    info!(candidates = candidates.len(), changed = changed.len(), "Detected changed files");
    logger.end("Detect changed files");

    match &config.goniec {
        Some(target) => {
            logger.begin("Send files to Goniec");
            let mut client = PushClient::new(target.clone(), config.push_timeout, config.force_resend);
            let working_directory = layout.working_directory();
            let files = client.prepare(&working_directory, &candidates, &changed);
            match client.push(&working_directory, &files).await {
                Ok(sent) => {
                    summary.files_pushed = sent;
                    tracker.commit();
                }
                Err(err) => error!(error = %err, "Unable to send files to Goniec"),
            }
            summary.push_state = Some(client.state());
            logger.end("Send files to Goniec");
        }
        None => tracker.commit(),
    }
    tracker.forget_missing();
    state.file_hashes = tracker.into_stored();

    if let Err(err) = state.save(&state_path) {
        error!(path = %state_path.display(), error = %err, "Unable to save run state");
    }

    summary.warnings = counts.warnings().saturating_sub(warnings_before);
    summary.errors = counts.errors().saturating_sub(errors_before);
    info!(
        written = summary.fragments_written,
        links = summary.links_injected,
        deleted = summary.files_deleted,
        bundles = summary.bundles_written,
        stale_bundles = summary.bundles_deleted,
        pushed = summary.files_pushed,
        "Run finished"
    );
    Ok(summary)
}
