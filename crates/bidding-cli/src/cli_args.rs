use std::path::PathBuf;

use bidding_core::GoniecTarget;
use bidding_core::config::RuntimeOverrides;
use bidding_core::logging::ConsoleVerbosity;
use clap::{ArgAction, Parser, ValueHint};

/// Display bidding data from BWS exports on JFR Pary pages.
#[derive(Parser, Debug, Clone)]
#[command(name = "bidding-data", version, about, long_about = None)]
pub struct Cli {
    /// Directory with the BWS table export (RoundData.csv, BiddingData.csv, ReceivedData.csv).
    #[arg(value_name = "SOURCE", value_hint = ValueHint::DirPath)]
    pub source: String,

    /// Tournament path (to PREFIX.html).
    #[arg(value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub path: String,

    /// Use Goniec to send modified files.
    #[arg(
        short = 's',
        long = "send-files",
        value_name = "GONIEC_HOST",
        num_args = 0..=1,
        default_missing_value = "localhost:8090"
    )]
    pub send_files: Option<String>,

    /// Force resending all files with Goniec.
    #[arg(long = "force-resend", action = ArgAction::SetTrue)]
    pub force_resend: bool,

    /// Section to read from (0 reads every section).
    #[arg(long = "section-number", value_name = "SECTION")]
    pub section_number: Option<String>,

    /// Highest round number to read (0 reads every round).
    #[arg(
        long = "max-round",
        value_name = "MAX_ROUND",
        value_parser = clap::value_parser!(u32)
    )]
    pub max_round: Option<u32>,

    /// Keep one bidding file per pair instead of a JSON bundle per board.
    #[arg(long = "no-compress", action = ArgAction::SetTrue)]
    pub no_compress: bool,

    /// Seconds to wait for Goniec before giving up.
    #[arg(long = "push-timeout", value_name = "SECONDS")]
    pub push_timeout: Option<u64>,

    /// Suppress warnings on stderr.
    #[arg(short, long, action = ArgAction::SetTrue, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Be verbose on stderr.
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Persist the effective settings to config.toml.
    #[arg(long = "save-config", action = ArgAction::SetTrue)]
    pub save_config: bool,
}

impl Cli {
    pub fn verbosity(&self) -> ConsoleVerbosity {
        if self.quiet {
            ConsoleVerbosity::Quiet
        } else if self.verbose {
            ConsoleVerbosity::Verbose
        } else {
            ConsoleVerbosity::Normal
        }
    }

    /// Expanded and validated positional paths.
    pub fn resolve_paths(&self) -> Result<(PathBuf, PathBuf), String> {
        let source = PathBuf::from(shellexpand::tilde(&self.source).to_string());
        if !source.is_dir() {
            return Err(format!("Directory {} does not exist", source.display()));
        }
        let path = PathBuf::from(shellexpand::tilde(&self.path).to_string());
        if !path.is_file() {
            return Err(format!("File {} does not exist", path.display()));
        }
        Ok((source, path))
    }

    /// Convert CLI flags into runtime overrides plus any advisory warnings.
    pub fn to_runtime_overrides(&self) -> Result<(RuntimeOverrides, Vec<String>), String> {
        let mut overrides = RuntimeOverrides::default();
        let mut warnings = Vec::new();

        if let Some(ref value) = self.send_files {
            let target: GoniecTarget = value.parse()?;
            overrides.goniec_enabled = Some(true);
            overrides.goniec_host = Some(target.host);
            overrides.goniec_port = Some(target.port);
        }
        if self.force_resend {
            overrides.force_resend = Some(true);
        }
        if let Some(ref section) = self.section_number {
            let section = section.trim();
            if section.parse::<u32>().is_err() {
                warnings.push(format!(
                    "Section '{section}' is not a number; matching it literally."
                ));
            }
            overrides.section = Some(section.to_string());
        }
        if let Some(max_round) = self.max_round {
            overrides.max_round = Some(max_round);
        }
        if self.no_compress {
            overrides.compress = Some(false);
        }
        if let Some(timeout) = self.push_timeout {
            overrides.push_timeout_secs = Some(timeout);
        }

        Ok((overrides, warnings))
    }
}
