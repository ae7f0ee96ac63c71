use std::fs;

use bidding_cli::cli_args::Cli;
use bidding_core::logging::ConsoleVerbosity;
use clap::Parser;
use tempfile::tempdir;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["bidding-data"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("arguments parse")
}

#[test]
fn test_positionals_only() {
    let cli = parse(&["export", "site/t.html"]);
    assert_eq!(cli.source, "export");
    assert_eq!(cli.path, "site/t.html");
    assert!(cli.send_files.is_none());
    assert_eq!(cli.verbosity(), ConsoleVerbosity::Normal);

    let (overrides, warnings) = cli.to_runtime_overrides().unwrap();
    assert!(overrides.is_empty());
    assert!(warnings.is_empty());
}

#[test]
fn test_missing_positionals_rejected() {
    assert!(Cli::try_parse_from(["bidding-data", "export"]).is_err());
}

#[test]
fn test_bare_send_files_uses_default_receiver() {
    let cli = parse(&["export", "t.html", "-s"]);
    assert_eq!(cli.send_files.as_deref(), Some("localhost:8090"));

    let (overrides, _) = cli.to_runtime_overrides().unwrap();
    assert_eq!(overrides.goniec_enabled, Some(true));
    assert_eq!(overrides.goniec_host.as_deref(), Some("localhost"));
    assert_eq!(overrides.goniec_port, Some(8090));
}

#[test]
fn test_send_files_with_host_and_port() {
    let cli = parse(&["export", "t.html", "--send-files", "10.0.0.5:9000"]);
    let (overrides, _) = cli.to_runtime_overrides().unwrap();
    assert_eq!(overrides.goniec_host.as_deref(), Some("10.0.0.5"));
    assert_eq!(overrides.goniec_port, Some(9000));

    let cli = parse(&["export", "t.html", "--send-files=kibic"]);
    let (overrides, _) = cli.to_runtime_overrides().unwrap();
    assert_eq!(overrides.goniec_host.as_deref(), Some("kibic"));
    assert_eq!(overrides.goniec_port, Some(8090));
}

#[test]
fn test_send_files_bad_port() {
    let cli = parse(&["export", "t.html", "-s", "host:http"]);
    let err = cli.to_runtime_overrides().unwrap_err();
    assert!(err.contains("invalid Goniec port"));
}

#[test]
fn test_filter_and_output_overrides() {
    let cli = parse(&[
        "export",
        "t.html",
        "--section-number",
        "2",
        "--max-round",
        "5",
        "--no-compress",
        "--force-resend",
        "--push-timeout",
        "30",
    ]);
    let (overrides, warnings) = cli.to_runtime_overrides().unwrap();

    assert!(warnings.is_empty());
    assert_eq!(overrides.section.as_deref(), Some("2"));
    assert_eq!(overrides.max_round, Some(5));
    assert_eq!(overrides.compress, Some(false));
    assert_eq!(overrides.force_resend, Some(true));
    assert_eq!(overrides.push_timeout_secs, Some(30));
    assert!(overrides.goniec_enabled.is_none());
}

#[test]
fn test_non_numeric_section_warns() {
    let cli = parse(&["export", "t.html", "--section-number", " B "]);
    let (overrides, warnings) = cli.to_runtime_overrides().unwrap();
    assert_eq!(overrides.section.as_deref(), Some("B"));
    assert_eq!(warnings.len(), 1);
}

#[test]
fn test_max_round_must_be_number() {
    assert!(Cli::try_parse_from(["bidding-data", "export", "t.html", "--max-round", "x"]).is_err());
}

#[test]
fn test_verbosity_flags() {
    assert_eq!(parse(&["export", "t.html", "-q"]).verbosity(), ConsoleVerbosity::Quiet);
    assert_eq!(parse(&["export", "t.html", "-v"]).verbosity(), ConsoleVerbosity::Verbose);
    assert!(Cli::try_parse_from(["bidding-data", "export", "t.html", "-q", "-v"]).is_err());
}

#[test]
fn test_resolve_paths() {
    let dir = tempdir().unwrap();
    let export = dir.path().join("export");
    fs::create_dir(&export).unwrap();
    let page = dir.path().join("t.html");
    fs::write(&page, "<html></html>").unwrap();

    let cli = parse(&[export.to_str().unwrap(), page.to_str().unwrap()]);
    let (source, path) = cli.resolve_paths().unwrap();
    assert_eq!(source, export);
    assert_eq!(path, page);

    let missing = dir.path().join("nope");
    let cli = parse(&[missing.to_str().unwrap(), page.to_str().unwrap()]);
    assert!(cli.resolve_paths().unwrap_err().starts_with("Directory"));

    let cli = parse(&[export.to_str().unwrap(), missing.to_str().unwrap()]);
    assert!(cli.resolve_paths().unwrap_err().starts_with("File"));
}
