use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bidding_core::push::PushState;
use bidding_core::source::{BIDDING_DATA_FILE, RECEIVED_DATA_FILE, ROUND_DATA_FILE};
use bidding_core::{GoniecTarget, RunConfig, RunSummary, SourceFilter, run_with_config};
use tempfile::{TempDir, tempdir};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

const ROUND_DATA: &str = "\
Section,Table,Round,NSPair,EWPair,LowBoard,HighBoard,CustomBoardNumber
1,1,1,1,2,1,2,1
1,2,1,3,4,1,2,1
";

const BIDDING_DATA: &str = "\
ID,Section,Table,Round,Board,Counter,Direction,Bid,DateLog,TimeLog,Erased
1,1,1,1,1,1,N,1H,2024-05-11 00:00:00,1899-12-30 18:00:01,0
2,1,1,1,1,2,E,Pass,2024-05-11 00:00:00,1899-12-30 18:00:02,0
3,1,1,1,1,3,S,2H,2024-05-11 00:00:00,1899-12-30 18:00:03,0
4,1,1,1,1,4,W,Pass,2024-05-11 00:00:00,1899-12-30 18:00:04,0
5,1,1,1,1,5,N,Pass,2024-05-11 00:00:00,1899-12-30 18:00:05,0
6,1,1,1,1,6,E,Pass,2024-05-11 00:00:00,1899-12-30 18:00:06,0
7,1,2,1,2,1,W,1NT,2024-05-11 00:00:00,1899-12-30 18:01:01,0
8,1,2,1,2,2,N,Pass,2024-05-11 00:00:00,1899-12-30 18:01:02,0
9,1,2,1,2,3,E,3NT,2024-05-11 00:00:00,1899-12-30 18:01:03,0
10,1,2,1,2,4,S,Pass,2024-05-11 00:00:00,1899-12-30 18:01:04,0
11,1,2,1,2,5,W,Pass,2024-05-11 00:00:00,1899-12-30 18:01:05,0
12,1,2,1,2,6,N,Pass,2024-05-11 00:00:00,1899-12-30 18:01:06,0
";

const NO_RETRACTIONS: &str = "Section,Table,Round,Board,DateLog,TimeLog,Erased\n";

const PAGE: &str = "<html>\n<head>\n<title>Rozdanie</title>\n</head>\n<body></body>\n</html>\n";

fn score_row(ns: u32, ew: u32, contract: &str) -> String {
    format!(
        "<tr><td>1</td><td>{ns}</td><td>{ew}</td><td>{contract}</td><td>N</td>\
         <td>KS</td><td>10</td><td>420</td><td></td><td>8</td><td>0</td></tr>\n"
    )
}

fn listing(rows: &[(u32, u32, &str)]) -> String {
    let mut html = String::from("<table>\n<tr><td>NS</td><td>EW</td></tr>\n");
    for (ns, ew, contract) in rows {
        html.push_str(&score_row(*ns, *ew, contract));
    }
    html.push_str("<tr><td>invalid</td><td>x</td><td>y</td><td></td><td></td><td></td><td></td><td></td><td></td><td></td><td></td></tr>\n");
    html.push_str("</table>\n");
    html
}

struct Fixture {
    _temp: TempDir,
    export: PathBuf,
    site: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempdir().expect("tempdir");
        let export = temp.path().join("export");
        let site = temp.path().join("site");
        fs::create_dir_all(&export).unwrap();
        fs::create_dir_all(&site).unwrap();

        fs::write(export.join(ROUND_DATA_FILE), ROUND_DATA).unwrap();
        fs::write(export.join(BIDDING_DATA_FILE), BIDDING_DATA).unwrap();
        fs::write(export.join(RECEIVED_DATA_FILE), NO_RETRACTIONS).unwrap();

        fs::write(site.join("t.html"), PAGE).unwrap();
        fs::write(site.join("t001.html"), PAGE).unwrap();
        fs::write(site.join("t002.html"), PAGE).unwrap();
        fs::write(site.join("t001.txt"), listing(&[(1, 2, "4H N"), (3, 4, "3NT S")])).unwrap();
        fs::write(site.join("t002.txt"), listing(&[(4, 3, "3NT E"), (2, 1, "2S W")])).unwrap();

        Self {
            _temp: temp,
            export,
            site: fs::canonicalize(site).unwrap(),
        }
    }

    fn config(&self) -> RunConfig {
        RunConfig {
            source_dir: self.export.clone(),
            tournament_page: self.site.join("t.html"),
            filter: SourceFilter::default(),
            compress: true,
            goniec: None,
            force_resend: false,
            push_timeout: Duration::from_secs(5),
        }
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.site.join(name)).unwrap_or_else(|err| panic!("{name}: {err}"))
    }

    fn snapshot(&self) -> BTreeMap<PathBuf, String> {
        let mut files = BTreeMap::new();
        collect(&self.site, &mut files);
        files
    }
}

fn collect(dir: &Path, files: &mut BTreeMap<PathBuf, String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(&path, files);
        } else {
            files.insert(path.clone(), fs::read_to_string(&path).unwrap());
        }
    }
}

async fn run(config: RunConfig) -> RunSummary {
    run_with_config(config).await.expect("run completes")
}

#[tokio::test]
async fn pipeline_publishes_bundles_and_links() {
    let fixture = Fixture::new();
    let summary = run(fixture.config()).await;

    assert_eq!(summary.boards_compiled, 2);
    assert_eq!(summary.fragments_written, 2);
    assert_eq!(summary.links_injected, 2);
    assert_eq!(summary.links_missing, 2);
    assert_eq!(summary.bundles_written, 2);
    assert_eq!(summary.files_deleted, 0);
    assert_eq!(summary.bundles_deleted, 0);

    let listing = fixture.read("t001.txt");
    assert_eq!(listing.matches("data-bidding-link=\"1_2\"").count(), 1);
    assert!(!listing.contains("data-bidding-link=\"3_4\""));
    let listing = fixture.read("t002.txt");
    assert_eq!(listing.matches("data-bidding-link=\"3_4\"").count(), 1);

    let bundle: BTreeMap<String, String> =
        serde_json::from_str(&fixture.read("bidding-data/t_bidding_001.json")).unwrap();
    assert_eq!(bundle.keys().collect::<Vec<_>>(), vec!["1_2"]);
    assert!(bundle["1_2"].starts_with("<table><tr><th>W</th>"));
    assert!(bundle["1_2"].contains("<td>1<img src=\"images/H.gif\"/></td>"));

    let page = fixture.read("t001.html");
    assert!(page.contains("javas/jquery.js"));
    assert!(page.contains("javas/bidding.js"));
    assert!(page.contains("css/bidding.css"));
    assert!(page.contains("<link rel=\"bidding-file\" src=\"bidding-data/t_bidding_001.json\"/>"));
    assert_eq!(fixture.read("t.html"), PAGE, "tournament page itself is not a board page");

    assert!(fixture.site.join("javas").join("bidding.js").is_file());
    assert!(fixture.site.join(".t_bidding_state.json").is_file());
    assert!(
        fixture
            .snapshot()
            .keys()
            .all(|path| !path.to_string_lossy().ends_with("_1_2.txt")),
        "fragments are merged into bundles"
    );
}

#[tokio::test]
async fn pipeline_is_idempotent() {
    let fixture = Fixture::new();
    run(fixture.config()).await;
    let first = fixture.snapshot();

    let summary = run(fixture.config()).await;
    assert_eq!(fixture.snapshot(), first);
    assert_eq!(summary.files_changed, 0);
    assert_eq!(summary.fragments_written, 2);

    let mut uncompressed = fixture.config();
    uncompressed.compress = false;
    run(uncompressed.clone()).await;
    let first = fixture.snapshot();
    let summary = run(uncompressed).await;
    assert_eq!(fixture.snapshot(), first);
    assert_eq!(summary.fragments_unchanged, 2);
}

#[tokio::test]
async fn retracted_board_loses_fragment_and_link() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.compress = false;

    run(config.clone()).await;
    assert!(fixture.site.join("t_bidding_002_3_4.txt").is_file());
    assert!(fixture.read("t002.txt").contains("biddingLink"));

    fs::write(
        fixture.export.join(RECEIVED_DATA_FILE),
        format!("{NO_RETRACTIONS}1,2,1,2,2024-05-11,18:30:00,1\n"),
    )
    .unwrap();
    let summary = run(config).await;

    assert_eq!(summary.boards_compiled, 1);
    assert_eq!(summary.auction_stats.superseded, 6);
    assert!(!fixture.site.join("t_bidding_002_3_4.txt").exists());
    assert!(!fixture.read("t002.txt").contains("biddingLink"));
    assert!(fixture.site.join("t_bidding_001_1_2.txt").is_file());
}

#[tokio::test]
async fn uncompressed_run_removes_bundles_and_page_links() {
    let fixture = Fixture::new();
    run(fixture.config()).await;
    assert!(fixture.site.join("bidding-data/t_bidding_002.json").is_file());
    assert!(fixture.read("t002.html").contains("rel=\"bidding-file\""));

    fs::write(
        fixture.export.join(RECEIVED_DATA_FILE),
        format!("{NO_RETRACTIONS}1,2,1,2,2024-05-11,18:30:00,1\n"),
    )
    .unwrap();
    let mut config = fixture.config();
    config.compress = false;
    let summary = run(config).await;

    assert_eq!(summary.bundles_written, 0);
    assert_eq!(summary.bundles_deleted, 2);
    assert_eq!(summary.pages_unlinked, 2);
    assert!(!fixture.site.join("bidding-data/t_bidding_001.json").exists());
    assert!(!fixture.site.join("bidding-data/t_bidding_002.json").exists());
    assert!(!fixture.read("t001.html").contains("rel=\"bidding-file\""));
    assert!(!fixture.read("t002.html").contains("rel=\"bidding-file\""));
    assert!(fixture.site.join("t_bidding_001_1_2.txt").is_file());
    assert!(!fixture.site.join("t_bidding_002_3_4.txt").exists());
}

#[tokio::test]
async fn page_leaving_the_mapping_loses_its_bundle() {
    let fixture = Fixture::new();
    run(fixture.config()).await;
    assert!(fixture.site.join("bidding-data/t_bidding_002.json").is_file());

    fs::write(
        fixture.export.join(ROUND_DATA_FILE),
        "Section,Table,Round,NSPair,EWPair,LowBoard,HighBoard,CustomBoardNumber\n\
         1,1,1,1,2,1,1,1\n\
         1,2,1,3,4,1,1,1\n",
    )
    .unwrap();
    let summary = run(fixture.config()).await;

    assert_eq!(summary.bundles_written, 1);
    assert_eq!(summary.bundles_deleted, 1);
    assert!(fixture.site.join("bidding-data/t_bidding_001.json").is_file());
    assert!(!fixture.site.join("bidding-data/t_bidding_002.json").exists());
    assert!(fixture.read("t001.html").contains("rel=\"bidding-file\""));
    assert!(!fixture.read("t002.html").contains("rel=\"bidding-file\""));
}

#[tokio::test]
async fn blocked_bundle_directory_only_skips_compression() {
    let fixture = Fixture::new();
    fs::write(fixture.site.join("bidding-data"), "not a directory").unwrap();

    let summary = run_with_config(fixture.config())
        .await
        .expect("run completes without bundles");

    assert_eq!(summary.bundles_written, 0);
    assert_eq!(summary.fragments_written, 2);
    assert_eq!(summary.links_injected, 2);
    assert!(fixture.site.join("t_bidding_001_1_2.txt").is_file());
    assert!(fixture.site.join("t_bidding_002_3_4.txt").is_file());
    assert!(fixture.read("t001.txt").contains("data-bidding-link=\"1_2\""));
    assert!(!fixture.read("t001.html").contains("rel=\"bidding-file\""));
    assert!(fixture.read("t001.html").contains("javas/bidding.js"));
    assert!(fixture.site.join(".t_bidding_state.json").is_file());
}

#[tokio::test]
async fn changed_files_are_pushed_once() {
    let fixture = Fixture::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let receiver = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = String::new();
        socket.read_to_string(&mut received).await.unwrap();
        received
    });

    let mut config = fixture.config();
    config.goniec = Some(GoniecTarget {
        host: "127.0.0.1".to_string(),
        port,
    });

    let summary = run(config.clone()).await;
    assert_eq!(summary.push_state, Some(PushState::Closed));
    assert!(summary.files_pushed > 0);

    let received = receiver.await.unwrap();
    let lines: Vec<&str> = received.split('\n').collect();
    assert_eq!(lines[0], format!("{}{}", fixture.site.display(), std::path::MAIN_SEPARATOR));
    assert!(lines.contains(&"t001.html"));
    assert!(lines.contains(&"t002.txt"));
    assert!(received.ends_with("\nbye\n"));

    let summary = run(config).await;
    assert_eq!(summary.files_pushed, 0);
    assert_eq!(summary.push_state, Some(PushState::Idle));
}

#[tokio::test]
async fn missing_export_aborts_before_writing() {
    let fixture = Fixture::new();
    let before = fixture.snapshot();
    let mut config = fixture.config();
    config.source_dir = fixture.export.join("missing");

    let err = run_with_config(config).await.unwrap_err();

    assert!(err.is_fatal_source());
    assert_eq!(fixture.snapshot(), before);
}
