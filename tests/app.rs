use std::path::Path;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use methylseq_fetch::app::{App, DownloadOptions, ListResult};
use methylseq_fetch::domain::{DownloadOutcome, RunAccession};
use methylseq_fetch::error::FetchError;
use methylseq_fetch::registry::DatasetRegistry;
use methylseq_fetch::resolver::RunResolver;
use methylseq_fetch::srr::RunFetcher;

#[derive(Default)]
struct MockResolver {
    runs: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl MockResolver {
    fn returning(runs: &[&'static str]) -> Self {
        Self {
            runs: runs.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl RunResolver for MockResolver {
    fn resolve_runs(&self, bioproject: &str) -> Vec<RunAccession> {
        self.calls.lock().unwrap().push(bioproject.to_string());
        self.runs.iter().map(|run| run.parse().unwrap()).collect()
    }
}

#[derive(Default)]
struct MockFetcher {
    calls: Mutex<Vec<(RunAccession, std::path::PathBuf)>>,
}

impl RunFetcher for MockFetcher {
    fn fetch_run(&self, run: &RunAccession, destination_dir: &Path) -> DownloadOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((run.clone(), destination_dir.to_path_buf()));
        DownloadOutcome::Downloaded
    }
}

struct Harness {
    _temp: tempfile::TempDir,
    root: Utf8PathBuf,
    resolver: Arc<MockResolver>,
    fetcher: Arc<MockFetcher>,
    app: App<Arc<MockResolver>, Arc<MockFetcher>>,
}

fn harness(runs: &[&'static str]) -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("methylation_data")).unwrap();
    let resolver = Arc::new(MockResolver::returning(runs));
    let fetcher = Arc::new(MockFetcher::default());
    let app = App::new(
        Arc::new(DatasetRegistry::builtin()),
        resolver.clone(),
        fetcher.clone(),
        root.clone(),
        2,
    );
    Harness {
        _temp: temp,
        root,
        resolver,
        fetcher,
        app,
    }
}

#[test]
fn unknown_dataset_invokes_nothing() {
    let h = harness(&["SRR1"]);
    let err = h
        .app
        .download_dataset("no_such_dataset", &DownloadOptions::default())
        .unwrap_err();

    assert_matches!(err, FetchError::UnknownDataset(ref id) if id == "no_such_dataset");
    assert!(h.resolver.calls.lock().unwrap().is_empty());
    assert!(h.fetcher.calls.lock().unwrap().is_empty());
}

#[test]
fn one_run_per_bioproject_with_max_runs_one() {
    let h = harness(&["SRR1", "SRR2", "SRR3"]);
    let options = DownloadOptions {
        max_runs: Some(1),
        ..DownloadOptions::default()
    };

    let report = h.app.download_dataset("rrbs_developmental", &options).unwrap();

    assert!(report.success());
    assert_eq!(
        *h.resolver.calls.lock().unwrap(),
        vec!["PRJNA486983".to_string(), "PRJNA273482".to_string()]
    );
    let calls = h.fetcher.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(run, _)| run.as_str() == "SRR1"));
    assert!(
        calls
            .iter()
            .all(|(_, dir)| dir == h.root.join("rrbs_developmental").as_std_path())
    );
}

#[test]
fn max_runs_keeps_short_lists_unchanged() {
    let h = harness(&["SRR1", "SRR2"]);
    let options = DownloadOptions {
        bioproject: Some("PRJNA486983".to_string()),
        max_runs: Some(5),
        ..DownloadOptions::default()
    };

    let report = h.app.download_dataset("rrbs_developmental", &options).unwrap();
    assert_eq!(report.bioprojects.len(), 1);
    assert_eq!(report.bioprojects[0].runs.len(), 2);
}

#[test]
fn max_runs_truncates_in_resolver_order() {
    let h = harness(&["SRR9", "SRR8", "SRR7", "SRR6"]);
    let options = DownloadOptions {
        bioproject: Some("PRJNA486983".to_string()),
        max_runs: Some(2),
        ..DownloadOptions::default()
    };

    let report = h.app.download_dataset("rrbs_developmental", &options).unwrap();
    let runs: Vec<&str> = report.bioprojects[0]
        .runs
        .iter()
        .map(|run| run.run.as_str())
        .collect();
    assert_eq!(runs, vec!["SRR9", "SRR8"]);
}

#[test]
fn dry_run_never_resolves_or_fetches() {
    let h = harness(&["SRR1"]);
    let options = DownloadOptions {
        dry_run: true,
        ..DownloadOptions::default()
    };

    let report = h.app.download_dataset("wgbs_roberts", &options).unwrap();

    assert!(report.success());
    assert_eq!(report.bioprojects.len(), 2);
    assert!(h.resolver.calls.lock().unwrap().is_empty());
    assert!(h.fetcher.calls.lock().unwrap().is_empty());
}

#[test]
fn empty_resolution_is_not_a_failure() {
    let h = harness(&[]);
    let report = h
        .app
        .download_dataset("medip_seq", &DownloadOptions::default())
        .unwrap();

    assert!(report.success());
    assert_eq!(h.resolver.calls.lock().unwrap().len(), 2);
    assert!(h.fetcher.calls.lock().unwrap().is_empty());
}

#[test]
fn dataset_info_json_is_written() {
    let h = harness(&[]);
    let options = DownloadOptions {
        dry_run: true,
        ..DownloadOptions::default()
    };
    h.app.download_dataset("wgbs_roberts", &options).unwrap();

    let path = h.root.join("wgbs_roberts").join("dataset_info.json");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path.as_std_path()).unwrap()).unwrap();
    assert_eq!(json["id"], "wgbs_roberts");
    assert_eq!(json["method"], "WGBS");
    assert_eq!(json["estimated_size_gb"], "200-400");
    assert_eq!(json["bioprojects"][1], "PRJNA394801");
}

#[test]
fn bioproject_filter_replaces_descriptor_list() {
    let h = harness(&["SRR1"]);
    let options = DownloadOptions {
        bioproject: Some("PRJNA999999".to_string()),
        ..DownloadOptions::default()
    };

    h.app.download_dataset("wgbs_roberts", &options).unwrap();
    assert_eq!(
        *h.resolver.calls.lock().unwrap(),
        vec!["PRJNA999999".to_string()]
    );
}

#[test]
fn list_returns_every_dataset() {
    let h = harness(&[]);
    let result = h.app.list();
    assert_eq!(result.datasets.len(), 7);
    assert!(result.datasets.iter().any(|dataset| dataset.id == "wgbs_roberts"));
    assert!(!h.root.exists());
    assert_eq!(
        ListResult::from_registry(&DatasetRegistry::builtin()).datasets.len(),
        result.datasets.len()
    );
}
