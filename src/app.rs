use std::path::Path;
use std::sync::Arc;

use camino::Utf8PathBuf;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::{DownloadOutcome, RunAccession};
use crate::error::FetchError;
use crate::fs_util;
use crate::registry::{DatasetDescriptor, DatasetRegistry};
use crate::resolver::RunResolver;
use crate::srr::RunFetcher;

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub bioproject: Option<String>,
    pub max_runs: Option<usize>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub dataset_dir: String,
    pub dry_run: bool,
    pub bioprojects: Vec<BioprojectReport>,
}

impl DatasetReport {
    pub fn success(&self) -> bool {
        self.bioprojects
            .iter()
            .flat_map(|bioproject| &bioproject.runs)
            .all(|run| run.outcome.is_success())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BioprojectReport {
    pub bioproject: String,
    pub runs: Vec<RunReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: RunAccession,
    pub outcome: DownloadOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub datasets: Vec<DatasetDescriptor>,
}

impl ListResult {
    pub fn from_registry(registry: &DatasetRegistry) -> Self {
        Self {
            datasets: registry.list_all().to_vec(),
        }
    }
}

#[derive(Clone)]
pub struct App<R: RunResolver, F: RunFetcher> {
    registry: Arc<DatasetRegistry>,
    resolver: R,
    fetcher: F,
    output_dir: Utf8PathBuf,
    pool: Option<Arc<ThreadPool>>,
}

impl<R: RunResolver, F: RunFetcher> App<R, F> {
    pub fn new(
        registry: Arc<DatasetRegistry>,
        resolver: R,
        fetcher: F,
        output_dir: Utf8PathBuf,
        max_parallel: usize,
    ) -> Self {
        Self {
            registry,
            resolver,
            fetcher,
            output_dir,
            pool: build_pool(max_parallel),
        }
    }

    pub fn output_dir(&self) -> &Utf8PathBuf {
        &self.output_dir
    }

    pub fn list(&self) -> ListResult {
        ListResult::from_registry(&self.registry)
    }

    pub fn download_dataset(
        &self,
        dataset_id: &str,
        options: &DownloadOptions,
    ) -> Result<DatasetReport, FetchError> {
        let Some(dataset) = self.registry.lookup(dataset_id) else {
            error!("unknown dataset id: {dataset_id}");
            return Err(FetchError::UnknownDataset(dataset_id.to_string()));
        };
        info!("starting download for dataset: {}", dataset.description);

        let dataset_dir = self.output_dir.join(&dataset.id);
        fs_util::ensure_dir(dataset_dir.as_std_path())?;
        let metadata = serde_json::to_vec_pretty(dataset)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        fs_util::write_atomic(
            dataset_dir.join("dataset_info.json").as_std_path(),
            &metadata,
        )?;

        let bioprojects = match &options.bioproject {
            Some(bioproject) => vec![bioproject.clone()],
            None => dataset.bioprojects.clone(),
        };

        let mut reports = Vec::with_capacity(bioprojects.len());
        for bioproject in bioprojects {
            info!("processing bioproject: {bioproject}");
            if options.dry_run {
                info!("DRY RUN: would download data from {bioproject}");
                reports.push(BioprojectReport {
                    bioproject,
                    runs: Vec::new(),
                });
                continue;
            }

            let mut runs = self.resolver.resolve_runs(&bioproject);
            if runs.is_empty() {
                warn!("no runs found for bioproject {bioproject}");
                reports.push(BioprojectReport {
                    bioproject,
                    runs: Vec::new(),
                });
                continue;
            }
            if let Some(limit) = options.max_runs.filter(|limit| *limit > 0) {
                if runs.len() > limit {
                    runs.truncate(limit);
                    info!("limiting to {limit} runs");
                }
            }

            let results = self.fetch_all(&runs, dataset_dir.as_std_path());
            for result in &results {
                if let DownloadOutcome::Failed { reason } = &result.outcome {
                    error!("failed to download run {}: {reason}", result.run);
                }
            }
            reports.push(BioprojectReport {
                bioproject,
                runs: results,
            });
        }

        Ok(DatasetReport {
            dataset: dataset.id.clone(),
            dataset_dir: dataset_dir.to_string(),
            dry_run: options.dry_run,
            bioprojects: reports,
        })
    }

    // Runs fan out over the shared pool; results keep resolver order.
    fn fetch_all(&self, runs: &[RunAccession], destination: &Path) -> Vec<RunReport> {
        let fetch = |run: &RunAccession| RunReport {
            run: run.clone(),
            outcome: self.fetcher.fetch_run(run, destination),
        };
        match &self.pool {
            Some(pool) if runs.len() > 1 => pool.install(|| runs.par_iter().map(fetch).collect()),
            _ => runs.iter().map(fetch).collect(),
        }
    }
}

fn build_pool(max_parallel: usize) -> Option<Arc<ThreadPool>> {
    if max_parallel <= 1 {
        return None;
    }
    match ThreadPoolBuilder::new()
        .num_threads(max_parallel)
        .thread_name(|index| format!("fetch-{index}"))
        .build()
    {
        Ok(pool) => Some(Arc::new(pool)),
        Err(err) => {
            warn!("worker pool unavailable, downloading sequentially: {err}");
            None
        }
    }
}
