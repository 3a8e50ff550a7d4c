use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::RunAccession;
use crate::error::FetchError;
use crate::process::{self, Toolkit};
use crate::registry::DatasetRegistry;

pub trait RunResolver: Send + Sync {
    /// Run accessions for `bioproject`; empty means "no runs available", never an error.
    fn resolve_runs(&self, bioproject: &str) -> Vec<RunAccession>;
}

impl<T: RunResolver + ?Sized> RunResolver for Arc<T> {
    fn resolve_runs(&self, bioproject: &str) -> Vec<RunAccession> {
        (**self).resolve_runs(bioproject)
    }
}

pub trait RunSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn runs(&self, bioproject: &str) -> Result<Vec<RunAccession>, FetchError>;
}

pub struct EntrezSource {
    esearch: PathBuf,
    efetch: PathBuf,
    timeout: Duration,
}

impl EntrezSource {
    pub fn new(esearch: PathBuf, efetch: PathBuf, timeout: Duration) -> Self {
        Self {
            esearch,
            efetch,
            timeout,
        }
    }
}

impl RunSource for EntrezSource {
    fn name(&self) -> &'static str {
        "entrez"
    }

    fn runs(&self, bioproject: &str) -> Result<Vec<RunAccession>, FetchError> {
        let query = format!("{bioproject}[BioProject]");
        let mut search = Command::new(&self.esearch);
        search.args(["-db", "sra", "-query", query.as_str()]);
        let mut fetch = Command::new(&self.efetch);
        fetch.args(["-format", "runinfo"]);

        let output = process::run_pipeline(search, fetch, "esearch | efetch", self.timeout)?
            .into_result("esearch | efetch")?;
        Ok(parse_runinfo(&output.stdout))
    }
}

pub struct KnownRunsSource {
    registry: Arc<DatasetRegistry>,
}

impl KnownRunsSource {
    pub fn new(registry: Arc<DatasetRegistry>) -> Self {
        Self { registry }
    }
}

impl RunSource for KnownRunsSource {
    fn name(&self) -> &'static str {
        "known-runs"
    }

    fn runs(&self, bioproject: &str) -> Result<Vec<RunAccession>, FetchError> {
        let runs = self.registry.example_runs(bioproject);
        if !runs.is_empty() {
            warn!(
                bioproject,
                count = runs.len(),
                "using built-in example runs; these are not a complete listing"
            );
        }
        Ok(runs)
    }
}

pub fn parse_runinfo(text: &str) -> Vec<RunAccession> {
    text.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| line.split(',').next())
        .filter_map(|first| first.trim().parse().ok())
        .collect()
}

pub struct SourceChain {
    sources: Vec<Box<dyn RunSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Box<dyn RunSource>>) -> Self {
        Self { sources }
    }

    pub fn system(toolkit: &Toolkit, registry: Arc<DatasetRegistry>, timeout: Duration) -> Self {
        let mut sources: Vec<Box<dyn RunSource>> = Vec::new();
        if let (Some(esearch), Some(efetch)) = (&toolkit.esearch, &toolkit.efetch) {
            sources.push(Box::new(EntrezSource::new(
                esearch.clone(),
                efetch.clone(),
                timeout,
            )));
        }
        sources.push(Box::new(KnownRunsSource::new(registry)));
        Self::new(sources)
    }
}

impl RunResolver for SourceChain {
    fn resolve_runs(&self, bioproject: &str) -> Vec<RunAccession> {
        info!(bioproject, "searching for runs");
        for source in &self.sources {
            match source.runs(bioproject) {
                Ok(runs) if !runs.is_empty() => {
                    info!(bioproject, source = source.name(), count = runs.len(), "found runs");
                    return runs;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(bioproject, source = source.name(), "run discovery failed: {err}");
                }
            }
        }
        warn!(bioproject, "no runs available");
        Vec::new()
    }
}
