use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::{DownloadOutcome, RunAccession};
use crate::error::FetchError;
use crate::fs_util;
use crate::process::{self, ToolInfo, Toolkit};

pub trait RunFetcher: Send + Sync {
    fn fetch_run(&self, run: &RunAccession, destination_dir: &Path) -> DownloadOutcome;
}

impl<T: RunFetcher + ?Sized> RunFetcher for Arc<T> {
    fn fetch_run(&self, run: &RunAccession, destination_dir: &Path) -> DownloadOutcome {
        (**self).fetch_run(run, destination_dir)
    }
}

pub trait DownloadTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn download(&self, run: &RunAccession, destination_dir: &Path) -> Result<(), FetchError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub threads: usize,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            threads: 2,
            timeout: Duration::from_secs(3600),
        }
    }
}

pub struct FasterqDump {
    program: PathBuf,
    settings: FetchSettings,
}

impl FasterqDump {
    pub fn new(program: PathBuf, settings: FetchSettings) -> Self {
        Self { program, settings }
    }

    pub fn args(run: &RunAccession, destination_dir: &Path, threads: usize) -> Vec<String> {
        vec![
            "--split-files".to_string(),
            "--outdir".to_string(),
            destination_dir.to_string_lossy().to_string(),
            "--progress".to_string(),
            "--threads".to_string(),
            threads.to_string(),
            run.as_str().to_string(),
        ]
    }
}

impl DownloadTool for FasterqDump {
    fn name(&self) -> &'static str {
        "fasterq-dump"
    }

    fn download(&self, run: &RunAccession, destination_dir: &Path) -> Result<(), FetchError> {
        let args = Self::args(run, destination_dir, self.settings.threads);
        info!("executing: {}", process::render_command(self.name(), &args));
        process::run_with_timeout(
            Command::new(&self.program).args(&args),
            self.name(),
            self.settings.timeout,
        )?
        .into_result(self.name())?;

        // fasterq-dump writes plain FASTQ; compress to match fastq-dump --gzip.
        for fastq in fs_util::find_uncompressed_fastq(destination_dir, run) {
            info!("compressing {}", fastq.display());
            fs_util::gzip_in_place(&fastq)?;
        }
        Ok(())
    }
}

pub struct FastqDump {
    program: PathBuf,
    settings: FetchSettings,
}

impl FastqDump {
    pub fn new(program: PathBuf, settings: FetchSettings) -> Self {
        Self { program, settings }
    }

    pub fn args(run: &RunAccession, destination_dir: &Path) -> Vec<String> {
        vec![
            "--split-files".to_string(),
            "--gzip".to_string(),
            "--outdir".to_string(),
            destination_dir.to_string_lossy().to_string(),
            run.as_str().to_string(),
        ]
    }
}

impl DownloadTool for FastqDump {
    fn name(&self) -> &'static str {
        "fastq-dump"
    }

    fn download(&self, run: &RunAccession, destination_dir: &Path) -> Result<(), FetchError> {
        let args = Self::args(run, destination_dir);
        info!("executing: {}", process::render_command(self.name(), &args));
        process::run_with_timeout(
            Command::new(&self.program).args(&args),
            self.name(),
            self.settings.timeout,
        )?
        .into_result(self.name())?;
        Ok(())
    }
}

pub struct SystemSrrClient {
    tools: Vec<Box<dyn DownloadTool>>,
    settings: FetchSettings,
    tool_info: ToolInfo,
}

impl SystemSrrClient {
    pub fn new(toolkit: &Toolkit, settings: FetchSettings) -> Self {
        let mut tools: Vec<Box<dyn DownloadTool>> = Vec::new();
        if let Some(path) = &toolkit.fasterq_dump {
            tools.push(Box::new(FasterqDump::new(path.clone(), settings)));
        }
        if let Some(path) = &toolkit.fastq_dump {
            tools.push(Box::new(FastqDump::new(path.clone(), settings)));
        }
        Self::with_tools(tools, settings, toolkit.tool_info())
    }

    pub fn with_tools(
        tools: Vec<Box<dyn DownloadTool>>,
        settings: FetchSettings,
        tool_info: ToolInfo,
    ) -> Self {
        Self {
            tools,
            settings,
            tool_info,
        }
    }

    pub fn tool_info(&self) -> &ToolInfo {
        &self.tool_info
    }

    pub fn manual_commands(&self, run: &RunAccession, destination_dir: &Path) -> [String; 2] {
        let mut fasterq = FasterqDump::args(run, destination_dir, self.settings.threads);
        // Manual runs use the tool's own thread default.
        fasterq.drain(4..6);
        [
            process::render_command("fasterq-dump", &fasterq),
            process::render_command("fastq-dump", &FastqDump::args(run, destination_dir)),
        ]
    }

    fn write_instructions(
        &self,
        run: &RunAccession,
        destination_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let [fasterq, fastq] = self.manual_commands(run, destination_dir);
        warn!("SRA Toolkit not available. Generated commands for {run}:");
        warn!("  {fasterq}");
        warn!("  # OR: {fastq}");

        let path = destination_dir.join(format!("{run}_DOWNLOAD_REQUIRED.txt"));
        let content = format!(
            "Run {run} requires manual download\nCommands:\n{fasterq}\n{fastq}\n"
        );
        fs_util::write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }
}

impl RunFetcher for SystemSrrClient {
    fn fetch_run(&self, run: &RunAccession, destination_dir: &Path) -> DownloadOutcome {
        info!("downloading run: {run}");
        if !fs_util::find_run_files(destination_dir, run).is_empty() {
            info!("run {run} already exists, skipping");
            return DownloadOutcome::Skipped;
        }
        if let Err(err) = fs_util::ensure_dir(destination_dir) {
            return DownloadOutcome::Failed {
                reason: err.to_string(),
            };
        }

        if self.tools.is_empty() {
            return match self.write_instructions(run, destination_dir) {
                Ok(path) => DownloadOutcome::InstructionsWritten { path },
                Err(err) => DownloadOutcome::Failed {
                    reason: err.to_string(),
                },
            };
        }

        let mut last_error = None;
        for tool in &self.tools {
            match tool.download(run, destination_dir) {
                Ok(()) => {
                    info!("successfully downloaded {run} with {}", tool.name());
                    return DownloadOutcome::Downloaded;
                }
                Err(err) => {
                    warn!("{} failed for {run}: {err}", tool.name());
                    last_error = Some(err);
                }
            }
        }

        let reason = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no download tool succeeded".to_string());
        error!("all download methods failed for {run}: {reason}");
        DownloadOutcome::Failed { reason }
    }
}
