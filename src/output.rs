use std::io::{self, Write};

use serde::Serialize;

use crate::app::{DatasetReport, ListResult};
use crate::domain::DownloadOutcome;
use crate::script::RenderedScript;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_report(result: &DatasetReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_script(result: &RenderedScript) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_list(result: &ListResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "\nAvailable DNA Methylation Datasets:")?;
        writeln!(stdout, "{}", "=".repeat(50))?;
        for dataset in &result.datasets {
            writeln!(stdout, "\nDataset ID: {}", dataset.id)?;
            writeln!(stdout, "Description: {}", dataset.description)?;
            writeln!(stdout, "Method: {}", dataset.method)?;
            writeln!(stdout, "BioProjects: {}", dataset.bioprojects.join(", "))?;
            writeln!(stdout, "Estimated Samples: {}", dataset.estimated_samples)?;
            writeln!(stdout, "Estimated Size: {} GB", dataset.estimated_size_gb)?;
            writeln!(stdout, "Tissue Types: {}", dataset.tissue_types.join(", "))?;
            writeln!(stdout, "Notes: {}", dataset.notes)?;
        }
        Ok(())
    }

    pub fn print_report(result: &DatasetReport) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        let status = if result.success() { "ok" } else { "with failures" };
        writeln!(stdout, "{} ({status})", result.dataset)?;
        for bioproject in &result.bioprojects {
            if result.dry_run {
                writeln!(stdout, "  {}: dry run", bioproject.bioproject)?;
                continue;
            }
            writeln!(
                stdout,
                "  {}: {} run(s)",
                bioproject.bioproject,
                bioproject.runs.len()
            )?;
            for run in &bioproject.runs {
                match &run.outcome {
                    DownloadOutcome::Failed { reason } => {
                        writeln!(stdout, "    {} failed: {reason}", run.run)?
                    }
                    DownloadOutcome::InstructionsWritten { path } => writeln!(
                        stdout,
                        "    {} needs manual download, see {}",
                        run.run,
                        path.display()
                    )?,
                    outcome => writeln!(stdout, "    {} {}", run.run, outcome.as_str())?,
                }
            }
        }
        Ok(())
    }
}
