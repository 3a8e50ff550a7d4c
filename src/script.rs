use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::fs_util;
use crate::registry::{DatasetDescriptor, DatasetRegistry};

const RUNS_PER_BIOPROJECT: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct RenderedScript {
    #[serde(skip)]
    pub text: String,
    pub datasets: Vec<String>,
    pub skipped: Vec<String>,
    pub total_size_gb: u64,
}

pub fn render_script(
    registry: &DatasetRegistry,
    ids: &[String],
    generated_at: DateTime<Utc>,
) -> RenderedScript {
    let mut out = String::new();
    push_header(&mut out, generated_at);

    let mut datasets = Vec::new();
    let mut skipped = Vec::new();
    let mut total_size_gb = 0;
    for id in ids {
        let Some(dataset) = registry.lookup(id) else {
            warn!("skipping unknown dataset id: {id}");
            skipped.push(id.clone());
            continue;
        };
        total_size_gb += dataset.size_upper_bound_gb().unwrap_or(0);
        push_dataset(&mut out, registry, dataset);
        datasets.push(dataset.id.clone());
    }

    push_footer(&mut out, total_size_gb);
    RenderedScript {
        text: out,
        datasets,
        skipped,
        total_size_gb,
    }
}

pub fn write_script(
    registry: &DatasetRegistry,
    ids: &[String],
    path: &Path,
) -> Result<RenderedScript, FetchError> {
    if ids.is_empty() {
        return Err(FetchError::MissingArgument(
            "--datasets required when using --create-script".to_string(),
        ));
    }
    let rendered = render_script(registry, ids, Utc::now());
    fs_util::write_atomic(path, rendered.text.as_bytes())?;
    fs_util::make_executable(path)?;

    info!("download script created: {}", path.display());
    info!("estimated total download size: ~{} GB", rendered.total_size_gb);
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("execute with: cd {} && ./{name}", dir.display());
    }
    Ok(rendered)
}

fn push_header(out: &mut String, generated_at: DateTime<Utc>) {
    out.push_str("#!/bin/bash\n");
    out.push_str("# Generated script for downloading DNA methylation datasets\n");
    let _ = writeln!(
        out,
        "# Generated by methylseq-fetch {} at {}",
        env!("CARGO_PKG_VERSION"),
        generated_at.to_rfc3339()
    );
    out.push_str("# Usage: ./download_script.sh\n\n");
    out.push_str("set -e  # Exit on error\n");
    out.push_str("set -u  # Exit on undefined variable\n\n");
    out.push_str("command_exists() {\n");
    out.push_str("    command -v \"$1\" >/dev/null 2>&1\n");
    out.push_str("}\n\n");
    out.push_str("if ! command_exists fasterq-dump && ! command_exists fastq-dump; then\n");
    out.push_str("    echo \"Error: SRA Toolkit not found. Please install sra-tools.\"\n");
    out.push_str("    echo \"Visit: https://github.com/ncbi/sra-tools\"\n");
    out.push_str("    exit 1\n");
    out.push_str("fi\n\n");
    out.push_str("# Same preference order as methylseq-fetch itself\n");
    out.push_str("if command_exists fasterq-dump; then\n");
    out.push_str("    DOWNLOAD_TOOL=\"fasterq-dump\"\n");
    out.push_str("    DOWNLOAD_ARGS=\"--split-files --progress --threads 2\"\n");
    out.push_str("else\n");
    out.push_str("    DOWNLOAD_TOOL=\"fastq-dump\"\n");
    out.push_str("    DOWNLOAD_ARGS=\"--split-files --gzip\"\n");
    out.push_str("fi\n\n");
    out.push_str("echo \"Using $DOWNLOAD_TOOL for downloads\"\n");
    out.push_str("echo \"Started at: $(date)\"\n\n");
}

fn push_dataset(out: &mut String, registry: &DatasetRegistry, dataset: &DatasetDescriptor) {
    let id = &dataset.id;
    let _ = writeln!(out, "# Dataset: {}", dataset.description);
    let _ = writeln!(out, "# Method: {}", dataset.method);
    let _ = writeln!(out, "# Estimated size: {} GB", dataset.estimated_size_gb);
    let _ = writeln!(out, "# Estimated samples: {}", dataset.estimated_samples);
    let _ = writeln!(out, "echo \"Starting dataset: {}\"", dataset.description);
    let _ = writeln!(out, "mkdir -p {id}\n");

    for bioproject in &dataset.bioprojects {
        let dir = format!("{id}/{bioproject}");
        let _ = writeln!(out, "# BioProject: {bioproject}");
        let _ = writeln!(out, "echo \"Processing BioProject {bioproject}...\"");
        let _ = writeln!(out, "mkdir -p {dir}");

        let runs = registry.example_runs(bioproject);
        if runs.is_empty() {
            let _ = writeln!(out, "# No example runs available for {bioproject}");
            out.push_str("# Manual run discovery required\n\n");
            continue;
        }

        out.push_str("# Option 1: Download example runs (for testing)\n");
        for run in runs.iter().take(RUNS_PER_BIOPROJECT) {
            let _ = writeln!(out, "echo \"Downloading run {run}...\"");
            let _ = writeln!(out, "$DOWNLOAD_TOOL $DOWNLOAD_ARGS --outdir {dir} {run}");
            let _ = writeln!(
                out,
                "[ \"$DOWNLOAD_TOOL\" = \"fasterq-dump\" ] && gzip {dir}/{run}*.fastq 2>/dev/null || true\n"
            );
        }

        out.push_str("# Option 2: Query for all runs and download\n");
        out.push_str("# Uncomment the following lines to download all runs:\n");
        out.push_str("# if command_exists esearch && command_exists efetch; then\n");
        let _ = writeln!(out, "#     echo \"Querying all runs for {bioproject}...\"");
        let _ = writeln!(out, "#     esearch -db sra -query '{bioproject}[BioProject]' | \\");
        out.push_str("#         efetch -format runinfo | \\\n");
        out.push_str("#         cut -d',' -f1 | \\\n");
        out.push_str("#         tail -n +2 | \\\n");
        out.push_str("#         while read run; do\n");
        out.push_str("#             echo \"Downloading $run...\"\n");
        let _ = writeln!(out, "#             $DOWNLOAD_TOOL $DOWNLOAD_ARGS --outdir {dir} $run");
        let _ = writeln!(
            out,
            "#             [ \"$DOWNLOAD_TOOL\" = \"fasterq-dump\" ] && gzip {dir}/$run*.fastq 2>/dev/null || true"
        );
        out.push_str("#         done\n");
        out.push_str("# else\n");
        out.push_str("#     echo \"Entrez Direct tools not available for automated run discovery\"\n");
        out.push_str("# fi\n\n");
    }
}

fn push_footer(out: &mut String, total_size_gb: u64) {
    out.push_str("# Summary\n");
    out.push_str("echo \"Download script completed at: $(date)\"\n");
    let _ = writeln!(out, "echo \"Estimated total size: ~{total_size_gb} GB\"");
    out.push_str("echo \"Check individual dataset directories for downloaded files\"\n");
    out.push_str("echo \"Compress large files with: find . -name '*.fastq' -exec gzip {} \\;\"\n\n");
    out.push_str("# Optional: Verify downloads\n");
    out.push_str("echo \"Verifying downloads...\"\n");
    out.push_str("find . -name '*.fastq*' -type f | wc -l | xargs echo \"Total FASTQ files:\"\n");
    out.push_str("du -sh */ 2>/dev/null | sort -h\n");
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn bioprojects_without_examples_get_a_manual_note() {
        let mut dataset = DatasetRegistry::builtin()
            .lookup("medip_seq")
            .cloned()
            .unwrap();
        dataset.bioprojects = vec!["PRJNA999999".to_string()];
        let registry = DatasetRegistry::new(vec![dataset], Vec::new());

        let rendered = render_script(&registry, &["medip_seq".to_string()], fixed_time());
        assert!(rendered.text.contains("# No example runs available for PRJNA999999"));
        assert!(!rendered.text.contains("Option 1"));
    }

    #[test]
    fn unknown_ids_are_skipped() {
        let registry = DatasetRegistry::builtin();
        let ids = vec!["bogus".to_string(), "medip_seq".to_string()];
        let rendered = render_script(&registry, &ids, fixed_time());
        assert_eq!(rendered.datasets, vec!["medip_seq".to_string()]);
        assert_eq!(rendered.skipped, vec!["bogus".to_string()]);
        assert_eq!(rendered.total_size_gb, 60);
    }

    #[test]
    fn example_runs_are_capped_per_bioproject() {
        let registry = DatasetRegistry::builtin();
        let rendered = render_script(&registry, &["wgbs_roberts".to_string()], fixed_time());
        let downloads = rendered
            .text
            .lines()
            .filter(|line| line.starts_with("$DOWNLOAD_TOOL"))
            .count();
        assert_eq!(downloads, 2 * RUNS_PER_BIOPROJECT);
        assert!(rendered.text.contains("2024-12-01T00:00:00+00:00"));
    }
}
