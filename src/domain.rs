use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

// SRA, ENA and DDBJ run prefixes.
fn run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(SRR|ERR|DRR)[0-9]+$").expect("valid run regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunAccession(String);

impl RunAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunAccession {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !run_pattern().is_match(&normalized) {
            return Err(FetchError::InvalidRunAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Downloaded,
    Skipped,
    /// No download tool was available; a marker file with manual commands was written.
    InstructionsWritten { path: PathBuf },
    Failed { reason: String },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadOutcome::Downloaded => "downloaded",
            DownloadOutcome::Skipped => "skipped",
            DownloadOutcome::InstructionsWritten { .. } => "instructions",
            DownloadOutcome::Failed { .. } => "failed",
        }
    }
}
