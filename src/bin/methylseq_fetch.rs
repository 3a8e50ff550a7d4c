use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use camino::Utf8Path;
use clap::{CommandFactory, Parser};
use miette::IntoDiagnostic;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use methylseq_fetch::app::{App, DownloadOptions, ListResult};
use methylseq_fetch::config::{ConfigLoader, Overrides, Settings};
use methylseq_fetch::error::FetchError;
use methylseq_fetch::output::{JsonOutput, OutputMode, TextOutput};
use methylseq_fetch::process::Toolkit;
use methylseq_fetch::registry::DatasetRegistry;
use methylseq_fetch::resolver::SourceChain;
use methylseq_fetch::script;
use methylseq_fetch::srr::{FetchSettings, SystemSrrClient};

#[derive(Parser)]
#[command(name = "methylseq-fetch")]
#[command(about = "Download DNA methylation datasets for Crassostrea/Magallana gigas")]
#[command(version)]
#[command(after_help = "Examples:
  methylseq-fetch --list
  methylseq-fetch --dataset wgbs_roberts
  methylseq-fetch --dataset rrbs_developmental --bioproject PRJNA486983 --max-runs 5
  methylseq-fetch --create-script --datasets wgbs_roberts rrbs_developmental
  methylseq-fetch --dataset medip_seq --dry-run")]
struct Cli {
    #[arg(long, help = "List all available datasets")]
    list: bool,

    #[arg(long, help = "Dataset ID to download")]
    dataset: Option<String>,

    #[arg(long, help = "Specific BioProject to download")]
    bioproject: Option<String>,

    #[arg(long, help = "Maximum number of runs to download per BioProject")]
    max_runs: Option<usize>,

    #[arg(long, help = "Show what would be downloaded without downloading")]
    dry_run: bool,

    #[arg(long, help = "Create a shell script for downloading datasets")]
    create_script: bool,

    #[arg(long, num_args = 1.., help = "Dataset IDs for script generation")]
    datasets: Vec<String>,

    #[arg(long, default_value = "download_script.sh", help = "File name of the generated script")]
    script_name: String,

    #[arg(long, help = "Output directory for downloaded data [default: ./methylation_data]")]
    output_dir: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u16).range(1..), help = "Maximum number of parallel downloads [default: 2]")]
    max_parallel: Option<u16>,

    #[arg(long, value_parser = clap::value_parser!(u16).range(1..), help = "Threads passed to fasterq-dump [default: 2]")]
    threads: Option<u16>,

    #[arg(long, help = "JSON config file (defaults to ./methylseq-fetch.json when present)")]
    config: Option<String>,

    #[arg(long, help = "Also append log lines to this file")]
    log_file: Option<String>,

    #[arg(long, help = "Print results as JSON")]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = ConfigLoader::resolve(
        cli.config.as_deref(),
        Overrides {
            output_dir: cli.output_dir.clone(),
            max_parallel: cli.max_parallel.map(usize::from),
            threads: cli.threads.map(usize::from),
            log_file: cli.log_file.clone(),
        },
    )?;
    init_tracing(settings.log_file.as_deref())?;

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let registry = Arc::new(DatasetRegistry::builtin());

    if cli.list {
        let result = ListResult::from_registry(&registry);
        match output_mode {
            OutputMode::Json => JsonOutput::print_list(&result).into_diagnostic()?,
            OutputMode::Text => TextOutput::print_list(&result).into_diagnostic()?,
        }
        return Ok(ExitCode::SUCCESS);
    }

    if cli.create_script {
        if cli.datasets.is_empty() {
            error!("--datasets required when using --create-script");
            return Ok(ExitCode::from(1));
        }
        let path = settings.output_dir.join(&cli.script_name);
        let rendered = script::write_script(&registry, &cli.datasets, path.as_std_path())?;
        if matches!(output_mode, OutputMode::Json) {
            JsonOutput::print_script(&rendered).into_diagnostic()?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(dataset) = cli.dataset {
        let options = DownloadOptions {
            bioproject: cli.bioproject,
            max_runs: cli.max_runs,
            dry_run: cli.dry_run,
        };
        return run_download(&dataset, options, registry, settings, output_mode);
    }

    Cli::command().print_help().into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_download(
    dataset: &str,
    options: DownloadOptions,
    registry: Arc<DatasetRegistry>,
    settings: Settings,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let toolkit = Toolkit::detect();
    let resolver = SourceChain::system(&toolkit, registry.clone(), settings.query_timeout);
    let fetcher = SystemSrrClient::new(
        &toolkit,
        FetchSettings {
            threads: settings.threads,
            timeout: settings.download_timeout,
        },
    );
    debug!(tools = ?fetcher.tool_info(), "download tools resolved");
    let app = App::new(
        registry,
        resolver,
        fetcher,
        settings.output_dir,
        settings.max_parallel,
    );

    let report = match app.download_dataset(dataset, &options) {
        Ok(report) => report,
        Err(FetchError::UnknownDataset(_)) => return Ok(ExitCode::from(1)),
        Err(err) => return Err(err.into()),
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_report(&report).into_diagnostic()?,
    }
    if report.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn init_tracing(log_file: Option<&Utf8Path>) -> miette::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.as_std_path())
                .map_err(|err| FetchError::Filesystem(format!("open log file {path}: {err}")))?;
            builder
                .with_ansi(false)
                .with_writer(std::io::stderr.and(Mutex::new(file)))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
