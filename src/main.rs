use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use gene_compare::output::timestamped_dir;
use gene_compare::{ReportFormat, ReportGenerator, VariantAnalyzer};

/// Multithreaded pooled-sample variant comparison
#[derive(Parser, Debug)]
#[command(
    name = "gene-compare",
    version,
    about = "Find background and candidate mutations across pools of samples",
    long_about = r#"
Compares snpEff-annotated variant calls across pools of samples:
- Background mutations shared between pools
- Candidate positions shared between samples of one pool
- Candidate genes hit in several samples, with homozygosity ratios
- Flagged genes from curated gene lists

POOL_ROOT must contain one sub-directory per pool. An optional
gene_compare.yaml in POOL_ROOT configures filters, selected columns
and flagged gene lists.
"#
)]
struct Cli {
    /// Directory holding one sub-directory per pool
    #[arg(value_name = "POOL_ROOT", value_hint = ValueHint::DirPath)]
    pool_root: Option<PathBuf>,

    /// Parent directory for the timestamped report directory
    /// (default: next to POOL_ROOT)
    #[arg(short, long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "tsv")]
    format: OutputFormat,

    /// Number of worker threads (0 = auto-detect)
    #[arg(short, long, default_value = "1", help = "Number of threads (0 = auto)")]
    threads: usize,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Interactive mode with prompts for all parameters
    #[arg(short, long, help = "Interactive mode with default values")]
    interactive: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Tsv,
    Csv,
    Json,
    Html,
    All,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> ReportFormat {
        match format {
            OutputFormat::Tsv => ReportFormat::Tsv,
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Html => ReportFormat::Html,
            OutputFormat::All => ReportFormat::All,
        }
    }
}

#[derive(Debug)]
struct AppConfig {
    pool_root: PathBuf,
    output: Option<PathBuf>,
    format: OutputFormat,
    threads: usize,
}

impl AppConfig {
    fn from_cli(cli: &Cli, pool_root: PathBuf) -> Self {
        Self {
            pool_root,
            output: cli.output.clone(),
            format: cli.format,
            threads: cli.threads,
        }
    }

    fn workers(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// `<output or pool root parent>/<pool root name>.<timestamp>`
    fn report_dir(&self) -> PathBuf {
        let basename = self
            .pool_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "gene_compare".to_string());
        let parent = match &self.output {
            Some(output) => output.clone(),
            None => self
                .pool_root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        timestamped_dir(&parent, &basename)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match (&cli.pool_root, cli.interactive) {
        (Some(pool_root), false) => AppConfig::from_cli(&cli, pool_root.clone()),
        _ => run_interactive_mode(&cli)?,
    };

    run_analysis(config)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("gene_compare={}", level))
        .init();
}

fn run_interactive_mode(cli: &Cli) -> Result<AppConfig> {
    println!("{}", style("Gene Compare - Interactive Mode").cyan().bold());
    println!();

    let theme = ColorfulTheme::default();

    let default_root = cli
        .pool_root
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    let pool_root: String = Input::with_theme(&theme)
        .with_prompt("Pool root directory")
        .default(default_root)
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if Path::new(input).is_dir() {
                Ok(())
            } else {
                Err("Please choose a directory, not a specific file")
            }
        })
        .interact_text()?;

    let formats = vec!["TSV", "CSV", "JSON", "HTML", "All formats"];
    let format_idx = Select::with_theme(&theme)
        .with_prompt("Select output format")
        .default(0)
        .items(&formats)
        .interact()?;

    let format = match format_idx {
        0 => OutputFormat::Tsv,
        1 => OutputFormat::Csv,
        2 => OutputFormat::Json,
        3 => OutputFormat::Html,
        4 => OutputFormat::All,
        _ => OutputFormat::Tsv,
    };

    let threads: usize = Input::with_theme(&theme)
        .with_prompt("Number of threads (0 = auto-detect)")
        .default(cli.threads)
        .interact_text()?;

    Ok(AppConfig {
        pool_root: PathBuf::from(pool_root),
        output: cli.output.clone(),
        format,
        threads,
    })
}

fn run_analysis(config: AppConfig) -> Result<()> {
    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    pb.set_message("Reading configuration and discovering pools...");
    let analyzer = VariantAnalyzer::new(&config.pool_root, config.workers())
        .with_context(|| format!("Failed to configure analysis of {}", config.pool_root.display()))?;
    info!(
        "Found {} pools and {} importable files, using {} workers",
        analyzer.pools().len(),
        analyzer.planned_imports().len(),
        config.workers()
    );

    pb.set_message("Importing variant files...");
    let table = analyzer.load_tables()?;

    pb.set_message("Analysing mutations...");
    let report = analyzer.analyse(table)?;

    pb.set_message("Writing reports...");
    let generator = ReportGenerator::new(&config.report_dir())?;
    let files = generator.generate(&report, config.format.into())?;

    pb.finish_and_clear();

    println!(
        "{} {} sheets ({} files) saved to: {}",
        style("✓").green().bold(),
        report.len(),
        files.len(),
        style(generator.output_dir().display()).cyan()
    );
    println!(
        "  total runtime: {}",
        style(format!("{:.1}s", start.elapsed().as_secs_f64())).dim()
    );

    Ok(())
}
