//! CardioBench CLI Module
//!
//! Command-line interface for running the benchmark, tuning a single
//! model and inspecting a dataset.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::ExperimentConfig;
use crate::data::{DataLoader, DatasetSummary};
use crate::experiment::{Experiment, ModelReport};
use crate::report::format_table;
use crate::training::ModelKind;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cardiobench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tune and compare tree-ensemble classifiers on a tabular dataset")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by `run` and `search`; they override the config file
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// CSV path or http(s) URL
    #[arg(short, long)]
    pub data: Option<String>,

    /// Target column name
    #[arg(short, long)]
    pub target: Option<String>,

    /// Output directory for figures and summary.json
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Random seed for the split, searches and models
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not write HTML figures
    #[arg(long)]
    pub no_plots: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tune every model and compare them on the test split
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Models to run (rf, hgb, xgb, lgbm)
        #[arg(short, long, value_delimiter = ',')]
        models: Option<Vec<ModelKind>>,
    },

    /// Tune a single model
    Search {
        #[command(flatten)]
        args: RunArgs,

        /// Model to tune (rf, hgb, xgb, lgbm)
        #[arg(short, long)]
        model: ModelKind,
    },

    /// Show shape, column types and the first rows of a dataset
    Info {
        /// CSV path or http(s) URL
        #[arg(short, long)]
        data: Option<String>,

        /// Number of rows to show
        #[arg(long, default_value = "5")]
        head: usize,
    },

    /// Write the default configuration as JSON
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "cardiobench.json")]
        output: PathBuf,
    },
}

/// Config file (or defaults) with command-line overrides applied
pub fn resolve_config(args: &RunArgs) -> anyhow::Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(data) = &args.data {
        config = config.with_data_path(data.clone());
    }
    if let Some(target) = &args.target {
        config = config.with_target(target.clone());
    }
    if let Some(output) = &args.output {
        config = config.with_output_dir(output.clone());
    }
    if let Some(seed) = args.seed {
        config = config.with_random_state(Some(seed));
    }
    if args.no_plots {
        config = config.with_plots(false);
    }
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs, models: Option<Vec<ModelKind>>) -> anyhow::Result<()> {
    let mut config = resolve_config(args)?;
    if let Some(models) = models {
        config = config.with_models(models);
        config.validate()?;
    }
    let experiment = Experiment::new(config);

    section("Data");
    step_run("Loading data");
    let start = Instant::now();
    let df = experiment.load_data()?;
    step_done(&format!("{} rows × {} cols in {:.2?}", df.height(), df.width(), start.elapsed()));
    println!();
    indented(&format_table(&df.head(Some(5))));

    let split = experiment.prepare(&df)?;
    let ((train_rows, cols), (test_rows, _)) = split.shapes();
    step_ok(&format!("train {} rows, test {} rows, {} features", train_rows, test_rows, cols));

    let mut reports = Vec::new();
    for &kind in &experiment.config().models {
        section(kind.label());
        step_run(&format!("Halving search over {}", kind.display_name().cyan()));
        let start = Instant::now();
        let report = experiment.search_model(kind, &split)?;
        step_done(&format!("{:.2?}", start.elapsed()));
        print_model_report(&report)?;
        reports.push(report);
    }

    if let Some(rf) = reports.iter().find(|r| r.kind == ModelKind::RandomForest) {
        section("Random Forest confusion matrix");
        indented(&rf.confusion.to_string());
    }

    step_run("Writing report");
    let report = experiment.build_report(&split, reports)?;
    step_done(&format!("{} files", report.written.len()));

    section("Comparison");
    indented(&format_table(&report.comparison.wide_df()?));
    if let Ok((name, score)) = report.comparison.best_by("accuracy") {
        println!();
        println!("  {} {} {} {:.4}", ok("best"), name.white().bold(), muted("accuracy:"), score);
    }

    section("Outputs");
    for path in &report.written {
        println!("  {}", path.display());
    }
    println!();
    Ok(())
}

pub fn cmd_search(args: &RunArgs, model: ModelKind) -> anyhow::Result<()> {
    let config = resolve_config(args)?.with_models(vec![model]);
    let experiment = Experiment::new(config);

    section(&format!("Search {}", model.display_name()));
    step_run("Loading data");
    let df = experiment.load_data()?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let split = experiment.prepare(&df)?;
    step_run("Halving search");
    let start = Instant::now();
    let report = experiment.search_model(model, &split)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_model_report(&report)?;
    println!();
    indented(&report.confusion.to_string());
    println!();
    Ok(())
}

fn print_model_report(report: &ModelReport) -> anyhow::Result<()> {
    println!();
    kv("Best params", &report.best_params.to_string());
    kv("Best CV score", &format!("{:.4}", report.best_score));
    kv("Best estimator", &report.best_estimator);
    kv(
        "Iterations",
        &format!(
            "{} (candidates {:?}, resources {:?})",
            report.n_candidates.len(),
            report.n_candidates,
            report.n_resources
        ),
    );
    println!();
    indented(&format_table(&report.cv_results_frame()?));
    println!();
    kv("Test accuracy", &format!("{:.4}", report.test_accuracy));
    println!();
    indented(&report.metrics.to_string());
    Ok(())
}

pub fn cmd_info(data: Option<&str>, head: usize) -> anyhow::Result<()> {
    section("Data Info");

    let source = data.unwrap_or(crate::config::DEFAULT_DATA_PATH);
    let df = DataLoader::new().load(source)?;
    let summary = DatasetSummary::from_frame(&df);

    println!("  {:<12} {}", muted("Source"), source);
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.n_cols);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));
    for col in &summary.columns {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            col.null_count,
            col.unique_count
        );
    }

    println!();
    indented(&format_table(&df.head(Some(head))));
    println!();
    Ok(())
}

pub fn cmd_init_config(output: &PathBuf) -> anyhow::Result<()> {
    ExperimentConfig::default().to_json_file(output)?;
    step_ok(&format!("Wrote default config to {}", output.display()));
    Ok(())
}
