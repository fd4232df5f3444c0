//! Command-line interface for training runs and artifact inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::export::{ArtifactFormat, ArtifactStore};
use crate::pipeline::{RunSummary, TrainingRun};
use crate::preprocessing::FeatureTransformer;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "score-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and select a regression model for tabular score data")]
#[command(long_about = None)]
pub struct Cli {
    /// Log filter directives (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit the feature plan, evaluate the model catalog and save the winner
    Train {
        /// Training table (CSV, TSV, JSON lines or Parquet)
        #[arg(long)]
        train: PathBuf,

        /// Held-out test table with the same columns
        #[arg(long)]
        test: PathBuf,

        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for the preprocessor and model artifacts
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,

        /// Minimum acceptable R² on the test table
        #[arg(long)]
        threshold: Option<f64>,

        /// Seed for randomized models
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the metadata of a saved artifact
    Inspect {
        /// Artifact file written by `train`
        #[arg(short, long)]
        artifact: PathBuf,
    },

    /// Print the configured columns and feature plan
    Schema {
        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    train_path: &Path,
    test_path: &Path,
    config_path: Option<&Path>,
    artifacts_dir: Option<&Path>,
    threshold: Option<f64>,
    seed: Option<u64>,
) -> anyhow::Result<f64> {
    section("Train");

    let mut config = load_config(config_path)?;
    if let Some(dir) = artifacts_dir {
        config = config.with_artifacts_dir(dir);
    }
    if let Some(t) = threshold {
        config = config.with_quality_threshold(t);
    }
    if let Some(s) = seed {
        config = config.with_random_state(s);
    }
    config.validate()?;

    let loader = DataLoader::new();
    step_run("Loading data");
    let start = Instant::now();
    let train = loader.load_auto(train_path)?;
    let test = loader.load_auto(test_path)?;
    step_done(&format!(
        "{} train / {} test rows in {:?}",
        train.height(),
        test.height(),
        start.elapsed()
    ));

    step_run("Training catalog");
    let start = Instant::now();
    let mut run = TrainingRun::new(config);
    let result = run.run(&train, &test);
    match &result {
        Ok(_) => step_done(&format!("{:?}", start.elapsed())),
        Err(_) => println!("{}", "failed".red()),
    }
    let score = result?;

    if let Some(summary) = run.summary() {
        print_summary(summary);
    }
    Ok(score)
}

fn print_summary(summary: &RunSummary) {
    section("Leaderboard");
    for (rank, entry) in summary.report.ranked().iter().enumerate() {
        let line = format!(
            "{:>2}. {:<26} R² {:>8.4}   RMSE {:>8.3}   {:>6} ms",
            rank + 1,
            entry.name,
            entry.score,
            entry.rmse,
            entry.fit_time_ms
        );
        if entry.name == summary.best_model {
            println!("  {}", line.white().bold());
        } else {
            println!("  {}", muted(&line));
        }
    }

    section("Result");
    kv("Best model", &summary.best_model);
    kv("R²", &format!("{:.4}", summary.score));
    kv("Features", &summary.feature_names.len().to_string());
    kv("Preprocessor", &summary.preprocessor_path.display().to_string());
    kv("Model", &summary.model_path.display().to_string());
    println!();
}

pub fn cmd_inspect(artifact: &Path) -> anyhow::Result<()> {
    section("Artifact");

    let store = ArtifactStore::new(ArtifactFormat::from_path(artifact));
    let meta = store.load_metadata(artifact)?;

    kv("Path", &artifact.display().to_string());
    kv("Kind", &format!("{:?}", meta.kind));
    kv("Name", &meta.name);
    kv("Created", &meta.created_at);
    kv("Format version", &meta.format_version.to_string());
    kv("Written by", &meta.crate_version);
    if let Some(score) = meta.score {
        kv("R²", &format!("{:.4}", score));
    }
    kv("Features", &meta.feature_names.len().to_string());
    for name in &meta.feature_names {
        println!("    {}", dim(name));
    }
    println!();
    Ok(())
}

pub fn cmd_schema(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let plan = FeatureTransformer::from_config(&config).build_plan()?;

    section("Schema");
    kv("Target", &config.schema.target_column);
    kv("Threshold", &format!("{}", config.quality_threshold));
    kv("Seed", &config.random_state.to_string());

    section("Feature plan");
    for group in plan.groups() {
        println!("  {} {}", accent(&group.name), dim(&format!("({:?})", group.kind)));
        for column in &group.columns {
            println!("    {}", column);
        }
        let steps: Vec<String> = group.recipe.iter().map(|s| format!("{:?}", s)).collect();
        println!("    {} {}", muted("recipe"), steps.join(" → "));
    }
    println!();
    Ok(())
}
