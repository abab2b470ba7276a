//! `coverscan run|validate|summarize`: config-driven identifier reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tracing::{debug, info};

use coverscan_recon::aggregate::DetectionRules;
use coverscan_recon::engine::{load_input, run_with, RunOptions};
use coverscan_recon::report::render_all;
use coverscan_recon::summarize::{summarize, SummarizeInput};
use coverscan_recon::{ReconConfig, ReconError};

use crate::exit_codes::{
    EXIT_RECON_INPUT, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_REVIEW, EXIT_RECON_WRITE,
};
use crate::CliError;

const PATH_HINT: &str = "input paths are resolved relative to the config file";

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Reconcile the catalog against scan detections and write bucket reports
    #[command(after_help = "\
Examples:
  coverscan run review.toml
  coverscan run review.toml --json
  coverscan run review.toml --output summary.json --out-dir /tmp/analysis
  coverscan run review.toml --check-duplicates --fail-on-review")]
    Run {
        /// Path to the TOML config file
        config: PathBuf,

        /// Output JSON to stdout in addition to the human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides output.json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Directory for bucket reports (overrides output.dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Report identifiers held by more than one record
        #[arg(long)]
        check_duplicates: bool,

        /// Exit non-zero when any record needs review
        #[arg(long)]
        fail_on_review: bool,
    },

    /// Validate a config without running
    #[command(after_help = "\
Examples:
  coverscan validate review.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Merge reviewed bucket files into per-record identifier tables
    #[command(after_help = "\
Examples:
  coverscan summarize review.toml
  coverscan summarize review.toml --out-dir /tmp/analysis")]
    Summarize {
        /// Path to the TOML config file
        config: PathBuf,

        /// Directory for the output tables (overrides output.dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            config,
            json,
            output,
            out_dir,
            check_duplicates,
            fail_on_review,
        } => cmd_recon_run(config, json, output, out_dir, check_duplicates, fail_on_review),
        ReconCommands::Validate { config } => cmd_recon_validate(config),
        ReconCommands::Summarize { config, out_dir } => cmd_recon_summarize(config, out_dir),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

/// Map an engine error to its exit code.
fn engine_err(err: ReconError) -> CliError {
    let code = match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::CatalogParse { .. }
        | ReconError::MappingParse { .. }
        | ReconError::DetectionDbParse(_)
        | ReconError::ReviewedParse { .. } => EXIT_RECON_INPUT,
        ReconError::Report(_) => EXIT_RECON_WRITE,
    };
    recon_err(code, err.to_string())
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(
            EXIT_RECON_INVALID_CONFIG,
            format!("cannot read config {}: {e}", config_path.display()),
        )
    })?;
    ReconConfig::from_toml(&config_str).map_err(engine_err)
}

/// Directory the config lives in; relative paths resolve against it.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn read_input(path: &Path) -> Result<String, CliError> {
    debug!(path = %path.display(), "reading input");
    std::fs::read_to_string(path).map_err(|e| {
        recon_err(EXIT_RECON_INPUT, format!("cannot read {}: {e}", path.display()))
            .with_hint(PATH_HINT)
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes)
        .map_err(|e| recon_err(EXIT_RECON_WRITE, format!("cannot write {}: {e}", path.display())))
}

fn prepare_out_dir(config: &ReconConfig, base: &Path, out_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    let dir = out_dir.unwrap_or_else(|| base.join(&config.output.dir));
    std::fs::create_dir_all(&dir).map_err(|e| {
        recon_err(EXIT_RECON_WRITE, format!("cannot create {}: {e}", dir.display()))
    })?;
    Ok(dir)
}

fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    check_duplicates: bool,
    fail_on_review: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);

    let input = load_input(
        &read_input(&base.join(&config.inputs.catalog))?,
        &read_input(&base.join(&config.inputs.mapping))?,
        &read_input(&base.join(&config.inputs.detections))?,
    )
    .map_err(engine_err)?;

    // Run engine
    let result = run_with(&config, &input, RunOptions { check_duplicates }).map_err(engine_err)?;

    // Reports
    let dir = prepare_out_dir(&config, base, out_dir)?;
    for (name, bytes) in render_all(&result).map_err(engine_err)? {
        write_output(&dir.join(name), &bytes)?;
    }
    info!(dir = %dir.display(), "reports written");

    // JSON
    let json_path = output_file.or_else(|| config.output.json.as_ref().map(|p| dir.join(p)));
    if json_output || json_path.is_some() {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| recon_err(EXIT_RECON_WRITE, format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = json_path {
            write_output(path, json_str.as_bytes())?;
            eprintln!("wrote {}", path.display());
        }

        if json_output {
            println!("{json_str}");
        }
    }

    // Human summary to stderr
    let s = &result.summary;
    let reported: usize = s.bucket_counts.values().sum();
    eprintln!(
        "recon '{}': {} records, {} confirmed, {} reported ({} need review), {} unclassified",
        result.meta.config_name, s.total_records, s.confirmed, reported, s.needs_review, s.unclassified,
    );
    if let Some(dups) = s.duplicate_identifiers {
        eprintln!("duplicates: {dups} identifier(s) under more than one record");
    }

    if fail_on_review && s.needs_review > 0 {
        return Err(recon_err(
            EXIT_RECON_REVIEW,
            format!("{} record(s) need review", s.needs_review),
        ));
    }

    Ok(())
}

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let sources = config.summarize.as_ref().map(|s| s.sources.len()).unwrap_or(0);
    eprintln!(
        "valid: recon '{}' with {} symbolog{}, {} reviewed source(s)",
        config.name,
        config.detection.symbologies.len(),
        if config.detection.symbologies.len() == 1 { "y" } else { "ies" },
        sources,
    );
    Ok(())
}

fn cmd_recon_summarize(config_path: PathBuf, out_dir: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);

    let summarize_config = config.summarize.as_ref().ok_or_else(|| {
        recon_err(EXIT_RECON_INVALID_CONFIG, "config has no [summarize] section")
            .with_hint("add [summarize] with one [[summarize.sources]] entry per reviewed file")
    })?;

    let mut reviewed = Vec::with_capacity(summarize_config.sources.len());
    for source in &summarize_config.sources {
        reviewed.push((source, read_input(&base.join(&source.file))?));
    }

    let loaded = load_input(
        &read_input(&base.join(&config.inputs.catalog))?,
        &read_input(&base.join(&config.inputs.mapping))?,
        &read_input(&base.join(&config.inputs.detections))?,
    )
    .map_err(engine_err)?;

    let input = SummarizeInput {
        catalog: loaded.catalog,
        mapping: loaded.mapping,
        detections: loaded.detections,
        reviewed,
    };
    let out = summarize(summarize_config, &DetectionRules::from_config(&config), &input)
        .map_err(engine_err)?;

    let dir = prepare_out_dir(&config, base, out_dir)?;
    let versions = dir.join(&summarize_config.versions);
    let outlines = dir.join(&summarize_config.outlines);
    write_output(&versions, &out.versions)?;
    write_output(&outlines, &out.outlines)?;

    eprintln!(
        "summarize '{}': {} records, {} split by volume",
        config.name, out.records, out.split_records,
    );
    eprintln!("wrote {}", versions.display());
    eprintln!("wrote {}", outlines.display());
    Ok(())
}
