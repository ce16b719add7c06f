//! Binary entrypoint for canvas-fx.
//!
//! Loads one image, applies the configured effect and exports the result as PNG.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use canvas_fx::config::Configuration;
use canvas_fx::effects::{DrawOutcome, EffectId};
use canvas_fx::Engine;
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Apply an image effect and export it as PNG
#[derive(Debug, Parser)]
#[command(name = "canvas-fx", about = "Apply an image effect and export PNG")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Effect to apply (overrides the config)
    #[arg(short, long, value_name = "EFFECT")]
    effect: Option<String>,

    /// Device pixels per image pixel (overrides the config)
    #[arg(short, long, value_name = "FACTOR")]
    scale: Option<f32>,

    /// Output PNG path, defaults to the input name with a .png extension
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Image to process
    input: PathBuf,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(
        format!("canvas_fx={level}")
            .parse()
            .context("building log filter")?,
    );
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = match &cli.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(effect) = &cli.effect {
        cfg.effect = effect.parse::<EffectId>()?;
    }
    if let Some(scale) = cli.scale {
        cfg.scale = scale;
    }
    let cfg = cfg.validated().context("validating configuration")?;

    let (alert_tx, mut alert_rx) = mpsc::channel(16);
    let mut engine = Engine::new(cfg.effect_set(), cfg.schedule(), cfg.scale)?
        .with_alerts(alert_tx)
        .with_initial_effect(cfg.effect);

    let mut outcomes = vec![engine.load_path(&cli.input).await];
    outcomes.extend(engine.settle().await);
    while let Ok(alert) = alert_rx.try_recv() {
        error!(kind = ?alert.kind, "{alert}");
    }
    match outcomes.last() {
        Some(DrawOutcome::Drawn) => {}
        other => bail!("{} was not drawn: {other:?}", cfg.effect),
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(engine.export_file_name()));
    if output.exists()
        && std::fs::canonicalize(&output)? == std::fs::canonicalize(&cli.input)?
    {
        bail!("refusing to overwrite input {}", cli.input.display());
    }
    engine
        .save_png(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(effect = %cfg.effect, output = %output.display(), "exported");
    engine.shutdown().await;
    Ok(())
}
