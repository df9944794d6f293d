//! Holdings Treemap - S&P 500 Top Holders Preparation & Interactive Treemap Viewer
//!
//! `prepare` merges the constituents and top holders exports into one table,
//! `view` opens the treemap window and `render` writes a chart without a window.

mod charts;
mod cli;
mod config;
mod data;
mod gui;
mod treemap;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use tracing::info;
use tracing_subscriber::EnvFilter;

use charts::StaticTreemapRenderer;
use cli::{Cli, Command};
use config::{PrepareConfig, RenderConfig, RenderFormat, ViewerConfig};
use data::{DataLoader, DataProcessor};
use gui::HoldingsApp;
use treemap::TreemapBuilder;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();
    match cli.into_command() {
        Command::Prepare(args) => run_prepare(args.into()),
        Command::View(args) => run_viewer(args.into()),
        Command::Render(args) => run_render(args.try_into()?),
    }
}

fn run_prepare(config: PrepareConfig) -> Result<()> {
    info!("Preparing merged data from {:?} and {:?}", config.constituents_path, config.holders_path);
    let report = DataProcessor::prepare(&config).context("data preparation failed")?;
    println!("{}", report);
    Ok(())
}

fn run_render(config: RenderConfig) -> Result<()> {
    let mut loader = DataLoader::new();
    let df = loader
        .load_artifact(&config.artifact_path)
        .with_context(|| format!("cannot load {}", config.artifact_path.display()))?;
    let tree = TreemapBuilder::build(&df, config.mode, config.color_scale)
        .with_context(|| format!("cannot build the {} treemap", config.mode.id))?;
    info!(
        "{} treemap: {} nodes, {} leaves, total value {:.2}",
        tree.mode,
        tree.nodes.len(),
        tree.leaves().count(),
        tree.root().value
    );

    match config.format {
        RenderFormat::Png => StaticTreemapRenderer::render_png(
            &tree,
            &config.output_path,
            config.width,
            config.height,
        ),
        RenderFormat::Json => StaticTreemapRenderer::write_json(&tree, &config.output_path),
    }
    .with_context(|| format!("cannot write {}", config.output_path.display()))?;
    Ok(())
}

fn run_viewer(config: ViewerConfig) -> Result<()> {
    info!("Opening viewer for {:?}", config.artifact_path);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 850.0])
            .with_min_inner_size([1000.0, 650.0])
            .with_title("S&P 500 Holdings Treemap"),
        ..Default::default()
    };

    eframe::run_native(
        "S&P 500 Holdings Treemap",
        options,
        Box::new(move |cc| Ok(Box::new(HoldingsApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("viewer failed: {}", e))
}
