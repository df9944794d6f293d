//! Holdings Treemap Main Application
//! Main window with control panel and treemap viewer.

use crate::charts::StaticTreemapRenderer;
use crate::config::ViewerConfig;
use crate::data::DataLoader;
use crate::gui::control_panel::UserSettings;
use crate::gui::{ControlPanel, ControlPanelAction, TreemapViewer};
use crate::treemap::{ColorScale, GroupingMode, Treemap, TreemapBuilder};
use egui::SidePanel;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

const EXPORT_WIDTH: u32 = 1600;
const EXPORT_HEIGHT: u32 = 1000;

/// Treemap build result from background thread
enum CalcResult {
    Progress(f32, String),
    Complete(Treemap),
    Error(String),
}

/// Artifact loading result from background thread
enum LoadResult {
    Progress(String),
    Complete { df: DataFrame, path: PathBuf },
    Error(String),
}

/// Main application window.
pub struct HoldingsApp {
    loader: DataLoader,
    control_panel: ControlPanel,
    viewer: TreemapViewer,

    // Async treemap builds. Replacing the receiver drops the previous one, so
    // an outdated build can no longer deliver its result.
    calc_rx: Option<Receiver<CalcResult>>,
    is_calculating: bool,

    // Async artifact loading
    load_rx: Option<Receiver<LoadResult>>,
    is_loading: bool,
}

impl HoldingsApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: ViewerConfig) -> Self {
        Self::with_config(config)
    }

    /// Build the app state and start reading the configured artifact.
    fn with_config(config: ViewerConfig) -> Self {
        let settings = UserSettings {
            artifact_path: config.artifact_path,
            mode: config.initial_mode,
            color_scale: config.color_scale,
        };
        let mut app = Self {
            loader: DataLoader::new(),
            control_panel: ControlPanel::new(settings),
            viewer: TreemapViewer::new(),
            calc_rx: None,
            is_calculating: false,
            load_rx: None,
            is_loading: false,
        };
        let path = app.control_panel.settings.artifact_path.clone();
        app.start_loading(path);
        app
    }

    /// Ask for another artifact and load it.
    fn handle_browse_artifact(&mut self) {
        if self.is_loading {
            return;
        }
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        {
            self.start_loading(path);
        }
    }

    /// Read the artifact in a background thread.
    fn start_loading(&mut self, path: PathBuf) {
        if self.is_loading {
            return;
        }
        // A build still running works on the old frame; drop its receiver.
        self.calc_rx = None;
        self.is_calculating = false;
        self.viewer.clear();
        self.control_panel.summary = None;
        self.control_panel.export_enabled = false;
        self.control_panel.settings.artifact_path = path.clone();
        self.control_panel.set_progress(0.0, "Loading merged data...");
        self.is_loading = true;

        let (tx, rx) = channel();
        self.load_rx = Some(rx);

        thread::spawn(move || {
            let _ = tx.send(LoadResult::Progress(format!(
                "Reading {}...",
                path.display()
            )));
            match DataLoader::read_artifact(&path) {
                Ok(df) => {
                    let _ = tx.send(LoadResult::Complete { df, path });
                }
                Err(e) => {
                    let _ = tx.send(LoadResult::Error(e.to_string()));
                }
            }
        });
    }

    /// Check for artifact loading results
    fn check_load_results(&mut self) {
        let rx = self.load_rx.take();
        if let Some(rx) = rx {
            let mut should_keep_receiver = true;

            while let Ok(result) = rx.try_recv() {
                match result {
                    LoadResult::Progress(status) => {
                        self.control_panel.set_progress(0.0, &status);
                    }
                    LoadResult::Complete { df, path } => {
                        self.loader.set_dataframe(df);
                        info!("Viewer loaded {}", path.display());
                        self.control_panel.summary = Some(self.summary());
                        self.is_loading = false;
                        should_keep_receiver = false;
                        self.start_calculation();
                    }
                    LoadResult::Error(e) => {
                        error!("Loading merged data failed: {}", e);
                        self.control_panel.set_progress(0.0, &format!("Error: {}", e));
                        self.is_loading = false;
                        should_keep_receiver = false;
                    }
                }
            }

            if should_keep_receiver {
                self.load_rx = Some(rx);
            }
        }
    }

    fn summary(&self) -> String {
        format!(
            "{} rows, {} holders, {} companies",
            self.loader.get_row_count(),
            self.loader.count_unique_values("name"),
            self.loader.count_unique_values("symbol")
        )
    }

    /// Build the treemap for the current settings in a background thread.
    fn start_calculation(&mut self) {
        let Some(df) = self.loader.shared() else {
            self.control_panel.set_progress(0.0, "No data loaded");
            return;
        };
        let mode = self.control_panel.settings.mode;
        let scale = self.control_panel.settings.color_scale;

        let (tx, rx) = channel();
        self.calc_rx = Some(rx);
        self.is_calculating = true;
        self.control_panel.export_enabled = false;
        self.control_panel.set_progress(10.0, "Grouping holdings...");

        thread::spawn(move || {
            Self::run_calculation(tx, df, mode, scale);
        });
    }

    /// Run one build (called from background thread). Only reads the shared table.
    fn run_calculation(
        tx: Sender<CalcResult>,
        df: Arc<DataFrame>,
        mode: &'static GroupingMode,
        scale: ColorScale,
    ) {
        let _ = tx.send(CalcResult::Progress(
            40.0,
            format!("Building {} treemap...", mode.label),
        ));
        match TreemapBuilder::build(&df, mode, scale) {
            Ok(tree) => {
                let _ = tx.send(CalcResult::Complete(tree));
            }
            Err(e) => {
                let _ = tx.send(CalcResult::Error(e.to_string()));
            }
        }
    }

    /// Check for treemap build results
    fn check_calculation_results(&mut self) {
        let rx = self.calc_rx.take();
        if let Some(rx) = rx {
            let mut should_keep_receiver = true;

            while let Ok(result) = rx.try_recv() {
                match result {
                    CalcResult::Progress(progress, status) => {
                        self.control_panel.set_progress(progress, &status);
                    }
                    CalcResult::Complete(tree) => {
                        let status = format!(
                            "Complete! {} nodes, {} rows skipped",
                            tree.nodes.len(),
                            tree.skipped_rows
                        );
                        self.viewer.set_chart(tree);
                        self.control_panel.set_progress(100.0, &status);
                        self.control_panel.export_enabled = true;
                        self.is_calculating = false;
                        should_keep_receiver = false;
                    }
                    CalcResult::Error(e) => {
                        error!("Treemap build failed: {}", e);
                        self.viewer.clear();
                        self.control_panel.set_progress(0.0, &format!("Error: {}", e));
                        self.is_calculating = false;
                        should_keep_receiver = false;
                    }
                }
            }

            if should_keep_receiver {
                self.calc_rx = Some(rx);
            }
        }
    }

    fn export_file_name(tree: &Treemap, extension: &str) -> String {
        format!(
            "treemap_{}_{}.{}",
            tree.mode,
            tree.color_scale.label().to_lowercase(),
            extension
        )
    }

    /// Render the current chart to a PNG and open it.
    fn handle_export_png(&mut self) {
        let Some(tree) = self.viewer.tree() else {
            self.control_panel.set_progress(0.0, "No chart to export");
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG Image", &["png"])
            .set_file_name(Self::export_file_name(tree, "png"))
            .save_file()
        else {
            return;
        };

        match StaticTreemapRenderer::render_png(tree, &path, EXPORT_WIDTH, EXPORT_HEIGHT) {
            Ok(()) => {
                if let Err(e) = open::that(&path) {
                    warn!("Could not open {}: {}", path.display(), e);
                }
                self.control_panel
                    .set_progress(100.0, &format!("Complete! Exported {}", path.display()));
            }
            Err(e) => {
                error!("PNG export failed: {}", e);
                self.control_panel
                    .set_progress(0.0, &format!("Error: {}", e));
            }
        }
    }

    /// Write the chart description as JSON.
    fn handle_export_json(&mut self) {
        let Some(tree) = self.viewer.tree() else {
            self.control_panel.set_progress(0.0, "No chart to export");
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name(Self::export_file_name(tree, "json"))
            .save_file()
        else {
            return;
        };

        match StaticTreemapRenderer::write_json(tree, &path) {
            Ok(()) => {
                info!("Exported chart description to {}", path.display());
                self.control_panel
                    .set_progress(100.0, &format!("Complete! Exported {}", path.display()));
            }
            Err(e) => {
                error!("JSON export failed: {}", e);
                self.control_panel
                    .set_progress(0.0, &format!("Error: {}", e));
            }
        }
    }
}

impl eframe::App for HoldingsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_load_results();
        self.check_calculation_results();

        if self.is_loading || self.is_calculating {
            ctx.request_repaint();
        }

        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let action = self.control_panel.show(ui);

                    match action {
                        ControlPanelAction::BrowseArtifact => self.handle_browse_artifact(),
                        ControlPanelAction::Reload => {
                            let path = self.control_panel.settings.artifact_path.clone();
                            self.start_loading(path);
                        }
                        ControlPanelAction::ModeChanged => self.start_calculation(),
                        ControlPanelAction::ExportPng => self.handle_export_png(),
                        ControlPanelAction::ExportJson => self.handle_export_json(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.viewer.show(ctx, ui);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_export_file_name() {
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), vec!["ABC"]),
            Column::new("name".into(), vec!["Big Fund"]),
            Column::new("value".into(), vec![10.0]),
        ])
        .unwrap();
        let tree = TreemapBuilder::build(
            &df,
            GroupingMode::find("company").unwrap(),
            ColorScale::Log10,
        )
        .unwrap();
        assert_eq!(
            HoldingsApp::export_file_name(&tree, "png"),
            "treemap_company_log10.png"
        );
    }

    #[test]
    fn test_loading_discards_pending_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = HoldingsApp::with_config(ViewerConfig {
            artifact_path: dir.path().join("missing.csv"),
            ..ViewerConfig::default()
        });
        app.is_loading = false;

        let (tx, rx) = channel();
        app.calc_rx = Some(rx);
        app.is_calculating = true;

        app.start_loading(dir.path().join("other.csv"));
        assert!(app.calc_rx.is_none());
        assert!(!app.is_calculating);
        assert!(app.is_loading);
        assert!(tx.send(CalcResult::Error("stale".to_string())).is_err());
    }

    #[test]
    fn test_build_reports_over_channel() {
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), vec!["ABC", "DEF"]),
            Column::new("name".into(), vec!["Big Fund", "Big Fund"]),
            Column::new("value".into(), vec![10.0, 30.0]),
        ])
        .unwrap();
        let shared = Arc::new(df);
        let (tx, rx) = channel();
        HoldingsApp::run_calculation(
            tx,
            Arc::clone(&shared),
            GroupingMode::find("shareholder_company").unwrap(),
            ColorScale::Linear,
        );

        let results: Vec<CalcResult> = rx.try_iter().collect();
        assert!(matches!(results[0], CalcResult::Progress(..)));
        match &results[1] {
            CalcResult::Complete(tree) => assert!((tree.root().value - 40.0).abs() < 1e-9),
            _ => panic!("expected a finished treemap"),
        }
        assert_eq!(shared.width(), 3);
    }
}
