//! Control Panel Widget
//! Left side panel with the artifact, grouping mode and color scale controls.

use crate::treemap::{ColorScale, GroupingMode, ROOT_LABEL};
use egui::{Color32, ComboBox, RichText};
use std::path::PathBuf;

/// What the viewer is currently asked to show.
#[derive(Clone)]
pub struct UserSettings {
    pub artifact_path: PathBuf,
    pub mode: &'static GroupingMode,
    pub color_scale: ColorScale,
}

/// Left side control panel with artifact selection and view controls.
pub struct ControlPanel {
    pub settings: UserSettings,
    pub summary: Option<String>,
    pub progress: f32,
    pub status: String,
    pub export_enabled: bool,
}

impl ControlPanel {
    pub fn new(settings: UserSettings) -> Self {
        Self {
            settings,
            summary: None,
            progress: 0.0,
            status: "Ready".to_string(),
            export_enabled: false,
        }
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("S&P 500 Holdings")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(
                RichText::new("Top 10 holders treemap")
                    .size(11.0)
                    .color(Color32::GRAY),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Artifact Section =====
        ui.label(RichText::new("📁 Merged Data").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let path_text = self
                        .settings
                        .artifact_path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "No file selected".to_string());
                    ui.label(RichText::new(&path_text).size(12.0))
                        .on_hover_text(self.settings.artifact_path.display().to_string());

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("📂 Browse").clicked() {
                            action = ControlPanelAction::BrowseArtifact;
                        }
                        if ui.button("⟳ Reload").clicked() {
                            action = ControlPanelAction::Reload;
                        }
                    });
                });
                if let Some(summary) = &self.summary {
                    ui.label(RichText::new(summary).size(11.0).color(Color32::GRAY));
                }
            });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== View Section =====
        ui.label(RichText::new("🔧 Grouping").size(14.0).strong());
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.add_sized([90.0, 20.0], egui::Label::new("Mode:"));
            ComboBox::from_id_salt("grouping_mode")
                .width(190.0)
                .selected_text(self.settings.mode.label)
                .show_ui(ui, |ui| {
                    for mode in GroupingMode::all() {
                        if ui
                            .selectable_label(self.settings.mode.id == mode.id, mode.label)
                            .clicked()
                            && self.settings.mode.id != mode.id
                        {
                            self.settings.mode = mode;
                            action = ControlPanelAction::ModeChanged;
                        }
                    }
                });
        });

        ui.add_space(5.0);
        ui.label(
            RichText::new(format!(
                "{} levels: {} → {}",
                self.settings.mode.levels(),
                ROOT_LABEL,
                self.settings.mode.path.join(" → ")
            ))
            .size(11.0)
            .color(Color32::GRAY),
        );

        ui.add_space(10.0);
        ui.label("Color scale:");
        ui.horizontal(|ui| {
            for scale in [ColorScale::Linear, ColorScale::Log10] {
                if ui
                    .radio_value(&mut self.settings.color_scale, scale, scale.label())
                    .changed()
                {
                    action = ControlPanelAction::ModeChanged;
                }
            }
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Export =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.export_enabled, |ui| {
                let png = egui::Button::new(RichText::new("🖼 Export PNG").size(14.0))
                    .min_size(egui::vec2(150.0, 30.0));
                if ui.add(png).clicked() {
                    action = ControlPanelAction::ExportPng;
                }
                ui.add_space(6.0);
                let json = egui::Button::new(RichText::new("📄 Export JSON").size(14.0))
                    .min_size(egui::vec2(150.0, 30.0));
                if ui.add(json).clicked() {
                    action = ControlPanelAction::ExportJson;
                }
            });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Progress Section =====
        ui.label(RichText::new("📊 Progress").size(14.0).strong());
        ui.add_space(5.0);

        ui.add(
            egui::ProgressBar::new(self.progress / 100.0)
                .show_percentage()
                .animate(self.progress > 0.0 && self.progress < 100.0),
        );

        ui.add_space(5.0);

        let status_color = if self.status.contains("Error") {
            Color32::from_rgb(220, 53, 69)
        } else if self.status.contains("Complete") {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        action
    }

    /// Set progress and status
    pub fn set_progress(&mut self, progress: f32, status: &str) {
        self.progress = progress;
        self.status = status.to_string();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseArtifact,
    Reload,
    /// Grouping mode or color scale changed.
    ModeChanged,
    ExportPng,
    ExportJson,
}
