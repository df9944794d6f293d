//! Resolved run configuration.
//!
//! The CLI layer turns parsed arguments into these plain structs so the data
//! and chart modules never depend on clap.

use std::path::PathBuf;

use crate::treemap::{ColorScale, GroupingMode};

pub const DEFAULT_SP500_PATH: &str = "data/s&p500.csv";
pub const DEFAULT_HOLDERS_PATH: &str = "data/sp500_top10_holders.csv";
pub const DEFAULT_ARTIFACT_PATH: &str = "data/merged_sp500_data.csv";

/// Inputs and output of the preparation job.
#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub constituents_path: PathBuf,
    pub holders_path: PathBuf,
    pub output_path: PathBuf,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            constituents_path: PathBuf::from(DEFAULT_SP500_PATH),
            holders_path: PathBuf::from(DEFAULT_HOLDERS_PATH),
            output_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
        }
    }
}

/// Settings for the interactive viewer window.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub artifact_path: PathBuf,
    pub initial_mode: &'static GroupingMode,
    pub color_scale: ColorScale,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            initial_mode: GroupingMode::default_mode(),
            color_scale: ColorScale::default(),
        }
    }
}

/// Output format of a headless render, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Png,
    Json,
}

impl RenderFormat {
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => Some(RenderFormat::Png),
            Some("json") => Some(RenderFormat::Json),
            _ => None,
        }
    }
}

/// Settings for a one-shot headless render.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub artifact_path: PathBuf,
    pub mode: &'static GroupingMode,
    pub color_scale: ColorScale,
    pub output_path: PathBuf,
    pub format: RenderFormat,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_render_format_from_extension() {
        assert_eq!(RenderFormat::from_path(Path::new("out.png")), Some(RenderFormat::Png));
        assert_eq!(RenderFormat::from_path(Path::new("out.JSON")), Some(RenderFormat::Json));
        assert_eq!(RenderFormat::from_path(Path::new("out.svg")), None);
        assert_eq!(RenderFormat::from_path(Path::new("out")), None);
    }

    #[test]
    fn test_defaults_match_fixed_layout() {
        let prepare = PrepareConfig::default();
        assert_eq!(prepare.output_path, PathBuf::from("data/merged_sp500_data.csv"));
        let viewer = ViewerConfig::default();
        assert_eq!(viewer.artifact_path, prepare.output_path);
        assert_eq!(viewer.initial_mode.id, "shareholder_company");
    }
}
