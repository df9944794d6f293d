//! Command-line parsing.
//!
//! Arguments are turned into the plain config structs in [`crate::config`]
//! before anything else runs.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{
    PrepareConfig, RenderConfig, RenderFormat, ViewerConfig, DEFAULT_ARTIFACT_PATH,
    DEFAULT_HOLDERS_PATH, DEFAULT_SP500_PATH,
};
use crate::treemap::{ColorScale, GroupingMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "holdings",
    version,
    about = "S&P 500 top holders: data preparation and treemap viewer",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Defaults to `view` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Viewer options used when no subcommand is given.
    #[command(flatten)]
    pub view: ViewArgs,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::View(self.view))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Clean, join and normalize the two exports into the merged artifact.
    Prepare(PrepareArgs),
    /// Open the interactive treemap window.
    View(ViewArgs),
    /// Build one treemap and write it as PNG or JSON without opening a window.
    Render(RenderArgs),
}

#[derive(Debug, Args, Clone)]
pub struct PrepareArgs {
    /// Index constituents export.
    #[arg(long, env = "HOLDINGS_SP500_PATH", default_value = DEFAULT_SP500_PATH)]
    pub sp500: PathBuf,

    /// Top holders export.
    #[arg(long, env = "HOLDINGS_HOLDERS_PATH", default_value = DEFAULT_HOLDERS_PATH)]
    pub holders: PathBuf,

    /// Where the merged artifact is written.
    #[arg(short, long, env = "HOLDINGS_ARTIFACT_PATH", default_value = DEFAULT_ARTIFACT_PATH)]
    pub output: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ViewArgs {
    /// Merged artifact written by `prepare`.
    #[arg(long, env = "HOLDINGS_ARTIFACT_PATH", default_value = DEFAULT_ARTIFACT_PATH)]
    pub artifact: PathBuf,

    /// Grouping mode shown first.
    #[arg(short, long, value_parser = GroupingMode::parse_id, default_value = "shareholder_company")]
    pub mode: &'static GroupingMode,

    #[arg(long, value_enum, default_value_t = ColorScale::Linear)]
    pub color_scale: ColorScale,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[arg(long, env = "HOLDINGS_ARTIFACT_PATH", default_value = DEFAULT_ARTIFACT_PATH)]
    pub artifact: PathBuf,

    #[arg(short, long, value_parser = GroupingMode::parse_id)]
    pub mode: &'static GroupingMode,

    /// Shorthand for `--color-scale log10`.
    #[arg(long, conflicts_with = "color_scale")]
    pub log_color: bool,

    #[arg(long, value_enum)]
    pub color_scale: Option<ColorScale>,

    /// Output file; the extension (.png or .json) picks the format.
    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 1600)]
    pub width: u32,

    #[arg(long, default_value_t = 1000)]
    pub height: u32,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(args: PrepareArgs) -> Self {
        Self {
            constituents_path: args.sp500,
            holders_path: args.holders,
            output_path: args.output,
        }
    }
}

impl From<ViewArgs> for ViewerConfig {
    fn from(args: ViewArgs) -> Self {
        Self {
            artifact_path: args.artifact,
            initial_mode: args.mode,
            color_scale: args.color_scale,
        }
    }
}

impl TryFrom<RenderArgs> for RenderConfig {
    type Error = anyhow::Error;

    fn try_from(args: RenderArgs) -> Result<Self> {
        let Some(format) = RenderFormat::from_path(&args.output) else {
            bail!(
                "cannot tell the output format of {}: use a .png or .json extension",
                args.output.display()
            );
        };
        let color_scale = if args.log_color {
            ColorScale::Log10
        } else {
            args.color_scale.unwrap_or_default()
        };
        Ok(Self {
            artifact_path: args.artifact,
            mode: args.mode,
            color_scale,
            output_path: args.output,
            format,
            width: args.width,
            height: args.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_view() {
        let cli = Cli::try_parse_from(["holdings", "--mode", "sector"]).unwrap();
        let Command::View(args) = cli.into_command() else {
            panic!("expected view");
        };
        let config = ViewerConfig::from(args);
        assert_eq!(config.initial_mode.id, "sector");
        assert_eq!(config.color_scale, ColorScale::Linear);
    }

    #[test]
    fn test_render_args_resolve() {
        let cli = Cli::try_parse_from([
            "holdings",
            "render",
            "--mode",
            "sector",
            "--log-color",
            "--output",
            "out/sector.png",
        ])
        .unwrap();
        let Some(Command::Render(args)) = cli.command else {
            panic!("expected render");
        };
        let config = RenderConfig::try_from(args).unwrap();
        assert_eq!(config.mode.id, "sector");
        assert_eq!(config.color_scale, ColorScale::Log10);
        assert_eq!(config.format, RenderFormat::Png);
        assert_eq!((config.width, config.height), (1600, 1000));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = Cli::try_parse_from(["holdings", "view", "--mode", "planets"]).unwrap_err();
        assert!(err.to_string().contains("unknown grouping mode"));
    }

    #[test]
    fn test_render_needs_known_extension() {
        let cli = Cli::try_parse_from([
            "holdings", "render", "--mode", "company", "--output", "out.svg",
        ])
        .unwrap();
        let Some(Command::Render(args)) = cli.command else {
            panic!("expected render");
        };
        assert!(RenderConfig::try_from(args).is_err());
    }

    #[test]
    fn test_prepare_paths_are_overridable() {
        let cli = Cli::try_parse_from([
            "holdings",
            "prepare",
            "--sp500",
            "in/a.csv",
            "--holders",
            "in/b.csv",
            "-o",
            "out/merged.csv",
        ])
        .unwrap();
        let Some(Command::Prepare(args)) = cli.command else {
            panic!("expected prepare");
        };
        let config = PrepareConfig::from(args);
        assert_eq!(config.constituents_path, PathBuf::from("in/a.csv"));
        assert_eq!(config.holders_path, PathBuf::from("in/b.csv"));
        assert_eq!(config.output_path, PathBuf::from("out/merged.csv"));
    }
}
