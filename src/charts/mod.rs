//! Charts module - Treemap painting and export

pub mod palette;
mod plotter;
mod renderer;

pub use plotter::{TreemapAction, TreemapChart, TreemapPlotter};
pub use renderer::StaticTreemapRenderer;
