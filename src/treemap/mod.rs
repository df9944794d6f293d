//! Treemap module - grouping modes, hierarchy aggregation and layout

mod hierarchy;
pub mod layout;
mod mode;

pub use hierarchy::{Treemap, TreemapBuilder};
pub use mode::{ColorScale, GroupingMode, ROOT_LABEL};
