//! Treemap Hierarchy Builder
//! Aggregates the merged table into a rooted tree of value-weighted nodes.

use crate::data::loader::{float_column, text_column};
use crate::treemap::mode::{ColorScale, GroupingMode, ROOT_LABEL, VALUE_COLUMN};
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TreemapError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' is missing from the holdings table")]
    MissingColumn(String),
    #[error("No rows with a complete path and a positive value")]
    NoRows,
}

/// A node of the treemap. `id` is the `/`-joined path from the root.
#[derive(Debug, Clone, Serialize)]
pub struct TreemapNode {
    pub id: String,
    pub label: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
    pub value: f64,
    pub color: f64,
    pub row_count: usize,
}

/// Chart description handed to the viewer and the static renderer.
#[derive(Debug, Clone, Serialize)]
pub struct Treemap {
    pub mode: &'static str,
    pub mode_label: &'static str,
    pub color_scale: ColorScale,
    pub color_range: (f64, f64),
    pub max_depth: Option<usize>,
    pub skipped_rows: usize,
    pub nodes: Vec<TreemapNode>,
}

impl Treemap {
    pub const ROOT: usize = 0;

    pub fn root(&self) -> &TreemapNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, index: usize) -> Option<&TreemapNode> {
        self.nodes.get(index)
    }

    /// Index of the node with this `/`-joined id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreemapNode> {
        self.nodes.iter().filter(|node| node.children.is_empty())
    }

    /// Indices from the root down to `index`, inclusive.
    pub fn ancestry(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            chain.push(i);
            current = self.nodes.get(i).and_then(|node| node.parent);
        }
        chain.reverse();
        chain
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Default)]
struct Accumulator {
    value: f64,
    weighted_color: f64,
    color_sum: f64,
    row_count: usize,
}

/// Builds treemaps from the shared holdings table.
pub struct TreemapBuilder;

impl TreemapBuilder {
    /// Build the hierarchy for one grouping mode.
    ///
    /// The table is only read. Derived per-row colors (for example the log10
    /// of the value) live in a buffer local to this call.
    pub fn build(
        df: &DataFrame,
        mode: &'static GroupingMode,
        scale: ColorScale,
    ) -> Result<Treemap, TreemapError> {
        for column in mode.path.iter().chain(std::iter::once(&VALUE_COLUMN)) {
            if df.column(column).is_err() {
                return Err(TreemapError::MissingColumn(column.to_string()));
            }
        }

        let path_cells: Vec<Vec<Option<String>>> = mode
            .path
            .iter()
            .map(|column| text_column(df, column))
            .collect::<PolarsResult<_>>()?;
        let values = float_column(df, VALUE_COLUMN)?;
        let colors: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.and_then(|v| scale.transform(v)))
            .collect();

        let mut labels: Vec<String> = vec![ROOT_LABEL.to_string()];
        let mut ids: Vec<String> = vec![ROOT_LABEL.to_string()];
        let mut parents: Vec<Option<usize>> = vec![None];
        let mut depths: Vec<usize> = vec![0];
        let mut totals: Vec<Accumulator> = vec![Accumulator::default()];
        // Keyed by parent and segment: labels may contain '/', so ids are not unique keys.
        let mut index: HashMap<(usize, String), usize> = HashMap::new();
        let mut skipped_rows = 0;

        for row in 0..df.height() {
            let (Some(value), Some(color)) = (values[row], colors[row]) else {
                skipped_rows += 1;
                continue;
            };
            if !(value > 0.0) {
                skipped_rows += 1;
                continue;
            }
            let Some(segments) = path_cells
                .iter()
                .map(|cells| cells[row].as_deref())
                .collect::<Option<Vec<&str>>>()
            else {
                skipped_rows += 1;
                continue;
            };

            let mut chain = Vec::with_capacity(segments.len() + 1);
            chain.push(Treemap::ROOT);
            let mut parent = Treemap::ROOT;
            for (level, segment) in segments.iter().enumerate() {
                let key = (parent, segment.to_string());
                let node = match index.get(&key) {
                    Some(&node) => node,
                    None => {
                        let node = labels.len();
                        labels.push(segment.to_string());
                        ids.push(format!("{}/{}", ids[parent], segment));
                        parents.push(Some(parent));
                        depths.push(level + 1);
                        totals.push(Accumulator::default());
                        index.insert(key, node);
                        node
                    }
                };
                chain.push(node);
                parent = node;
            }

            for node in chain {
                let acc = &mut totals[node];
                acc.value += value;
                acc.weighted_color += color * value;
                acc.color_sum += color;
                acc.row_count += 1;
            }
        }

        if totals[Treemap::ROOT].row_count == 0 {
            return Err(TreemapError::NoRows);
        }
        if skipped_rows > 0 {
            warn!(
                "{}: skipped {} rows with a missing path cell or non-positive value",
                mode.id, skipped_rows
            );
        }

        let mut nodes: Vec<TreemapNode> = labels
            .into_iter()
            .zip(ids)
            .zip(parents)
            .zip(depths)
            .zip(totals)
            .map(|((((label, id), parent), depth), acc)| TreemapNode {
                id,
                label,
                parent,
                children: Vec::new(),
                depth,
                value: acc.value,
                color: if acc.value > 0.0 {
                    acc.weighted_color / acc.value
                } else {
                    acc.color_sum / acc.row_count.max(1) as f64
                },
                row_count: acc.row_count,
            })
            .collect();

        for i in 1..nodes.len() {
            if let Some(parent) = nodes[i].parent {
                nodes[parent].children.push(i);
            }
        }
        let order: Vec<(f64, String)> = nodes.iter().map(|n| (n.value, n.label.clone())).collect();
        for node in nodes.iter_mut() {
            node.children.sort_by(|&a, &b| {
                order[b]
                    .0
                    .partial_cmp(&order[a].0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| order[a].1.cmp(&order[b].1))
            });
        }

        let color_range = scale
            .fixed_range()
            .unwrap_or_else(|| Self::observed_range(&nodes));

        debug!(
            "{}: {} nodes, total value {:.2}",
            mode.id,
            nodes.len(),
            nodes[Treemap::ROOT].value
        );

        Ok(Treemap {
            mode: mode.id,
            mode_label: mode.label,
            color_scale: scale,
            color_range,
            max_depth: mode.max_depth,
            skipped_rows,
            nodes,
        })
    }

    fn observed_range(nodes: &[TreemapNode]) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for node in nodes.iter().filter(|n| n.children.is_empty()) {
            min = min.min(node.color);
            max = max.max(node.color);
        }
        if min.is_infinite() {
            (0.0, 1.0)
        } else {
            (min, max)
        }
    }
}
