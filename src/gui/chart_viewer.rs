//! Treemap Viewer Widget
//! Central panel with the breadcrumb, the zoomable treemap and its color bar.

use crate::charts::{TreemapAction, TreemapChart, TreemapPlotter};
use crate::treemap::Treemap;
use egui::{Color32, RichText};

const COLOR_BAR_SPACE: f32 = 60.0;

/// Holds the current chart and the node it is zoomed into.
#[derive(Default)]
pub struct TreemapViewer {
    pub chart: Option<TreemapChart>,
    pub focus: usize,
}

impl TreemapViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.chart = None;
        self.focus = Treemap::ROOT;
    }

    /// Replace the chart. The zoom is kept when the new tree still has a node
    /// with the focused id, which is the case when only the color scale changed.
    pub fn set_chart(&mut self, tree: Treemap) {
        let focused_id = self
            .chart
            .as_ref()
            .and_then(|c| c.tree.node(self.focus))
            .map(|n| n.id.clone());
        self.focus = focused_id
            .and_then(|id| tree.index_of(&id))
            .unwrap_or(Treemap::ROOT);
        self.chart = Some(TreemapChart::new(tree));
    }

    pub fn tree(&self) -> Option<&Treemap> {
        self.chart.as_ref().map(|c| &c.tree)
    }

    pub fn show(&mut self, _ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(chart) = &self.chart else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data").size(20.0));
            });
            return;
        };

        ui.label(
            RichText::new(format!(
                "{} ({})",
                chart.tree.mode_label,
                chart.tree.color_scale.label()
            ))
            .size(18.0)
            .strong(),
        );

        // Breadcrumb: every ancestor of the focus is a link back up.
        let mut new_focus = None;
        ui.horizontal_wrapped(|ui| {
            let chain = chart.tree.ancestry(self.focus);
            for (i, &node) in chain.iter().enumerate() {
                if i > 0 {
                    ui.label(RichText::new("›").color(Color32::GRAY));
                }
                let label = &chart.tree.nodes[node].label;
                if node == self.focus {
                    ui.label(RichText::new(label).strong());
                } else if ui.link(label).clicked() {
                    new_focus = Some(node);
                }
            }
        });
        ui.add_space(6.0);

        let height = (ui.available_height() - COLOR_BAR_SPACE).max(100.0);
        if let TreemapAction::Focus(node) =
            TreemapPlotter::draw_treemap(ui, chart, self.focus, height)
        {
            new_focus = Some(node);
        }

        ui.add_space(8.0);
        TreemapPlotter::draw_color_bar(ui, chart);

        if let Some(node) = new_focus {
            self.focus = node;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treemap::{ColorScale, GroupingMode, TreemapBuilder};
    use polars::prelude::*;

    fn build(scale: ColorScale) -> Treemap {
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), vec!["ABC", "DEF"]),
            Column::new("name".into(), vec!["Big Fund", "Other"]),
            Column::new("sector".into(), vec!["Tech", "Energy"]),
            Column::new("value".into(), vec![2.0e9, 5.0e8]),
        ])
        .unwrap();
        TreemapBuilder::build(&df, GroupingMode::find("sector").unwrap(), scale).unwrap()
    }

    #[test]
    fn test_focus_survives_scale_change() {
        let mut viewer = TreemapViewer::new();
        viewer.set_chart(build(ColorScale::Linear));
        let tree = viewer.tree().unwrap();
        viewer.focus = tree.nodes.iter().position(|n| n.id == "sp500/Energy").unwrap();

        viewer.set_chart(build(ColorScale::Log10));
        let tree = viewer.tree().unwrap();
        assert_eq!(tree.nodes[viewer.focus].id, "sp500/Energy");
        assert_eq!(tree.color_scale, ColorScale::Log10);
    }

    #[test]
    fn test_clear_resets_focus() {
        let mut viewer = TreemapViewer::new();
        viewer.set_chart(build(ColorScale::Linear));
        viewer.focus = 1;
        viewer.clear();
        assert!(viewer.chart.is_none());
        assert_eq!(viewer.focus, Treemap::ROOT);
    }
}
