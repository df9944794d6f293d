//! Treemap Plotter Module
//! Paints interactive treemaps with the egui painter.

use crate::charts::palette::{text_on, ColorMap, ROOT_FILL};
use crate::data::magnitude::{format_compact, format_grouped};
use crate::treemap::layout::{hit_test, layout_treemap, LayoutRect, Padding, PlacedNode};
use crate::treemap::{ColorScale, Treemap};
use egui::{Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Stroke};

/// Approximate glyph width used to decide whether a label fits its tile.
pub const LABEL_CHAR_WIDTH: f64 = 7.0;
const LABEL_FONT_SIZE: f32 = 12.0;
const HOVER_STROKE: Color32 = Color32::from_rgb(33, 33, 33);
const COLOR_BAR_STEPS: usize = 64;

/// A built treemap together with the color mapping used to draw it.
#[derive(Clone)]
pub struct TreemapChart {
    pub tree: Treemap,
    pub color_map: ColorMap,
}

impl TreemapChart {
    pub fn new(tree: Treemap) -> Self {
        let color_map = ColorMap::new(tree.color_range);
        Self { tree, color_map }
    }

    /// Fill for a node; the constant root is always light gray.
    pub fn fill(&self, node: usize) -> [u8; 3] {
        if node == Treemap::ROOT {
            ROOT_FILL
        } else {
            self.color_map.rgb(self.tree.nodes[node].color)
        }
    }
}

/// What the user did with the treemap this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreemapAction {
    None,
    /// Zoom so that this node fills the chart.
    Focus(usize),
}

pub fn color32(rgb: [u8; 3]) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

/// Shorten a label to fit `width` pixels, or `None` when not even a stub fits.
pub fn fit_label(label: &str, width: f64) -> Option<String> {
    let max_chars = ((width - 8.0) / LABEL_CHAR_WIDTH).floor();
    if max_chars < 3.0 {
        return None;
    }
    let max_chars = max_chars as usize;
    let count = label.chars().count();
    if count <= max_chars {
        Some(label.to_string())
    } else {
        let kept: String = label.chars().take(max_chars - 1).collect();
        Some(format!("{}…", kept))
    }
}

/// Hover text lines: label, path, and value in dollars.
pub fn hover_lines(tree: &Treemap, node: usize) -> [String; 3] {
    let n = &tree.nodes[node];
    [
        n.label.clone(),
        format!("Path: {}", n.id),
        format!("Value: {}$", format_grouped(n.value)),
    ]
}

/// Label for a color bar tick; log ticks are shown as the dollar amount they stand for.
pub fn tick_label(value: f64, scale: ColorScale) -> String {
    match scale {
        ColorScale::Linear => format_compact(value),
        ColorScale::Log10 => format_compact(10f64.powf(value)),
    }
}

/// Paints treemaps and the color bar into egui.
pub struct TreemapPlotter;

impl TreemapPlotter {
    fn to_rect(rect: &LayoutRect) -> Rect {
        Rect::from_min_size(
            Pos2::new(rect.x as f32, rect.y as f32),
            egui::vec2(rect.w as f32, rect.h as f32),
        )
    }

    /// Draw the treemap rooted at `focus` into a `height` tall area.
    pub fn draw_treemap(
        ui: &mut egui::Ui,
        chart: &TreemapChart,
        focus: usize,
        height: f32,
    ) -> TreemapAction {
        let size = egui::vec2(ui.available_width(), height.max(100.0));
        let (area, response) = ui.allocate_exact_size(size, Sense::click());
        let painter = ui.painter_at(area);

        let bounds = LayoutRect::new(
            area.min.x as f64,
            area.min.y as f64,
            area.width() as f64,
            area.height() as f64,
        );
        let placed = layout_treemap(
            &chart.tree,
            focus,
            bounds,
            chart.tree.max_depth,
            Padding::default(),
        );

        for p in &placed {
            Self::draw_tile(&painter, chart, p);
        }

        let mut action = TreemapAction::None;

        if let Some(pos) = response.hover_pos() {
            if let Some(hit) = hit_test(&placed, pos.x as f64, pos.y as f64) {
                painter.rect_stroke(Self::to_rect(&hit.rect), 0.0, Stroke::new(2.0, HOVER_STROKE));

                let [label, path, value] = hover_lines(&chart.tree, hit.node);
                response.clone().on_hover_ui_at_pointer(|ui| {
                    ui.label(RichText::new(label).strong().size(14.0).color(Color32::BLACK));
                    ui.label(RichText::new(path).size(14.0).color(Color32::BLACK));
                    ui.label(RichText::new(value).size(14.0).color(Color32::BLACK));
                });

                if response.clicked() {
                    action = Self::click_target(&chart.tree, focus, hit.node);
                }
            }
        }

        action
    }

    /// Clicking a parent zooms into it; clicking the focused tile zooms back out.
    pub fn click_target(tree: &Treemap, focus: usize, clicked: usize) -> TreemapAction {
        if clicked == focus {
            return tree.nodes[focus]
                .parent
                .map(TreemapAction::Focus)
                .unwrap_or(TreemapAction::None);
        }
        if tree.nodes[clicked].children.is_empty() {
            return TreemapAction::None;
        }
        TreemapAction::Focus(clicked)
    }

    fn draw_tile(painter: &egui::Painter, chart: &TreemapChart, placed: &PlacedNode) {
        let rect = Self::to_rect(&placed.rect);
        let fill = chart.fill(placed.node);
        painter.rect_filled(rect, 0.0, color32(fill));

        let node = &chart.tree.nodes[placed.node];
        if placed.rect.h < LABEL_FONT_SIZE as f64 + 4.0 {
            return;
        }
        if let Some(label) = fit_label(&node.label, placed.rect.w) {
            painter.with_clip_rect(rect).text(
                rect.min + egui::vec2(4.0, 2.0),
                Align2::LEFT_TOP,
                label,
                FontId::proportional(LABEL_FONT_SIZE),
                color32(text_on(fill)),
            );
        }
    }

    /// Horizontal gradient legend with tick labels.
    pub fn draw_color_bar(ui: &mut egui::Ui, chart: &TreemapChart) {
        let size = egui::vec2(ui.available_width().min(420.0), 34.0);
        let (area, _) = ui.allocate_exact_size(size, Sense::hover());
        let painter = ui.painter_at(area);

        let bar = Rect::from_min_size(area.min, egui::vec2(area.width(), 14.0));
        let step = bar.width() / COLOR_BAR_STEPS as f32;
        for i in 0..COLOR_BAR_STEPS {
            let t = (i as f64 + 0.5) / COLOR_BAR_STEPS as f64;
            let cell = Rect::from_min_size(
                Pos2::new(bar.min.x + i as f32 * step, bar.min.y),
                egui::vec2(step + 0.5, bar.height()),
            );
            painter.rect_filled(cell, 0.0, color32(ColorMap::sample(t)));
        }

        let ticks = chart.color_map.ticks(5);
        let text_color = ui.visuals().text_color();
        for (i, tick) in ticks.iter().enumerate() {
            let x = bar.min.x + bar.width() * i as f32 / (ticks.len() - 1).max(1) as f32;
            let align = match i {
                0 => Align2::LEFT_TOP,
                n if n + 1 == ticks.len() => Align2::RIGHT_TOP,
                _ => Align2::CENTER_TOP,
            };
            painter.text(
                Pos2::new(x, bar.max.y + 2.0),
                align,
                tick_label(*tick, chart.tree.color_scale),
                FontId::proportional(11.0),
                text_color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treemap::{GroupingMode, TreemapBuilder};
    use polars::prelude::*;

    fn chart() -> TreemapChart {
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), vec!["ABC", "DEF", "ABC"]),
            Column::new("name".into(), vec!["Big Fund", "Big Fund", "Other"]),
            Column::new("sector".into(), vec!["Tech", "Energy", "Tech"]),
            Column::new("value".into(), vec![1500.25, 500.0, 1000.0]),
        ])
        .unwrap();
        let tree =
            TreemapBuilder::build(&df, GroupingMode::find("sector").unwrap(), ColorScale::Linear)
                .unwrap();
        TreemapChart::new(tree)
    }

    #[test]
    fn test_fit_label_truncates() {
        assert_eq!(fit_label("Vanguard", 200.0).as_deref(), Some("Vanguard"));
        assert_eq!(fit_label("Vanguard Group Inc", 64.0).as_deref(), Some("Vanguar…"));
        assert_eq!(fit_label("Vanguard", 20.0), None);
    }

    #[test]
    fn test_hover_lines_follow_template() {
        let chart = chart();
        let tech = chart.tree.nodes.iter().position(|n| n.id == "sp500/Tech").unwrap();
        let [label, path, value] = hover_lines(&chart.tree, tech);
        assert_eq!(label, "Tech");
        assert_eq!(path, "Path: sp500/Tech");
        assert_eq!(value, "Value: 2,500.25$");
    }

    #[test]
    fn test_root_is_gray() {
        let chart = chart();
        assert_eq!(chart.fill(Treemap::ROOT), ROOT_FILL);
    }

    #[test]
    fn test_click_zooms_in_and_out() {
        let chart = chart();
        let tree = &chart.tree;
        let tech = tree.nodes.iter().position(|n| n.id == "sp500/Tech").unwrap();
        let leaf = tree.nodes[tech].children[0];

        assert_eq!(TreemapPlotter::click_target(tree, Treemap::ROOT, tech), TreemapAction::Focus(tech));
        assert_eq!(TreemapPlotter::click_target(tree, tech, leaf), TreemapAction::None);
        assert_eq!(
            TreemapPlotter::click_target(tree, tech, tech),
            TreemapAction::Focus(Treemap::ROOT)
        );
        assert_eq!(
            TreemapPlotter::click_target(tree, Treemap::ROOT, Treemap::ROOT),
            TreemapAction::None
        );
    }

    #[test]
    fn test_tick_labels() {
        assert_eq!(tick_label(7.0, ColorScale::Log10), "10M");
        assert_eq!(tick_label(2500.0, ColorScale::Linear), "2.5k");
    }
}
