//! Static Treemap Renderer
//! Draws a treemap into an in-memory bitmap with plotters and writes PNG or JSON files.
//!
//! Layout:
//! 1. Title: "{mode label} ({color scale})" centered
//! 2. Nested rectangles for every level the mode shows, labelled where they fit
//! 3. Color bar with tick labels along the bottom

use crate::charts::palette::{text_on, ColorMap, PAPER_FILL};
use crate::charts::plotter::{fit_label, tick_label, TreemapChart};
use crate::treemap::layout::{layout_treemap, LayoutRect, Padding};
use crate::treemap::Treemap;
use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::info;

const FONT_FAMILY: &str = "sans-serif";
const TITLE_H: u32 = 40;
const BAR_H: u32 = 56;
const MARGIN: u32 = 10;
/// Upper bound on the RGB buffer allocated for one image.
const MAX_BUFFER_BYTES: usize = 256 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Draw(String),
    #[error("Font unavailable: {0}")]
    Font(String),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image size {0}x{1} is out of range")]
    Size(u32, u32),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Register egui's bundled proportional font with plotters, once per process.
fn ensure_font() -> Result<(), RenderError> {
    static FONT: OnceLock<Result<(), String>> = OnceLock::new();
    FONT.get_or_init(|| {
        let defs = egui::FontDefinitions::default();
        let data = defs
            .font_data
            .get("Ubuntu-Light")
            .ok_or_else(|| "bundled font 'Ubuntu-Light' not found".to_string())?;
        let bytes: &'static [u8] = match &data.font {
            Cow::Borrowed(bytes) => *bytes,
            Cow::Owned(bytes) => Box::leak(bytes.clone().into_boxed_slice()),
        };
        plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes)
            .map_err(|_| "InvalidFont".to_string())
    })
    .clone()
    .map_err(RenderError::Font)
}

/// Length of the RGB buffer for a `width` x `height` image, if it is allowed.
fn buffer_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
        .filter(|&len| len <= MAX_BUFFER_BYTES)
}

fn rgb(c: [u8; 3]) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

pub struct StaticTreemapRenderer;

impl StaticTreemapRenderer {
    /// Render the whole tree (focused at the root) as PNG bytes.
    pub fn render_png_bytes(tree: &Treemap, width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
        if width < 200 || height < TITLE_H + BAR_H + 100 {
            return Err(RenderError::Size(width, height));
        }
        let len = buffer_len(width, height).ok_or(RenderError::Size(width, height))?;
        ensure_font()?;

        let chart = TreemapChart::new(tree.clone());
        let mut buffer = vec![0u8; len];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&rgb(PAPER_FILL)).map_err(draw_err)?;

            let title = format!("{} ({})", tree.mode_label, tree.color_scale.label());
            root.draw(&Text::new(
                title,
                ((width / 2) as i32, (MARGIN + 4) as i32),
                (FONT_FAMILY, 22)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Top)),
            ))
            .map_err(draw_err)?;

            let bounds = LayoutRect::new(
                MARGIN as f64,
                (TITLE_H + MARGIN) as f64,
                (width - 2 * MARGIN) as f64,
                (height - TITLE_H - BAR_H - 2 * MARGIN) as f64,
            );
            Self::draw_tiles(&root, &chart, bounds)?;
            Self::draw_color_bar(&root, &chart, width, height)?;
            root.present().map_err(draw_err)?;
        }

        let image = RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| RenderError::Draw("bitmap buffer has the wrong length".to_string()))?;
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn draw_tiles(
        root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
        chart: &TreemapChart,
        bounds: LayoutRect,
    ) -> Result<(), RenderError> {
        let placed = layout_treemap(
            &chart.tree,
            Treemap::ROOT,
            bounds,
            chart.tree.max_depth,
            Padding::default(),
        );

        for p in &placed {
            let fill = chart.fill(p.node);
            let (x0, y0) = (p.rect.x.round() as i32, p.rect.y.round() as i32);
            let (x1, y1) = (p.rect.right().round() as i32, p.rect.bottom().round() as i32);
            root.draw(&Rectangle::new([(x0, y0), (x1, y1)], rgb(fill).filled()))
                .map_err(draw_err)?;
            root.draw(&Rectangle::new([(x0, y0), (x1, y1)], rgb(PAPER_FILL).stroke_width(1)))
                .map_err(draw_err)?;

            if p.rect.h < 16.0 {
                continue;
            }
            if let Some(label) = fit_label(&chart.tree.nodes[p.node].label, p.rect.w) {
                root.draw(&Text::new(
                    label,
                    (x0 + 4, y0 + 3),
                    (FONT_FAMILY, 12).into_font().color(&rgb(text_on(fill))),
                ))
                .map_err(draw_err)?;
            }
        }
        Ok(())
    }

    fn draw_color_bar(
        root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
        chart: &TreemapChart,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        let bar_w = (width / 2) as i32;
        let x0 = ((width as i32) - bar_w) / 2;
        let y0 = (height - BAR_H + 8) as i32;
        let bar_h = 16;

        for dx in 0..bar_w {
            let t = (dx as f64 + 0.5) / bar_w as f64;
            root.draw(&Rectangle::new(
                [(x0 + dx, y0), (x0 + dx + 1, y0 + bar_h)],
                rgb(ColorMap::sample(t)).filled(),
            ))
            .map_err(draw_err)?;
        }

        let ticks = chart.color_map.ticks(5);
        let last = (ticks.len() - 1).max(1) as f64;
        for (i, tick) in ticks.iter().enumerate() {
            let x = x0 + (bar_w as f64 * i as f64 / last).round() as i32;
            root.draw(&PathElement::new(
                vec![(x, y0 + bar_h), (x, y0 + bar_h + 4)],
                BLACK,
            ))
            .map_err(draw_err)?;
            root.draw(&Text::new(
                tick_label(*tick, chart.tree.color_scale),
                (x, y0 + bar_h + 6),
                (FONT_FAMILY, 12)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Top)),
            ))
            .map_err(draw_err)?;
        }
        Ok(())
    }

    pub fn render_png(tree: &Treemap, path: &Path, width: u32, height: u32) -> Result<(), RenderError> {
        let bytes = Self::render_png_bytes(tree, width, height)?;
        std::fs::write(path, bytes)?;
        info!("Wrote {}x{} treemap image to {:?}", width, height, path);
        Ok(())
    }

    /// Serialize the chart description as pretty JSON.
    pub fn write_json(tree: &Treemap, path: &Path) -> Result<(), RenderError> {
        std::fs::write(path, tree.to_json()?)?;
        info!("Wrote treemap description ({} nodes) to {:?}", tree.nodes.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treemap::{ColorScale, GroupingMode, TreemapBuilder};
    use polars::prelude::{Column, DataFrame};

    fn tree() -> Treemap {
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), vec!["ABC", "DEF", "GHI"]),
            Column::new("name".into(), vec!["Big Fund", "Big Fund", "Other"]),
            Column::new("sector".into(), vec!["Tech", "Energy", "Tech"]),
            Column::new("value".into(), vec![3.0e9, 4.0e7, 9.0e8]),
        ])
        .unwrap();
        TreemapBuilder::build(&df, GroupingMode::find("sector").unwrap(), ColorScale::Log10).unwrap()
    }

    #[test]
    fn test_png_has_signature_and_size() {
        let bytes = StaticTreemapRenderer::render_png_bytes(&tree(), 640, 420).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 420));
    }

    #[test]
    fn test_too_small_is_rejected() {
        let err = StaticTreemapRenderer::render_png_bytes(&tree(), 50, 50).unwrap_err();
        assert!(matches!(err, RenderError::Size(50, 50)));
    }

    #[test]
    fn test_oversized_is_rejected() {
        let err = StaticTreemapRenderer::render_png_bytes(&tree(), u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, RenderError::Size(u32::MAX, u32::MAX)));
        let err = StaticTreemapRenderer::render_png_bytes(&tree(), 20_000, 20_000).unwrap_err();
        assert!(matches!(err, RenderError::Size(20_000, 20_000)));
        assert_eq!(buffer_len(640, 420), Some(640 * 420 * 3));
    }

    #[test]
    fn test_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("chart.png");
        let json = dir.path().join("chart.json");
        let tree = tree();

        StaticTreemapRenderer::render_png(&tree, &png, 400, 300).unwrap();
        StaticTreemapRenderer::write_json(&tree, &json).unwrap();

        assert!(std::fs::metadata(&png).unwrap().len() > 0);
        let text = std::fs::read_to_string(&json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["mode"], "sector");
        assert_eq!(value["color_range"][0], 6.0);
    }
}
