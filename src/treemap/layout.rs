//! Squarified treemap layout.
//!
//! Rectangles are in an abstract coordinate space with `y` growing downwards,
//! so the same layout feeds both the egui painter and the bitmap renderer.

use crate::treemap::hierarchy::Treemap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl LayoutRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w: w.max(0.0),
            h: h.max(0.0),
        }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Shrink by `pad` on every side and reserve `header` at the top.
    pub fn inset(&self, pad: f64, header: f64) -> Self {
        Self::new(
            self.x + pad,
            self.y + pad + header,
            self.w - 2.0 * pad,
            self.h - 2.0 * pad - header,
        )
    }
}

/// Split `bounds` into one rectangle per value, areas proportional to values.
///
/// Values should be sorted in descending order for the best aspect ratios.
/// Non-positive values get an empty rectangle at the origin of `bounds`.
pub fn squarify(values: &[f64], bounds: LayoutRect) -> Vec<LayoutRect> {
    let empty = LayoutRect::new(bounds.x, bounds.y, 0.0, 0.0);
    let mut rects = vec![empty; values.len()];

    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 || bounds.area() <= 0.0 {
        return rects;
    }

    let scale = bounds.area() / total;
    let items: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .map(|(i, v)| (i, v * scale))
        .collect();

    let mut free = bounds;
    let mut row: Vec<(usize, f64)> = Vec::new();
    let mut next = 0;

    while next < items.len() {
        let side = free.w.min(free.h);
        let candidate = items[next];

        let mut extended = row.clone();
        extended.push(candidate);
        if row.is_empty() || worst_ratio(&extended, side) <= worst_ratio(&row, side) {
            row = extended;
            next += 1;
        } else {
            free = place_row(&row, free, &mut rects);
            row.clear();
        }
    }
    if !row.is_empty() {
        place_row(&row, free, &mut rects);
    }

    rects
}

/// Largest aspect ratio in a row laid along a side of length `side`.
fn worst_ratio(row: &[(usize, f64)], side: f64) -> f64 {
    let sum: f64 = row.iter().map(|(_, a)| a).sum();
    if sum <= 0.0 || side <= 0.0 {
        return f64::INFINITY;
    }
    let (min, max) = row.iter().fold((f64::INFINITY, 0.0f64), |(lo, hi), (_, a)| {
        (lo.min(*a), hi.max(*a))
    });
    let side2 = side * side;
    let sum2 = sum * sum;
    (side2 * max / sum2).max(sum2 / (side2 * min))
}

/// Lay the row along the shorter side of `free`; returns the space left over.
fn place_row(row: &[(usize, f64)], free: LayoutRect, rects: &mut [LayoutRect]) -> LayoutRect {
    let sum: f64 = row.iter().map(|(_, a)| a).sum();

    if free.w >= free.h {
        let width = if free.h > 0.0 { sum / free.h } else { 0.0 };
        let mut y = free.y;
        for &(i, area) in row {
            let h = if width > 0.0 { area / width } else { 0.0 };
            rects[i] = LayoutRect::new(free.x, y, width, h);
            y += h;
        }
        LayoutRect::new(free.x + width, free.y, free.w - width, free.h)
    } else {
        let height = if free.w > 0.0 { sum / free.w } else { 0.0 };
        let mut x = free.x;
        for &(i, area) in row {
            let w = if height > 0.0 { area / height } else { 0.0 };
            rects[i] = LayoutRect::new(x, free.y, w, height);
            x += w;
        }
        LayoutRect::new(free.x, free.y + height, free.w, free.h - height)
    }
}

/// Spacing used when nesting children inside a parent rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub inner: f64,
    pub header: f64,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            inner: 2.0,
            header: 18.0,
        }
    }
}

/// A node placed on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedNode {
    pub node: usize,
    pub rect: LayoutRect,
    /// Depth relative to the focused node (the focus itself is 0).
    pub level: usize,
}

/// Lay out the subtree under `focus`, at most `max_depth` levels including `focus`.
///
/// Parents come before their children in the output, so painting in order
/// draws nested rectangles correctly.
pub fn layout_treemap(
    tree: &Treemap,
    focus: usize,
    bounds: LayoutRect,
    max_depth: Option<usize>,
    padding: Padding,
) -> Vec<PlacedNode> {
    let mut placed = Vec::new();
    if tree.node(focus).is_none() {
        return placed;
    }

    let limit = max_depth.unwrap_or(usize::MAX).max(1);
    let mut stack = vec![(focus, bounds, 0usize)];
    while let Some((index, rect, level)) = stack.pop() {
        placed.push(PlacedNode {
            node: index,
            rect,
            level,
        });

        let node = &tree.nodes[index];
        if node.children.is_empty() || level + 1 >= limit {
            continue;
        }

        let inner = rect.inset(padding.inner, padding.header);
        if inner.w < 1.0 || inner.h < 1.0 {
            continue;
        }

        let values: Vec<f64> = node.children.iter().map(|&c| tree.nodes[c].value).collect();
        let rects = squarify(&values, inner);
        for (&child, child_rect) in node.children.iter().zip(rects).rev() {
            if child_rect.area() > 0.0 {
                stack.push((child, child_rect, level + 1));
            }
        }
    }
    placed
}

/// Deepest placed node under the point, if any.
pub fn hit_test(placed: &[PlacedNode], px: f64, py: f64) -> Option<&PlacedNode> {
    placed
        .iter()
        .filter(|p| p.rect.contains(px, py))
        .max_by_key(|p| p.level)
}
