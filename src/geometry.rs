//! Geometry Primitives
//!
//! Pure functions over a y-down canvas. Angles are in degrees, 0° points
//! right and -90° points to the top.

use serde::{Deserialize, Serialize};

use crate::model::{BorderStyle, SealShape};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A closed outline usable as a seal border.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outline {
    Circle { center: Point, r: f64 },
    Ellipse { center: Point, rx: f64, ry: f64 },
    Rect { x: f64, y: f64, width: f64, height: f64 },
}

/// Oval borders are flattened vertically by this factor.
pub const OVAL_RATIO: f64 = 0.7;
/// Rectangular border width as a fraction of the canvas.
pub const RECT_WIDTH_RATIO: f64 = 0.8;
/// Rectangular border height as a fraction of the canvas.
pub const RECT_HEIGHT_RATIO: f64 = 0.5;

pub fn polar(center: Point, radius: f64, angle_deg: f64) -> Point {
    let theta = angle_deg.to_radians();
    Point::new(center.x + radius * theta.cos(), center.y + radius * theta.sin())
}

pub fn circle(center: Point, r: f64) -> Outline {
    Outline::Circle { center, r }
}

pub fn ellipse(center: Point, rx: f64) -> Outline {
    Outline::Ellipse { center, rx, ry: rx * OVAL_RATIO }
}

pub fn rectangle(center: Point, canvas: f64) -> Outline {
    let width = canvas * RECT_WIDTH_RATIO;
    let height = canvas * RECT_HEIGHT_RATIO;
    Outline::Rect {
        x: center.x - width / 2.0,
        y: center.y - height / 2.0,
        width,
        height,
    }
}

/// The outline for `shape` on a canvas of side `canvas` with border radius `r`.
pub fn border_outline(shape: SealShape, center: Point, r: f64, canvas: f64) -> Outline {
    match shape {
        SealShape::Round => circle(center, r),
        SealShape::Oval => ellipse(center, r),
        SealShape::Rectangular => rectangle(center, canvas),
    }
}

impl Outline {
    /// Shrink the outline by `by` units on every side.
    pub fn inset(&self, by: f64) -> Outline {
        match *self {
            Outline::Circle { center, r } => Outline::Circle { center, r: r - by },
            Outline::Ellipse { center, rx, ry } => Outline::Ellipse {
                center,
                rx: rx - by,
                ry: ry - by,
            },
            Outline::Rect { x, y, width, height } => Outline::Rect {
                x: x + by,
                y: y + by,
                width: width - 2.0 * by,
                height: height - 2.0 * by,
            },
        }
    }

    /// Every extent strictly positive. An over-inset outline is not drawable.
    pub fn is_drawable(&self) -> bool {
        match *self {
            Outline::Circle { r, .. } => r > 0.0,
            Outline::Ellipse { rx, ry, .. } => rx > 0.0 && ry > 0.0,
            Outline::Rect { width, height, .. } => width > 0.0 && height > 0.0,
        }
    }

    /// Largest radius usable for content placed around the center.
    pub fn inner_radius(&self) -> f64 {
        match *self {
            Outline::Circle { r, .. } => r,
            Outline::Ellipse { ry, .. } => ry,
            Outline::Rect { height, .. } => height / 2.0,
        }
    }
}

/// Outlines for a border style: Double yields a second ring inset by `thickness + 2`.
pub fn border_rings(outline: Outline, style: BorderStyle, thickness: f64) -> Vec<Outline> {
    match style {
        BorderStyle::Double => vec![outline, outline.inset(thickness + 2.0)],
        BorderStyle::Solid | BorderStyle::Dashed => vec![outline],
    }
}

/// `count` angles evenly spread over 360°, the first at the top.
pub fn even_angles(count: usize) -> Vec<f64> {
    if count == 0 {
        return vec![];
    }
    let step = 360.0 / count as f64;
    (0..count).map(|i| i as f64 * step - 90.0).collect()
}

/// Five-point star: 10 vertices alternating `size` and `size / 2`, first at the top.
pub fn star_vertices(center: Point, size: f64) -> Vec<Point> {
    (0..10)
        .map(|i| {
            let radius = if i % 2 == 0 { size } else { size / 2.0 };
            polar(center, radius, i as f64 * 36.0 - 90.0)
        })
        .collect()
}
