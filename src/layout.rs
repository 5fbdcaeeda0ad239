//! Layout Composer
//!
//! Turns a `SealVersionSpec` into an ordered `Drawing` on a fixed square
//! canvas. Pure: the same spec and config always give the same drawing.

use serde::{Deserialize, Serialize};

use crate::error::{SealError, SealResult};
use crate::geometry::{self, Outline, Point};
use crate::model::{BorderStyle, InnerSymbol, SealType, SealVersionSpec};

/// Inner symbols sit on a ring at this fraction of the border radius.
pub const SYMBOL_RING_RATIO: f64 = 0.6;
/// Vertical distance of the holder name/title lines from the center.
pub const NOMINATIVE_LINE_OFFSET: f64 = 10.0;
/// Side of the centered logo square.
pub const LOGO_SIZE: f64 = 40.0;
pub const LOGO_OPACITY: f64 = 0.8;
pub const SIGNATURE_WIDTH: f64 = 60.0;
pub const SIGNATURE_HEIGHT: f64 = 30.0;
/// Length of a `Line` tick symbol.
pub const LINE_TICK_LENGTH: f64 = 8.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    #[serde(default = "default_canvas_size")]
    pub canvas_size: f64,
    #[serde(default = "default_stroke_margin")]
    pub stroke_margin: f64,
}

fn default_canvas_size() -> f64 { 200.0 }
fn default_stroke_margin() -> f64 { 10.0 }

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            canvas_size: default_canvas_size(),
            stroke_margin: default_stroke_margin(),
        }
    }
}

impl LayoutConfig {
    pub fn center(&self) -> Point {
        Point::new(self.canvas_size / 2.0, self.canvas_size / 2.0)
    }

    /// Radius of the outer border: half the canvas minus the stroke margin.
    pub fn radius(&self) -> f64 {
        self.canvas_size / 2.0 - self.stroke_margin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFont {
    pub family: String,
    pub weight: String,
    pub size: f64,
    pub color: String,
}

/// A single character placed on a circle, rotated to read tangentially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub ch: char,
    pub point: Point,
    pub rotate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Star,
    Line,
    Dot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "primitive", rename_all = "camelCase")]
pub enum Primitive {
    Border {
        outline: Outline,
        stroke: String,
        style: BorderStyle,
        thickness: f64,
    },
    CircularText {
        radius: f64,
        glyphs: Vec<Glyph>,
        font: TextFont,
    },
    CenterText {
        point: Point,
        text: String,
        font: TextFont,
    },
    Image {
        href: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        opacity: f64,
    },
    Symbol {
        kind: SymbolKind,
        point: Point,
        size: f64,
        color: String,
    },
}

/// Serializer-agnostic seal drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawing {
    pub canvas_size: f64,
    pub center: Point,
    /// Degrees, applied about `center` to every element.
    pub rotation: f64,
    /// Multiplier in `[0, 1]` applied to the whole canvas.
    pub opacity: f64,
    pub elements: Vec<Primitive>,
}

/// Place `text` evenly around a circle, first glyph at the top.
pub fn circular_text(text: &str, center: Point, radius: f64) -> Vec<Glyph> {
    let chars: Vec<char> = text.chars().collect();
    geometry::even_angles(chars.len())
        .into_iter()
        .zip(chars)
        .map(|(angle, ch)| Glyph {
            ch,
            point: geometry::polar(center, radius, angle),
            rotate: angle + 90.0,
        })
        .collect()
}

/// Border outlines for `spec`, outermost first.
fn rings(spec: &SealVersionSpec, config: &LayoutConfig) -> Vec<Outline> {
    let outer = geometry::border_outline(spec.shape, config.center(), config.radius(), config.canvas_size);
    geometry::border_rings(outer, spec.border.style, spec.border.thickness)
}

/// Circular text runs just inside the innermost ring.
fn external_text_radius(spec: &SealVersionSpec, innermost: Outline) -> f64 {
    innermost.inner_radius() - spec.border.thickness - spec.text.font_sizes.external / 2.0
}

fn external_text(spec: &SealVersionSpec) -> Option<&str> {
    match spec.seal_type {
        SealType::Institutional => spec.text.external.as_deref().filter(|s| !s.is_empty()),
        SealType::Nominative | SealType::Transactional => None,
    }
}

/// Reject specs whose parameters are in range but whose geometry would be
/// inverted: a ring inset past its own center, or circular text with a
/// non-positive radius (glyph 0 would land at the bottom).
pub fn ensure_drawable(spec: &SealVersionSpec, config: &LayoutConfig) -> SealResult<()> {
    spec.validate(config.radius())?;

    let rings = rings(spec, config);
    if let Some(ring) = rings.iter().find(|r| !r.is_drawable()) {
        return Err(SealError::InvalidState(format!(
            "border thickness {} leaves no room for a {:?} {:?} border ({:?})",
            spec.border.thickness, spec.border.style, spec.shape, ring
        )));
    }
    if let (Some(_), Some(innermost)) = (external_text(spec), rings.last()) {
        let radius = external_text_radius(spec, *innermost);
        if !(radius > 0.0) {
            return Err(SealError::InvalidState(format!(
                "external text does not fit inside the border: radius {} (thickness {}, font size {})",
                radius, spec.border.thickness, spec.text.font_sizes.external
            )));
        }
    }
    Ok(())
}

pub fn compose(spec: &SealVersionSpec, config: &LayoutConfig) -> Drawing {
    let center = config.center();
    let rings = rings(spec, config);
    let outer = rings[0];

    let mut elements = Vec::new();

    for (i, outline) in rings.iter().enumerate() {
        let stroke = if i == 0 { &spec.colors.primary } else { &spec.colors.secondary };
        elements.push(Primitive::Border {
            outline: *outline,
            stroke: stroke.clone(),
            style: spec.border.style,
            thickness: spec.border.thickness,
        });
    }

    if let Some(logo) = &spec.logo {
        elements.push(Primitive::Image {
            href: logo.clone(),
            x: center.x - LOGO_SIZE / 2.0,
            y: center.y - LOGO_SIZE / 2.0,
            width: LOGO_SIZE,
            height: LOGO_SIZE,
            opacity: LOGO_OPACITY,
        });
    }

    elements.extend(symbols(spec, center, outer.inner_radius() * SYMBOL_RING_RATIO));

    // Text sits inside the innermost ring.
    let innermost = rings.last().copied().unwrap_or(outer);
    match spec.seal_type {
        SealType::Institutional => institutional_text(spec, center, innermost, &mut elements),
        SealType::Nominative => nominative_text(spec, center, &mut elements),
        SealType::Transactional => {
            let label = spec.text.central.clone().unwrap_or_else(|| spec.label.clone());
            elements.push(Primitive::CenterText {
                point: center,
                text: label,
                font: font(spec, spec.text.font_sizes.central),
            });
        }
    }

    Drawing {
        canvas_size: config.canvas_size,
        center,
        rotation: spec.rotation,
        opacity: f64::from(spec.opacity) / 100.0,
        elements,
    }
}

fn font(spec: &SealVersionSpec, size: f64) -> TextFont {
    TextFont {
        family: spec.font.family.clone(),
        weight: spec.font.weight.clone(),
        size,
        color: spec.colors.primary.clone(),
    }
}

fn institutional_text(
    spec: &SealVersionSpec,
    center: Point,
    innermost: Outline,
    elements: &mut Vec<Primitive>,
) {
    let sizes = &spec.text.font_sizes;
    if let Some(external) = external_text(spec) {
        let radius = external_text_radius(spec, innermost);
        elements.push(Primitive::CircularText {
            radius,
            glyphs: circular_text(external, center, radius),
            font: font(spec, sizes.external),
        });
    }
    if let Some(role) = spec.text.central.as_ref().or(spec.role.as_ref()) {
        elements.push(Primitive::CenterText {
            point: center,
            text: role.clone(),
            font: font(spec, sizes.central),
        });
    }
}

fn nominative_text(spec: &SealVersionSpec, center: Point, elements: &mut Vec<Primitive>) {
    let sizes = &spec.text.font_sizes;
    if let Some(name) = spec.text.name.as_ref().or(spec.holder_name.as_ref()) {
        elements.push(Primitive::CenterText {
            point: Point::new(center.x, center.y - NOMINATIVE_LINE_OFFSET),
            text: name.clone(),
            font: font(spec, sizes.name),
        });
    }
    if let Some(title) = spec.text.title.as_ref().or(spec.holder_title.as_ref()) {
        elements.push(Primitive::CenterText {
            point: Point::new(center.x, center.y + NOMINATIVE_LINE_OFFSET),
            text: title.clone(),
            font: font(spec, sizes.title),
        });
    }
    if let Some(signature) = &spec.signature {
        elements.push(Primitive::Image {
            href: signature.clone(),
            x: center.x - SIGNATURE_WIDTH / 2.0,
            y: center.y + 2.0 * NOMINATIVE_LINE_OFFSET,
            width: SIGNATURE_WIDTH,
            height: SIGNATURE_HEIGHT,
            opacity: 1.0,
        });
    }
}

fn symbols(spec: &SealVersionSpec, center: Point, ring: f64) -> Vec<Primitive> {
    geometry::even_angles(spec.symbols.len())
        .into_iter()
        .zip(&spec.symbols)
        .map(|(angle, symbol)| {
            let (kind, size) = match symbol {
                InnerSymbol::Star { size } => (SymbolKind::Star, *size),
                InnerSymbol::Line => (SymbolKind::Line, LINE_TICK_LENGTH),
                InnerSymbol::Dot { size } => (SymbolKind::Dot, *size),
            };
            Primitive::Symbol {
                kind,
                point: geometry::polar(center, ring, angle),
                size,
                color: spec.colors.primary.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BorderSpec, SealShape, TextLayout};

    fn spec(seal_type: SealType) -> SealVersionSpec {
        SealVersionSpec {
            seal_type,
            label: "Reçu de paiement".into(),
            role: Some("Le Directeur".into()),
            holder_name: Some("A. Diallo".into()),
            holder_title: Some("Censeur".into()),
            shape: SealShape::Round,
            colors: Default::default(),
            border: BorderSpec::default(),
            text: TextLayout {
                external: Some("ACADEMIA".into()),
                ..Default::default()
            },
            font: Default::default(),
            rotation: 0.0,
            opacity: 100,
            symbols: vec![],
            logo: None,
            signature: None,
        }
    }

    fn center_texts(drawing: &Drawing) -> Vec<(Point, String)> {
        drawing
            .elements
            .iter()
            .filter_map(|e| match e {
                Primitive::CenterText { point, text, .. } => Some((*point, text.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_config_radius() {
        assert_eq!(LayoutConfig::default().radius(), 90.0);
    }

    #[test]
    fn test_circular_text_angles() {
        let glyphs = circular_text("ACADEMIA", Point::new(100.0, 100.0), 85.0);
        assert_eq!(glyphs.len(), 8);
        assert_eq!(glyphs[0].rotate, 0.0);
        assert!((glyphs[0].point.x - 100.0).abs() < 1e-9);
        assert!((glyphs[0].point.y - 15.0).abs() < 1e-9);
        assert_eq!(glyphs[2].rotate, 90.0);
        assert!((glyphs[2].point.x - 185.0).abs() < 1e-9);
        assert!((glyphs[2].point.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_institutional_layout() {
        let drawing = compose(&spec(SealType::Institutional), &LayoutConfig::default());
        assert!(matches!(drawing.elements[0], Primitive::Border { .. }));
        assert!(drawing
            .elements
            .iter()
            .any(|e| matches!(e, Primitive::CircularText { glyphs, .. } if glyphs.len() == 8)));
        assert_eq!(
            center_texts(&drawing),
            vec![(Point::new(100.0, 100.0), "Le Directeur".to_string())]
        );
    }

    #[test]
    fn test_nominative_layout() {
        let mut s = spec(SealType::Nominative);
        s.signature = Some("/uploads/sig.png".into());
        let drawing = compose(&s, &LayoutConfig::default());
        assert_eq!(
            center_texts(&drawing),
            vec![
                (Point::new(100.0, 90.0), "A. Diallo".to_string()),
                (Point::new(100.0, 110.0), "Censeur".to_string()),
            ]
        );
        assert!(drawing.elements.iter().any(
            |e| matches!(e, Primitive::Image { y, .. } if *y > 100.0)
        ));
        assert!(!drawing.elements.iter().any(|e| matches!(e, Primitive::CircularText { .. })));
    }

    #[test]
    fn test_transactional_layout() {
        let drawing = compose(&spec(SealType::Transactional), &LayoutConfig::default());
        assert_eq!(
            center_texts(&drawing),
            vec![(Point::new(100.0, 100.0), "Reçu de paiement".to_string())]
        );
    }

    #[test]
    fn test_double_round_border() {
        let mut s = spec(SealType::Transactional);
        s.border = BorderSpec { style: BorderStyle::Double, thickness: 2.0 };
        let drawing = compose(&s, &LayoutConfig::default());
        let radii: Vec<f64> = drawing
            .elements
            .iter()
            .filter_map(|e| match e {
                Primitive::Border { outline: Outline::Circle { r, .. }, .. } => Some(*r),
                _ => None,
            })
            .collect();
        assert_eq!(radii, vec![90.0, 86.0]);
    }

    #[test]
    fn test_symbols_and_logo() {
        let mut s = spec(SealType::Transactional);
        s.symbols = vec![InnerSymbol::Star { size: 6.0 }, InnerSymbol::Dot { size: 2.0 }];
        s.logo = Some("/uploads/logo.png".into());
        let drawing = compose(&s, &LayoutConfig::default());

        let points: Vec<Point> = drawing
            .elements
            .iter()
            .filter_map(|e| match e {
                Primitive::Symbol { point, .. } => Some(*point),
                _ => None,
            })
            .collect();
        assert_eq!(points.len(), 2);
        // ring radius = 0.6 * 90
        assert!((points[0].y - 46.0).abs() < 1e-9);
        assert!((points[1].y - 154.0).abs() < 1e-9);

        assert!(drawing.elements.contains(&Primitive::Image {
            href: "/uploads/logo.png".into(),
            x: 80.0,
            y: 80.0,
            width: 40.0,
            height: 40.0,
            opacity: 0.8,
        }));
    }

    #[test]
    fn test_rotation_and_opacity_carried() {
        let mut s = spec(SealType::Institutional);
        s.rotation = 15.0;
        s.opacity = 40;
        let drawing = compose(&s, &LayoutConfig::default());
        assert_eq!(drawing.rotation, 15.0);
        assert!((drawing.opacity - 0.4).abs() < 1e-12);
    }

    fn symbol_points(drawing: &Drawing) -> Vec<Point> {
        drawing
            .elements
            .iter()
            .filter_map(|e| match e {
                Primitive::Symbol { point, .. } => Some(*point),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_oval_seal_end_to_end() {
        let mut s = spec(SealType::Institutional);
        s.shape = SealShape::Oval;
        s.symbols = vec![InnerSymbol::Star { size: 5.0 }];
        assert!(ensure_drawable(&s, &LayoutConfig::default()).is_ok());
        let drawing = compose(&s, &LayoutConfig::default());

        match &drawing.elements[0] {
            Primitive::Border { outline: Outline::Ellipse { rx, ry, .. }, .. } => {
                assert_eq!(*rx, 90.0);
                assert!((ry - 63.0).abs() < 1e-9);
            }
            other => panic!("unexpected first element {:?}", other),
        }
        // symbol ring = 0.6 * ry
        let points = symbol_points(&drawing);
        assert!((points[0].y - 62.2).abs() < 1e-9);
        // text radius = 63 - 2 - 10/2
        let radius = drawing.elements.iter().find_map(|e| match e {
            Primitive::CircularText { radius, glyphs, .. } => Some((*radius, glyphs[0].point)),
            _ => None,
        });
        let (radius, first) = radius.unwrap();
        assert!((radius - 56.0).abs() < 1e-9);
        assert!((first.y - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_rectangular_seal_end_to_end() {
        let mut s = spec(SealType::Transactional);
        s.shape = SealShape::Rectangular;
        s.border = BorderSpec { style: BorderStyle::Double, thickness: 3.0 };
        s.symbols = vec![InnerSymbol::Line];
        let drawing = compose(&s, &LayoutConfig::default());

        let outlines: Vec<Outline> = drawing
            .elements
            .iter()
            .filter_map(|e| match e {
                Primitive::Border { outline, .. } => Some(*outline),
                _ => None,
            })
            .collect();
        assert_eq!(
            outlines,
            vec![
                Outline::Rect { x: 20.0, y: 50.0, width: 160.0, height: 100.0 },
                Outline::Rect { x: 25.0, y: 55.0, width: 150.0, height: 90.0 },
            ]
        );
        // symbol ring = 0.6 * half height
        let points = symbol_points(&drawing);
        assert!((points[0].x - 100.0).abs() < 1e-9);
        assert!((points[0].y - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_over_inset_double_border_rejected() {
        let config = LayoutConfig::default();
        for (shape, thickness) in [
            (SealShape::Round, 89.0),
            (SealShape::Oval, 61.0),
            (SealShape::Rectangular, 50.0),
        ] {
            let mut s = spec(SealType::Transactional);
            s.shape = shape;
            s.border = BorderSpec { style: BorderStyle::Double, thickness };
            let err = ensure_drawable(&s, &config).unwrap_err();
            assert!(matches!(err, SealError::InvalidState(_)), "{:?}", shape);

            // same thickness as a single ring still draws
            s.border.style = BorderStyle::Solid;
            assert!(ensure_drawable(&s, &config).is_ok(), "{:?}", shape);
        }
    }

    #[test]
    fn test_circular_text_radius_must_stay_positive() {
        let config = LayoutConfig::default();

        // inner ring 43, text radius 43 - 45 - 5 < 0
        let mut s = spec(SealType::Institutional);
        s.border = BorderSpec { style: BorderStyle::Double, thickness: 45.0 };
        assert!(matches!(ensure_drawable(&s, &config), Err(SealError::InvalidState(_))));

        let mut s = spec(SealType::Institutional);
        s.text.font_sizes.external = 200.0;
        assert!(matches!(ensure_drawable(&s, &config), Err(SealError::InvalidState(_))));

        // without external text the same sizes are fine
        s.text.external = None;
        assert!(ensure_drawable(&s, &config).is_ok());

        for shape in [SealShape::Round, SealShape::Oval, SealShape::Rectangular] {
            let mut s = spec(SealType::Institutional);
            s.shape = shape;
            assert!(ensure_drawable(&s, &config).is_ok(), "{:?}", shape);
        }
    }

    #[test]
    fn test_compose_deterministic() {
        let s = spec(SealType::Institutional);
        assert_eq!(compose(&s, &LayoutConfig::default()), compose(&s, &LayoutConfig::default()));
    }
}
