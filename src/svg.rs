//! Vector Serializer - SVG Is Truth
//!
//! `Drawing -> String`. No I/O, no clock, no randomness: numbers are
//! rounded to two decimals so equal drawings always give equal bytes.

use std::fmt::Write;

use crate::error::SealResult;
use crate::geometry::{self, Outline, Point};
use crate::layout::{self, Drawing, LayoutConfig, Primitive, SymbolKind, TextFont};
use crate::model::{BorderStyle, SealVersionSpec};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const LINE_SYMBOL_STROKE: f64 = 1.5;

/// Validate, lay out and serialize a seal in one step.
pub fn render_seal(spec: &SealVersionSpec, config: &LayoutConfig) -> SealResult<String> {
    layout::ensure_drawable(spec, config)?;
    Ok(to_svg(&layout::compose(spec, config)))
}

pub fn to_svg(drawing: &Drawing) -> String {
    let mut out = String::new();
    let size = num(drawing.canvas_size);
    let _ = write!(
        &mut out,
        r#"<svg xmlns="{}" xmlns:xlink="{}" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        SVG_NS, XLINK_NS, size, size, size, size
    );
    let _ = write!(
        &mut out,
        r#"<g opacity="{}" transform="rotate({} {} {})">"#,
        num(drawing.opacity),
        num(drawing.rotation),
        num(drawing.center.x),
        num(drawing.center.y)
    );
    for element in &drawing.elements {
        write_primitive(&mut out, element);
    }
    out.push_str("</g></svg>");
    out
}

fn write_primitive(out: &mut String, element: &Primitive) {
    match element {
        Primitive::Border { outline, stroke, style, thickness } => {
            write_border(out, outline, stroke, *style, *thickness)
        }
        Primitive::CircularText { glyphs, font, .. } => {
            let _ = write!(out, "<g {}>", font_attrs(font));
            for glyph in glyphs.iter().filter(|g| !g.ch.is_whitespace()) {
                let (x, y) = (num(glyph.point.x), num(glyph.point.y));
                let _ = write!(
                    out,
                    r#"<text x="{}" y="{}" transform="rotate({} {} {})">{}</text>"#,
                    x,
                    y,
                    num(glyph.rotate),
                    x,
                    y,
                    escape(&glyph.ch.to_string())
                );
            }
            out.push_str("</g>");
        }
        Primitive::CenterText { point, text, font } => {
            let _ = write!(
                out,
                r#"<text x="{}" y="{}" {}>{}</text>"#,
                num(point.x),
                num(point.y),
                font_attrs(font),
                escape(text)
            );
        }
        Primitive::Image { href, x, y, width, height, opacity } => {
            let _ = write!(
                out,
                r#"<image xlink:href="{}" x="{}" y="{}" width="{}" height="{}" opacity="{}" preserveAspectRatio="xMidYMid meet"/>"#,
                escape(href),
                num(*x),
                num(*y),
                num(*width),
                num(*height),
                num(*opacity)
            );
        }
        Primitive::Symbol { kind, point, size, color } => write_symbol(out, *kind, *point, *size, color),
    }
}

fn write_border(out: &mut String, outline: &Outline, stroke: &str, style: BorderStyle, thickness: f64) {
    let dash = match style {
        BorderStyle::Dashed => format!(
            r#" stroke-dasharray="{},{}""#,
            num(thickness * 3.0),
            num(thickness * 2.0)
        ),
        BorderStyle::Solid | BorderStyle::Double => String::new(),
    };
    let paint = format!(
        r#"fill="none" stroke="{}" stroke-width="{}"{}"#,
        escape(stroke),
        num(thickness),
        dash
    );
    let _ = match *outline {
        Outline::Circle { center, r } => write!(
            out,
            r#"<circle cx="{}" cy="{}" r="{}" {}/>"#,
            num(center.x),
            num(center.y),
            num(r),
            paint
        ),
        Outline::Ellipse { center, rx, ry } => write!(
            out,
            r#"<ellipse cx="{}" cy="{}" rx="{}" ry="{}" {}/>"#,
            num(center.x),
            num(center.y),
            num(rx),
            num(ry),
            paint
        ),
        Outline::Rect { x, y, width, height } => write!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" {}/>"#,
            num(x),
            num(y),
            num(width),
            num(height),
            paint
        ),
    };
}

fn write_symbol(out: &mut String, kind: SymbolKind, point: Point, size: f64, color: &str) {
    let color = escape(color);
    let _ = match kind {
        SymbolKind::Star => {
            let points: Vec<String> = geometry::star_vertices(point, size)
                .into_iter()
                .map(|p| format!("{},{}", num(p.x), num(p.y)))
                .collect();
            write!(out, r#"<polygon points="{}" fill="{}"/>"#, points.join(" "), color)
        }
        SymbolKind::Line => write!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
            num(point.x - size / 2.0),
            num(point.y),
            num(point.x + size / 2.0),
            num(point.y),
            color,
            num(LINE_SYMBOL_STROKE)
        ),
        SymbolKind::Dot => write!(
            out,
            r#"<circle cx="{}" cy="{}" r="{}" fill="{}"/>"#,
            num(point.x),
            num(point.y),
            num(size),
            color
        ),
    };
}

fn font_attrs(font: &TextFont) -> String {
    format!(
        r#"font-family="{}" font-size="{}" font-weight="{}" fill="{}" text-anchor="middle" dominant-baseline="middle""#,
        escape(&font.family),
        num(font.size),
        escape(&font.weight),
        escape(&font.color)
    )
}

/// Two decimals, trailing zeros trimmed, never `-0`.
fn num(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let s = format!("{:.2}", rounded);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
