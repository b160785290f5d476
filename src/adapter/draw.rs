//! Alpha-blended drawing primitives on RGBA frames.
//!
//! Lines and plain rectangles go through `imageproc` wrapped in
//! [`Blend`], so semi-transparent brushes composite instead of overwrite.
//! Shapes whose parts would overlap (rounded rectangles, rings) are
//! rasterized from a coverage test so every pixel is blended exactly once.

use crate::core::types::{Alignment, Brush, Color, Position, TextBorder, TextStyle};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{imageops, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, Blend};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Height and width of one font8x8 glyph cell.
const GLYPH: u32 = 8;

/// Weight from which text renders bold.
const BOLD_WEIGHT: u32 = 700;

fn rgba(color: Color) -> Rgba<u8> {
    Rgba(color.to_rgba())
}

/// Run `draw` against a blending view of `canvas`.
fn with_blend(canvas: &mut RgbaImage, draw: impl FnOnce(&mut Blend<RgbaImage>)) {
    let mut blend = Blend(std::mem::take(canvas));
    draw(&mut blend);
    *canvas = blend.0;
}

/// Composite `color` over the pixel at (x, y); out of bounds is ignored.
fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    canvas.get_pixel_mut(x as u32, y as u32).blend(&color);
}

/// Blend `color` into every pixel of the box `[x0, x1) × [y0, y1)` for which
/// `covered` holds. The box is clipped to the canvas.
fn fill_where(
    canvas: &mut RgbaImage,
    (x0, y0, x1, y1): (i32, i32, i32, i32),
    color: Rgba<u8>,
    covered: impl Fn(f32, f32) -> bool,
) {
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(canvas.width() as i32);
    let y1 = y1.min(canvas.height() as i32);
    for y in y0..y1 {
        for x in x0..x1 {
            // sample at the pixel center
            if covered(x as f32 + 0.5, y as f32 + 0.5) {
                blend_pixel(canvas, x, y, color);
            }
        }
    }
}

/// Line from `start` to `end` in the brush's stroke color and width.
pub fn line(canvas: &mut RgbaImage, start: Position, end: Position, brush: &Brush) {
    let Some(color) = brush.stroke.or(brush.fill) else {
        return;
    };
    let color = rgba(color);
    let width = brush.width();
    let (x1, y1) = (start.x as f32, start.y as f32);
    let (x2, y2) = (end.x as f32, end.y as f32);
    let length = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();

    if width <= 1 || length < 1.0 {
        with_blend(canvas, |c| draw_line_segment_mut(c, (x1, y1), (x2, y2), color));
        return;
    }

    let half = width as f32 / 2.0;
    let (nx, ny) = (-(y2 - y1) / length * half, (x2 - x1) / length * half);
    let corner = |x: f32, y: f32| Point::new(x.round() as i32, y.round() as i32);
    let poly = [
        corner(x1 + nx, y1 + ny),
        corner(x2 + nx, y2 + ny),
        corner(x2 - nx, y2 - ny),
        corner(x1 - nx, y1 - ny),
    ];
    if poly[0] == poly[3] {
        with_blend(canvas, |c| draw_line_segment_mut(c, (x1, y1), (x2, y2), color));
        return;
    }
    with_blend(canvas, |c| draw_polygon_mut(c, &poly, color));
}

/// Normalized box between two corners as (left, top, right, bottom).
fn corners(start: Position, end: Position) -> (i32, i32, i32, i32) {
    (
        start.x.min(end.x),
        start.y.min(end.y),
        start.x.max(end.x),
        start.y.max(end.y),
    )
}

/// Whether (px, py) lies in the box, with corners rounded by `radius`.
fn in_rounded_box(px: f32, py: f32, (l, t, r, b): (f32, f32, f32, f32), radius: f32) -> bool {
    if px < l || px > r || py < t || py > b {
        return false;
    }
    let radius = radius.min((r - l) / 2.0).min((b - t) / 2.0).max(0.0);
    let cx = if px < l + radius {
        l + radius
    } else if px > r - radius {
        r - radius
    } else {
        return true;
    };
    let cy = if py < t + radius {
        t + radius
    } else if py > b - radius {
        b - radius
    } else {
        return true;
    };
    (px - cx).powi(2) + (py - cy).powi(2) <= radius * radius
}

/// Rectangle between two corners, filled with the brush's fill color and
/// outlined in its stroke color. A zero stroke width draws no outline.
pub fn rect(canvas: &mut RgbaImage, start: Position, end: Position, brush: &Brush, radius: Option<u32>) {
    let (l, t, r, b) = corners(start, end);
    let stroke_width = brush.stroke_width.unwrap_or(0) as i32;
    let radius = radius.unwrap_or(0) as f32;

    if radius <= 0.0 {
        if let Some(fill) = brush.fill_color() {
            if r > l && b > t {
                let area = Rect::at(l, t).of_size((r - l) as u32, (b - t) as u32);
                with_blend(canvas, |c| draw_filled_rect_mut(c, area, rgba(fill)));
            }
        }
        if let (Some(stroke), true) = (brush.stroke, stroke_width > 0) {
            // four non-overlapping bands
            let w = stroke_width;
            let bands = [
                (l, t, r, t + w),
                (l, b - w, r, b),
                (l, t + w, l + w, b - w),
                (r - w, t + w, r, b - w),
            ];
            for (x0, y0, x1, y1) in bands {
                fill_where(canvas, (x0, y0, x1, y1), rgba(stroke), |_, _| true);
            }
        }
        return;
    }

    let outer = (l as f32, t as f32, r as f32, b as f32);
    let w = stroke_width as f32;
    let inner = (outer.0 + w, outer.1 + w, outer.2 - w, outer.3 - w);
    let inner_radius = (radius - w).max(0.0);
    if let Some(fill) = brush.fill_color() {
        fill_where(canvas, (l, t, r, b), rgba(fill), |x, y| in_rounded_box(x, y, inner, inner_radius));
    }
    if let (Some(stroke), true) = (brush.stroke, stroke_width > 0) {
        fill_where(canvas, (l, t, r, b), rgba(stroke), |x, y| {
            in_rounded_box(x, y, outer, radius) && !in_rounded_box(x, y, inner, inner_radius)
        });
    }
}

/// Circle of `radius` around `center`: a disc in the fill color and a ring
/// of the stroke width in the stroke color.
pub fn circle(canvas: &mut RgbaImage, center: Position, radius: f32, brush: &Brush) {
    let (cx, cy) = (center.x as f32, center.y as f32);
    let half = brush.stroke_width.unwrap_or(0) as f32 / 2.0;
    let reach = (radius + half).ceil() as i32 + 1;
    let bounds = (center.x - reach, center.y - reach, center.x + reach, center.y + reach);
    let dist = move |x: f32, y: f32| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();

    if let Some(fill) = brush.fill_color() {
        let inner = (radius - half).max(0.0);
        fill_where(canvas, bounds, rgba(fill), |x, y| dist(x, y) <= inner);
    }
    if let (Some(stroke), true) = (brush.stroke, half > 0.0) {
        fill_where(canvas, bounds, rgba(stroke), |x, y| {
            let d = dist(x, y);
            d > radius - half && d <= radius + half
        });
    }
}

/// Coverage mask of `text` rendered with font8x8 at an integer `scale`.
/// Characters without a glyph render as blanks.
fn text_mask(text: &str, scale: u32, bold: bool) -> (Vec<(u32, u32)>, u32, u32) {
    let advance = GLYPH * scale + u32::from(bold);
    let chars: Vec<char> = text.chars().collect();
    let width = advance * chars.len() as u32;
    let height = GLYPH * scale;
    let mut pixels = Vec::new();

    for (index, ch) in chars.iter().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(*ch) else {
            continue;
        };
        let origin = index as u32 * advance;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH {
                if *bits & (1u8 << col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale + u32::from(bold) {
                        pixels.push((origin + col * scale + dx, row as u32 * scale + dy));
                    }
                }
            }
        }
    }
    (pixels, width, height)
}

/// Text anchored with its baseline at `pos`, optionally on a background box
/// and rotated around its own center.
pub fn text(
    canvas: &mut RgbaImage,
    pos: Position,
    style: &TextStyle,
    brush: &Brush,
    border: Option<&TextBorder>,
    rotate: Option<f64>,
) {
    if style.text.is_empty() {
        return;
    }
    let Some(color) = brush.stroke.or(brush.fill) else {
        return;
    };
    let scale = (style.size.unwrap_or(GLYPH) / GLYPH).max(1);
    let bold = style.weight.is_some_and(|w| w >= BOLD_WEIGHT);
    let (mask, text_w, text_h) = text_mask(&style.text, scale, bold);

    let padding = border.map_or(0, |b| b.padding);
    let layer_w = text_w + 2 * padding;
    let layer_h = text_h + 2 * padding;
    let mut layer = RgbaImage::new(layer_w.max(1), layer_h.max(1));

    if let Some(border) = border {
        rect(
            &mut layer,
            Position::new(0, 0),
            Position::new(layer_w as i32, layer_h as i32),
            &border.brush,
            border.radius,
        );
    }
    let ink = rgba(color);
    for (x, y) in mask {
        blend_pixel(&mut layer, (x + padding) as i32, (y + padding) as i32, ink);
    }

    let shift = match style.alignment {
        Alignment::Left => 0,
        Alignment::Center => text_w as i32 / 2,
        Alignment::Right => text_w as i32,
    };
    let mut left = pos.x - shift - padding as i32;
    let mut top = pos.y - text_h as i32 - padding as i32;

    if let Some(degrees) = rotate.filter(|d| d.rem_euclid(360.0) != 0.0) {
        let rotated = rotate_frame(&layer, degrees);
        left -= (rotated.width() as i32 - layer.width() as i32) / 2;
        top -= (rotated.height() as i32 - layer.height() as i32) / 2;
        layer = rotated;
    }
    imageops::overlay(canvas, &layer, i64::from(left), i64::from(top));
}

/// Rotate clockwise by `degrees`, enlarging the canvas so nothing is cut off.
/// Uncovered corners are transparent.
pub fn rotate_frame(frame: &RgbaImage, degrees: f64) -> RgbaImage {
    let normalized = degrees.rem_euclid(360.0);
    if normalized == 0.0 {
        return frame.clone();
    }
    if normalized == 90.0 {
        return imageops::rotate90(frame);
    }
    if normalized == 180.0 {
        return imageops::rotate180(frame);
    }
    if normalized == 270.0 {
        return imageops::rotate270(frame);
    }

    let theta = normalized.to_radians();
    let (w, h) = (frame.width() as f64, frame.height() as f64);
    let new_w = (w * theta.cos().abs() + h * theta.sin().abs()).ceil() as u32;
    let new_h = (w * theta.sin().abs() + h * theta.cos().abs()).ceil() as u32;

    let mut padded = RgbaImage::new(new_w.max(1), new_h.max(1));
    let x = (i64::from(new_w) - i64::from(frame.width())) / 2;
    let y = (i64::from(new_h) - i64::from(frame.height())) / 2;
    imageops::replace(&mut padded, frame, x, y);
    rotate_about_center(&padded, theta as f32, Interpolation::Bilinear, Rgba([0, 0, 0, 0]))
}

/// Paint `frame` onto a solid background, removing transparency.
pub fn flatten(frame: &RgbaImage, background: Color) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(frame.width(), frame.height(), rgba(background));
    imageops::overlay(&mut canvas, frame, 0, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    fn red(width: u32) -> Brush {
        Brush::new(Some(Color::rgb(255, 0, 0)), Some(width), None)
    }

    #[test]
    fn test_thick_line_covers_band() {
        let mut c = canvas(50, 50);
        line(&mut c, Position::new(5, 25), Position::new(45, 25), &red(6));
        assert_eq!(c.get_pixel(25, 25).0, [255, 0, 0, 255]);
        assert_eq!(c.get_pixel(25, 23).0, [255, 0, 0, 255]);
        assert_eq!(c.get_pixel(25, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_semi_transparent_line_blends() {
        let mut c = canvas(20, 20);
        let brush = Brush::new(Some(Color::new(0, 0, 0, 128)), Some(1), None);
        line(&mut c, Position::new(0, 10), Position::new(19, 10), &brush);
        let px = c.get_pixel(10, 10).0;
        assert!(px[0] > 100 && px[0] < 160, "expected a blended gray, got {:?}", px);
    }

    #[test]
    fn test_rect_fill_falls_back_to_stroke() {
        let mut c = canvas(30, 30);
        rect(&mut c, Position::new(20, 20), Position::new(10, 10), &red(0), None);
        assert_eq!(c.get_pixel(15, 15).0, [255, 0, 0, 255]);
        assert_eq!(c.get_pixel(25, 25).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_rect_outline() {
        let mut c = canvas(30, 30);
        let brush = Brush::new(Some(Color::BLACK), Some(2), Some(Color::rgb(0, 0, 255)));
        rect(&mut c, Position::new(0, 0), Position::new(20, 20), &brush, None);
        assert_eq!(c.get_pixel(0, 10).0, [0, 0, 0, 255]);
        assert_eq!(c.get_pixel(10, 10).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_rounded_rect_skips_corners() {
        let mut c = canvas(40, 40);
        rect(&mut c, Position::new(0, 0), Position::new(40, 40), &red(0), Some(10));
        assert_eq!(c.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(c.get_pixel(20, 20).0, [255, 0, 0, 255]);
        assert_eq!(c.get_pixel(20, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_circle_ring_and_fill() {
        let mut c = canvas(60, 60);
        let brush = Brush::new(Some(Color::BLACK), Some(2), Some(Color::rgb(0, 255, 0)));
        circle(&mut c, Position::new(30, 30), 20.0, &brush);
        assert_eq!(c.get_pixel(30, 30).0, [0, 255, 0, 255]);
        assert_eq!(c.get_pixel(50, 30).0, [0, 0, 0, 255]);
        assert_eq!(c.get_pixel(2, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_text_mask_dimensions() {
        let (pixels, w, h) = text_mask("Hi", 2, false);
        assert_eq!((w, h), (32, 16));
        assert!(!pixels.is_empty());
        assert!(pixels.iter().all(|(x, y)| *x < w && *y < h));
    }

    #[test]
    fn test_text_draws_above_baseline() {
        let mut c = canvas(100, 40);
        let style = TextStyle {
            text: "XX".to_string(),
            size: Some(16),
            ..TextStyle::default()
        };
        text(&mut c, Position::new(10, 30), &style, &red(1), None, None);
        let inked = c.enumerate_pixels().filter(|(_, _, p)| p.0 == [255, 0, 0, 255]);
        for (_, y, _) in inked {
            assert!((14..30).contains(&y));
        }
    }

    #[test]
    fn test_text_border_box() {
        let mut c = canvas(100, 40);
        let style = TextStyle {
            text: "A".to_string(),
            ..TextStyle::default()
        };
        let border = TextBorder {
            brush: Brush::new(None, Some(0), Some(Color::rgb(0, 0, 255))),
            radius: None,
            padding: 4,
        };
        text(&mut c, Position::new(20, 20), &style, &red(1), Some(&border), None);
        // padding area left of the glyph belongs to the box
        assert_eq!(c.get_pixel(17, 10).0, [0, 0, 255, 255]);
        assert_eq!(c.get_pixel(60, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_rotate_frame_dimensions() {
        let frame = RgbaImage::new(40, 20);
        assert_eq!(rotate_frame(&frame, 90.0).dimensions(), (20, 40));
        assert_eq!(rotate_frame(&frame, -180.0).dimensions(), (40, 20));
        let (w, h) = rotate_frame(&frame, 45.0).dimensions();
        assert!(w >= 42 && h >= 42);
    }

    #[test]
    fn test_flatten_removes_alpha() {
        let frame = RgbaImage::new(4, 4);
        let flat = flatten(&frame, Color::rgb(10, 20, 30));
        assert_eq!(flat.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }
}
