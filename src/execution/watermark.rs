//! Watermark steps appended after the configured finishings.
//!
//! The overlay is a set of `shape` line steps whose geometry is written as
//! templates over `image["width"]`/`image["height"]`, so it is evaluated by
//! the same expression path as user steps and adapts to the final size.

use crate::core::model::Finishing;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stroke color, stroke width and offset of each watermark line, relative to
/// the image size.
const LINES: [(&str, f64, f64); 4] = [
    ("#43c7ff", 0.010, 0.045),
    ("#ff66c4", 0.009, 0.064),
    ("#fcee21", 0.007, 0.079),
    ("#bae580", 0.005, 0.091),
];

/// Alpha of every watermark line, in percent.
const LINE_ALPHA: i64 = 60;

/// Default distance from the edges.
pub const DEFAULT_SHIFT: f64 = 10.0;

/// Default line size factor.
pub const DEFAULT_SCALE: f64 = 2.0;

/// Watermark layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkStyle {
    /// Diagonal ribbons across two corners
    #[default]
    Ribbon,
    /// Horizontal bars at the top and bottom
    HBars,
    /// Vertical bars at the left and right
    VBars,
    /// No watermark
    None,
}

impl WatermarkStyle {
    /// Name used in settings and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkStyle::Ribbon => "ribbon",
            WatermarkStyle::HBars => "hbars",
            WatermarkStyle::VBars => "vbars",
            WatermarkStyle::None => "none",
        }
    }

    /// Synthesize the watermark steps. `shift` and `scale` fall back to
    /// their defaults when zero.
    pub fn finishings(&self, shift: f64, scale: f64) -> Vec<Finishing> {
        let shift = if shift == 0.0 { DEFAULT_SHIFT } else { shift };
        let scale = if scale == 0.0 { DEFAULT_SCALE } else { scale };
        match self {
            WatermarkStyle::Ribbon => ribbon(shift, scale),
            WatermarkStyle::HBars => hbars(shift, scale),
            WatermarkStyle::VBars => vbars(shift, scale),
            WatermarkStyle::None => Vec::new(),
        }
    }
}

impl fmt::Display for WatermarkStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ribbon" => Ok(WatermarkStyle::Ribbon),
            "hbars" => Ok(WatermarkStyle::HBars),
            "vbars" => Ok(WatermarkStyle::VBars),
            "none" | "" => Ok(WatermarkStyle::None),
            other => Err(format!("unknown watermark style '{}'", other)),
        }
    }
}

/// A line step in one of the watermark colors.
fn line(color: &str, width: f64, scale: f64) -> Finishing {
    Finishing::new("shape")
        .with_title(format!("Watermark {}", color))
        .with_config("shape", "line")
        .with_config("color_stroke", color)
        .with_config("color_fill", color)
        .with_config("color_alpha", LINE_ALPHA)
        .with_config("stroke_width", format!("{{image[\"width\"]*{}*{}}}", width, scale))
}

fn ribbon(shift: f64, scale: f64) -> Vec<Finishing> {
    let shift = format!("image[\"width\"]*0.01*{}", shift);
    let offset = format!("image[\"height\"]*0.01+{}", shift);
    let mut finishings = Vec::new();
    for (color, width, pos) in LINES {
        let size = format!("image[\"height\"]*{}*{}", pos, scale);
        let extent = format!("{{{}+{}+{}}}", offset, size, shift);
        let base = line(color, width, scale)
            .with_config("size_x", extent.clone())
            .with_config("size_y", format!("-{}", extent));
        finishings.push(
            base.clone()
                .with_config("start_x", format!("-{{{}/2}}", offset))
                .with_config("start_y", format!("{{{}/2+{}}}", offset, size)),
        );
        finishings.push(
            base.with_config(
                "start_x",
                format!("{{-{}/2+image[\"width\"]-{}-{}}}", offset, size, shift),
            )
            .with_config("start_y", format!("{{{}/2+image[\"height\"]}}", offset)),
        );
    }
    finishings
}

fn hbars(shift: f64, scale: f64) -> Vec<Finishing> {
    let shift = format!("image[\"height\"]*0.001*{}", shift);
    let mut finishings = Vec::new();
    for (color, width, pos) in LINES {
        let size = format!("image[\"height\"]*{}*0.8*{}", pos, scale);
        let base = line(color, width, scale)
            .with_config("size_x", "{image[\"width\"]}")
            .with_config("size_y", 0);
        finishings.push(
            base.clone()
                .with_config("start_x", "0")
                .with_config("start_y", format!("{{{}+{}}}", size, shift)),
        );
        finishings.push(
            base.with_config("start_x", "0")
                .with_config("start_y", format!("{{image[\"height\"]-{}-{}}}", size, shift)),
        );
    }
    finishings
}

fn vbars(shift: f64, scale: f64) -> Vec<Finishing> {
    let shift = format!("image[\"height\"]*0.001*{}", shift);
    let mut finishings = Vec::new();
    for (color, width, pos) in LINES {
        let size = format!("image[\"height\"]*{}*0.8*{}", pos, scale);
        let base = line(color, width, scale)
            .with_config("size_x", 0)
            .with_config("size_y", "{image[\"height\"]}");
        finishings.push(
            base.clone()
                .with_config("start_x", format!("{{{}+{}}}", size, shift))
                .with_config("start_y", "0"),
        );
        finishings.push(
            base.with_config("start_x", format!("{{image[\"width\"]-{}-{}}}", size, shift))
                .with_config("start_y", "0"),
        );
    }
    finishings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::PluginModel;
    use crate::core::value::Value;
    use crate::expression::{Context, MapResolver};
    use indexmap::IndexMap;

    fn image_context(width: i64, height: i64) -> Context {
        let ctx = Context::new();
        let mut meta = IndexMap::new();
        meta.insert("width".to_string(), Value::Int(width));
        meta.insert("height".to_string(), Value::Int(height));
        ctx.set_resolver("image", MapResolver::new(meta));
        ctx
    }

    #[test]
    fn test_two_lines_per_color() {
        for style in [WatermarkStyle::Ribbon, WatermarkStyle::HBars, WatermarkStyle::VBars] {
            let steps = style.finishings(0.0, 0.0);
            assert_eq!(steps.len(), 8, "{}", style);
            assert!(steps.iter().all(|s| s.plugin == "shape" && s.enabled));
        }
        assert!(WatermarkStyle::None.finishings(10.0, 2.0).is_empty());
    }

    fn approx(value: &Value, expected: f64) -> bool {
        value.as_float().is_some_and(|v| (v - expected).abs() < 1e-6)
    }

    #[test]
    fn test_hbars_geometry() {
        let ctx = image_context(1000, 500);
        let steps = WatermarkStyle::HBars.finishings(10.0, 2.0);
        let top = ctx.evaluate_model(&steps[0]).unwrap();
        // 500*0.045*0.8*2 + 500*0.001*10
        assert!(approx(&top["start_y"], 41.0));
        assert!(approx(&top["size_x"], 1000.0));
        assert!(approx(&top["stroke_width"], 20.0));

        let bottom = ctx.evaluate_model(&steps[1]).unwrap();
        assert!(approx(&bottom["start_y"], 459.0));
    }

    #[test]
    fn test_ribbon_runs_diagonally() {
        let ctx = image_context(800, 600);
        let steps = WatermarkStyle::Ribbon.finishings(10.0, 2.0);
        let first = ctx.evaluate_model(&steps[0]).unwrap();
        let size_x = first["size_x"].as_float().unwrap();
        let size_y = first["size_y"].as_float().unwrap();
        assert!(size_x > 0.0);
        assert_eq!(size_x, -size_y);
        assert!(first["start_x"].as_float().unwrap() < 0.0);
        assert_eq!(steps[0].plugin_config()["color_alpha"], Value::Int(60));
    }

    #[test]
    fn test_style_names() {
        assert_eq!("HBars".parse::<WatermarkStyle>(), Ok(WatermarkStyle::HBars));
        assert_eq!("".parse::<WatermarkStyle>(), Ok(WatermarkStyle::None));
        assert!("stripes".parse::<WatermarkStyle>().is_err());
        assert_eq!(WatermarkStyle::default().to_string(), "ribbon");
    }
}
