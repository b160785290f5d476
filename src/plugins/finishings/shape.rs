//! Shape: draw a line, rectangle or circle.

use super::{
    color, color_alpha_field, color_fill_field, color_stroke_fields, pixels, position, position_fields, size,
    FinishingImplementation, FinishingPlugin,
};
use crate::adapter::ImageContainer;
use crate::core::error::{PluginError, PluginResult};
use crate::core::types::Brush;
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::form::FieldDefinition;
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};

pub(super) fn plugin() -> FinishingPlugin {
    let metadata = PluginMetadata::new("shape", "Shape", "Draw a given shape")
        .field(FieldDefinition::choice("shape", "Shape", &["line", "circle", "rectangle"]).required())
        .fields(position_fields("start_x", "start_y", "position"))
        .fields([
            FieldDefinition::text("size_x", "X dimension").with_help("Horizontal extent (or circle radius vector)"),
            FieldDefinition::text("size_y", "Y dimension").with_help("Vertical extent (or circle radius vector)"),
        ])
        .fields(color_stroke_fields())
        .field(color_fill_field())
        .field(color_alpha_field());
    Plugin::new(metadata, || Box::new(Shape) as Box<dyn FinishingImplementation>)
}

/// Shapes span from `start` to `start + size`; a circle is centered on
/// `start` and passes through `start + size`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shape;

impl Lifecycle for Shape {}

impl FinishingImplementation for Shape {
    fn run(
        &mut self,
        config: &Evaluated,
        image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        let alpha = config["color_alpha"].as_int();
        let brush = Brush::new(
            color(config, "color_stroke", alpha)?,
            pixels(&config["stroke_width"]),
            color(config, "color_fill", alpha)?,
        );
        let start = position(config, "start_x", "start_y");
        let end = start + size(config, "size_x", "size_y");

        let adapter = ctx.adapter();
        match config["shape"].as_str().unwrap_or_default().as_str() {
            "line" => adapter.draw_line(image, start, end, &brush),
            "rectangle" => adapter.draw_rect(image, start, end, &brush, None),
            "circle" => adapter.draw_circle(image, start, end, &brush),
            other => {
                return Err(PluginError::InvalidConfig {
                    field: "shape".to_string(),
                    reason: format!("unknown shape '{}'", other),
                })
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::RecordingAdapter;
    use crate::adapter::ImageAdapter;
    use crate::core::value::Value;
    use crate::execution::context::tests::Records;
    use crate::plugins::finishings::tests::config;

    fn draw(entries: &[(&str, Value)]) -> PluginResult<ImageContainer> {
        let adapter = RecordingAdapter::new();
        let records = Records::new("mem://20x20");
        let ctx = records.context(&adapter);
        let mut image = adapter.open("mem://20x20", None)?;
        Shape.run(&config(entries), &mut image, &ctx)?;
        Ok(image)
    }

    #[test]
    fn test_rectangle() {
        let image = draw(&[
            ("shape", Value::from("rectangle")),
            ("start_x", Value::from("2")),
            ("start_y", Value::from("2")),
            ("size_x", Value::from("5")),
            ("size_y", Value::from("5")),
            ("color_stroke", Value::from("#ff0000")),
            ("color_fill", Value::from("#0000ff")),
            ("stroke_width", Value::from("1")),
        ])
        .unwrap();
        let frame = &image.frames()[0];
        assert_eq!(frame.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(4, 4).0, [0, 0, 255, 255]);
        assert_eq!(frame.get_pixel(15, 15).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_line_with_alpha() {
        let image = draw(&[
            ("shape", Value::from("line")),
            ("start_x", Value::from("0")),
            ("start_y", Value::from("10")),
            ("size_x", Value::from("19")),
            ("size_y", Value::from("0")),
            ("color_stroke", Value::from("#000000")),
            ("color_alpha", Value::from("50")),
        ])
        .unwrap();
        let pixel = image.frames()[0].get_pixel(5, 10).0;
        assert!(pixel[0] > 100 && pixel[0] < 155, "{:?}", pixel);
    }

    #[test]
    fn test_circle_centered_on_start() {
        let image = draw(&[
            ("shape", Value::from("circle")),
            ("start_x", Value::from("10")),
            ("start_y", Value::from("10")),
            ("size_x", Value::from("3")),
            ("size_y", Value::from("4")),
            ("color_stroke", Value::from("#00ff00")),
        ])
        .unwrap();
        let frame = &image.frames()[0];
        assert_eq!(frame.get_pixel(10, 10).0, [0, 255, 0, 255]);
        assert_eq!(frame.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_unknown_shape() {
        let result = draw(&[("shape", Value::from("star")), ("color_stroke", Value::from("#000"))]);
        assert!(matches!(result, Err(PluginError::InvalidConfig { .. })));
    }
}
