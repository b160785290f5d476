//! Text: write text at a position, optionally on a bordered box.

use super::{
    color, color_alpha_field, color_fill_field, color_stroke_fields, pixels, position, position_fields,
    required_str, FinishingImplementation, FinishingPlugin,
};
use crate::adapter::ImageContainer;
use crate::core::error::{PluginError, PluginResult};
use crate::core::types::{Alignment, Brush, TextBorder, TextStyle};
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::form::{FieldDefinition, FieldKind};
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};

pub(super) fn plugin() -> FinishingPlugin {
    let metadata = PluginMetadata::new("text", "Text", "Write some text to given position")
        .fields([
            FieldDefinition::text("font", "Font").with_help("Font name to use (e.g. Arial, Helvetica, Courier)"),
            FieldDefinition::text("weight", "Font weight").with_help("400 for normal, 700 for bold"),
            FieldDefinition::new("text", "Text", FieldKind::Textarea)
                .required()
                .with_help("Text to show"),
            FieldDefinition::text("size", "Size").with_help("Font size in pixels"),
        ])
        .fields(color_stroke_fields())
        .field(color_fill_field())
        .field(color_alpha_field())
        .field(
            FieldDefinition::choice("alignment", "Alignment", &["left", "right", "center"])
                .with_default("left")
                .with_help("How to align the text relative to the position"),
        )
        .fields(position_fields("start_x", "start_y", "position"))
        .fields([
            FieldDefinition::text("border", "Border").with_help("Draw a box around the text with given line width"),
            FieldDefinition::text("border_radius", "Border radius").with_help("Use rounded corners for the box"),
            FieldDefinition::integer("border_alpha", "Border transparency")
                .with_help("Alpha of the box between 0 (transparent) and 100 (no transparency)"),
            FieldDefinition::integer("border_padding", "Border padding").with_help("Spacing between text and box"),
            FieldDefinition::integer("rotate", "Rotation").with_help("Rotate text by given angle"),
        ]);
    Plugin::new(metadata, || Box::new(Text) as Box<dyn FinishingImplementation>)
}

/// Text is drawn in the stroke color. The box behind it is drawn only when
/// `border` is set: outlined in the stroke color with `border` as width
/// (0 for no outline) and filled with `color_fill`, both at `border_alpha`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

impl Lifecycle for Text {}

impl FinishingImplementation for Text {
    fn run(
        &mut self,
        config: &Evaluated,
        image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        let alignment: Alignment = config["alignment"]
            .as_str()
            .unwrap_or_default()
            .parse()
            .map_err(|reason| PluginError::InvalidConfig {
                field: "alignment".to_string(),
                reason,
            })?;
        let style = TextStyle {
            text: required_str(config, "text")?,
            font: config["font"].as_str().filter(|f| !f.is_empty()),
            size: pixels(&config["size"]),
            weight: pixels(&config["weight"]),
            alignment,
        };
        let brush = Brush::new(
            color(config, "color_stroke", config["color_alpha"].as_int())?,
            pixels(&config["stroke_width"]),
            None,
        );

        let border_alpha = config["border_alpha"].as_int();
        let border = match pixels(&config["border"]) {
            Some(width) => Some(TextBorder {
                brush: Brush::new(
                    if width == 0 {
                        None
                    } else {
                        color(config, "color_stroke", border_alpha)?
                    },
                    Some(width),
                    color(config, "color_fill", border_alpha)?,
                ),
                radius: pixels(&config["border_radius"]),
                padding: pixels(&config["border_padding"]).unwrap_or(0),
            }),
            None => None,
        };
        let rotate = config["rotate"].as_float().filter(|r| *r != 0.0);

        ctx.adapter().draw_text(
            image,
            position(config, "start_x", "start_y"),
            &style,
            &brush,
            border.as_ref(),
            rotate,
        );
        Ok(None)
    }
}
