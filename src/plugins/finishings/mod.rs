//! Finishing plugins: the image operations a frame applies to every item.
//!
//! Finishings are tree-shaped: a `group` has no effect of its own but
//! disabling it disables every step below it.

mod group;
mod image;
mod merge;
mod resize;
mod shape;
mod text;
mod transform;

pub use group::Group;
pub use image::OpenImage;
pub use merge::Merge;
pub use resize::Resize;
pub use shape::Shape;
pub use text::Text;
pub use transform::Transform;

use crate::adapter::ImageContainer;
use crate::core::error::{PluginError, PluginResult};
use crate::core::model::{Finishing, PluginModel};
use crate::core::types::{Color, Position, Size};
use crate::core::value::Value;
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::form::{FieldDefinition, FieldKind};
use crate::plugins::plugin::{Category, Lifecycle, Plugin};
use crate::plugins::registry::PluginRegistry;

/// Registry of finishing plugins.
pub type FinishingRegistry = PluginRegistry<Finishings>;

/// Descriptor of a finishing plugin.
pub type FinishingPlugin = Plugin<Finishings>;

/// Image operation run by a finishing step.
pub trait FinishingImplementation: Lifecycle + Send {
    /// Apply the step to `image`, the step's inputs collected into one
    /// container. Returns `None` when `image` itself (possibly modified) is
    /// the result, or a new container replacing it.
    fn run(
        &mut self,
        config: &Evaluated,
        image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>>;
}

/// The finishing category.
#[derive(Debug, Clone, Copy)]
pub struct Finishings;

impl Category for Finishings {
    const KEY: &'static str = "finishing";
    const TREE: bool = true;
    type Model = Finishing;
    type Implementation = dyn FinishingImplementation;

    fn new_model(plugin: &str) -> Finishing {
        Finishing::new(plugin)
    }

    fn builtins() -> Vec<FinishingPlugin> {
        vec![
            group::plugin(),
            image::plugin(),
            merge::plugin(),
            resize::plugin(),
            shape::plugin(),
            text::plugin(),
            transform::plugin(),
        ]
    }
}

impl Plugin<Finishings> {
    /// Run a step on the implementation instance its record names.
    pub fn run(
        &self,
        model: &Finishing,
        config: &Evaluated,
        image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        self.with_instance(&model.instance_name(), |implementation| {
            implementation.run(config, image, ctx)
        })
    }
}

// ============================================================================
// Shared fields
// ============================================================================

fn color_stroke_fields() -> [FieldDefinition; 2] {
    [
        FieldDefinition::new("color_stroke", "Foreground color", FieldKind::Color)
            .required()
            .with_help("The foreground color (lines, text) in hex"),
        FieldDefinition::integer("stroke_width", "Line width").with_help("The width to use when drawing lines"),
    ]
}

fn color_fill_field() -> FieldDefinition {
    FieldDefinition::new("color_fill", "Background color", FieldKind::Color)
        .with_help("The background color (fill) in hex")
}

fn color_alpha_field() -> FieldDefinition {
    FieldDefinition::integer("color_alpha", "Transparency")
        .with_help("Alpha between 0 (transparent) and 100 (no transparency)")
}

fn position_fields(x: &str, y: &str, label: &str) -> [FieldDefinition; 2] {
    [
        FieldDefinition::text(x, format!("X {}", label)),
        FieldDefinition::text(y, format!("Y {}", label)),
    ]
}

// ============================================================================
// Config helpers
// ============================================================================

/// Optional color, empty meaning none.
fn color(config: &Evaluated, field: &str, alpha: Option<i64>) -> PluginResult<Option<Color>> {
    match config[field].as_str().filter(|c| !c.trim().is_empty()) {
        Some(c) => Ok(Some(Color::with_alpha_percent(&c, alpha)?)),
        None => Ok(None),
    }
}

/// Pixel coordinate, zero when unset.
fn coordinate(value: &Value) -> i32 {
    value
        .as_int()
        .map_or(0, |v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

fn position(config: &Evaluated, x: &str, y: &str) -> Position {
    Position::new(coordinate(&config[x]), coordinate(&config[y]))
}

fn size(config: &Evaluated, x: &str, y: &str) -> Size {
    Size::new(coordinate(&config[x]), coordinate(&config[y]))
}

/// Non-negative pixel count, `None` when unset or negative.
fn pixels(value: &Value) -> Option<u32> {
    value.as_int().and_then(|v| u32::try_from(v).ok())
}

fn required_str(config: &Evaluated, field: &str) -> PluginResult<String> {
    config[field]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PluginError::InvalidConfig {
            field: field.to_string(),
            reason: "a value is required".to_string(),
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use indexmap::IndexMap;

    pub fn config(entries: &[(&str, Value)]) -> Evaluated {
        let values: IndexMap<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Evaluated::from_values("Finishing", values)
    }

    #[test]
    fn test_builtins_registered() {
        let registry = FinishingRegistry::with_builtins();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec!["group", "image", "merge", "resize", "shape", "text", "transform"]
        );
        assert_eq!(registry.category(), "finishing");
    }

    #[test]
    fn test_color_helper() {
        let cfg = config(&[("a", Value::from("#ff0000")), ("b", Value::from(" ")), ("c", Value::from("zz"))]);
        assert_eq!(color(&cfg, "a", Some(50)).unwrap().map(|c| c.a), Some(128));
        assert_eq!(color(&cfg, "b", None).unwrap(), None);
        assert_eq!(color(&cfg, "missing", None).unwrap(), None);
        assert!(color(&cfg, "c", None).is_err());
    }

    #[test]
    fn test_numeric_helpers() {
        let cfg = config(&[("x", Value::from("12.9")), ("y", Value::Int(-4)), ("w", Value::Int(-1))]);
        assert_eq!(position(&cfg, "x", "y"), Position::new(12, -4));
        assert_eq!(size(&cfg, "x", "missing"), Size::new(12, 0));
        assert_eq!(pixels(&cfg["w"]), None);
        assert_eq!(pixels(&cfg["x"]), Some(12));
        assert!(required_str(&cfg, "missing").is_err());
    }
}
