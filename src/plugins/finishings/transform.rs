//! Transform: blur, scale or rotate.

use super::{FinishingImplementation, FinishingPlugin};
use crate::adapter::ImageContainer;
use crate::core::error::{PluginError, PluginResult};
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::form::{FieldDefinition, FieldKind};
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};

pub(super) fn plugin() -> FinishingPlugin {
    let metadata = PluginMetadata::new("transform", "Transform", "Apply transformation on image (blur/scale/rotate)")
        .fields([
            FieldDefinition::choice("mode", "Type", &["blur", "scale", "rotate"])
                .required()
                .with_help("The transformation to apply"),
            FieldDefinition::new("factor", "Factor", FieldKind::Float)
                .with_help(">1/<1 for blur/sharpen, percent for scale, degrees for rotate"),
        ]);
    Plugin::new(metadata, || Box::new(Transform) as Box<dyn FinishingImplementation>)
}

/// `scale` takes a percentage, `rotate` degrees clockwise and `blur` a
/// strength where values below 1 sharpen.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transform;

impl Lifecycle for Transform {}

impl FinishingImplementation for Transform {
    fn run(
        &mut self,
        config: &Evaluated,
        image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        let Some(factor) = config["factor"].as_float() else {
            return Ok(None);
        };
        let adapter = ctx.adapter();
        match config["mode"].as_str().unwrap_or_default().as_str() {
            "blur" => adapter.blur(image, factor),
            "scale" => adapter.scale(image, factor / 100.0),
            "rotate" => adapter.rotate(image, factor),
            other => {
                return Err(PluginError::InvalidConfig {
                    field: "mode".to_string(),
                    reason: format!("unknown transformation '{}'", other),
                })
            }
        }
        Ok(None)
    }
}
