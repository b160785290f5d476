//! Resize: scale to an explicit size or fit within one.

use super::{pixels, FinishingImplementation, FinishingPlugin};
use crate::adapter::ImageContainer;
use crate::core::error::PluginResult;
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::form::{FieldDefinition, FieldKind};
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};

pub(super) fn plugin() -> FinishingPlugin {
    let metadata = PluginMetadata::new("resize", "Resize", "Apply horizontal and/or vertical resize").fields([
        FieldDefinition::text("resize_x", "X resizing").with_help("Resize to given image width"),
        FieldDefinition::text("resize_y", "Y resizing").with_help("Resize to given image height"),
        FieldDefinition::new("keep_aspect", "Keep aspect ratio", FieldKind::Boolean)
            .with_default(false)
            .with_help("Resize only to given size as maximum while keeping aspect ratio"),
    ]);
    Plugin::new(metadata, || Box::new(Resize) as Box<dyn FinishingImplementation>)
}

/// Without `keep_aspect` an unset dimension keeps its current value; with
/// it, an unset dimension does not constrain the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resize;

impl Lifecycle for Resize {}

impl FinishingImplementation for Resize {
    fn run(
        &mut self,
        config: &Evaluated,
        image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        let Some((width, height)) = image.dimensions() else {
            return Ok(None);
        };
        let keep_aspect = config["keep_aspect"].as_bool().unwrap_or(false);
        let unset = |current: u32| if keep_aspect { u32::MAX } else { current };
        let target_x = pixels(&config["resize_x"]).unwrap_or_else(|| unset(width));
        let target_y = pixels(&config["resize_y"]).unwrap_or_else(|| unset(height));
        if target_x == u32::MAX && target_y == u32::MAX {
            return Ok(None);
        }
        ctx.adapter().resize(image, target_x, target_y, keep_aspect);
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

    fn run(cfg: &[(&str, Value)]) -> Option<(u32, u32)> {
        let adapter = RecordingAdapter::new();
        let records = Records::new("mem://400x200");
        let ctx = records.context(&adapter);
        let mut image = adapter.open("mem://400x200", None).unwrap();
        Resize.run(&config(cfg), &mut image, &ctx).unwrap();
        image.dimensions()
    }

    #[test]
    fn test_exact_resize() {
        let size = run(&[("resize_x", Value::from("100")), ("resize_y", Value::from("50"))]);
        assert_eq!(size, Some((100, 50)));
    }

    #[test]
    fn test_keep_aspect_fits() {
        let size = run(&[
            ("resize_x", Value::from("100")),
            ("resize_y", Value::from("100")),
            ("keep_aspect", Value::from("true")),
        ]);
        assert_eq!(size, Some((100, 50)));
    }

    #[test]
    fn test_unset_dimension() {
        assert_eq!(run(&[("resize_x", Value::from("100"))]), Some((100, 200)));
        let fitted = run(&[("resize_y", Value::from("50")), ("keep_aspect", Value::Bool(true))]);
        assert_eq!(fitted, Some((100, 50)));
        assert_eq!(run(&[("keep_aspect", Value::Bool(true))]), Some((400, 200)));
    }
}
