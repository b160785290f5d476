//! Image: load a further image, e.g. a logo to merge onto the photo.

use super::{color, color_alpha_field, color_fill_field, required_str, FinishingImplementation, FinishingPlugin};
use crate::adapter::ImageContainer;
use crate::core::error::PluginResult;
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::form::FieldDefinition;
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};
use log::debug;

pub(super) fn plugin() -> FinishingPlugin {
    let metadata = PluginMetadata::new("image", "Image", "Load image from a given resource URL").fields([
        color_fill_field(),
        color_alpha_field(),
        FieldDefinition::text("url", "URL")
            .required()
            .with_help("The URL or path to load the image from"),
    ]);
    Plugin::new(metadata, || Box::new(OpenImage) as Box<dyn FinishingImplementation>)
}

/// Opens `url`, optionally flattened onto `color_fill` and faded by
/// `color_alpha`. The loaded image replaces the step's input.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenImage;

impl Lifecycle for OpenImage {}

impl FinishingImplementation for OpenImage {
    fn run(
        &mut self,
        config: &Evaluated,
        _image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        let url = required_str(config, "url")?;
        let background = color(config, "color_fill", None)?;
        let alpha = config["color_alpha"].as_int().unwrap_or(0);

        debug!("Opening image '{}'", url);
        let mut opened = ctx.adapter().open(&url, background)?;
        if alpha != 0 {
            ctx.adapter().alpha(&mut opened, alpha);
        }
        Ok(Some(opened))
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

    #[test]
    fn test_opens_new_image() {
        let adapter = RecordingAdapter::new();
        let records = Records::new("mem://10x10");
        let ctx = records.context(&adapter);
        let mut input = ImageContainer::new();
        let cfg = config(&[
            ("url", Value::from("mem://3x2")),
            ("color_fill", Value::from("#000000")),
            ("color_alpha", Value::from("50")),
        ]);
        let opened = OpenImage.run(&cfg, &mut input, &ctx).unwrap().unwrap();
        assert_eq!(opened.dimensions(), Some((3, 2)));
        assert_eq!(opened.frames()[0].get_pixel(0, 0)[3], 128);
        adapter.close(opened);
    }

    #[test]
    fn test_missing_url_fails() {
        let adapter = RecordingAdapter::new();
        let records = Records::new("mem://10x10");
        let ctx = records.context(&adapter);
        let mut input = ImageContainer::new();
        assert!(OpenImage.run(&config(&[]), &mut input, &ctx).is_err());
    }
}
