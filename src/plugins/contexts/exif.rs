//! Exif: EXIF fields of one or more image buffers.

use super::{ContextImplementation, ContextPlugin, Contributed};
use crate::core::error::PluginResult;
use crate::core::model::{split_names, FrameContext, DEFAULT_IMAGE_NAME};
use crate::core::value::Value;
use crate::execution::RenderContext;
use crate::expression::{Evaluated, MapResolver, SharedResolver};
use crate::plugins::form::FieldDefinition;
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};
use indexmap::IndexMap;
use std::rc::Rc;

pub(super) fn plugin() -> ContextPlugin {
    let metadata = PluginMetadata::new("exif", "Exif", "Extract and provide EXIF information").field(
        FieldDefinition::text("image", "Images")
            .with_help("Images to extract EXIF information from (defaults to \"default\")"),
    );
    Plugin::new(metadata, || Box::new(Exif) as Box<dyn ContextImplementation>)
}

/// The default buffer's fields are registered as `exif`, those of every
/// other named buffer under `exifs[name]`. Missing buffers yield no fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exif;

impl Lifecycle for Exif {}

impl ContextImplementation for Exif {
    fn run(&mut self, _record: &FrameContext, config: &Evaluated, ctx: &RenderContext<'_>) -> PluginResult<Contributed> {
        let names = config["image"].as_str();
        let mut contributed: Contributed = Vec::new();
        let mut others = IndexMap::new();
        for name in split_names(names.as_deref()) {
            let fields = ctx
                .buffer(&name)
                .filter(|image| !image.is_empty())
                .map(|image| ctx.adapter().exif(image))
                .unwrap_or_default();
            if name == DEFAULT_IMAGE_NAME {
                let resolver: SharedResolver = Rc::new(MapResolver::new(fields));
                contributed.push(("exif".to_string(), resolver));
            } else {
                others.insert(name, Value::Map(fields));
            }
        }
        let resolver: SharedResolver = Rc::new(MapResolver::new(others));
        contributed.push(("exifs".to_string(), resolver));
        Ok(contributed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::RecordingAdapter;
    use crate::adapter::ImageAdapter;
    use crate::execution::context::tests::Records;
    use crate::plugins::finishings::tests::config;

    #[test]
    fn test_exif_of_named_buffers() {
        let adapter = RecordingAdapter::new();
        let records = Records::new("mem://4x4");
        let mut ctx = records.context(&adapter);

        let mut fields = IndexMap::new();
        fields.insert("model".to_string(), Value::from("X100"));
        let tagged = adapter.open("mem://4x4", None).unwrap().with_exif(fields);
        ctx.insert_buffer("default", tagged);
        ctx.insert_buffer("logo", adapter.open("mem://2x2", None).unwrap());

        let cfg = config(&[("image", Value::from("default logo missing"))]);
        let contributed = Exif.run(&FrameContext::new("exif", ""), &cfg, &ctx).unwrap();
        let names: Vec<&str> = contributed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["exif", "exifs"]);

        assert_eq!(contributed[0].1.resolve("model"), Value::from("X100"));
        let exifs = &contributed[1].1;
        assert!(exifs.resolve("logo").is_empty());
        assert!(exifs.resolve("missing").is_empty());
        assert!(exifs.resolve("other").is_null());
    }
}
