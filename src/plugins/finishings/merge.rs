//! Merge: composite all input images onto the first one.

use super::{position, FinishingImplementation, FinishingPlugin};
use crate::adapter::{ImageContainer, Placement};
use crate::core::error::PluginResult;
use crate::core::types::Gravity;
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::form::FieldDefinition;
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};

const ALIGNMENTS: [&str; 10] = [
    "coords",
    "center",
    "top",
    "bottom",
    "left",
    "right",
    "top-left",
    "top-right",
    "bottom-left",
    "bottom-right",
];

pub(super) fn plugin() -> FinishingPlugin {
    let metadata = PluginMetadata::new("merge", "Merge", "Merge multiple images into one").fields([
        FieldDefinition::choice("alignment", "Alignment", &ALIGNMENTS)
            .with_default("center")
            .with_help("Align images when merging (predefined alignments or the coordinates below)"),
        FieldDefinition::text("left", "X position").with_help("Horizontal position for coords alignment"),
        FieldDefinition::text("top", "Y position").with_help("Vertical position for coords alignment"),
    ]);
    Plugin::new(metadata, || Box::new(Merge) as Box<dyn FinishingImplementation>)
}

/// Merges in place; the result has a single frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merge;

impl Lifecycle for Merge {}

impl FinishingImplementation for Merge {
    fn run(
        &mut self,
        config: &Evaluated,
        image: &mut ImageContainer,
        ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        let alignment = config["alignment"].as_str().unwrap_or_default();
        let placement = if alignment == "coords" {
            Placement::Coords(position(config, "left", "top"))
        } else {
            Placement::Gravity(Gravity::from_alignment(&alignment))
        };
        ctx.adapter().merge(image, placement);
        Ok(None)
    }
}
