//! Group: a container for other finishings.

use super::{FinishingImplementation, FinishingPlugin};
use crate::adapter::ImageContainer;
use crate::core::error::PluginResult;
use crate::execution::RenderContext;
use crate::expression::Evaluated;
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};

pub(super) fn plugin() -> FinishingPlugin {
    Plugin::new(
        PluginMetadata::new("group", "Group", "Group finishings to enable or disable them together"),
        || Box::new(Group) as Box<dyn FinishingImplementation>,
    )
}

/// Passes its input through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Group;

impl Lifecycle for Group {}

impl FinishingImplementation for Group {
    fn run(
        &mut self,
        _config: &Evaluated,
        _image: &mut ImageContainer,
        _ctx: &RenderContext<'_>,
    ) -> PluginResult<Option<ImageContainer>> {
        Ok(None)
    }
}
