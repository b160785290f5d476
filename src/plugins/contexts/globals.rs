//! Globals: system wide parameters exposed as `globals`.

use super::{ContextImplementation, ContextPlugin, Contributed};
use crate::core::error::PluginResult;
use crate::core::model::FrameContext;
use crate::execution::RenderContext;
use crate::expression::{Evaluated, MapResolver, SharedResolver};
use crate::plugins::form::{FieldDefinition, FieldKind};
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};
use std::rc::Rc;

pub(super) fn plugin() -> ContextPlugin {
    let metadata = PluginMetadata::new("globals", "Globals", "System global parameters and variables").field(
        FieldDefinition::new("variables", "Globals", FieldKind::Json).with_help("Global parameters and variables"),
    );
    Plugin::new(metadata, || Box::new(Globals) as Box<dyn ContextImplementation>)
}

/// Unlike `vars`, values are used as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct Globals;

impl Lifecycle for Globals {}

impl ContextImplementation for Globals {
    fn run(&mut self, _record: &FrameContext, config: &Evaluated, _ctx: &RenderContext<'_>) -> PluginResult<Contributed> {
        let resolver: SharedResolver = Rc::new(MapResolver::from_value(&config["variables"]));
        Ok(vec![("globals".to_string(), resolver)])
    }
}
