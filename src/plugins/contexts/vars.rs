//! Variables: a named map whose values may themselves be templates.

use super::{ContextImplementation, ContextPlugin, Contributed};
use crate::core::error::PluginResult;
use crate::core::model::FrameContext;
use crate::execution::RenderContext;
use crate::expression::{Evaluated, EvaluatedResolver, MapResolver, SharedResolver};
use crate::plugins::form::{FieldDefinition, FieldKind};
use crate::plugins::plugin::{Lifecycle, Plugin, PluginMetadata};
use std::rc::Rc;

/// Resolver name used when the record has none.
const DEFAULT_NAME: &str = "vars";

pub(super) fn plugin() -> ContextPlugin {
    let metadata = PluginMetadata::new("vars", "Variables", "Global variables").field(
        FieldDefinition::new("variables", "Variables", FieldKind::Json)
            .with_default(crate::core::value::Value::Map(Default::default()))
            .with_help("Key/value pairs to provide as variables"),
    );
    Plugin::new(metadata, || Box::new(Variables) as Box<dyn ContextImplementation>)
}

/// Registers `variables` under the record's name. String values are
/// rendered on every lookup, so they can refer to the current image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Variables;

impl Lifecycle for Variables {}

impl ContextImplementation for Variables {
    fn run(&mut self, record: &FrameContext, config: &Evaluated, ctx: &RenderContext<'_>) -> PluginResult<Contributed> {
        let name = if record.name.is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            record.name.clone()
        };
        let resolver: SharedResolver = Rc::new(EvaluatedResolver::new(
            ctx.expressions(),
            MapResolver::from_value(&config["variables"]),
        ));
        Ok(vec![(name, resolver)])
    }
}
