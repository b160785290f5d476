//! Context plugins: extra template variables provided by a frame.
//!
//! Each enabled [`FrameContext`] of a frame runs before every finishing step
//! is evaluated and contributes named resolvers to the expression context.

mod exif;
mod globals;
mod vars;

pub use exif::Exif;
pub use globals::Globals;
pub use vars::Variables;

use crate::core::error::PluginResult;
use crate::core::model::{FrameContext, PluginModel};
use crate::execution::RenderContext;
use crate::expression::{Evaluated, SharedResolver};
use crate::plugins::plugin::{Category, Lifecycle, Plugin};
use crate::plugins::registry::PluginRegistry;

/// Registry of context plugins.
pub type ContextRegistry = PluginRegistry<Contexts>;

/// Descriptor of a context plugin.
pub type ContextPlugin = Plugin<Contexts>;

/// Resolvers contributed by one context record, by name.
pub type Contributed = Vec<(String, SharedResolver)>;

/// Source of template variables.
pub trait ContextImplementation: Lifecycle + Send {
    /// Build the resolvers for the current render state.
    fn run(&mut self, record: &FrameContext, config: &Evaluated, ctx: &RenderContext<'_>) -> PluginResult<Contributed>;
}

/// The context category.
#[derive(Debug, Clone, Copy)]
pub struct Contexts;

impl Category for Contexts {
    const KEY: &'static str = "context";
    const TREE: bool = false;
    type Model = FrameContext;
    type Implementation = dyn ContextImplementation;

    fn new_model(plugin: &str) -> FrameContext {
        FrameContext::new(plugin, "")
    }

    fn builtins() -> Vec<ContextPlugin> {
        vec![vars::plugin(), globals::plugin(), exif::plugin()]
    }
}

impl Plugin<Contexts> {
    /// Run a context record on the implementation instance it names.
    pub fn run(&self, record: &FrameContext, config: &Evaluated, ctx: &RenderContext<'_>) -> PluginResult<Contributed> {
        self.with_instance(&record.instance_name(), |implementation| {
            implementation.run(record, config, ctx)
        })
    }
}
