//! Plugins and their registries.
//!
//! A plugin pairs a declared form with an implementation factory. Plugins
//! are grouped by category (finishing, context); each category has its own
//! [`PluginRegistry`] which also imports and exports configurations.

pub mod contexts;
pub mod document;
pub mod finishings;
pub mod form;
pub mod plugin;
pub mod registry;

pub use contexts::{ContextImplementation, ContextPlugin, ContextRegistry, Contexts};
pub use document::{ExportDocument, ExportNode, DOCUMENT_VERSION};
pub use finishings::{FinishingImplementation, FinishingPlugin, FinishingRegistry, Finishings};
pub use form::{FieldDefinition, FieldKind, Form};
pub use plugin::{BaseValues, Category, Lifecycle, ModelStore, Plugin, PluginMetadata};
pub use registry::{ExportMode, ImportReport, PluginRegistry, Records, ReconcileTarget};
