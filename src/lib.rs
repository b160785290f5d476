//! # framarama - Finishing engine for photo frames
//!
//! framarama turns a source photo into the image a display shows. A frame
//! owns an ordered tree of *finishings* (resize, text overlays, shapes,
//! merges with further images, ...). Each finishing is backed by a plugin
//! and configured with template strings that are evaluated against the
//! current render state before the step runs.
//!
//! ## Features
//!
//! - **Plugin registries**: finishing and context plugins registered per category
//! - **Templated configuration**: `{image["width"] / 2}` style expressions in a sandboxed engine
//! - **Named buffers**: steps read and write any number of named images
//! - **Tree reconciliation**: export a finishing tree and import it back as a create/update/delete diff
//! - **Guaranteed release**: every image opened during a render is closed, even when a step fails
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use framarama::prelude::*;
//!
//! let finishings = FinishingRegistry::with_builtins();
//! let contexts = ContextRegistry::with_builtins();
//! let adapter = ImageCrateAdapter::new();
//!
//! let mut tree = FinishingTree::default();
//! tree.append(
//!     None,
//!     Finishing::new("resize")
//!         .with_config("resize_x", "{display[\"device_width\"]}")
//!         .with_config("keep_aspect", true),
//! )?;
//!
//! let display = Display::new("living room", 800, 480);
//! let frame = Frame::new("holidays");
//! let item = Item::new("photos/beach.jpg");
//!
//! let processor = FinishingProcessor::new(&adapter, &finishings, &contexts);
//! let request = RenderRequest::new(&display, &frame, &item).with_finishings(&tree);
//! if let Some(result) = processor.process(&request)? {
//!     std::fs::write("out.png", &result.data)?;
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: errors, the null-safe [`Value`](core::Value), paint primitives and records
//! - [`expression`]: resolvers and the template evaluation context
//! - [`adapter`]: the image library boundary
//! - [`tree`]: nested-set tree of finishings
//! - [`plugins`]: plugin descriptors, registries, import/export and the built-in plugins
//! - [`execution`]: the per-render buffer set, watermark and processor
//! - [`settings`]: TOML settings of the command line tool

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod core;
pub mod execution;
pub mod expression;
pub mod plugins;
pub mod settings;
pub mod tree;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use framarama::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{Alignment, Brush, Color, Gravity, Position, Size, TextBorder, TextStyle};
    pub use crate::core::value::Value;

    // Records
    pub use crate::core::model::{Display, Finishing, Frame, FrameContext, Item, PluginConfig, PluginModel};

    // Errors
    pub use crate::core::error::{
        AdapterError, EvalError, FramaramaError, FramaramaResult, PluginError, ReconcileError, RecordId,
        RenderError, TreeError,
    };

    // Expressions
    pub use crate::expression::{Context, Evaluated, MapResolver, ObjectResolver, Resolver, SandboxLimits};

    // Adapter
    pub use crate::adapter::{ImageAdapter, ImageContainer, ImageCrateAdapter, ImageMeta};

    // Tree
    pub use crate::tree::{FinishingTree, ModelTree, MoveAction};

    // Plugins
    pub use crate::plugins::{
        BaseValues, ContextRegistry, ExportDocument, ExportMode, ExportNode, FinishingRegistry, ImportReport,
        Plugin, PluginMetadata, PluginRegistry,
    };

    // Execution
    pub use crate::execution::{
        FinishingProcessor, ProcessingResult, RenderContext, RenderOptions, RenderRequest, WatermarkStyle,
    };

    // Settings
    pub use crate::settings::Settings;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "framarama");
    }

    #[test]
    fn test_registries_with_builtins() {
        let finishings = FinishingRegistry::with_builtins();
        for name in ["group", "image", "merge", "resize", "shape", "text", "transform"] {
            assert!(finishings.contains(name), "{}", name);
        }
        let contexts = ContextRegistry::with_builtins();
        assert!(contexts.contains("vars"));
        assert!(contexts.contains("exif"));
    }

    #[test]
    fn test_prelude_render() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.png");
        image::RgbaImage::from_pixel(64, 32, image::Rgba([10, 20, 30, 255]))
            .save(&source)
            .unwrap();

        let finishings = FinishingRegistry::with_builtins();
        let contexts = ContextRegistry::with_builtins();
        let adapter = ImageCrateAdapter::new();
        let mut tree = FinishingTree::default();
        tree.append(
            None,
            Finishing::new("resize")
                .with_config("resize_x", "{image[\"width\"] / 2}")
                .with_config("keep_aspect", true),
        )
        .unwrap();

        let display = Display::new("desk", 800, 480);
        let frame = Frame::new("test");
        let item = Item::new(source.to_string_lossy());
        let processor = FinishingProcessor::new(&adapter, &finishings, &contexts);
        let request = RenderRequest::new(&display, &frame, &item).with_finishings(&tree);
        let result = processor.process(&request).unwrap().unwrap();
        assert_eq!((result.width, result.height), (32, 16));
        assert_eq!(result.mime, "image/png");
    }
}
