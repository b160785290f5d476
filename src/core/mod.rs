//! Core types for the framarama finishing engine.
//!
//! This module contains the foundational types shared by every stage:
//! - The null-safe [`Value`] produced by expression evaluation
//! - Geometry and paint primitives (position, size, color, brush, text)
//! - Records read and edited by the engine (finishings, contexts, frames)
//! - Error types

pub mod error;
pub mod model;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::{
    AdapterError, EvalError, FramaramaError, PluginError, ReconcileError, RecordId, RenderError,
    TreeError,
};
pub use model::{Display, Finishing, Frame, FrameContext, Item, PluginConfig, PluginModel};
pub use types::{Alignment, Brush, Color, Gravity, Position, Size, TextBorder, TextStyle};
pub use value::Value;
