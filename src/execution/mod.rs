//! Render execution.
//!
//! This module runs a frame's finishings over an item: the per-render
//! buffer set, the synthesized watermark and the processor driving both.

pub mod context;
pub mod options;
pub mod processor;
pub mod watermark;

pub use context::RenderContext;
pub use options::RenderOptions;
pub use processor::{FinishingProcessor, ProcessingResult, RenderRequest};
pub use watermark::WatermarkStyle;
