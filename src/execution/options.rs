//! Render options.

use crate::execution::watermark::{WatermarkStyle, DEFAULT_SCALE, DEFAULT_SHIFT};
use crate::expression::SandboxLimits;
use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// Options controlling a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Watermark drawn after all configured steps.
    pub watermark: WatermarkStyle,
    /// Distance of the watermark from the edges.
    pub watermark_shift: f64,
    /// Size factor of the watermark lines.
    pub watermark_scale: f64,
    /// Bounding box of the preview; the aspect ratio is kept.
    pub preview_size: (u32, u32),
    /// Output format by file extension (`png`, `jpg`, ...). The source
    /// format is kept when unset.
    pub format: Option<String>,
    /// Limits of the expression sandbox.
    pub limits: SandboxLimits,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            watermark: WatermarkStyle::Ribbon,
            watermark_shift: DEFAULT_SHIFT,
            watermark_scale: DEFAULT_SCALE,
            preview_size: (640, 480),
            format: None,
            limits: SandboxLimits::default(),
        }
    }
}

impl RenderOptions {
    /// Create a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the watermark style.
    pub fn with_watermark(mut self, style: WatermarkStyle) -> Self {
        self.watermark = style;
        self
    }

    /// Set watermark shift and scale.
    pub fn with_watermark_geometry(mut self, shift: f64, scale: f64) -> Self {
        self.watermark_shift = shift;
        self.watermark_scale = scale;
        self
    }

    /// Disable the watermark.
    pub fn without_watermark(self) -> Self {
        self.with_watermark(WatermarkStyle::None)
    }

    /// Set the preview bounding box.
    pub fn with_preview_size(mut self, width: u32, height: u32) -> Self {
        self.preview_size = (width, height);
        self
    }

    /// Encode the result in the format of a file extension.
    pub fn with_format(mut self, extension: impl Into<String>) -> Self {
        self.format = Some(extension.into());
        self
    }

    /// Set expression sandbox limits.
    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Output format override, `None` if unset or not a known extension.
    pub fn output_format(&self) -> Option<ImageFormat> {
        self.format
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .and_then(ImageFormat::from_extension)
    }
}
