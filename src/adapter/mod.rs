//! Image processing adapter.
//!
//! The [`ImageAdapter`] trait is the boundary between the finishing pipeline
//! and the native image library. Every operation acts on an
//! [`ImageContainer`], which may hold several frames (animated sources or the
//! collected inputs of a merge); resize, drawing and the other in-place
//! operations apply to every frame.
//!
//! The production implementation is [`ImageCrateAdapter`], built on the
//! `image` and `imageproc` crates.

pub mod backend;
pub mod draw;

pub use backend::ImageCrateAdapter;

use crate::core::error::{AdapterError, AdapterResult};
use crate::core::types::{Brush, Color, Gravity, Position, TextBorder, TextStyle};
use crate::core::value::Value;
use image::{ImageFormat, RgbaImage};
use indexmap::IndexMap;
use log::warn;
use std::fmt;

/// Named collection of frames forming one logical image.
#[derive(Clone, Default)]
pub struct ImageContainer {
    frames: Vec<RgbaImage>,
    format: Option<ImageFormat>,
    exif: IndexMap<String, Value>,
}

impl ImageContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container holding a single frame.
    pub fn from_frame(frame: RgbaImage) -> Self {
        Self {
            frames: vec![frame],
            ..Self::default()
        }
    }

    /// Set the source format (used when encoding).
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Attach EXIF metadata.
    pub fn with_exif(mut self, exif: IndexMap<String, Value>) -> Self {
        self.exif = exif;
        self
    }

    /// Frames in order.
    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }

    /// Mutable frames.
    pub fn frames_mut(&mut self) -> &mut Vec<RgbaImage> {
        &mut self.frames
    }

    /// First frame, which defines the container's metadata.
    pub fn first(&self) -> Option<&RgbaImage> {
        self.frames.first()
    }

    /// Append a frame.
    pub fn push(&mut self, frame: RgbaImage) {
        self.frames.push(frame);
    }

    /// Move all frames of `other` to the end of this container. Format and
    /// EXIF are inherited when this container has none yet.
    pub fn absorb(&mut self, mut other: ImageContainer) {
        if self.frames.is_empty() {
            self.format = self.format.or(other.format);
            if self.exif.is_empty() {
                self.exif = std::mem::take(&mut other.exif);
            }
        }
        self.frames.append(&mut other.frames);
    }

    /// Remove and return all frames.
    pub fn take_frames(&mut self) -> Vec<RgbaImage> {
        std::mem::take(&mut self.frames)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the container holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Format the container was decoded from.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// EXIF metadata of the source.
    pub fn exif(&self) -> &IndexMap<String, Value> {
        &self.exif
    }

    /// Dimensions of the first frame.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.first().map(|f| f.dimensions())
    }

    /// Apply `op` to every frame.
    pub fn for_each_frame(&mut self, mut op: impl FnMut(&mut RgbaImage)) {
        for frame in &mut self.frames {
            op(frame);
        }
    }
}

impl fmt::Debug for ImageContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<String> = self
            .frames
            .iter()
            .map(|frame| format!("{}x{}", frame.width(), frame.height()))
            .collect();
        write!(f, "<ImageContainer: {} images: {}>", self.frames.len(), sizes.join(", "))
    }
}

/// Width, height and MIME type of a container's first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub mime: String,
}

impl ImageMeta {
    /// Metadata as a value map (`width`, `height`, `mime`), the shape
    /// templates see under `image`.
    pub fn to_map(&self) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        map.insert("width".to_string(), Value::from(self.width));
        map.insert("height".to_string(), Value::from(self.height));
        map.insert("mime".to_string(), Value::from(self.mime.clone()));
        map
    }
}

/// Where merged frames are placed on the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Align relative to the canvas edges
    Gravity(Gravity),
    /// Explicit top-left coordinates
    Coords(Position),
}

/// Operations the finishing pipeline needs from an image library.
pub trait ImageAdapter: Send + Sync {
    /// Load an image from an HTTP(S) URL or a local path. With a background
    /// color, transparent areas are flattened onto that color.
    fn open(&self, url: &str, background: Option<Color>) -> AdapterResult<ImageContainer>;

    /// Encoded bytes of the first frame in the container's format.
    fn data(&self, image: &ImageContainer) -> AdapterResult<Vec<u8>>;

    /// Metadata of the first frame.
    fn meta(&self, image: &ImageContainer) -> AdapterResult<ImageMeta>;

    /// EXIF fields of the source, keys lower-cased.
    fn exif(&self, image: &ImageContainer) -> IndexMap<String, Value>;

    /// Resize to exactly `width`×`height`, or to fit within it when
    /// `keep_aspect` is set.
    fn resize(&self, image: &mut ImageContainer, width: u32, height: u32, keep_aspect: bool);

    /// Scale both dimensions by `factor`.
    fn scale(&self, image: &mut ImageContainer, factor: f64);

    /// Rotate clockwise by `degrees`, growing the canvas to fit.
    fn rotate(&self, image: &mut ImageContainer, degrees: f64);

    /// Blur for factors above 1, sharpen below 1.
    fn blur(&self, image: &mut ImageContainer, factor: f64);

    /// Scale the alpha channel to `percent` (0 transparent, 100 unchanged).
    fn alpha(&self, image: &mut ImageContainer, percent: i64);

    /// Composite every frame after the first onto the first one.
    fn merge(&self, image: &mut ImageContainer, placement: Placement);

    /// Deep copy of a container.
    fn clone_image(&self, image: &ImageContainer) -> ImageContainer;

    /// Release every frame of a container.
    fn close(&self, image: ImageContainer);

    /// Draw a line from `start` to `end`.
    fn draw_line(&self, image: &mut ImageContainer, start: Position, end: Position, brush: &Brush);

    /// Draw a rectangle between two corners, optionally with rounded corners.
    fn draw_rect(
        &self,
        image: &mut ImageContainer,
        start: Position,
        end: Position,
        brush: &Brush,
        radius: Option<u32>,
    );

    /// Draw a circle around `center` passing through `perimeter`.
    fn draw_circle(&self, image: &mut ImageContainer, center: Position, perimeter: Position, brush: &Brush);

    /// Draw text anchored at `pos` (baseline), optionally on a background box
    /// and rotated by `rotate` degrees.
    fn draw_text(
        &self,
        image: &mut ImageContainer,
        pos: Position,
        text: &TextStyle,
        brush: &Brush,
        border: Option<&TextBorder>,
        rotate: Option<f64>,
    );
}

/// Largest width or height a resize or scale produces.
pub const MAX_DIMENSION: u32 = 16_384;

/// Largest pixel count of a frame a resize or scale produces (256 MiB of RGBA).
pub const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Target size of a resize, at least 1x1 and bounded by [`MAX_DIMENSION`]
/// and [`MAX_PIXELS`]. Oversized targets shrink keeping their aspect ratio.
pub fn bounded_dimensions(width: u32, height: u32) -> (u32, u32) {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let factor = (MAX_DIMENSION as f64 / w)
        .min(MAX_DIMENSION as f64 / h)
        .min((MAX_PIXELS as f64 / (w * h)).sqrt())
        .min(1.0);
    if factor < 1.0 {
        warn!("Target size {}x{} exceeds the frame limit, shrinking it", width, height);
    }
    let scaled = |v: f64| ((v * factor).round() as u32).clamp(1, MAX_DIMENSION);
    (scaled(w), scaled(h))
}

/// MIME type for a format, PNG when unknown.
pub fn mime_type(format: Option<ImageFormat>) -> String {
    format.unwrap_or(ImageFormat::Png).to_mime_type().to_string()
}

/// Ensure a container holds at least one frame.
pub fn require_frames(image: &ImageContainer) -> AdapterResult<&RgbaImage> {
    image.first().ok_or(AdapterError::EmptyContainer)
}
