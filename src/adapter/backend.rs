//! [`ImageAdapter`] on top of the `image` and `imageproc` crates.

use super::draw;
use super::{bounded_dimensions, mime_type, require_frames, ImageAdapter, ImageContainer, ImageMeta, Placement};
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::types::{Brush, Color, Position, TextBorder, TextStyle};
use crate::core::value::Value;
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, DynamicImage, ImageFormat, RgbaImage};
use indexmap::IndexMap;
use log::debug;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;

/// Largest download accepted from a remote URL.
const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Adapter backed by the pure-Rust `image` stack.
#[derive(Debug, Clone)]
pub struct ImageCrateAdapter {
    timeout: Duration,
    filter: FilterType,
}

impl Default for ImageCrateAdapter {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            filter: FilterType::Lanczos3,
        }
    }
}

impl ImageCrateAdapter {
    /// Create an adapter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout for remote fetches.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resampling filter for resize and scale.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn fetch(&self, url: &str) -> AdapterResult<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
            let response = agent.get(url).call().map_err(|e| AdapterError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            let mut bytes = Vec::new();
            response
                .into_reader()
                .take(MAX_DOWNLOAD_BYTES)
                .read_to_end(&mut bytes)
                .map_err(|e| AdapterError::Http {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            return Ok(bytes);
        }

        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if !path.is_file() {
            return Err(AdapterError::Open {
                url: url.to_string(),
                reason: "only http(s) URLs and existing files are supported".to_string(),
            });
        }
        std::fs::read(path).map_err(|e| AdapterError::Open {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode encoded image bytes. GIFs keep every frame; EXIF orientation
    /// is applied so frames come out upright.
    pub fn decode(bytes: &[u8]) -> AdapterResult<ImageContainer> {
        let format = image::guess_format(bytes).map_err(|e| AdapterError::Decode(e.to_string()))?;
        let mut frames = if format == ImageFormat::Gif {
            GifDecoder::new(Cursor::new(bytes))?
                .into_frames()
                .collect_frames()?
                .into_iter()
                .map(|frame| frame.into_buffer())
                .collect()
        } else {
            vec![image::load_from_memory_with_format(bytes, format)?.to_rgba8()]
        };

        if let Some(orientation) = exif_orientation(bytes) {
            frames = frames.into_iter().map(|f| orient(f, orientation)).collect();
        }

        let mut container = ImageContainer::new().with_format(format).with_exif(read_exif(bytes));
        for frame in frames {
            container.push(frame);
        }
        Ok(container)
    }
}

/// EXIF Orientation tag (1-8) if present.
fn exif_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    (1..=8).contains(&orientation).then_some(orientation)
}

/// Primary EXIF fields keyed by lower-cased tag name.
fn read_exif(bytes: &[u8]) -> IndexMap<String, Value> {
    let Ok(exif) = exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
        return IndexMap::new();
    };
    exif.fields()
        .filter(|field| field.ifd_num == exif::In::PRIMARY)
        .map(|field| {
            let value = field.display_value().to_string();
            (
                field.tag.to_string().to_lowercase(),
                Value::Str(value.trim_matches('"').to_string()),
            )
        })
        .collect()
}

fn orient(frame: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&frame),
        3 => imageops::rotate180(&frame),
        4 => imageops::flip_vertical(&frame),
        5 => imageops::flip_horizontal(&imageops::rotate90(&frame)),
        6 => imageops::rotate90(&frame),
        7 => imageops::flip_horizontal(&imageops::rotate270(&frame)),
        8 => imageops::rotate270(&frame),
        _ => frame,
    }
}

fn encode(frame: &RgbaImage, format: ImageFormat) -> AdapterResult<Vec<u8>> {
    let image = match format {
        // no alpha channel in JPEG
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(frame.clone()).to_rgb8()),
        _ => DynamicImage::ImageRgba8(frame.clone()),
    };
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|e| AdapterError::Encode(e.to_string()))?;
    Ok(bytes)
}

impl ImageAdapter for ImageCrateAdapter {
    fn open(&self, url: &str, background: Option<Color>) -> AdapterResult<ImageContainer> {
        let bytes = self.fetch(url)?;
        let mut image = Self::decode(&bytes).map_err(|e| AdapterError::Open {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if let Some(background) = background {
            image.for_each_frame(|frame| *frame = draw::flatten(frame, background));
        }
        debug!("Opened {} as {:?}", url, image);
        Ok(image)
    }

    fn data(&self, image: &ImageContainer) -> AdapterResult<Vec<u8>> {
        let frame = require_frames(image)?;
        encode(frame, image.format().unwrap_or(ImageFormat::Png))
    }

    fn meta(&self, image: &ImageContainer) -> AdapterResult<ImageMeta> {
        let (width, height) = require_frames(image)?.dimensions();
        Ok(ImageMeta {
            width,
            height,
            mime: mime_type(image.format()),
        })
    }

    fn exif(&self, image: &ImageContainer) -> IndexMap<String, Value> {
        image.exif().clone()
    }

    fn resize(&self, image: &mut ImageContainer, width: u32, height: u32, keep_aspect: bool) {
        let filter = self.filter;
        image.for_each_frame(|frame| {
            let (w, h) = if keep_aspect {
                let (iw, ih) = frame.dimensions();
                let factor = (width as f64 / iw as f64).min(height as f64 / ih as f64);
                ((iw as f64 * factor) as u32, (ih as f64 * factor) as u32)
            } else {
                (width, height)
            };
            let (w, h) = bounded_dimensions(w, h);
            *frame = imageops::resize(frame, w, h, filter);
        });
    }

    fn scale(&self, image: &mut ImageContainer, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        let filter = self.filter;
        image.for_each_frame(|frame| {
            let (w, h) = bounded_dimensions(
                (frame.width() as f64 * factor) as u32,
                (frame.height() as f64 * factor) as u32,
            );
            *frame = imageops::resize(frame, w, h, filter);
        });
    }

    fn rotate(&self, image: &mut ImageContainer, degrees: f64) {
        image.for_each_frame(|frame| *frame = draw::rotate_frame(frame, degrees));
    }

    fn blur(&self, image: &mut ImageContainer, factor: f64) {
        if factor > 1.0 {
            image.for_each_frame(|frame| *frame = imageproc::filter::gaussian_blur_f32(frame, factor as f32));
        } else if factor > 0.0 && factor < 1.0 {
            let sigma = (1.0 / factor) as f32;
            image.for_each_frame(|frame| *frame = imageops::unsharpen(frame, sigma, 0));
        }
    }

    fn alpha(&self, image: &mut ImageContainer, percent: i64) {
        let factor = percent.clamp(0, 100) as f32 / 100.0;
        image.for_each_frame(|frame| {
            for pixel in frame.pixels_mut() {
                pixel.0[3] = (pixel.0[3] as f32 * factor).round() as u8;
            }
        });
    }

    fn merge(&self, image: &mut ImageContainer, placement: Placement) {
        let mut frames = image.take_frames().into_iter();
        let Some(mut base) = frames.next() else {
            return;
        };
        for overlay in frames {
            let at = match placement {
                Placement::Gravity(gravity) => gravity.offset(base.dimensions(), overlay.dimensions()),
                Placement::Coords(pos) => pos,
            };
            imageops::overlay(&mut base, &overlay, i64::from(at.x), i64::from(at.y));
        }
        image.push(base);
    }

    fn clone_image(&self, image: &ImageContainer) -> ImageContainer {
        image.clone()
    }

    fn close(&self, image: ImageContainer) {
        debug!("Closing {:?}", image);
        drop(image);
    }

    fn draw_line(&self, image: &mut ImageContainer, start: Position, end: Position, brush: &Brush) {
        image.for_each_frame(|frame| draw::line(frame, start, end, brush));
    }

    fn draw_rect(
        &self,
        image: &mut ImageContainer,
        start: Position,
        end: Position,
        brush: &Brush,
        radius: Option<u32>,
    ) {
        image.for_each_frame(|frame| draw::rect(frame, start, end, brush, radius));
    }

    fn draw_circle(&self, image: &mut ImageContainer, center: Position, perimeter: Position, brush: &Brush) {
        let dx = (perimeter.x - center.x) as f32;
        let dy = (perimeter.y - center.y) as f32;
        let radius = dx.hypot(dy);
        image.for_each_frame(|frame| draw::circle(frame, center, radius, brush));
    }

    fn draw_text(
        &self,
        image: &mut ImageContainer,
        pos: Position,
        text: &TextStyle,
        brush: &Brush,
        border: Option<&TextBorder>,
        rotate: Option<f64>,
    ) {
        image.for_each_frame(|frame| draw::text(frame, pos, text, brush, border, rotate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MAX_DIMENSION;
    use crate::core::types::Gravity;
    use image::Rgba;
    use tempfile::TempDir;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> ImageContainer {
        ImageContainer::from_frame(RgbaImage::from_pixel(w, h, Rgba(color))).with_format(ImageFormat::Png)
    }

    #[test]
    fn test_open_local_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        RgbaImage::from_pixel(30, 20, Rgba([1, 2, 3, 255])).save(&path).unwrap();

        let adapter = ImageCrateAdapter::new();
        let image = adapter.open(path.to_str().unwrap(), None).unwrap();
        let meta = adapter.meta(&image).unwrap();
        assert_eq!((meta.width, meta.height), (30, 20));
        assert_eq!(meta.mime, "image/png");
        assert!(adapter.exif(&image).is_empty());
    }

    #[test]
    fn test_open_with_background_flattens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clear.png");
        RgbaImage::new(4, 4).save(&path).unwrap();

        let adapter = ImageCrateAdapter::new();
        let image = adapter.open(path.to_str().unwrap(), Some(Color::WHITE)).unwrap();
        assert_eq!(image.first().unwrap().get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_open_rejects_unknown_scheme() {
        let adapter = ImageCrateAdapter::new();
        assert!(matches!(
            adapter.open("ftp://example.org/a.png", None),
            Err(AdapterError::Open { .. })
        ));
    }

    #[test]
    fn test_data_encodes_jpeg_without_alpha() {
        let adapter = ImageCrateAdapter::new();
        let image = solid(8, 8, [200, 10, 10, 128]).with_format(ImageFormat::Jpeg);
        let bytes = adapter.data(&image).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        assert!(adapter.data(&ImageContainer::new()).is_err());
    }

    #[test]
    fn test_resize_keep_aspect() {
        let adapter = ImageCrateAdapter::new();
        let mut image = solid(400, 200, [0, 0, 0, 255]);
        adapter.resize(&mut image, 100, 100, true);
        assert_eq!(image.dimensions(), Some((100, 50)));
        adapter.resize(&mut image, 30, 40, false);
        assert_eq!(image.dimensions(), Some((30, 40)));
    }

    #[test]
    fn test_resize_is_bounded() {
        let adapter = ImageCrateAdapter::new();
        let mut image = solid(4, 4, [0, 0, 0, 255]);
        adapter.resize(&mut image, 1_000_000, 2, false);
        assert_eq!(image.dimensions(), Some((MAX_DIMENSION, 1)));
    }

    #[test]
    fn test_scale_and_alpha() {
        let adapter = ImageCrateAdapter::new();
        let mut image = solid(100, 50, [0, 0, 0, 200]);
        adapter.alpha(&mut image, 50);
        assert_eq!(image.first().unwrap().get_pixel(10, 10).0[3], 100);
        adapter.scale(&mut image, 0.5);
        assert_eq!(image.dimensions(), Some((50, 25)));
    }

    #[test]
    fn test_merge_with_gravity() {
        let adapter = ImageCrateAdapter::new();
        let mut image = solid(10, 10, [255, 255, 255, 255]);
        image.absorb(solid(2, 2, [255, 0, 0, 255]));
        adapter.merge(&mut image, Placement::Gravity(Gravity::SouthEast));
        assert_eq!(image.len(), 1);
        let frame = image.first().unwrap();
        assert_eq!(frame.get_pixel(9, 9).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_merge_with_coords() {
        let adapter = ImageCrateAdapter::new();
        let mut image = solid(10, 10, [255, 255, 255, 255]);
        image.absorb(solid(2, 2, [0, 0, 255, 255]));
        adapter.merge(&mut image, Placement::Coords(Position::new(1, 1)));
        assert_eq!(image.first().unwrap().get_pixel(1, 1).0, [0, 0, 255, 255]);
        assert_eq!(image.first().unwrap().get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_draw_applies_to_every_frame() {
        let adapter = ImageCrateAdapter::new();
        let mut image = solid(20, 20, [255, 255, 255, 255]);
        image.absorb(solid(20, 20, [255, 255, 255, 255]));
        let brush = Brush::new(Some(Color::BLACK), Some(0), None);
        adapter.draw_rect(&mut image, Position::new(0, 0), Position::new(10, 10), &brush, None);
        for frame in image.frames() {
            assert_eq!(frame.get_pixel(5, 5).0, [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let adapter = ImageCrateAdapter::new();
        let mut image = solid(40, 10, [0, 0, 0, 255]);
        adapter.rotate(&mut image, 90.0);
        assert_eq!(image.dimensions(), Some((10, 40)));
    }

    #[test]
    fn test_orientation_transform() {
        let mut frame = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255]));
        frame.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let rotated = orient(frame.clone(), 6);
        assert_eq!(rotated.dimensions(), (2, 3));
        assert_eq!(rotated.get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(orient(frame.clone(), 1), frame);
    }
}
