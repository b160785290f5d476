//! Geometry and paint primitives handed from finishing plugins to the adapter.

use crate::core::error::AdapterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a color from RGBA components.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Parse a color from `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA` or a basic
    /// color name.
    pub fn parse(color: &str) -> Result<Self, AdapterError> {
        let color = color.trim();
        if let Some(named) = Self::named(&color.to_lowercase()) {
            return Ok(named);
        }
        Self::from_hex(color).ok_or_else(|| AdapterError::InvalidColor(color.to_string()))
    }

    /// Parse a user supplied color and apply an alpha given in percent
    /// (0 transparent, 100 opaque). Missing or zero alpha keeps the color's own.
    pub fn with_alpha_percent(color: &str, alpha: Option<i64>) -> Result<Self, AdapterError> {
        let mut parsed = Self::parse(color)?;
        if let Some(alpha) = alpha.filter(|a| *a != 0) {
            parsed.a = ((alpha.clamp(0, 100) as f32 / 100.0) * 255.0).round() as u8;
        }
        Ok(parsed)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok().map(|v| v * 17);
        let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(digit(0)?, digit(1)?, digit(2)?)),
            4 => Some(Self::new(digit(0)?, digit(1)?, digit(2)?, digit(3)?)),
            6 => Some(Self::rgb(pair(0)?, pair(2)?, pair(4)?)),
            8 => Some(Self::new(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "blue" => Self::rgb(0, 0, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "cyan" => Self::rgb(0, 255, 255),
            "magenta" => Self::rgb(255, 0, 255),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "orange" => Self::rgb(255, 165, 0),
            "none" | "transparent" => Self::TRANSPARENT,
            _ => return None,
        };
        Some(color)
    }

    /// Convert to hex string (#RRGGBBAA).
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }

    /// Components as an array, the layout `image::Rgba` expects.
    pub fn to_rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Stroke and fill settings for drawing primitives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Brush {
    pub stroke: Option<Color>,
    pub stroke_width: Option<u32>,
    pub fill: Option<Color>,
}

impl Brush {
    /// Create a brush.
    pub fn new(stroke: Option<Color>, stroke_width: Option<u32>, fill: Option<Color>) -> Self {
        Self {
            stroke,
            stroke_width,
            fill,
        }
    }

    /// Fill color, falling back to the stroke color.
    pub fn fill_color(&self) -> Option<Color> {
        self.fill.or(self.stroke)
    }

    /// Stroke width in pixels; unset means one pixel.
    pub fn width(&self) -> u32 {
        self.stroke_width.unwrap_or(1)
    }
}

/// Point on the canvas in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Extent in pixels. Components may be negative (e.g. a line drawn up-right).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, other: Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y)
    }
}

impl Add<Size> for Position {
    type Output = Position;
    fn add(self, other: Size) -> Position {
        Position::new(self.x + other.width, self.y + other.height)
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, other: Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y)
    }
}

impl Sub<Size> for Position {
    type Output = Position;
    fn sub(self, other: Size) -> Position {
        Position::new(self.x - other.width, self.y - other.height)
    }
}

impl Add for Size {
    type Output = Size;
    fn add(self, other: Size) -> Size {
        Size::new(self.width + other.width, self.height + other.height)
    }
}

impl Sub for Size {
    type Output = Size;
    fn sub(self, other: Size) -> Size {
        Size::new(self.width - other.width, self.height - other.height)
    }
}

/// Horizontal text alignment relative to the anchor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "left" => Ok(Alignment::Left),
            "center" => Ok(Alignment::Center),
            "right" => Ok(Alignment::Right),
            other => Err(format!("unknown alignment '{}'", other)),
        }
    }
}

/// Placement used when compositing frames on top of each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    North,
    NorthWest,
    NorthEast,
    South,
    SouthWest,
    SouthEast,
    West,
    East,
    #[default]
    Center,
}

impl Gravity {
    /// Map an alignment keyword (`top`, `bottom-left`, ...) to a gravity.
    /// Unknown keywords fall back to center.
    pub fn from_alignment(alignment: &str) -> Self {
        match alignment {
            "top" => Gravity::North,
            "top-left" => Gravity::NorthWest,
            "top-right" => Gravity::NorthEast,
            "bottom" => Gravity::South,
            "bottom-left" => Gravity::SouthWest,
            "bottom-right" => Gravity::SouthEast,
            "left" => Gravity::West,
            "right" => Gravity::East,
            _ => Gravity::Center,
        }
    }

    /// Top-left offset for an overlay of `overlay` size on a `base` canvas.
    pub fn offset(&self, base: (u32, u32), overlay: (u32, u32)) -> Position {
        let (bw, bh) = (base.0 as i32, base.1 as i32);
        let (ow, oh) = (overlay.0 as i32, overlay.1 as i32);
        let center_x = (bw - ow) / 2;
        let center_y = (bh - oh) / 2;
        match self {
            Gravity::North => Position::new(center_x, 0),
            Gravity::NorthWest => Position::new(0, 0),
            Gravity::NorthEast => Position::new(bw - ow, 0),
            Gravity::South => Position::new(center_x, bh - oh),
            Gravity::SouthWest => Position::new(0, bh - oh),
            Gravity::SouthEast => Position::new(bw - ow, bh - oh),
            Gravity::West => Position::new(0, center_y),
            Gravity::East => Position::new(bw - ow, center_y),
            Gravity::Center => Position::new(center_x, center_y),
        }
    }
}

/// Text to draw together with its typographic settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStyle {
    pub text: String,
    /// Font family name; the bitmap backend has a single face and ignores it.
    pub font: Option<String>,
    /// Glyph height in pixels.
    pub size: Option<u32>,
    /// 700 and above renders bold.
    pub weight: Option<u32>,
    pub alignment: Alignment,
}

/// Background box drawn behind text.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextBorder {
    pub brush: Brush,
    pub radius: Option<u32>,
    pub padding: u32,
}
