//! Settings file used by the command line tool.
//!
//! ```toml
//! [render]
//! watermark = "hbars"
//! watermark_shift = 10.0
//! preview_size = [640, 480]
//!
//! [variables]
//! owner = "Jane"
//! ```

use crate::core::error::{FramaramaError, FramaramaResult};
use crate::core::model::FrameContext;
use crate::core::value::Value;
use crate::execution::RenderOptions;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Render options plus system wide variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Options of every render.
    pub render: RenderOptions,
    /// Exposed to templates as `globals`.
    pub variables: IndexMap<String, Value>,
}

impl Settings {
    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> FramaramaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml(&text)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> FramaramaResult<Self> {
        toml::from_str(text).map_err(|e| FramaramaError::Settings(e.to_string()))
    }

    /// Serialize to TOML text.
    pub fn to_toml(&self) -> FramaramaResult<String> {
        toml::to_string_pretty(self).map_err(|e| FramaramaError::Settings(e.to_string()))
    }

    /// Context record providing the variables as `globals`, if any are set.
    pub fn globals_context(&self) -> Option<FrameContext> {
        if self.variables.is_empty() {
            return None;
        }
        Some(FrameContext::new("globals", "globals").with_config("variables", Value::Map(self.variables.clone())))
    }
}
