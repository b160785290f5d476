//! Records consumed by the finishing engine.
//!
//! Storage is owned by the caller; these types only describe the shape the
//! engine reads (display, frame, item) and the plugin-backed records it edits
//! (finishings and frame contexts).

use crate::core::error::RecordId;
use crate::core::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opaque, plugin-owned configuration of a record.
pub type PluginConfig = IndexMap<String, Value>;

/// Name of the buffer every render starts with.
pub const DEFAULT_IMAGE_NAME: &str = "default";

/// Instance name used when a record does not ask for a specific one.
pub const DEFAULT_INSTANCE: &str = "__default__";

/// Common surface of records whose behavior is provided by a plugin.
pub trait PluginModel: Clone + Serialize + Send + Sync + 'static {
    /// Type name used in error messages.
    const MODEL_TYPE: &'static str;

    /// Record identity.
    fn id(&self) -> RecordId;

    /// Key of the plugin implementing this record.
    fn plugin(&self) -> &str;

    /// Stamp the plugin key.
    fn set_plugin(&mut self, plugin: &str);

    /// Position among siblings.
    fn ordering(&self) -> i64;

    /// Set the position among siblings.
    fn set_ordering(&mut self, ordering: i64);

    /// Attach the record to a frame.
    fn set_frame(&mut self, frame: RecordId);

    /// Own enabled flag (ancestors not considered).
    fn enabled(&self) -> bool;

    /// Human readable title.
    fn title(&self) -> &str;

    /// Plugin-owned configuration.
    fn plugin_config(&self) -> &PluginConfig;

    /// Mutable plugin-owned configuration.
    fn plugin_config_mut(&mut self) -> &mut PluginConfig;

    /// Fields exposed to expression evaluation: the record's own attributes
    /// followed by every plugin configuration entry.
    fn fields(&self) -> IndexMap<String, Value>;

    /// Implementation instance this record runs on.
    fn instance_name(&self) -> String {
        self.plugin_config()
            .get("instance")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_INSTANCE.to_string())
    }
}

/// One configured image operation of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finishing {
    pub id: RecordId,
    #[serde(default)]
    pub frame: Option<RecordId>,
    #[serde(default)]
    pub title: String,
    pub plugin: String,
    #[serde(default)]
    pub plugin_config: PluginConfig,
    /// Space or comma separated input buffer names.
    #[serde(default)]
    pub image_in: Option<String>,
    /// Space or comma separated output buffer names.
    #[serde(default)]
    pub image_out: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub ordering: i64,
}

fn enabled_default() -> bool {
    true
}

impl Finishing {
    /// Create an enabled finishing for a plugin with empty configuration.
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            frame: None,
            title: String::new(),
            plugin: plugin.into(),
            plugin_config: PluginConfig::new(),
            image_in: None,
            image_out: None,
            enabled: true,
            ordering: 0,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set a configuration entry.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.plugin_config.insert(key.into(), value.into());
        self
    }

    /// Set input buffer names.
    pub fn with_image_in(mut self, names: impl Into<String>) -> Self {
        self.image_in = Some(names.into());
        self
    }

    /// Set output buffer names.
    pub fn with_image_out(mut self, names: impl Into<String>) -> Self {
        self.image_out = Some(names.into());
        self
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Input buffer names, defaulting to the default buffer.
    pub fn image_names_in(&self) -> Vec<String> {
        split_names(self.image_in.as_deref())
    }

    /// Output buffer names, defaulting to the default buffer.
    pub fn image_names_out(&self) -> Vec<String> {
        split_names(self.image_out.as_deref())
    }
}

/// Split a buffer name list on spaces and commas.
///
/// An absent or blank list means the default buffer.
pub fn split_names(names: Option<&str>) -> Vec<String> {
    let split: Vec<String> = names
        .unwrap_or_default()
        .split([' ', ','])
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if split.is_empty() {
        vec![DEFAULT_IMAGE_NAME.to_string()]
    } else {
        split
    }
}

impl PluginModel for Finishing {
    const MODEL_TYPE: &'static str = "Finishing";

    fn id(&self) -> RecordId {
        self.id
    }

    fn plugin(&self) -> &str {
        &self.plugin
    }

    fn set_plugin(&mut self, plugin: &str) {
        self.plugin = plugin.to_string();
    }

    fn ordering(&self) -> i64 {
        self.ordering
    }

    fn set_ordering(&mut self, ordering: i64) {
        self.ordering = ordering;
    }

    fn set_frame(&mut self, frame: RecordId) {
        self.frame = Some(frame);
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn plugin_config(&self) -> &PluginConfig {
        &self.plugin_config
    }

    fn plugin_config_mut(&mut self) -> &mut PluginConfig {
        &mut self.plugin_config
    }

    fn fields(&self) -> IndexMap<String, Value> {
        let mut fields = IndexMap::new();
        fields.insert("title".to_string(), Value::from(self.title.clone()));
        fields.insert("plugin".to_string(), Value::from(self.plugin.clone()));
        fields.insert("image_in".to_string(), Value::from(self.image_in.clone()));
        fields.insert("image_out".to_string(), Value::from(self.image_out.clone()));
        fields.insert("enabled".to_string(), Value::Bool(self.enabled));
        fields.insert("ordering".to_string(), Value::Int(self.ordering));
        for (key, value) in &self.plugin_config {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

/// A context plugin attached to a frame, contributing resolvers to renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameContext {
    pub id: RecordId,
    #[serde(default)]
    pub frame: Option<RecordId>,
    /// Name the contributed resolver is registered under (plugin dependent).
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub plugin: String,
    #[serde(default)]
    pub plugin_config: PluginConfig,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub ordering: i64,
}

impl FrameContext {
    /// Create an enabled context record for a plugin.
    pub fn new(plugin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            frame: None,
            name: name.into(),
            title: String::new(),
            plugin: plugin.into(),
            plugin_config: PluginConfig::new(),
            enabled: true,
            ordering: 0,
        }
    }

    /// Set a configuration entry.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.plugin_config.insert(key.into(), value.into());
        self
    }
}

impl PluginModel for FrameContext {
    const MODEL_TYPE: &'static str = "FrameContext";

    fn id(&self) -> RecordId {
        self.id
    }

    fn plugin(&self) -> &str {
        &self.plugin
    }

    fn set_plugin(&mut self, plugin: &str) {
        self.plugin = plugin.to_string();
    }

    fn ordering(&self) -> i64 {
        self.ordering
    }

    fn set_ordering(&mut self, ordering: i64) {
        self.ordering = ordering;
    }

    fn set_frame(&mut self, frame: RecordId) {
        self.frame = Some(frame);
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn plugin_config(&self) -> &PluginConfig {
        &self.plugin_config
    }

    fn plugin_config_mut(&mut self) -> &mut PluginConfig {
        &mut self.plugin_config
    }

    fn fields(&self) -> IndexMap<String, Value> {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), Value::from(self.name.clone()));
        fields.insert("title".to_string(), Value::from(self.title.clone()));
        fields.insert("enabled".to_string(), Value::Bool(self.enabled));
        for (key, value) in &self.plugin_config {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

/// Output device a render is produced for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Display {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub device_width: u32,
    pub device_height: u32,
}

impl Display {
    /// Create an enabled display of the given size.
    pub fn new(name: impl Into<String>, device_width: u32, device_height: u32) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            device_width,
            device_height,
        }
    }
}

/// Frame owning the finishing and context configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
}

impl Frame {
    /// Create an enabled frame.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            description: String::new(),
            enabled: true,
        }
    }
}

/// Item selected for display; `url` points at the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: RecordId,
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub mime: Option<String>,
    /// Further item attributes (date, location, ...), exposed to templates.
    #[serde(default, flatten)]
    pub meta: IndexMap<String, Value>,
}

impl Item {
    /// Create an item for a URL or local path.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            url: Some(url.into()),
            width: None,
            height: None,
            mime: None,
            meta: IndexMap::new(),
        }
    }

    /// Whether the item has a usable source location.
    pub fn has_url(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}
