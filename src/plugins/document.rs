//! Export document exchanged by `export_config` and `import_config`.
//!
//! ```json
//! {"version": "1.0.0", "name": "finishing", "title": "Living room", "date": "...",
//!  "data": [{"title": "Logo", "plugin": "group", "plugin_config": {},
//!            "children": [{"plugin": "text", "plugin_config": {"text": "hi"}}]}]}
//! ```
//!
//! Record identity, frame and ordering are not exported: a node is addressed
//! by its position in the document.

use crate::core::error::{PluginError, PluginResult};
use crate::core::model::{PluginConfig, PluginModel};
use crate::core::value::Value;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use semver::Version;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Format version written into exported documents.
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Record attributes managed by the engine rather than the document.
const MANAGED_KEYS: [&str; 5] = ["id", "frame", "ordering", "plugin", "plugin_config"];

/// A serialized plugin configuration of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    /// Category key
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub data: Vec<ExportNode>,
}

/// One exported record. Tree categories carry their children inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    /// Plain record attributes (title, enabled, image_in, ...)
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
    pub plugin: String,
    #[serde(default)]
    pub plugin_config: PluginConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ExportNode>>,
}

impl ExportDocument {
    /// Create a document stamped with the current format version and time.
    pub fn new(name: impl Into<String>, title: impl Into<String>, data: Vec<ExportNode>) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            name: name.into(),
            title: title.into(),
            date: Utc::now(),
            data,
        }
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reject documents written by an incompatible major version.
    pub fn check_version(&self) -> PluginResult<()> {
        let incompatible = || PluginError::IncompatibleVersion {
            expected: DOCUMENT_VERSION.to_string(),
            found: self.version.clone(),
        };
        let expected = Version::parse(DOCUMENT_VERSION).map_err(|_| incompatible())?;
        let found = Version::parse(&self.version).map_err(|_| incompatible())?;
        if expected.major == found.major {
            Ok(())
        } else {
            Err(incompatible())
        }
    }

    /// Every node in preorder with its path.
    pub fn paths(&self) -> Vec<(String, &ExportNode)> {
        let mut out = Vec::new();
        collect_paths(&self.data, "", &mut out);
        out
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.paths().len()
    }
}

fn collect_paths<'a>(nodes: &'a [ExportNode], prefix: &str, out: &mut Vec<(String, &'a ExportNode)>) {
    for (index, node) in nodes.iter().enumerate() {
        let path = child_path(prefix, index);
        out.push((path.clone(), node));
        if let Some(children) = &node.children {
            collect_paths(children, &path, out);
        }
    }
}

/// Path of the `index`-th child below `parent` (`""` is the root).
pub fn child_path(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        index.to_string()
    } else {
        format!("{}.{}", parent, index)
    }
}

/// Split a path into its parent path and sibling index.
pub fn split_path(path: &str) -> Option<(&str, usize)> {
    let (parent, index) = match path.rsplit_once('.') {
        Some((parent, index)) => (parent, index),
        None => ("", path),
    };
    index.parse().ok().map(|index| (parent, index))
}

fn serialization_error(error: serde_json::Error) -> PluginError {
    PluginError::InvalidConfig {
        field: "record".to_string(),
        reason: error.to_string(),
    }
}

impl ExportNode {
    /// Create a node for a plugin with empty configuration.
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            fields: IndexMap::new(),
            plugin: plugin.into(),
            plugin_config: PluginConfig::new(),
            children: None,
        }
    }

    /// Set a configuration entry.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.plugin_config.insert(key.into(), value.into());
        self
    }

    /// Set a record attribute.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Append a child node.
    pub fn with_child(mut self, child: ExportNode) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    /// Export a record.
    pub fn from_model<M: PluginModel>(model: &M, children: Option<Vec<ExportNode>>) -> PluginResult<Self> {
        let json = serde_json::to_value(model).map_err(serialization_error)?;
        let fields = match Value::from(json) {
            Value::Map(mut map) => {
                for key in MANAGED_KEYS {
                    map.shift_remove(key);
                }
                map
            }
            _ => IndexMap::new(),
        };
        Ok(Self {
            fields,
            plugin: model.plugin().to_string(),
            plugin_config: model.plugin_config().clone(),
            children,
        })
    }

    /// Copy of `model` carrying this node's attributes, plugin and
    /// configuration. Identity, frame and ordering are kept. Node attributes
    /// the record type does not know are treated as configuration entries.
    pub fn apply_to<M: PluginModel + DeserializeOwned>(&self, model: &M) -> PluginResult<M> {
        let mut json = serde_json::to_value(model).map_err(serialization_error)?;
        if let Some(object) = json.as_object_mut() {
            let config = self.effective_config(|key| object.contains_key(key));
            for (key, value) in &self.fields {
                if !MANAGED_KEYS.contains(&key.as_str()) && object.contains_key(key) {
                    object.insert(key.clone(), value.to_json());
                }
            }
            object.insert("plugin".to_string(), serde_json::Value::String(self.plugin.clone()));
            object.insert("plugin_config".to_string(), Value::Map(config).to_json());
        }
        serde_json::from_value(json).map_err(serialization_error)
    }

    /// Whether applying this node would change `model`.
    pub fn differs_from<M: PluginModel>(&self, model: &M) -> PluginResult<bool> {
        let current = Self::from_model(model, None)?;
        let fields_differ = self
            .fields
            .iter()
            .filter(|(key, _)| current.fields.contains_key(key.as_str()))
            .any(|(key, value)| &current.fields[key.as_str()] != value);
        let config = self.effective_config(|key| current.fields.contains_key(key));
        Ok(fields_differ || current.plugin != self.plugin || current.plugin_config != config)
    }

    /// Configuration plus stray attributes `is_field` does not claim.
    /// Explicit configuration entries win.
    fn effective_config(&self, is_field: impl Fn(&str) -> bool) -> PluginConfig {
        let mut config = self.plugin_config.clone();
        for (key, value) in &self.fields {
            if !MANAGED_KEYS.contains(&key.as_str()) && !is_field(key) && !config.contains_key(key) {
                config.insert(key.clone(), value.clone());
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Finishing;

    fn document() -> ExportDocument {
        ExportDocument::new(
            "finishing",
            "Test",
            vec![
                ExportNode::new("group")
                    .with_field("title", "Frame")
                    .with_child(ExportNode::new("text").with_config("text", "hi"))
                    .with_child(ExportNode::new("resize")),
                ExportNode::new("transform"),
            ],
        )
    }

    #[test]
    fn test_paths_preorder() {
        let paths: Vec<String> = document().paths().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["0", "0.0", "0.1", "1"]);
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("3"), Some(("", 3)));
        assert_eq!(split_path("0.1.2"), Some(("0.1", 2)));
        assert_eq!(split_path("a"), None);
        assert_eq!(child_path("", 4), "4");
        assert_eq!(child_path("0.1", 4), "0.1.4");
    }

    #[test]
    fn test_json_shape() {
        let json = document().to_json().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(raw["version"], "1.0.0");
        assert_eq!(raw["data"][0]["title"], "Frame");
        assert_eq!(raw["data"][0]["children"][0]["plugin_config"]["text"], "hi");
        assert!(raw["data"][1].get("children").is_none());

        let parsed = ExportDocument::from_json(&json).unwrap();
        assert_eq!(parsed, document_with_date(parsed.date));
    }

    fn document_with_date(date: DateTime<Utc>) -> ExportDocument {
        let mut doc = document();
        doc.date = date;
        doc
    }

    #[test]
    fn test_version_check() {
        let mut doc = document();
        assert!(doc.check_version().is_ok());
        doc.version = "1.4.2".to_string();
        assert!(doc.check_version().is_ok());
        doc.version = "2.0.0".to_string();
        assert!(matches!(doc.check_version(), Err(PluginError::IncompatibleVersion { .. })));
        doc.version = "garbage".to_string();
        assert!(doc.check_version().is_err());
    }

    #[test]
    fn test_model_round_trip() {
        let model = Finishing::new("text")
            .with_title("Caption")
            .with_image_out("caption")
            .with_config("text", "{item[\"title\"]}");
        let node = ExportNode::from_model(&model, None).unwrap();
        assert!(!node.fields.contains_key("id"));
        assert!(!node.fields.contains_key("ordering"));
        assert_eq!(node.fields["title"], Value::from("Caption"));
        assert!(!node.differs_from(&model).unwrap());

        let fresh = Finishing::new("group");
        assert!(node.differs_from(&fresh).unwrap());
        let applied = node.apply_to(&fresh).unwrap();
        assert_eq!(applied.id, fresh.id);
        assert_eq!(applied.plugin, "text");
        assert_eq!(applied.title, "Caption");
        assert_eq!(applied.image_out.as_deref(), Some("caption"));
        assert!(!node.differs_from(&applied).unwrap());
    }

    #[test]
    fn test_stray_attributes_become_config() {
        let node = ExportNode::new("text").with_field("text", "hi");
        let applied = node.apply_to(&Finishing::new("group")).unwrap();
        assert_eq!(applied.plugin_config["text"], Value::from("hi"));
        assert!(!node.differs_from(&applied).unwrap());

        let explicit = node.clone().with_config("text", "bye");
        assert_eq!(
            explicit.apply_to(&applied).unwrap().plugin_config["text"],
            Value::from("bye")
        );
    }
}
