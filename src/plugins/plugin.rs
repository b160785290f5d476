//! Plugin descriptors.
//!
//! A [`Plugin`] pairs static metadata (key, title, description, form fields)
//! with a factory for its implementation object. Implementations are created
//! lazily, one per instance name, and cached for the life of the descriptor:
//! two steps configured with the same `instance` share one implementation and
//! therefore any state it keeps between runs (e.g. a session cookie).
//!
//! The cache is process-wide shared mutable state. Access is serialized by a
//! mutex per descriptor, but two concurrent renders that use the same
//! instance name still observe each other's state changes between calls.

use crate::core::error::{PluginError, PluginResult, RecordId};
use crate::core::model::{PluginConfig, PluginModel};
use crate::plugins::form::{FieldDefinition, Form};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Optional hooks around a render, called once per render for every
/// implementation instance it uses.
pub trait Lifecycle {
    /// Called before the first step of a render.
    fn enter(&mut self) {}

    /// Called after the last step of a render, also when it failed.
    fn leave(&mut self) {}
}

/// A plugin category: the record type it manages and the implementation
/// interface its plugins provide.
pub trait Category: 'static {
    /// Category key (`"finishing"`, `"context"`).
    const KEY: &'static str;

    /// Whether records of this category form a tree.
    const TREE: bool;

    /// Record type.
    type Model: PluginModel + DeserializeOwned;

    /// Implementation interface.
    type Implementation: ?Sized + Lifecycle + Send;

    /// Fresh, unsaved record for a plugin.
    fn new_model(plugin: &str) -> Self::Model;

    /// Plugins shipped with the crate.
    fn builtins() -> Vec<Plugin<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Factory creating implementation objects.
pub type ImplementationFactory<C> = Arc<dyn Fn() -> Box<<C as Category>::Implementation> + Send + Sync>;

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Registry key stored in records' `plugin` attribute
    pub name: String,
    pub title: String,
    pub description: String,
    /// Configuration form
    pub fields: Vec<FieldDefinition>,
}

impl PluginMetadata {
    /// Create metadata without fields.
    pub fn new(name: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    /// Add a form field.
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Add several form fields.
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDefinition>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Find a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Attributes of the owning record stamped onto saved models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseValues {
    /// Frame the record belongs to
    pub frame: Option<RecordId>,
}

/// Persistence hook used by [`Plugin::save_model`] when committing.
pub trait ModelStore<M> {
    /// Insert or update a record.
    fn save(&mut self, model: &M) -> PluginResult<()>;
}

impl<M: PluginModel> ModelStore<M> for Vec<M> {
    fn save(&mut self, model: &M) -> PluginResult<()> {
        match self.iter_mut().find(|m| m.id() == model.id()) {
            Some(existing) => *existing = model.clone(),
            None => self.push(model.clone()),
        }
        Ok(())
    }
}

/// A registered plugin of category `C`.
pub struct Plugin<C: Category> {
    metadata: PluginMetadata,
    factory: ImplementationFactory<C>,
    instances: Mutex<HashMap<String, Box<C::Implementation>>>,
}

impl<C: Category> Plugin<C> {
    /// Create a descriptor.
    pub fn new<F>(metadata: PluginMetadata, factory: F) -> Self
    where
        F: Fn() -> Box<C::Implementation> + Send + Sync + 'static,
    {
        Self {
            metadata,
            factory: Arc::new(factory),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Registry key.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    /// Full metadata.
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Category key.
    pub fn category(&self) -> &'static str {
        C::KEY
    }

    /// New unsaved record for this plugin, configured with the form defaults.
    pub fn create_model(&self) -> C::Model {
        let mut model = C::new_model(&self.metadata.name);
        let config = model.plugin_config_mut();
        for field in &self.metadata.fields {
            if !field.default.is_null() {
                config.insert(field.name.clone(), field.default.clone());
            }
        }
        model
    }

    /// Stamp the plugin key, ordering and base values on a record and merge
    /// `defaults` into its configuration (existing entries win). With a
    /// store the record is persisted.
    pub fn save_model(
        &self,
        mut model: C::Model,
        ordering: Option<i64>,
        defaults: &PluginConfig,
        commit: Option<&mut dyn ModelStore<C::Model>>,
        base_values: BaseValues,
    ) -> PluginResult<C::Model> {
        model.set_plugin(&self.metadata.name);
        if let Some(ordering) = ordering {
            model.set_ordering(ordering);
        }
        if let Some(frame) = base_values.frame {
            model.set_frame(frame);
        }
        let config = model.plugin_config_mut();
        for (key, value) in defaults {
            if !config.contains_key(key) {
                config.insert(key.clone(), value.clone());
            }
        }
        if let Some(store) = commit {
            store.save(&model)?;
        }
        Ok(model)
    }

    /// Form bound to a fresh record.
    pub fn get_create_form(&self) -> Form<C::Model> {
        Form::bind(&self.metadata.fields, self.create_model())
    }

    /// Form bound to an existing record. The record must belong to this plugin.
    pub fn get_update_form(&self, model: C::Model) -> PluginResult<Form<C::Model>> {
        if model.plugin() != self.metadata.name {
            return Err(PluginError::InvalidConfig {
                field: "plugin".to_string(),
                reason: format!("record belongs to '{}', not '{}'", model.plugin(), self.metadata.name),
            });
        }
        Ok(Form::bind(&self.metadata.fields, model))
    }

    /// Run `f` on the implementation cached under `instance`, creating it on
    /// first use.
    pub fn with_instance<R>(&self, instance: &str, f: impl FnOnce(&mut C::Implementation) -> R) -> R {
        let mut instances = self.instances.lock();
        let implementation = instances
            .entry(instance.to_string())
            .or_insert_with(|| (self.factory)());
        f(implementation.as_mut())
    }

    /// Call the enter hook of an instance.
    pub fn enter(&self, instance: &str) {
        self.with_instance(instance, |implementation| implementation.enter());
    }

    /// Call the leave hook of an instance.
    pub fn leave(&self, instance: &str) {
        self.with_instance(instance, |implementation| implementation.leave());
    }

    /// Names of the instances created so far.
    pub fn instance_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<C: Category> fmt::Debug for Plugin<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("category", &C::KEY)
            .field("name", &self.metadata.name)
            .field("title", &self.metadata.title)
            .field("instances", &self.instance_names())
            .finish()
    }
}
