//! Plugin registry for one category.
//!
//! Besides lookup, the registry pairs stored records with their plugins and
//! moves whole configurations in and out as [`ExportDocument`]s. Importing
//! reconciles a document against live records by position: paths only in
//! the document are created, paths in both are updated when they differ and
//! paths only among the live records are deleted together with everything
//! below them.

use crate::core::error::{FramaramaResult, PluginError, ReconcileError, RecordId, TreeError};
use crate::core::model::{PluginConfig, PluginModel};
use crate::plugins::document::{split_path, ExportDocument, ExportNode};
use crate::plugins::plugin::{BaseValues, Category, Plugin};
use crate::tree::ModelTree;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::HashSet;

/// Records handed to the registry: a flat list or a tree.
#[derive(Debug)]
pub enum Records<'a, M: PluginModel> {
    /// Records without a hierarchy, ordered by `ordering`.
    Flat(&'a [M]),
    /// Records of a tree, in tree order.
    Tree(&'a ModelTree<M>),
}

impl<M: PluginModel> Clone for Records<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: PluginModel> Copy for Records<'_, M> {}

impl<'a, M: PluginModel> From<&'a [M]> for Records<'a, M> {
    fn from(records: &'a [M]) -> Self {
        Records::Flat(records)
    }
}

impl<'a, M: PluginModel> From<&'a Vec<M>> for Records<'a, M> {
    fn from(records: &'a Vec<M>) -> Self {
        Records::Flat(records.as_slice())
    }
}

impl<'a, M: PluginModel> From<&'a ModelTree<M>> for Records<'a, M> {
    fn from(tree: &'a ModelTree<M>) -> Self {
        Records::Tree(tree)
    }
}

/// Which records an export includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Every record; disabled ones keep their flag
    #[default]
    All,
    /// Only effectively enabled records (preview of what renders)
    Enabled,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    /// Records removed, descendants included
    pub deleted: usize,
}

impl ImportReport {
    /// Whether the import changed nothing.
    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Live record storage an import reconciles against.
///
/// Paths are dot-separated sibling indices in preorder; the empty path is
/// the parent of top-level records.
pub trait ReconcileTarget<M: PluginModel>: Clone {
    /// Every record's path in preorder.
    fn paths(&self) -> Vec<(String, RecordId)>;

    /// Record by identity.
    fn record(&self, id: RecordId) -> Option<&M>;

    /// Replace a record, keeping its position.
    fn replace(&mut self, id: RecordId, model: M) -> Result<(), ReconcileError>;

    /// Insert a record as the `index`-th child of the record at `parent`.
    fn create(&mut self, parent: &str, index: usize, model: M) -> Result<RecordId, ReconcileError>;

    /// Remove a record and everything below it, returning the number of
    /// removed records.
    fn delete(&mut self, id: RecordId) -> Result<usize, ReconcileError>;
}

impl<M: PluginModel> ReconcileTarget<M> for ModelTree<M> {
    fn paths(&self) -> Vec<(String, RecordId)> {
        ModelTree::paths(self)
    }

    fn record(&self, id: RecordId) -> Option<&M> {
        self.get(id)
    }

    fn replace(&mut self, id: RecordId, model: M) -> Result<(), ReconcileError> {
        let slot = self.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        *slot = model;
        Ok(())
    }

    fn create(&mut self, parent: &str, index: usize, model: M) -> Result<RecordId, ReconcileError> {
        let parent_id = self.node_at(parent).ok_or_else(|| ReconcileError::MissingParent {
            path: parent.to_string(),
        })?;
        Ok(self.insert(Some(parent_id), model, Some(index))?)
    }

    fn delete(&mut self, id: RecordId) -> Result<usize, ReconcileError> {
        Ok(self.remove(id)?.len())
    }
}

impl<M: PluginModel> ReconcileTarget<M> for Vec<M> {
    fn paths(&self) -> Vec<(String, RecordId)> {
        self.iter()
            .enumerate()
            .map(|(index, model)| (index.to_string(), model.id()))
            .collect()
    }

    fn record(&self, id: RecordId) -> Option<&M> {
        self.iter().find(|m| m.id() == id)
    }

    fn replace(&mut self, id: RecordId, model: M) -> Result<(), ReconcileError> {
        let slot = self
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or(TreeError::NodeNotFound(id))?;
        *slot = model;
        Ok(())
    }

    fn create(&mut self, parent: &str, index: usize, model: M) -> Result<RecordId, ReconcileError> {
        if !parent.is_empty() {
            return Err(ReconcileError::MissingParent {
                path: parent.to_string(),
            });
        }
        let id = model.id();
        self.insert(index.min(self.len()), model);
        renumber(self);
        Ok(id)
    }

    fn delete(&mut self, id: RecordId) -> Result<usize, ReconcileError> {
        let before = self.len();
        self.retain(|m| m.id() != id);
        if self.len() == before {
            return Err(TreeError::NodeNotFound(id).into());
        }
        renumber(self);
        Ok(before - self.len())
    }
}

fn renumber<M: PluginModel>(records: &mut [M]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.set_ordering(index as i64);
    }
}

/// Registry of the plugins of category `C`.
pub struct PluginRegistry<C: Category> {
    plugins: IndexMap<String, Plugin<C>>,
}

impl<C: Category> Default for PluginRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Category> PluginRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            plugins: IndexMap::new(),
        }
    }

    /// Create a registry holding the category's built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for plugin in C::builtins() {
            registry.register(plugin);
        }
        registry
    }

    /// Register a plugin, replacing one with the same name.
    pub fn register(&mut self, plugin: Plugin<C>) {
        let name = plugin.name().to_string();
        if self.plugins.insert(name.clone(), plugin).is_some() {
            debug!("Replaced {} plugin '{}'", C::KEY, name);
        }
    }

    /// Category key.
    pub fn category(&self) -> &'static str {
        C::KEY
    }

    /// Look up a plugin.
    pub fn get(&self, name: &str) -> Option<&Plugin<C>> {
        self.plugins.get(name)
    }

    /// Look up a plugin, failing when it is unknown.
    pub fn require(&self, name: &str) -> Result<&Plugin<C>, PluginError> {
        self.get(name).ok_or_else(|| PluginError::NotFound {
            name: name.to_string(),
        })
    }

    /// Check if a plugin is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered plugin names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// All registered plugins.
    pub fn iter(&self) -> impl Iterator<Item = &Plugin<C>> {
        self.plugins.values()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Pair records with their plugins. Records naming an unknown plugin
    /// are logged and dropped.
    pub fn get_all<'a>(&self, models: impl IntoIterator<Item = &'a C::Model>) -> Vec<(&Plugin<C>, &'a C::Model)> {
        models
            .into_iter()
            .filter_map(|model| match self.get(model.plugin()) {
                Some(plugin) => Some((plugin, model)),
                None => {
                    warn!(
                        "Skipping {} '{}': unknown plugin '{}'",
                        <C::Model as PluginModel>::MODEL_TYPE,
                        model.title(),
                        model.plugin()
                    );
                    None
                }
            })
            .collect()
    }

    /// Pair enabled records with their plugins, in rendering order. Flat
    /// records are filtered by their own flag and sorted by ordering; tree
    /// records are walked in preorder and a disabled node hides its subtree.
    pub fn get_enabled<'a>(&self, records: impl Into<Records<'a, C::Model>>) -> Vec<(&Plugin<C>, &'a C::Model)> {
        match records.into() {
            Records::Flat(models) => {
                let mut enabled: Vec<&C::Model> = models.iter().filter(|m| m.enabled()).collect();
                enabled.sort_by_key(|m| m.ordering());
                self.get_all(enabled)
            }
            Records::Tree(tree) => self.get_all(tree.enabled()),
        }
    }

    /// Serialize records into an export document named after the category.
    pub fn export_config<'a>(
        &self,
        title: &str,
        records: impl Into<Records<'a, C::Model>>,
        mode: ExportMode,
    ) -> FramaramaResult<ExportDocument> {
        let data = match records.into() {
            Records::Flat(models) => {
                let mut selected: Vec<&C::Model> = models
                    .iter()
                    .filter(|m| mode == ExportMode::All || m.enabled())
                    .collect();
                selected.sort_by_key(|m| m.ordering());
                selected
                    .into_iter()
                    .map(|m| ExportNode::from_model(m, None))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Records::Tree(tree) => export_children(tree, tree.root_id(), mode)?,
        };
        Ok(ExportDocument::new(C::KEY, title, data))
    }

    /// Reconcile `target` with a document.
    ///
    /// Every node's plugin is checked before anything changes, and the
    /// reconciliation runs on a copy that replaces `target` only when every
    /// step succeeded, so a failed import leaves the live records untouched.
    pub fn import_config<T: ReconcileTarget<C::Model>>(
        &self,
        document: &ExportDocument,
        target: &mut T,
        base_values: BaseValues,
    ) -> FramaramaResult<ImportReport> {
        document.check_version()?;
        let nodes = document.paths();
        let mut plugins = Vec::with_capacity(nodes.len());
        for (path, node) in &nodes {
            let plugin = self.get(&node.plugin).ok_or_else(|| PluginError::ImportUnknownPlugin {
                path: path.clone(),
                plugin: node.plugin.clone(),
            })?;
            if !C::TREE && node.children.as_ref().is_some_and(|c| !c.is_empty()) {
                return Err(ReconcileError::MissingParent { path: format!("{}.0", path) }.into());
            }
            plugins.push(plugin);
        }

        let mut live: IndexMap<String, RecordId> = IndexMap::new();
        for (path, id) in target.paths() {
            if live.insert(path.clone(), id).is_some() {
                return Err(ReconcileError::PathCollision { path }.into());
            }
        }

        let mut working = target.clone();
        let mut report = ImportReport::default();
        let no_defaults = PluginConfig::new();

        for ((path, node), plugin) in nodes.iter().zip(plugins) {
            let Some((parent, index)) = split_path(path) else {
                return Err(ReconcileError::MissingParent { path: path.clone() }.into());
            };
            match live.get(path) {
                Some(&id) => {
                    let current = working
                        .record(id)
                        .ok_or(TreeError::NodeNotFound(id))?;
                    if node.differs_from(current)? {
                        let model = node.apply_to(current)?;
                        let model = plugin.save_model(model, Some(index as i64), &no_defaults, None, base_values)?;
                        working.replace(id, model)?;
                        debug!("Import updated {} at {}", C::KEY, path);
                        report.updated += 1;
                    }
                }
                None => {
                    let model = node.apply_to(&plugin.create_model())?;
                    let model = plugin.save_model(model, Some(index as i64), &no_defaults, None, base_values)?;
                    working.create(parent, index, model)?;
                    debug!("Import created {} '{}' at {}", C::KEY, node.plugin, path);
                    report.created += 1;
                }
            }
        }

        let imported: HashSet<&str> = nodes.iter().map(|(path, _)| path.as_str()).collect();
        let mut stale: Vec<(String, RecordId)> = live
            .into_iter()
            .filter(|(path, _)| !imported.contains(path.as_str()))
            .collect();
        while !stale.is_empty() {
            let (path, id) = stale.remove(0);
            report.deleted += working.delete(id)?;
            debug!("Import deleted {} at {}", C::KEY, path);
            let prefix = format!("{}.", path);
            stale.retain(|(other, _)| !other.starts_with(&prefix));
        }

        *target = working;
        info!(
            "Imported {} '{}': {} created, {} updated, {} deleted",
            C::KEY,
            document.title,
            report.created,
            report.updated,
            report.deleted
        );
        Ok(report)
    }
}

fn export_children<M: PluginModel>(
    tree: &ModelTree<M>,
    parent: RecordId,
    mode: ExportMode,
) -> FramaramaResult<Vec<ExportNode>> {
    let mut nodes = Vec::new();
    for &child in tree.children(parent)? {
        let Some(model) = tree.get(child) else {
            continue;
        };
        if mode == ExportMode::Enabled && !model.enabled() {
            continue;
        }
        let children = export_children(tree, child, mode)?;
        nodes.push(ExportNode::from_model(model, Some(children))?);
    }
    Ok(nodes)
}

impl<C: Category> std::fmt::Debug for PluginRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("category", &C::KEY)
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}
