//! Named lookup sources consulted by the expression context.
//!
//! A resolver never fails: a missing key resolves to [`Value::Null`].

use crate::core::value::Value;
use crate::expression::context::{Context, ContextInner};
use indexmap::IndexMap;
use log::warn;
use serde::Serialize;
use std::rc::{Rc, Weak};

/// Lookup source for template variables.
pub trait Resolver {
    /// Resolve a key, yielding null when absent.
    fn resolve(&self, key: &str) -> Value;

    /// Known keys, if the source can enumerate them.
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Reference-counted resolver as stored by the context.
pub type SharedResolver = Rc<dyn Resolver>;

/// Resolver over a fixed map of values.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    map: IndexMap<String, Value>,
}

impl MapResolver {
    pub fn new(map: IndexMap<String, Value>) -> Self {
        Self { map }
    }

    /// Build from a map value; anything else yields an empty resolver.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Map(map) => Self::new(map.clone()),
            _ => Self::default(),
        }
    }
}

impl Resolver for MapResolver {
    fn resolve(&self, key: &str) -> Value {
        self.map.get(key).cloned().unwrap_or_default()
    }

    fn keys(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }
}

/// Resolver over the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentResolver;

impl Resolver for EnvironmentResolver {
    fn resolve(&self, key: &str) -> Value {
        std::env::var(key).map(Value::Str).unwrap_or_default()
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars().map(|(k, _)| k).collect()
    }
}

/// Resolver over the serialized attributes of a record.
#[derive(Debug, Clone, Default)]
pub struct ObjectResolver {
    fields: IndexMap<String, Value>,
}

impl ObjectResolver {
    /// Snapshot the attributes of `object`.
    pub fn new<T: Serialize>(object: &T) -> Self {
        match serde_json::to_value(object) {
            Ok(serde_json::Value::Object(map)) => Self {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            },
            Ok(_) => Self::default(),
            Err(e) => {
                warn!("Can not expose object to templates: {}", e);
                Self::default()
            }
        }
    }
}

impl Resolver for ObjectResolver {
    fn resolve(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or_default()
    }

    fn keys(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

/// Ordered set of named resolvers; the first non-null answer wins.
#[derive(Clone, Default)]
pub struct ChainedResolver {
    resolvers: IndexMap<String, SharedResolver>,
}

impl ChainedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a named resolver. Replacing keeps the original
    /// registration position.
    pub fn set_resolver(&mut self, name: impl Into<String>, resolver: SharedResolver) {
        self.resolvers.insert(name.into(), resolver);
    }

    /// Look up a resolver by name.
    pub fn get(&self, name: &str) -> Option<&SharedResolver> {
        self.resolvers.get(name)
    }

    /// Remove a resolver.
    pub fn remove(&mut self, name: &str) -> Option<SharedResolver> {
        self.resolvers.shift_remove(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }
}

impl Resolver for ChainedResolver {
    fn resolve(&self, key: &str) -> Value {
        self.resolvers
            .values()
            .map(|resolver| resolver.resolve(key))
            .find(|value| !value.is_null())
            .unwrap_or_default()
    }

    fn keys(&self) -> Vec<String> {
        self.resolvers.keys().cloned().collect()
    }
}

/// Resolver whose string values are themselves templates, rendered through
/// the owning context on every lookup.
pub struct EvaluatedResolver {
    context: Weak<ContextInner>,
    inner: SharedResolver,
}

impl EvaluatedResolver {
    pub fn new(context: &Context, inner: impl Resolver + 'static) -> Self {
        Self {
            context: context.downgrade(),
            inner: Rc::new(inner),
        }
    }
}

impl Resolver for EvaluatedResolver {
    fn resolve(&self, key: &str) -> Value {
        let template = match self.inner.resolve(key) {
            Value::Str(template) => template,
            other => return other,
        };
        let Some(context) = Context::upgrade(&self.context) else {
            return Value::Str(template);
        };
        match context.evaluate(&template) {
            Ok(rendered) => Value::Str(rendered),
            Err(e) => {
                warn!("Variable '{}' could not be evaluated: {}", key, e);
                Value::Str(template)
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}
