//! Sandboxed evaluation of templates against named resolvers.
//!
//! Every registered resolver is visible as a top-level name inside template
//! expressions (`image["width"]`, `frame["name"]`). A bare name that is not a
//! resolver is looked up across all resolvers in registration order, and a
//! name nobody knows evaluates to unit, which renders as an empty string.
//!
//! Expressions run on a rhai engine restricted to single expressions (no
//! statements, no `eval`) with operation, depth and size limits, and two
//! helpers on top of the standard operators: `split(text, separator)` and
//! `keys(map)`.
//!
//! Arithmetic follows the null-safe rules of [`Value`]: unit on one side of
//! `+ - * /` yields the other operand, and `/` always divides as floats
//! (`{7 / 2}` renders `3.5`). String literals may use single quotes
//! (`image['width']`); there are no character literals.

use crate::core::error::{EvalError, EvalResult};
use crate::core::model::PluginModel;
use crate::core::value::Value;
use crate::expression::resolver::{ChainedResolver, Resolver, SharedResolver};
use crate::expression::template::{Segment, Template};
use indexmap::IndexMap;
use log::{trace, warn};
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, AST, FLOAT, INT};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Index;
use std::rc::{Rc, Weak};

/// Nesting depth at which evaluated resolvers stop rendering their values.
const MAX_NESTED_EVALUATIONS: usize = 8;

/// Resource limits applied to every expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Maximum number of engine operations per expression.
    pub max_operations: u64,
    /// Maximum function call nesting.
    pub max_call_levels: usize,
    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,
    /// Maximum string length in bytes.
    pub max_string_size: usize,
    /// Maximum array length.
    pub max_array_size: usize,
    /// Maximum map size.
    pub max_map_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_call_levels: 16,
            max_expr_depth: 32,
            max_string_size: 64 * 1024,
            max_array_size: 10_000,
            max_map_size: 1_000,
        }
    }
}

/// Resolver seen from inside an expression. Indexing it resolves a key.
#[derive(Clone)]
struct ResolverHandle(SharedResolver);

impl ResolverHandle {
    fn index(&mut self, key: ImmutableString) -> Dynamic {
        to_dynamic(&self.0.resolve(key.as_str()))
    }

    fn keys(&mut self) -> Array {
        self.0.keys().into_iter().map(Dynamic::from).collect()
    }
}

pub(crate) struct ContextInner {
    engine: Engine,
    resolvers: Rc<RefCell<ChainedResolver>>,
    compiled: RefCell<HashMap<String, Rc<AST>>>,
    nesting: Cell<usize>,
}

/// Expression evaluation context.
///
/// Cloning is cheap and yields a handle to the same resolvers.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    /// Create a context with default sandbox limits.
    pub fn new() -> Self {
        Self::with_limits(SandboxLimits::default())
    }

    /// Create a context with explicit sandbox limits.
    pub fn with_limits(limits: SandboxLimits) -> Self {
        let resolvers = Rc::new(RefCell::new(ChainedResolver::new()));
        let engine = build_engine(Rc::clone(&resolvers), &limits);
        Self {
            inner: Rc::new(ContextInner {
                engine,
                resolvers,
                compiled: RefCell::new(HashMap::new()),
                nesting: Cell::new(0),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<ContextInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    /// Register or replace a named resolver.
    pub fn set_resolver(&self, name: impl Into<String>, resolver: impl Resolver + 'static) {
        self.set_shared_resolver(name, Rc::new(resolver));
    }

    /// Register or replace a named resolver that is already shared.
    pub fn set_shared_resolver(&self, name: impl Into<String>, resolver: SharedResolver) {
        self.inner.resolvers.borrow_mut().set_resolver(name, resolver);
    }

    /// Look up a registered resolver.
    pub fn resolver(&self, name: &str) -> Option<SharedResolver> {
        self.inner.resolvers.borrow().get(name).cloned()
    }

    /// Remove a registered resolver.
    pub fn remove_resolver(&self, name: &str) -> Option<SharedResolver> {
        self.inner.resolvers.borrow_mut().remove(name)
    }

    /// Names of the registered resolvers in registration order.
    pub fn resolver_names(&self) -> Vec<String> {
        self.inner.resolvers.borrow().keys()
    }

    /// Chained lookup across all resolvers.
    pub fn resolve(&self, key: &str) -> Value {
        self.inner.resolvers.borrow().resolve(key)
    }

    /// Render a template string.
    pub fn evaluate(&self, template: &str) -> EvalResult<String> {
        let parsed = Template::parse(template)?;
        if parsed.is_literal() {
            return Ok(parsed
                .segments()
                .iter()
                .map(|s| match s {
                    Segment::Literal(text) => text.as_str(),
                    Segment::Expr { .. } => "",
                })
                .collect());
        }

        let depth = self.inner.nesting.get();
        if depth >= MAX_NESTED_EVALUATIONS {
            warn!("Nested evaluation too deep, leaving '{}' unrendered", template);
            return Ok(template.to_string());
        }
        self.inner.nesting.set(depth + 1);
        let rendered = self.render(&parsed);
        self.inner.nesting.set(depth);
        rendered
    }

    fn render(&self, template: &Template) -> EvalResult<String> {
        let mut out = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expr { source, .. } => {
                    let value = self.eval_expression(source)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }

    /// Evaluate a single expression (without surrounding braces).
    pub fn eval_expression(&self, source: &str) -> EvalResult<Value> {
        let ast = self.compile(source)?;
        trace!("Evaluating '{}'", source);
        self.inner
            .engine
            .eval_ast::<Dynamic>(&ast)
            .map(from_dynamic)
            .map_err(|e| EvalError::Script {
                expr: source.to_string(),
                reason: e.to_string(),
            })
    }

    fn compile(&self, source: &str) -> EvalResult<Rc<AST>> {
        if let Some(ast) = self.inner.compiled.borrow().get(source) {
            return Ok(Rc::clone(ast));
        }
        let ast = self
            .inner
            .engine
            .compile_expression(normalize_quotes(source).as_ref())
            .map_err(|e| EvalError::Script {
                expr: source.to_string(),
                reason: e.to_string(),
            })?;
        let ast = Rc::new(ast);
        self.inner
            .compiled
            .borrow_mut()
            .insert(source.to_string(), Rc::clone(&ast));
        Ok(ast)
    }

    /// Evaluate a value: strings are rendered as templates, everything else
    /// (null included) passes through.
    pub fn evaluate_value(&self, value: &Value) -> EvalResult<Value> {
        match value {
            Value::Str(template) => self.evaluate(template).map(Value::Str),
            other => Ok(other.clone()),
        }
    }

    /// Evaluate every field of a model.
    ///
    /// Errors name the offending field and the model type.
    pub fn evaluate_model<M: PluginModel>(&self, model: &M) -> EvalResult<Evaluated> {
        self.evaluate_fields(M::MODEL_TYPE, &model.fields())
    }

    /// Evaluate a set of named fields on behalf of `model_type`.
    pub fn evaluate_fields(
        &self,
        model_type: &str,
        fields: &IndexMap<String, Value>,
    ) -> EvalResult<Evaluated> {
        let mut values = IndexMap::with_capacity(fields.len());
        for (field, value) in fields {
            let evaluated = self
                .evaluate_value(value)
                .map_err(|e| e.in_field(model_type, field.as_str()))?;
            values.insert(field.clone(), evaluated);
        }
        Ok(Evaluated {
            model_type: model_type.to_string(),
            values,
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("resolvers", &self.resolver_names())
            .finish()
    }
}

/// Result of evaluating a model: field name to null-safe value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluated {
    model_type: String,
    values: IndexMap<String, Value>,
}

impl Evaluated {
    /// Build directly from values (useful for plugins invoked outside a render).
    pub fn from_values(model_type: impl Into<String>, values: IndexMap<String, Value>) -> Self {
        Self {
            model_type: model_type.into(),
            values,
        }
    }

    /// Type of the evaluated model.
    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    /// Field value, null when the field does not exist.
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(Value::null_ref())
    }

    /// All fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl Index<&str> for Evaluated {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        self.get(field)
    }
}

// ============================================================================
// Engine
// ============================================================================

fn build_engine(resolvers: Rc<RefCell<ChainedResolver>>, limits: &SandboxLimits) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);
    engine.disable_symbol("eval");
    // registered operators below must win over the built-in ones
    engine.set_fast_operators(false);
    register_operators(&mut engine);

    engine
        .register_type_with_name::<ResolverHandle>("Resolver")
        .register_indexer_get(ResolverHandle::index)
        .register_fn("keys", ResolverHandle::keys);

    engine.register_fn("split", |text: Dynamic, separator: &str| -> Array {
        if text.is_unit() {
            return Array::new();
        }
        text.to_string()
            .split(separator)
            .map(|part| Dynamic::from(part.to_string()))
            .collect()
    });
    engine.register_fn("keys", |map: &mut rhai::Map| -> Array {
        map.keys().map(|k| Dynamic::from(k.to_string())).collect()
    });

    engine.on_var(move |name, _index, _context| {
        let resolvers = resolvers.borrow();
        if let Some(resolver) = resolvers.get(name) {
            return Ok(Some(Dynamic::from(ResolverHandle(Rc::clone(resolver)))));
        }
        Ok(Some(to_dynamic(&resolvers.resolve(name))))
    });

    engine
}

/// True division plus null pass-through for the arithmetic operators.
fn register_operators(engine: &mut Engine) {
    engine.register_fn("/", |a: INT, b: INT| -> Result<FLOAT, Box<EvalAltResult>> {
        if b == 0 {
            return Err("Division by zero".into());
        }
        Ok(a as FLOAT / b as FLOAT)
    });

    macro_rules! pass_through {
        ($($ty:ty),*) => {$(
            for op in ["+", "-", "*", "/"] {
                engine.register_fn(op, |_: (), other: $ty| other);
                engine.register_fn(op, |other: $ty, _: ()| other);
            }
        )*};
    }
    pass_through!(INT, FLOAT, ImmutableString);
    for op in ["+", "-", "*", "/"] {
        engine.register_fn(op, |_: (), _: ()| ());
    }
}

/// Rewrite single-quoted string literals as double-quoted ones.
fn normalize_quotes(source: &str) -> Cow<'_, str> {
    if !source.contains('\'') {
        return Cow::Borrowed(source);
    }
    let mut out = String::with_capacity(source.len() + 2);
    let mut quote: Option<char> = None;
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            (Some('\''), '\'') => {
                quote = None;
                out.push('"');
            }
            (Some('\''), '"') => out.push_str("\\\""),
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '\'') => {
                quote = Some('\'');
                out.push('"');
            }
            (None, '"' | '`') => {
                quote = Some(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Convert a value into the engine's dynamic representation.
pub fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Int(i) => Dynamic::from(*i),
        Value::Float(f) => Dynamic::from(*f),
        Value::Str(s) => Dynamic::from(s.clone()),
        Value::List(items) => {
            let array: Array = items.iter().map(to_dynamic).collect();
            Dynamic::from(array)
        }
        Value::Map(map) => {
            let map: rhai::Map = map
                .iter()
                .map(|(k, v)| (k.as_str().into(), to_dynamic(v)))
                .collect();
            Dynamic::from(map)
        }
    }
}

/// Convert an engine result back into a value.
pub fn from_dynamic(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if value.is_bool() {
        value.as_bool().map(Value::Bool).unwrap_or_default()
    } else if value.is_int() {
        value.as_int().map(Value::Int).unwrap_or_default()
    } else if value.is_float() {
        value.as_float().map(Value::Float).unwrap_or_default()
    } else if value.is_string() {
        value.into_string().map(Value::Str).unwrap_or_default()
    } else if value.is_array() {
        value
            .try_cast::<Array>()
            .map(|items| Value::List(items.into_iter().map(from_dynamic).collect()))
            .unwrap_or_default()
    } else if value.is_map() {
        value
            .try_cast::<rhai::Map>()
            .map(|map| {
                Value::Map(
                    map.into_iter()
                        .map(|(k, v)| (k.to_string(), from_dynamic(v)))
                        .collect(),
                )
            })
            .unwrap_or_default()
    } else if value.is::<ResolverHandle>() {
        Value::Null
    } else {
        Value::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Finishing;
    use crate::expression::resolver::{EvaluatedResolver, MapResolver};

    fn map(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn image_context() -> Context {
        let ctx = Context::new();
        ctx.set_resolver(
            "image",
            MapResolver::new(map(&[
                ("width", Value::Int(400)),
                ("height", Value::Int(200)),
                ("mime", Value::from("image/png")),
            ])),
        );
        ctx
    }

    #[test]
    fn test_literal_passthrough() {
        let ctx = Context::new();
        assert_eq!(ctx.evaluate("#43c7ff").unwrap(), "#43c7ff");
        assert_eq!(ctx.evaluate("{{x}}").unwrap(), "{x}");
    }

    #[test]
    fn test_resolver_indexing_and_arithmetic() {
        let ctx = image_context();
        assert_eq!(ctx.evaluate("{image[\"width\"]}").unwrap(), "400");
        assert_eq!(ctx.evaluate("{image[\"width\"] / 2}").unwrap(), "200.0");
        assert_eq!(ctx.evaluate("{image[\"width\"] - 20}").unwrap(), "380");
        assert_eq!(ctx.evaluate("{image[\"height\"] * 0.5}").unwrap(), "100.0");
        assert_eq!(
            ctx.evaluate("{image[\"width\"]}x{image[\"height\"]}").unwrap(),
            "400x200"
        );
    }

    #[test]
    fn test_unresolved_names_render_empty() {
        let ctx = image_context();
        assert_eq!(ctx.evaluate("[{image[\"missing\"]}]").unwrap(), "[]");
        assert_eq!(ctx.evaluate("[{nobody}]").unwrap(), "[]");
    }

    #[test]
    fn test_null_passes_through_arithmetic() {
        let ctx = image_context();
        assert_eq!(ctx.evaluate("{image[\"missing\"] + 5}").unwrap(), "5");
        assert_eq!(ctx.evaluate("{5 - image[\"missing\"]}").unwrap(), "5");
        assert_eq!(ctx.evaluate("{image[\"missing\"] * 2.5}").unwrap(), "2.5");
        assert_eq!(ctx.evaluate("{nobody / 4}").unwrap(), "4");
        assert_eq!(ctx.evaluate("{image[\"missing\"] + \"px\"}").unwrap(), "px");
        assert_eq!(ctx.evaluate("[{nobody + nobody}]").unwrap(), "[]");
    }

    #[test]
    fn test_division_is_true_division() {
        let ctx = Context::new();
        assert_eq!(ctx.evaluate("{7 / 2}").unwrap(), "3.5");
        assert_eq!(ctx.evaluate("{7.0 / 2}").unwrap(), "3.5");
        assert_eq!(ctx.evaluate("{7 % 2}").unwrap(), "1");
        assert!(matches!(ctx.evaluate("{7 / 0}"), Err(EvalError::Script { .. })));
    }

    #[test]
    fn test_single_quoted_strings() {
        let ctx = image_context();
        assert_eq!(ctx.evaluate("{image['width']}").unwrap(), "400");
        assert_eq!(ctx.evaluate("{'a' + \"b\"}").unwrap(), "ab");
        assert_eq!(ctx.evaluate("{\"it's\"}").unwrap(), "it's");
        assert_eq!(normalize_quotes("x['y']"), "x[\"y\"]");
        assert_eq!(normalize_quotes("'a\"b'"), "\"a\\\"b\"");
        assert!(matches!(normalize_quotes("x[\"y\"]"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_bare_names_use_chained_lookup() {
        let ctx = image_context();
        assert_eq!(ctx.evaluate("{mime}").unwrap(), "image/png");
    }

    #[test]
    fn test_split_and_keys() {
        let ctx = Context::new();
        ctx.set_resolver(
            "var",
            MapResolver::new(map(&[("tags", Value::from("a,b,c"))])),
        );
        assert_eq!(ctx.evaluate("{split(var[\"tags\"], \",\")[1]}").unwrap(), "b");
        assert_eq!(ctx.evaluate("{split(var[\"none\"], \",\").len()}").unwrap(), "0");
        assert_eq!(ctx.evaluate("{keys(var).len()}").unwrap(), "1");
        assert_eq!(ctx.evaluate("{keys(#{x: 1, y: 2})[0]}").unwrap(), "x");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let ctx = image_context();
        assert!(matches!(
            ctx.evaluate("{image[\"width\"] +}"),
            Err(EvalError::Script { .. })
        ));
        assert!(matches!(ctx.evaluate("{1"), Err(EvalError::Template { .. })));
    }

    #[test]
    fn test_statements_are_rejected() {
        let ctx = Context::new();
        assert!(ctx.evaluate("{let x = 1}").is_err());
        assert!(ctx.evaluate("{eval(\"1\")}").is_err());
    }

    #[test]
    fn test_string_size_limit() {
        let ctx = Context::with_limits(SandboxLimits {
            max_string_size: 16,
            ..SandboxLimits::default()
        });
        ctx.set_resolver(
            "image",
            MapResolver::new(map(&[("mime", Value::from("image/png"))])),
        );
        assert!(ctx.evaluate("{image[\"mime\"]}").is_ok());
        assert!(ctx
            .evaluate("{image[\"mime\"] + image[\"mime\"] + image[\"mime\"]}")
            .is_err());
    }

    #[test]
    fn test_evaluate_model_keeps_null_and_attributes_errors() {
        let ctx = image_context();
        let finishing = Finishing::new("resize")
            .with_config("resize_x", "{image[\"width\"] / 4}")
            .with_config("keep_aspect", true);
        let evaluated = ctx.evaluate_model(&finishing).unwrap();
        assert_eq!(evaluated["resize_x"].as_int(), Some(100));
        assert_eq!(evaluated["keep_aspect"].as_bool(), Some(true));
        assert!(evaluated["image_in"].is_null());
        assert!(evaluated["not_a_field"].is_null());
        assert_eq!(evaluated.model_type(), "Finishing");

        let broken = Finishing::new("resize").with_config("resize_y", "{image[}");
        match ctx.evaluate_model(&broken) {
            Err(EvalError::Field { model_type, field, .. }) => {
                assert_eq!(model_type, "Finishing");
                assert_eq!(field, "resize_y");
            }
            other => panic!("expected field error, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluated_resolver_renders_values() {
        let ctx = image_context();
        ctx.set_resolver(
            "vars",
            EvaluatedResolver::new(
                &ctx,
                MapResolver::new(map(&[
                    ("half", Value::from("{image[\"width\"] / 2}")),
                    ("plain", Value::Int(7)),
                ])),
            ),
        );
        assert_eq!(ctx.evaluate("{vars[\"half\"]}").unwrap(), "200.0");
        assert_eq!(ctx.evaluate("{vars[\"plain\"] + 1}").unwrap(), "8");
    }

    #[test]
    fn test_self_referencing_variable_terminates() {
        let ctx = Context::new();
        ctx.set_resolver(
            "vars",
            EvaluatedResolver::new(
                &ctx,
                MapResolver::new(map(&[("loop", Value::from("{vars[\"loop\"]}"))])),
            ),
        );
        assert!(ctx.evaluate("{vars[\"loop\"]}").is_ok());
    }

    #[test]
    fn test_dynamic_round_trip() {
        let value = Value::Map(map(&[
            ("list", Value::List(vec![Value::Int(1), Value::Float(2.5)])),
            ("flag", Value::Bool(true)),
            ("none", Value::Null),
        ]));
        let back = from_dynamic(to_dynamic(&value));
        assert_eq!(back["list"][1], Value::Float(2.5));
        assert_eq!(back["flag"], Value::Bool(true));
        assert!(back["none"].is_null());
    }
}
