//! Declarative configuration forms for plugins.
//!
//! A plugin declares its configuration as a list of [`FieldDefinition`]s.
//! Binding the definitions to a model yields a [`Form`] whose values can be
//! edited, validated and written back into the model's `plugin_config`.

use crate::core::error::{PluginError, PluginResult};
use crate::core::model::PluginModel;
use crate::core::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind of input a field expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single line of text
    Text,
    /// Multi-line text
    Textarea,
    /// Whole number
    Integer,
    /// Decimal number
    Float,
    /// Checkbox
    Boolean,
    /// Hex or named color
    Color,
    /// One of a fixed set of keywords
    Choice,
    /// Structured key/value data
    Json,
}

impl FieldKind {
    /// Whether values of this kind may be template strings.
    fn accepts_template(&self) -> bool {
        !matches!(self, FieldKind::Json)
    }
}

/// Declaration of one configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub default: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub help: String,
}

impl FieldDefinition {
    /// Create an optional field.
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            default: Value::Null,
            choices: Vec::new(),
            required: false,
            help: String::new(),
        }
    }

    /// Text field.
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    /// Integer field (templates allowed).
    pub fn integer(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Integer)
    }

    /// Choice field over the given keywords.
    pub fn choice(name: impl Into<String>, label: impl Into<String>, choices: &[&str]) -> Self {
        let mut field = Self::new(name, label, FieldKind::Choice);
        field.choices = choices.iter().map(|c| c.to_string()).collect();
        field
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Check a value against the field's kind and choices. Template strings
    /// are only checked for presence; their value is known at render time.
    pub fn validate(&self, value: &Value) -> PluginResult<()> {
        let invalid = |reason: String| PluginError::InvalidConfig {
            field: self.name.clone(),
            reason,
        };

        if value.is_null() || value.as_str().is_some_and(|s| s.is_empty()) {
            return if self.required {
                Err(invalid("a value is required".to_string()))
            } else {
                Ok(())
            };
        }
        if let Value::Str(s) = value {
            if self.kind.accepts_template() && s.contains('{') {
                return Ok(());
            }
        }

        match self.kind {
            FieldKind::Integer if value.as_int().is_none() => {
                Err(invalid(format!("'{}' is not a whole number", value)))
            }
            FieldKind::Float if value.as_float().is_none() => {
                Err(invalid(format!("'{}' is not a number", value)))
            }
            FieldKind::Choice => {
                let choice = value.as_str().unwrap_or_default();
                if self.choices.iter().any(|c| *c == choice) {
                    Ok(())
                } else {
                    Err(invalid(format!(
                        "'{}' is not one of {}",
                        choice,
                        self.choices.join(", ")
                    )))
                }
            }
            FieldKind::Json if !matches!(value, Value::Map(_) | Value::List(_)) => {
                Err(invalid("expected key/value data".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Field definitions bound to a model.
#[derive(Debug, Clone)]
pub struct Form<M: PluginModel> {
    fields: Vec<FieldDefinition>,
    values: IndexMap<String, Value>,
    model: M,
}

impl<M: PluginModel> Form<M> {
    /// Bind fields to a model; values come from the model's configuration,
    /// falling back to field defaults.
    pub fn bind(fields: &[FieldDefinition], model: M) -> Self {
        let values = fields
            .iter()
            .map(|field| {
                let value = model
                    .plugin_config()
                    .get(&field.name)
                    .cloned()
                    .unwrap_or_else(|| field.default.clone());
                (field.name.clone(), value)
            })
            .collect();
        Self {
            fields: fields.to_vec(),
            values,
            model,
        }
    }

    /// Declared fields.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Current values by field name.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Current value of a field, null when unknown.
    pub fn value(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(Value::null_ref())
    }

    /// Bound model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Set a field value. Unknown fields are rejected.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> PluginResult<()> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(PluginError::InvalidConfig {
                field: name.to_string(),
                reason: "unknown field".to_string(),
            }),
        }
    }

    /// Validate every field.
    pub fn validate(&self) -> PluginResult<()> {
        for field in &self.fields {
            field.validate(self.value(&field.name))?;
        }
        Ok(())
    }

    /// Validate and write the values into the model's configuration. Null
    /// values remove the entry.
    pub fn apply(mut self) -> PluginResult<M> {
        self.validate()?;
        let config = self.model.plugin_config_mut();
        for (name, value) in self.values {
            if value.is_null() {
                config.shift_remove(&name);
            } else {
                config.insert(name, value);
            }
        }
        Ok(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Finishing;

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::choice("mode", "Mode", &["blur", "scale", "rotate"]).required(),
            FieldDefinition::new("factor", "Factor", FieldKind::Float).with_default(1.5),
            FieldDefinition::new("variables", "Variables", FieldKind::Json),
        ]
    }

    #[test]
    fn test_bind_uses_model_then_defaults() {
        let model = Finishing::new("transform").with_config("mode", "scale");
        let form = Form::bind(&fields(), model);
        assert_eq!(form.value("mode"), &Value::from("scale"));
        assert_eq!(form.value("factor"), &Value::Float(1.5));
        assert!(form.value("variables").is_null());
    }

    #[test]
    fn test_validate_choices_and_numbers() {
        let mut form = Form::bind(&fields(), Finishing::new("transform"));
        assert!(form.validate().is_err());

        form.set("mode", "rotate").unwrap();
        form.set("factor", "{image[\"width\"] / 10}").unwrap();
        assert!(form.validate().is_ok());

        form.set("factor", "fast").unwrap();
        assert!(matches!(
            form.validate(),
            Err(PluginError::InvalidConfig { ref field, .. }) if field == "factor"
        ));

        form.set("factor", 2).unwrap();
        form.set("mode", "shear").unwrap();
        assert!(form.validate().is_err());
        assert!(form.set("nope", 1).is_err());
    }

    #[test]
    fn test_apply_writes_config() {
        let mut form = Form::bind(&fields(), Finishing::new("transform").with_config("variables", 1));
        form.set("mode", "blur").unwrap();
        form.set("variables", Value::Null).unwrap();
        let model = form.apply().unwrap();
        assert_eq!(model.plugin_config["mode"], Value::from("blur"));
        assert_eq!(model.plugin_config["factor"], Value::Float(1.5));
        assert!(!model.plugin_config.contains_key("variables"));
    }
}
