// ABOUTME: Declarative attribute schemas for credential types.
// ABOUTME: Structural checks: presence, type coercion, enum membership, ranges, and defaults.

use crate::validation::ValidationErrors;
use serde_json::{Map, Value};

/// Variant-specific attribute map stored on a credential.
pub type Attributes = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
}

/// Value applied when an optional field is absent.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Null,
    Str(&'static str),
    Int(i64),
}

impl FieldDefault {
    fn to_value(&self) -> Value {
        match self {
            FieldDefault::Null => Value::Null,
            FieldDefault::Str(s) => Value::String((*s).to_string()),
            FieldDefault::Int(i) => Value::from(*i),
        }
    }
}

/// One attribute in a credential schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    pub default: Option<FieldDefault>,
    pub choices: &'static [&'static str],
    pub range: Option<(i64, i64)>,
}

impl Field {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            nullable: false,
            default: None,
            choices: &[],
            range: None,
        }
    }

    pub fn str(name: &'static str) -> Self {
        Self::new(name, FieldKind::Str)
    }

    pub fn int(name: &'static str) -> Self {
        Self::new(name, FieldKind::Int)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Accept `null`, defaulting to it when absent.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self.default = Some(FieldDefault::Null);
        self
    }

    pub fn default_str(mut self, value: &'static str) -> Self {
        self.default = Some(FieldDefault::Str(value));
        self
    }

    pub fn default_int(mut self, value: i64) -> Self {
        self.default = Some(FieldDefault::Int(value));
        self
    }

    pub fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Coerce `value` in place to this field's kind, returning a message on failure.
    fn coerce(&self, value: &mut Value) -> Result<(), String> {
        match self.kind {
            FieldKind::Str => match value {
                Value::String(_) => Ok(()),
                Value::Number(n) => {
                    *value = Value::String(n.to_string());
                    Ok(())
                }
                _ => Err("Not a string".to_string()),
            },
            FieldKind::Int => {
                let parsed = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                let Some(n) = parsed else {
                    return Err("Not an integer".to_string());
                };
                if let Some((min, max)) = self.range {
                    if n < min || n > max {
                        return Err(format!("Should be between {min} and {max}"));
                    }
                }
                *value = Value::from(n);
                Ok(())
            }
        }
    }
}

/// The attribute shape of one credential type.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialSchema {
    fields: Vec<Field>,
}

impl CredentialSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate and normalize `attributes` in place.
    ///
    /// Returned error paths are bare field names; callers nest them.
    pub fn validate(&self, attributes: &mut Attributes) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        for key in attributes.keys() {
            if self.field(key).is_none() {
                errors.add(key.clone(), "Field was not expected");
            }
        }

        for field in &self.fields {
            match attributes.get_mut(field.name) {
                None => {
                    if field.required {
                        errors.add(field.name, "attribute required");
                    } else if let Some(default) = &field.default {
                        attributes.insert(field.name.to_string(), default.to_value());
                    }
                }
                Some(Value::Null) => {
                    if !field.nullable {
                        errors.add(field.name, "null not allowed");
                    }
                }
                Some(value) => {
                    if let Err(message) = field.coerce(value) {
                        errors.add(field.name, message);
                        continue;
                    }
                    if !field.choices.is_empty() {
                        let chosen = value.as_str().unwrap_or_default();
                        if !field.choices.contains(&chosen) {
                            errors.add(field.name, format!("Invalid choice: {chosen}"));
                        }
                    }
                }
            }
        }

        errors
    }
}
