//! Structural payload schemas.
//!
//! A [`Schema`] describes the JSON shape an event payload must have.
//! Validation reports every violation at once, each with the JSON pointer
//! of the offending value, so a rejected append tells the caller everything
//! that is wrong with it.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Payload must be absent or empty
    Null,
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<Schema>),
    Object(ObjectSchema),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: Vec<(String, Schema)>,
    pub required: Vec<String>,
    pub additional_properties: bool,
}

/// One schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer of the offending value, empty for the root
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{} {}", self.path, self.message)
        }
    }
}

/// Join violations into one message, comma separated
pub fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Schema {
    /// Start a closed object schema (no additional properties)
    pub fn object() -> ObjectSchema {
        ObjectSchema::default()
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    /// Check the schema itself is well formed.
    pub fn check(&self) -> Result<(), String> {
        self.check_at("")
    }

    fn check_at(&self, path: &str) -> Result<(), String> {
        match self {
            Schema::Array(items) => items.check_at(&format!("{}/items", path)),
            Schema::Object(object) => {
                let mut seen = HashSet::new();
                for (name, schema) in &object.properties {
                    if !seen.insert(name.as_str()) {
                        return Err(format!("{}: duplicate property \"{}\"", display(path), name));
                    }
                    schema.check_at(&format!("{}/{}", path, name))?;
                }
                for name in &object.required {
                    if !seen.contains(name.as_str()) && !object.additional_properties {
                        return Err(format!(
                            "{}: required property \"{}\" is not declared",
                            display(path),
                            name
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Validate a value, returning every violation found.
    pub fn validate(&self, value: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.validate_at(value, "", &mut violations);
        violations
    }

    fn validate_at(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        let mut fail = |message: String| {
            out.push(Violation {
                path: path.to_string(),
                message,
            })
        };

        match (self, value) {
            (Schema::Any, _) => {}
            (Schema::Null, Value::Null) => {}
            (Schema::Null, Value::Object(map)) if map.is_empty() => {}
            (Schema::Null, _) => fail("must be null or undefined".into()),
            (Schema::String, Value::String(_)) => {}
            (Schema::String, _) => fail("must be string".into()),
            (Schema::Number, Value::Number(_)) => {}
            (Schema::Number, _) => fail("must be number".into()),
            (Schema::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {}
            (Schema::Integer, _) => fail("must be integer".into()),
            (Schema::Boolean, Value::Bool(_)) => {}
            (Schema::Boolean, _) => fail("must be boolean".into()),
            (Schema::Array(items), Value::Array(values)) => {
                for (index, item) in values.iter().enumerate() {
                    items.validate_at(item, &format!("{}/{}", path, index), out);
                }
            }
            (Schema::Array(_), _) => fail("must be array".into()),
            (Schema::Object(object), Value::Object(map)) => {
                for name in &object.required {
                    if !map.contains_key(name) {
                        out.push(Violation {
                            path: path.to_string(),
                            message: format!("must have required property '{}'", name),
                        });
                    }
                }
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    let item = &map[key];
                    match object.property(key) {
                        Some(schema) => schema.validate_at(item, &format!("{}/{}", path, key), out),
                        None if object.additional_properties => {}
                        None => out.push(Violation {
                            path: path.to_string(),
                            message: format!("must NOT have additional property '{}'", key),
                        }),
                    }
                }
            }
            (Schema::Object(_), _) => fail("must be object".into()),
        }
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

impl ObjectSchema {
    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, schema)| schema)
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.push((name.into(), schema));
        self
    }

    pub fn with_required(mut self, names: &[&str]) -> Self {
        self.required.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = allowed;
        self
    }

    pub fn build(self) -> Schema {
        Schema::Object(self)
    }
}
