//! Compiled event registries.
//!
//! Each document type compiles its event kinds once into an
//! [`EventRegistry`]. Compilation checks every payload schema up front, so a
//! malformed schema surfaces the first time the document type is used rather
//! than at the first append of that kind.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde_json::Value;

use crate::error::ClientError;
use crate::schema::{self, Schema};

/// A registry compiled on first use, holding the compilation error if any
pub type CompiledRegistry = LazyLock<Result<EventRegistry, String>>;

/// Borrow a lazily compiled registry, surfacing a compilation failure.
pub fn compiled(registry: &'static CompiledRegistry) -> crate::Result<&'static EventRegistry> {
    registry
        .as_ref()
        .map_err(|e| ClientError::Schema(e.clone()))
}

/// Declaration of one event kind
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub kind: &'static str,
    pub schema: Schema,
}

impl EventSpec {
    pub fn new(kind: &'static str, schema: Schema) -> Self {
        Self { kind, schema }
    }
}

/// Immutable map from event kind to payload schema
#[derive(Debug, Clone)]
pub struct EventRegistry {
    events: BTreeMap<&'static str, Schema>,
}

impl EventRegistry {
    pub fn compile(specs: Vec<EventSpec>) -> Result<Self, String> {
        let mut events = BTreeMap::new();
        for spec in specs {
            spec.schema
                .check()
                .map_err(|e| format!("invalid schema for event \"{}\": {}", spec.kind, e))?;
            if events.insert(spec.kind, spec.schema).is_some() {
                return Err(format!("event \"{}\" is declared twice", spec.kind));
            }
        }
        Ok(Self { events })
    }

    pub fn schema(&self, kind: &str) -> Option<&Schema> {
        self.events.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.events.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.events.keys().copied()
    }

    /// Validate a payload (tag removed) against the schema for `kind`.
    ///
    /// Returns `None` for unknown kinds, otherwise the aggregated violation
    /// message, empty when the payload conforms.
    pub fn check_payload(&self, kind: &str, payload: &Value) -> Option<String> {
        self.schema(kind)
            .map(|schema| schema::describe(&schema.validate(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> EventRegistry {
        EventRegistry::compile(vec![
            EventSpec::new(
                "renamed",
                Schema::object()
                    .with_property("name", Schema::String)
                    .with_required(&["name"])
                    .build(),
            ),
            EventSpec::new("reset", Schema::Null),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let registry = registry();
        assert!(registry.contains("renamed"));
        assert!(!registry.contains("deleted"));
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["renamed", "reset"]);
    }

    #[test]
    fn test_check_payload() {
        let registry = registry();
        assert_eq!(
            registry.check_payload("renamed", &json!({ "name": "x" })),
            Some(String::new())
        );
        assert_eq!(
            registry.check_payload("renamed", &json!({})),
            Some("must have required property 'name'".to_string())
        );
        assert_eq!(registry.check_payload("deleted", &json!({})), None);
    }

    #[test]
    fn test_bad_schema_fails_compilation() {
        let err = EventRegistry::compile(vec![EventSpec::new(
            "broken",
            Schema::object().with_required(&["ghost"]).build(),
        )])
        .unwrap_err();
        assert!(err.starts_with("invalid schema for event \"broken\""));
    }

    #[test]
    fn test_compiled_surfaces_schema_error() {
        static BROKEN: CompiledRegistry = LazyLock::new(|| {
            EventRegistry::compile(vec![EventSpec::new(
                "broken",
                Schema::object().with_required(&["ghost"]).build(),
            )])
        });
        let err = compiled(&BROKEN).unwrap_err();
        assert!(err.to_string().starts_with("invalid EventMachine schema: invalid schema for event"));
    }

    #[test]
    fn test_duplicate_kind_fails_compilation() {
        let err = EventRegistry::compile(vec![
            EventSpec::new("reset", Schema::Null),
            EventSpec::new("reset", Schema::Any),
        ])
        .unwrap_err();
        assert_eq!(err, "event \"reset\" is declared twice");
    }
}
