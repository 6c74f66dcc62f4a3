//! Operation registry: name -> { input shape, handler }.
//!
//! Built once at startup; duplicate names fail the build. After that the
//! registry is only read (the dispatcher holds it behind an `Arc`).

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::azure::AzureCli;

pub type JsonObject = Map<String, Value>;

/// Future returned by every handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Handler entry point. Arguments arrive exactly as the caller sent them.
pub type Handler = fn(Arc<AzureCli>, JsonObject) -> HandlerFuture;

/// Box a handler body (pins the output type for `?` inside `async` blocks).
pub fn boxed<F>(fut: F) -> HandlerFuture
where
    F: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Box::pin(fut)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation '{0}' is registered more than once")]
    Duplicate(String),
    #[error("Unknown tool: {0}")]
    UnknownOperation(String),
}

/// JSON type of a declared input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
        }
    }
}

/// Declared arguments of an operation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputShape {
    fields: Vec<Field>,
}

impl InputShape {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// JSON-Schema object form (`type`, `properties`, `required`).
    pub fn to_json_schema(&self) -> JsonObject {
        let mut properties = Map::new();
        for f in &self.fields {
            properties.insert(
                f.name.to_string(),
                json!({ "type": f.kind.as_str(), "description": f.description }),
            );
        }
        let required: Vec<Value> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| Value::String(f.name.to_string()))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), Value::String("object".into()));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), Value::Array(required));
        schema
    }
}

pub struct OperationDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input: InputShape,
    pub handler: Handler,
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl OperationDescriptor {
    pub fn new(
        name: &'static str,
        description: &'static str,
        input: InputShape,
        handler: Handler,
    ) -> Self {
        Self {
            name,
            description,
            input,
            handler,
        }
    }

    pub fn info(&self) -> OperationInfo {
        OperationInfo {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input.to_json_schema(),
        }
    }
}

/// Public metadata of an operation (no handler).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub name: String,
    pub description: String,
    pub input_schema: JsonObject,
}

#[derive(Debug, Default)]
pub struct Registry {
    operations: Vec<OperationDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a fixed list, failing on the first duplicate name.
    pub fn with_operations<I>(ops: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = OperationDescriptor>,
    {
        let mut registry = Self::new();
        for op in ops {
            registry.register(op)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, op: OperationDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(op.name) {
            return Err(RegistryError::Duplicate(op.name.to_string()));
        }
        self.index.insert(op.name, self.operations.len());
        self.operations.push(op);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&OperationDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.operations[i])
            .ok_or_else(|| RegistryError::UnknownOperation(name.to_string()))
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: Arc<AzureCli>, _: JsonObject) -> HandlerFuture {
        boxed(async { Ok(Value::Null) })
    }

    fn op(name: &'static str) -> OperationDescriptor {
        OperationDescriptor::new(name, "test op", InputShape::empty(), noop)
    }

    #[test]
    fn duplicate_names_fail_at_build() {
        let err = Registry::with_operations([op("a"), op("b"), op("a")]).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("a".into()));
    }

    #[test]
    fn lookup_known_and_unknown() {
        let reg = Registry::with_operations([op("first"), op("second")]).unwrap();
        assert_eq!(reg.lookup("second").unwrap().name, "second");
        let err = reg.lookup("third").unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: third");
        let names: Vec<_> = reg.iter().map(|o| o.name).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn schema_lists_required_fields() {
        let shape = InputShape::new(vec![
            Field::required("name", FieldKind::String, "Function app name"),
            Field::optional("lines", FieldKind::Number, "Line count"),
        ]);
        let schema = Value::Object(shape.to_json_schema());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["lines"]["type"], "number");
        assert_eq!(
            schema["properties"]["name"]["description"],
            "Function app name"
        );
    }

    #[test]
    fn empty_shape_still_declares_object() {
        let schema = Value::Object(InputShape::empty().to_json_schema());
        assert_eq!(schema, json!({"type":"object","properties":{},"required":[]}));
    }
}
