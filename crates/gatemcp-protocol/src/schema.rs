//! JSON-Schema compilation and validation for tool inputs.
//!
//! Schemas are compiled once into a [`CompiledSchema`] and run many times;
//! the server's schema cache holds compiled forms keyed by schema text.
//! The validator covers the subset MCP tool schemas use:
//!
//! - Type checking (string, number, integer, boolean, object, array, null)
//! - Required field validation
//! - Enum and const validation
//! - Property validation for objects, items validation for arrays
//! - Length, range, and uniqueness bounds
//!
//! This is not a full JSON Schema implementation; unknown keywords are
//! ignored at compile time.

use serde_json::Value;
use std::fmt;

/// Error returned when a schema cannot be compiled.
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Description of what is wrong with the schema.
    pub message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid schema: {}", self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Error returned when JSON-Schema validation fails.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the invalid value (e.g., `root.foo.bar` or `root[0]`).
    pub path: String,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result of JSON-Schema validation.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A schema compiled for repeated validation.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    root: Node,
}

impl CompiledSchema {
    /// Compiles a schema value.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the root (or any nested schema position)
    /// holds something other than a boolean or an object.
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            root: Node::compile(schema)?,
        })
    }

    /// Compiles a schema from its JSON text.
    pub fn compile_text(schema_text: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(schema_text).map_err(|e| SchemaError {
            message: format!("schema is not valid JSON: {e}"),
        })?;
        Self::compile(&value)
    }

    /// Validates a value, collecting all errors found.
    pub fn validate(&self, value: &Value) -> ValidationResult {
        let mut errors = Vec::new();
        self.root.check(value, "root", &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// One compiled schema node.
#[derive(Debug, Clone)]
enum Node {
    /// `true` schema: accepts everything.
    Anything,
    /// `false` schema: rejects everything.
    Nothing,
    /// An object schema with compiled constraints.
    Checks(Box<Checks>),
}

/// How additional object properties are handled.
#[derive(Debug, Clone)]
enum AdditionalProps {
    Allow,
    Deny,
    Schema(Node),
}

#[derive(Debug, Clone)]
struct Checks {
    types: Option<Vec<String>>,
    enum_values: Option<Vec<Value>>,
    const_value: Option<Value>,
    required: Vec<String>,
    properties: Vec<(String, Node)>,
    additional: AdditionalProps,
    items: Option<Node>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    min_items: Option<u64>,
    max_items: Option<u64>,
    min_properties: Option<u64>,
    max_properties: Option<u64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    multiple_of: Option<f64>,
    unique_items: bool,
}

impl Node {
    fn compile(schema: &Value) -> Result<Node, SchemaError> {
        // Boolean schemas: true accepts all, false rejects all.
        if let Some(b) = schema.as_bool() {
            return Ok(if b { Node::Anything } else { Node::Nothing });
        }

        let Some(obj) = schema.as_object() else {
            return Err(SchemaError {
                message: format!("expected object or boolean, got {}", json_type_name(schema)),
            });
        };

        let types = obj.get("type").map(|t| match t {
            Value::String(name) => vec![name.clone()],
            Value::Array(names) => names
                .iter()
                .filter_map(|n| n.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        });

        let enum_values = obj
            .get("enum")
            .and_then(Value::as_array)
            .map(|arr| arr.to_vec());

        let const_value = obj.get("const").cloned();

        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| r.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();

        let mut properties = Vec::new();
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (key, prop_schema) in props {
                properties.push((key.clone(), Node::compile(prop_schema)?));
            }
        }

        let additional = match obj.get("additionalProperties") {
            Some(Value::Bool(false)) => AdditionalProps::Deny,
            Some(value @ Value::Object(_)) => AdditionalProps::Schema(Node::compile(value)?),
            _ => AdditionalProps::Allow,
        };

        let items = match obj.get("items") {
            Some(schema @ (Value::Object(_) | Value::Bool(_))) => Some(Node::compile(schema)?),
            _ => None,
        };

        Ok(Node::Checks(Box::new(Checks {
            types,
            enum_values,
            const_value,
            required,
            properties,
            additional,
            items,
            min_length: obj.get("minLength").and_then(Value::as_u64),
            max_length: obj.get("maxLength").and_then(Value::as_u64),
            min_items: obj.get("minItems").and_then(Value::as_u64),
            max_items: obj.get("maxItems").and_then(Value::as_u64),
            min_properties: obj.get("minProperties").and_then(Value::as_u64),
            max_properties: obj.get("maxProperties").and_then(Value::as_u64),
            minimum: obj.get("minimum").and_then(Value::as_f64),
            maximum: obj.get("maximum").and_then(Value::as_f64),
            exclusive_minimum: obj.get("exclusiveMinimum").and_then(Value::as_f64),
            exclusive_maximum: obj.get("exclusiveMaximum").and_then(Value::as_f64),
            multiple_of: obj.get("multipleOf").and_then(Value::as_f64),
            unique_items: obj
                .get("uniqueItems")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })))
    }

    fn check(&self, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
        let checks = match self {
            Node::Anything => return,
            Node::Nothing => {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: "schema rejects all values".to_owned(),
                });
                return;
            }
            Node::Checks(checks) => checks,
        };

        if let Some(types) = &checks.types {
            if !types.iter().any(|t| matches_type(t, value)) {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!(
                        "expected type {}, got {}",
                        types.join(" | "),
                        json_type_name(value)
                    ),
                });
                // Type mismatch, skip further validation at this node.
                return;
            }
        }

        if let Some(allowed) = &checks.enum_values {
            if !allowed.contains(value) {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("value must be one of: {allowed:?}"),
                });
            }
        }

        if let Some(expected) = &checks.const_value {
            if value != expected {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("value must equal {expected}"),
                });
            }
        }

        match value {
            Value::Object(obj) => checks.check_object(obj, path, errors),
            Value::Array(arr) => checks.check_array(arr, path, errors),
            Value::String(s) => checks.check_string(s, path, errors),
            Value::Number(n) => checks.check_number(n, path, errors),
            _ => {}
        }
    }
}

impl Checks {
    fn check_object(
        &self,
        obj: &serde_json::Map<String, Value>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        for req in &self.required {
            if !obj.contains_key(req) {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("missing required field: {req}"),
                });
            }
        }

        for (key, value) in obj {
            if let Some((_, node)) = self.properties.iter().find(|(name, _)| name == key) {
                let prop_path = format!("{path}.{key}");
                node.check(value, &prop_path, errors);
            } else {
                match &self.additional {
                    AdditionalProps::Allow => {}
                    AdditionalProps::Deny => {
                        errors.push(ValidationError {
                            path: path.to_owned(),
                            message: format!("additional property not allowed: {key}"),
                        });
                    }
                    AdditionalProps::Schema(node) => {
                        let prop_path = format!("{path}.{key}");
                        node.check(value, &prop_path, errors);
                    }
                }
            }
        }

        if let Some(min) = self.min_properties {
            if (obj.len() as u64) < min {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("object must have at least {min} properties"),
                });
            }
        }
        if let Some(max) = self.max_properties {
            if (obj.len() as u64) > max {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("object must have at most {max} properties"),
                });
            }
        }
    }

    fn check_array(&self, arr: &[Value], path: &str, errors: &mut Vec<ValidationError>) {
        if let Some(items) = &self.items {
            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                items.check(item, &item_path, errors);
            }
        }

        if let Some(min) = self.min_items {
            if (arr.len() as u64) < min {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("array must have at least {min} items"),
                });
            }
        }
        if let Some(max) = self.max_items {
            if (arr.len() as u64) > max {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("array must have at most {max} items"),
                });
            }
        }

        if self.unique_items {
            let mut seen: Vec<&Value> = Vec::with_capacity(arr.len());
            for (i, item) in arr.iter().enumerate() {
                if seen.contains(&item) {
                    errors.push(ValidationError {
                        path: format!("{path}[{i}]"),
                        message: "duplicate item in array".to_owned(),
                    });
                }
                seen.push(item);
            }
        }
    }

    fn check_string(&self, s: &str, path: &str, errors: &mut Vec<ValidationError>) {
        let len = s.chars().count() as u64;
        if let Some(min) = self.min_length {
            if len < min {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("string must be at least {min} characters"),
                });
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("string must be at most {max} characters"),
                });
            }
        }
    }

    fn check_number(&self, n: &serde_json::Number, path: &str, errors: &mut Vec<ValidationError>) {
        let val = n.as_f64().unwrap_or(0.0);

        if let Some(min) = self.minimum {
            if val < min {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("value must be >= {min}"),
                });
            }
        }
        if let Some(max) = self.maximum {
            if val > max {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("value must be <= {max}"),
                });
            }
        }
        if let Some(min) = self.exclusive_minimum {
            if val <= min {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("value must be > {min}"),
                });
            }
        }
        if let Some(max) = self.exclusive_maximum {
            if val >= max {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("value must be < {max}"),
                });
            }
        }
        if let Some(multiple) = self.multiple_of {
            if multiple != 0.0 && (val % multiple).abs() > f64::EPSILON {
                errors.push(ValidationError {
                    path: path.to_owned(),
                    message: format!("value must be a multiple of {multiple}"),
                });
            }
        }
    }
}

/// Checks if a value matches a single type name. Unknown names accept.
fn matches_type(type_name: &str, value: &Value) -> bool {
    match type_name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Returns the JSON type name for a value.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
