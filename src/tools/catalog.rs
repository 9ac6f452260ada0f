//! Tool definitions: typed metadata, parameter validation, schema rendering.
//!
//! A `ToolDefinition` is static metadata owned by its handler. It renders to a
//! JSON Schema object for `tools/list` and to a one-line signature used in
//! validation errors so the assistant can correct its own call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    StringList,
    Enum(Vec<String>),
}

impl ParamType {
    /// Build an enum type from string literals.
    pub fn one_of(variants: &[&str]) -> Self {
        ParamType::Enum(variants.iter().map(|v| v.to_string()).collect())
    }

    /// Validate a JSON value against this parameter type.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            ParamType::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(format!("expected string, got {}", value_type_name(value)))
                }
            }
            ParamType::Int => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err(format!("expected integer, got {}", value_type_name(value)))
                }
            }
            ParamType::Float => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(format!("expected number, got {}", value_type_name(value)))
                }
            }
            ParamType::Bool => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("expected boolean, got {}", value_type_name(value)))
                }
            }
            ParamType::StringList => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| format!("expected array, got {}", value_type_name(value)))?;
                for (i, item) in arr.iter().enumerate() {
                    if !item.is_string() {
                        return Err(format!(
                            "expected string at index {}, got {}",
                            i,
                            value_type_name(item)
                        ));
                    }
                }
                Ok(())
            }
            ParamType::Enum(variants) => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Ok(()),
                Some(s) => Err(format!(
                    "invalid value '{}', expected one of: {}",
                    s,
                    variants.join(", ")
                )),
                None => Err(format!(
                    "expected string for enum, got {}",
                    value_type_name(value)
                )),
            },
        }
    }

    /// Human-readable type name for signatures.
    pub fn display_name(&self) -> String {
        match self {
            ParamType::String => "string".to_string(),
            ParamType::Int => "integer".to_string(),
            ParamType::Float => "number".to_string(),
            ParamType::Bool => "boolean".to_string(),
            ParamType::StringList => "string[]".to_string(),
            ParamType::Enum(variants) => format!("enum({})", variants.join("|")),
        }
    }

    /// JSON Schema fragment for this type.
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Int => json!({"type": "integer"}),
            ParamType::Float => json!({"type": "number"}),
            ParamType::Bool => json!({"type": "boolean"}),
            ParamType::StringList => json!({"type": "array", "items": {"type": "string"}}),
            ParamType::Enum(variants) => json!({"type": "string", "enum": variants}),
        }
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Optional parameter whose value is filled in when the caller omits it.
    pub fn with_default(name: &str, param_type: ParamType, description: &str, default: Value) -> Self {
        Self {
            default: Some(default),
            ..Self::optional(name, param_type, description)
        }
    }
}

// =============================================================================
// Tool definition
// =============================================================================

/// Complete tool metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter (builder style).
    pub fn param(mut self, param: ParamDef) -> Self {
        self.parameters.push(param);
        self
    }

    /// One-line signature.
    ///
    /// Format: `tool_name(param1: type, param2?: type): description`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let optional = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, optional, p.param_type.display_name())
            })
            .collect();

        format!("{}({}): {}", self.name, params.join(", "), self.description)
    }

    /// JSON Schema object advertised as `inputSchema`.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            let mut schema = p.param_type.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".to_string(), Value::String(p.description.clone()));
                if let Some(default) = &p.default {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(p.name.clone(), schema);
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate arguments against the parameter definitions.
    ///
    /// Returns a list of validation errors (empty = valid). `null` is treated
    /// as an empty object; optional parameters accept `null` as "absent".
    pub fn validate_args(&self, args: &Value) -> Vec<String> {
        let empty = Map::new();
        let arg_map = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return vec![format!(
                    "arguments must be a JSON object, got {}",
                    value_type_name(other)
                )]
            }
        };

        let mut errors = Vec::new();

        for param_def in &self.parameters {
            let present = arg_map.get(&param_def.name).is_some_and(|v| !v.is_null());
            if param_def.required && !present {
                errors.push(format!("Missing required parameter: {}", param_def.name));
            }
        }

        let known_names: HashMap<&str, &ParamDef> = self
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();

        for (key, value) in arg_map {
            match known_names.get(key.as_str()) {
                Some(param_def) => {
                    if value.is_null() {
                        continue;
                    }
                    if let Err(e) = param_def.param_type.validate(value) {
                        errors.push(format!("Parameter '{}': {}", key, e));
                    }
                }
                None => errors.push(format!("Unknown parameter: {}", key)),
            }
        }

        errors
    }

    /// Fill in default values for missing (or `null`) optional parameters.
    ///
    /// A `null` argument becomes an object first so handlers always see a map.
    pub fn fill_defaults(&self, args: &mut Value) {
        if args.is_null() {
            *args = Value::Object(Map::new());
        }
        if let Some(map) = args.as_object_mut() {
            for param_def in &self.parameters {
                let Some(default) = &param_def.default else {
                    continue;
                };
                let missing = map.get(&param_def.name).map_or(true, Value::is_null);
                if missing {
                    map.insert(param_def.name.clone(), default.clone());
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_definition() -> ToolDefinition {
        ToolDefinition::new("search_products", "Search for products by name")
            .param(ParamDef::required("query", ParamType::String, "Search query"))
            .param(ParamDef::with_default(
                "limit",
                ParamType::Int,
                "Maximum results",
                json!(10),
            ))
            .param(ParamDef::optional(
                "sort_by",
                ParamType::one_of(&["price_asc", "price_desc"]),
                "Sort order",
            ))
    }

    #[test]
    fn test_validate_args_valid() {
        let def = sample_definition();
        let errors = def.validate_args(&json!({"query": "milk"}));
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_validate_args_missing_required() {
        let def = sample_definition();
        let errors = def.validate_args(&json!({}));
        assert_eq!(errors, vec!["Missing required parameter: query".to_string()]);
    }

    #[test]
    fn test_validate_args_null_counts_as_missing_for_required() {
        let def = sample_definition();
        let errors = def.validate_args(&json!({"query": null}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Missing required parameter: query"));
    }

    #[test]
    fn test_validate_args_null_object() {
        let def = ToolDefinition::new("view_cart", "View cart");
        assert!(def.validate_args(&Value::Null).is_empty());
    }

    #[test]
    fn test_validate_args_non_object() {
        let def = sample_definition();
        let errors = def.validate_args(&json!(["milk"]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("must be a JSON object"));
    }

    #[test]
    fn test_validate_args_wrong_type() {
        let def = sample_definition();
        let errors = def.validate_args(&json!({"query": 42}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expected string"));
    }

    #[test]
    fn test_validate_args_float_is_not_integer() {
        let def = sample_definition();
        let errors = def.validate_args(&json!({"query": "milk", "limit": 2.5}));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Parameter 'limit': expected integer"));
    }

    #[test]
    fn test_validate_args_unknown_param() {
        let def = sample_definition();
        let errors = def.validate_args(&json!({"query": "milk", "bogus": true}));
        assert_eq!(errors, vec!["Unknown parameter: bogus".to_string()]);
    }

    #[test]
    fn test_fill_defaults() {
        let def = sample_definition();
        let mut args = json!({"query": "milk"});
        def.fill_defaults(&mut args);
        assert_eq!(args["limit"], 10);
        assert!(args.get("sort_by").is_none());
    }

    #[test]
    fn test_fill_defaults_no_overwrite() {
        let def = sample_definition();
        let mut args = json!({"query": "milk", "limit": 5});
        def.fill_defaults(&mut args);
        assert_eq!(args["limit"], 5);
    }

    #[test]
    fn test_fill_defaults_on_null() {
        let def = sample_definition();
        let mut args = Value::Null;
        def.fill_defaults(&mut args);
        assert_eq!(args, json!({"limit": 10}));
    }

    #[test]
    fn test_signature_format() {
        assert_eq!(
            sample_definition().signature(),
            "search_products(query: string, limit?: integer, sort_by?: enum(price_asc|price_desc)): Search for products by name"
        );
    }

    #[test]
    fn test_input_schema() {
        let schema = sample_definition().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["limit"]["default"], 10);
        assert_eq!(
            schema["properties"]["sort_by"]["enum"],
            json!(["price_asc", "price_desc"])
        );
        assert_eq!(schema["properties"]["query"]["description"], "Search query");
    }

    #[test]
    fn test_param_type_enum_validation() {
        let pt = ParamType::one_of(&["upi", "cod"]);
        assert!(pt.validate(&json!("upi")).is_ok());
        assert!(pt.validate(&json!("card")).is_err());
        assert!(pt.validate(&json!(42)).is_err());
    }

    #[test]
    fn test_param_type_string_list_validation() {
        let pt = ParamType::StringList;
        assert!(pt.validate(&json!(["a", "b"])).is_ok());
        assert!(pt.validate(&json!([1, 2])).is_err());
        assert!(pt.validate(&json!("not array")).is_err());
    }
}
