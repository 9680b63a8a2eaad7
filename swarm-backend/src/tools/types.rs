use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;

/// Fixed set of tool categories. Tools are registered under exactly one.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ToolCategory {
    Blockchain,
    Data,
    External,
    Social,
}

impl ToolCategory {
    /// All categories in lookup order (also the order bare names are resolved in)
    pub fn all() -> Vec<ToolCategory> {
        ToolCategory::iter().collect()
    }
}

/// JSON Schema property definition, for tools declared in this crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
}

impl PropertySchema {
    pub fn new(schema_type: &str, description: &str) -> Self {
        PropertySchema {
            schema_type: schema_type.to_string(),
            description: description.to_string(),
            default: None,
            items: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(description: &str) -> Self {
        Self::new("string", description)
    }

    pub fn string_array(description: &str, item_description: &str) -> Self {
        let mut schema = Self::new("array", description);
        schema.items = Some(Box::new(Self::string(item_description)));
        schema
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }
}

/// Builder for an object-typed input schema. Tools publish the result as a
/// plain JSON Schema document; validation happens in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: vec![],
        }
    }
}

impl ToolInputSchema {
    pub fn new(properties: HashMap<String, PropertySchema>, required: &[&str]) -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required: required.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl From<ToolInputSchema> for Value {
    fn from(schema: ToolInputSchema) -> Value {
        serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }))
    }
}

/// Tool definition exposed to agents and over the HTTP API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema document the parameters are validated against
    pub input_schema: Value,
}

/// Successful tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        ToolOutput {
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Read a string field from the metadata object
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// Read an unsigned integer field from the metadata object
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.as_ref()?.get(key)?.as_u64()
    }
}

/// Context provided to tools during execution
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub request_id: Option<Uuid>,
    /// Provider settings and credentials
    pub extra: HashMap<String, Value>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add an API key to the context
    /// Keys are stored by their exact name (e.g., "PRICE_API_KEY")
    pub fn with_api_key(mut self, key_name: &str, key_value: String) -> Self {
        self.extra.insert(
            format!("api_key_{}", key_name),
            serde_json::json!(key_value),
        );
        self
    }

    /// Get an API key from the context by its exact name
    pub fn get_api_key(&self, key_name: &str) -> Option<String> {
        self.extra
            .get(&format!("api_key_{}", key_name))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Attach a plain string setting (e.g. a provider base URL)
    pub fn with_setting(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!("DATA".parse::<ToolCategory>(), Ok(ToolCategory::Data));
        assert_eq!(ToolCategory::Social.to_string(), "social");
        assert!("finance".parse::<ToolCategory>().is_err());
        assert_eq!(ToolCategory::all().len(), 4);
    }

    #[test]
    fn test_input_schema_serializes_as_json_schema() {
        let mut properties = HashMap::new();
        properties.insert(
            "network".to_string(),
            PropertySchema::string("Network").with_default(json!("base")),
        );
        properties.insert(
            "tags".to_string(),
            PropertySchema::string_array("Tags", "Tag"),
        );
        properties.insert(
            "decimals".to_string(),
            PropertySchema::new("integer", "Decimals").with_range(0, 36),
        );
        let schema: Value = ToolInputSchema::new(properties, &["network"]).into();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["network"]));
        assert_eq!(schema["properties"]["network"]["default"], "base");
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(schema["properties"]["decimals"]["maximum"], 36);
        assert!(schema["properties"]["tags"].get("default").is_none());
        assert!(schema["properties"]["network"].get("minimum").is_none());
    }

    #[test]
    fn test_context_api_keys_and_settings() {
        let ctx = ToolContext::new()
            .with_api_key("PRICE_API_KEY", "secret".to_string())
            .with_setting("price_api_url", "http://localhost:9000");
        assert_eq!(ctx.get_api_key("PRICE_API_KEY").as_deref(), Some("secret"));
        assert_eq!(ctx.setting("price_api_url"), Some("http://localhost:9000"));
        assert!(ctx.get_api_key("OTHER").is_none());
    }
}
