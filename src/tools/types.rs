//! Tool parameter schemas.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON Schema-based parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentToolParameters {
    pub schema: Value,
}

impl AgentToolParameters {
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    /// A schema that accepts no parameters.
    pub fn empty() -> Self {
        Self::object().build()
    }

    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for object parameter schemas.
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = json!({ "type": "string", "description": description.into() });
        self.property(name, schema, required)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = json!({ "type": "integer", "description": description.into() });
        self.property(name, schema, required)
    }

    /// An array of strings with at least one item.
    pub fn string_array(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = json!({
            "type": "array",
            "description": description.into(),
            "items": { "type": "string" },
            "minItems": 1,
        });
        self.property(name, schema, required)
    }

    pub fn build(self) -> AgentToolParameters {
        AgentToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}
