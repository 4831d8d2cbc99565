//! Hand-rolled input-schema description, in the `ResponsesApiTool` parameter
//! style, rather than deriving `schemars` on arbitrary tool-input types: tool
//! schemas need regex-bearing description text and strict
//! `additional_properties: false`, which a generic derive doesn't give
//! fine-grained control over.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        items: Box<JsonSchema>,
    },
    Object {
        properties: BTreeMap<String, JsonSchema>,
        #[serde(skip_serializing_if = "Option::is_none")]
        required: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        additional_properties: Option<bool>,
    },
}

impl JsonSchema {
    pub fn string(description: impl Into<String>) -> Self {
        JsonSchema::String {
            description: Some(description.into()),
        }
    }

    pub fn object(
        properties: impl IntoIterator<Item = (&'static str, JsonSchema)>,
        required: &[&'static str],
    ) -> Self {
        JsonSchema::Object {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            required: Some(required.iter().map(|s| s.to_string()).collect()),
            additional_properties: Some(false),
        }
    }
}
