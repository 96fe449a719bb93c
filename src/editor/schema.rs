//! Template schema: the declarative description of a document's input fields.
//!
//! Schemas are loaded once per editing session from JSON and never mutated
//! afterwards. Field identifiers are unique across the whole schema because
//! the form state is a single flat mapping keyed by identifier.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Number of records a dynamic list starts with when `defaultItems` is absent.
pub const DEFAULT_LIST_ITEMS: usize = 3;

/// Default upper bound on the records of one dynamic list in a session.
pub const MAX_LIST_ITEMS: usize = 200;

/// Errors raised while loading or checking a template schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate field id '{0}'")]
    DuplicateField(String),
    #[error("duplicate sub-field id '{sub_field}' in list '{field}'")]
    DuplicateSubField { field: String, sub_field: String },
    #[error("list field '{0}' declares no sub-fields")]
    EmptyList(String),
    #[error("list field '{field}' nests another list '{sub_field}'")]
    NestedList { field: String, sub_field: String },
    #[error("schema '{0}' has no layout definition")]
    MissingDefinition(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSchema {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// What kind of input a field is. Scalar kinds all hold a single string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Date,
    DynamicList(ListSpec),
}

/// Sub-schema of a repeatable field group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_items: Option<usize>,
    pub fields: Vec<FieldSpec>,
}

impl ListSpec {
    pub fn default_count(&self) -> usize {
        self.default_items.unwrap_or(DEFAULT_LIST_ITEMS)
    }

    pub fn has_sub_field(&self, id: &str) -> bool {
        self.fields.iter().any(|f| f.id == id)
    }
}

impl FieldKind {
    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::DynamicList(_))
    }

    pub fn list(&self) -> Option<&ListSpec> {
        match self {
            FieldKind::DynamicList(spec) => Some(spec),
            FieldKind::Text | FieldKind::Textarea | FieldKind::Date => None,
        }
    }
}

impl TemplateSchema {
    /// Parse and check a schema from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let schema: TemplateSchema = serde_json::from_str(text)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Every top-level field, in declaration order across sections.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields().find(|f| f.id == id)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for field in self.fields() {
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateField(field.id.clone()));
            }

            if let FieldKind::DynamicList(spec) = &field.kind {
                if spec.fields.is_empty() {
                    return Err(SchemaError::EmptyList(field.id.clone()));
                }
                let mut sub_seen = HashSet::new();
                for sub in &spec.fields {
                    if sub.kind.is_list() {
                        return Err(SchemaError::NestedList {
                            field: field.id.clone(),
                            sub_field: sub.id.clone(),
                        });
                    }
                    if !sub_seen.insert(sub.id.as_str()) {
                        return Err(SchemaError::DuplicateSubField {
                            field: field.id.clone(),
                            sub_field: sub.id.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
