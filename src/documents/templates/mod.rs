//! Built-in templates and the catalogue pairing schemas with layouts.

pub mod leave_request;
pub mod power_of_attorney;
pub mod receipt;

pub use leave_request::LeaveRequest;
pub use power_of_attorney::PowerOfAttorney;
pub use receipt::Receipt;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::common::get_static_dir;
use super::traits::DocumentDefinition;
use crate::editor::{SchemaError, TemplateSchema};

/// Layouts compiled into the binary, keyed by template id.
pub fn builtin_definitions() -> Vec<Arc<dyn DocumentDefinition>> {
    vec![
        Arc::new(PowerOfAttorney),
        Arc::new(Receipt),
        Arc::new(LeaveRequest),
    ]
}

/// A schema together with the layout that renders it.
#[derive(Clone)]
pub struct CatalogueEntry {
    pub schema: Arc<TemplateSchema>,
    pub definition: Arc<dyn DocumentDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone, Default)]
pub struct TemplateCatalogue {
    entries: BTreeMap<String, CatalogueEntry>,
}

impl TemplateCatalogue {
    /// Load every `*.json` schema in `dir` and pair it with a built-in layout.
    pub fn load(dir: &Path) -> Result<Self, SchemaError> {
        let io_err = |source| SchemaError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut schemas = Vec::with_capacity(paths.len());
        for path in paths {
            let text = fs::read_to_string(&path).map_err(|source| SchemaError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let schema = TemplateSchema::from_json(&text)?;
            log::debug!("Loaded template schema '{}' from {}", schema.id, path.display());
            schemas.push(schema);
        }

        let catalogue = Self::from_parts(schemas, builtin_definitions())?;
        log::info!("Template catalogue ready with {} templates", catalogue.len());
        Ok(catalogue)
    }

    /// Schemas shipped under `static/templates`.
    pub fn load_default() -> Result<Self, SchemaError> {
        Self::load(&get_static_dir().join("templates"))
    }

    pub fn from_parts(
        schemas: Vec<TemplateSchema>,
        definitions: Vec<Arc<dyn DocumentDefinition>>,
    ) -> Result<Self, SchemaError> {
        let mut entries = BTreeMap::new();
        for schema in schemas {
            schema.validate()?;
            let definition = definitions
                .iter()
                .find(|d| d.template_id() == schema.id)
                .cloned()
                .ok_or_else(|| SchemaError::MissingDefinition(schema.id.clone()))?;
            entries.insert(
                schema.id.clone(),
                CatalogueEntry {
                    schema: Arc::new(schema),
                    definition,
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&CatalogueEntry> {
        self.entries.get(id)
    }

    pub fn summaries(&self) -> Vec<TemplateSummary> {
        self.entries
            .values()
            .map(|entry| TemplateSummary {
                id: entry.schema.id.clone(),
                title: entry.schema.title.clone(),
                description: entry.schema.description.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
