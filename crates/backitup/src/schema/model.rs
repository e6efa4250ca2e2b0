use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::SchemaError;
use crate::validation::{validate_document, validate_paths, PathValidation};

/// A named backup task: copy every source into the destination.
///
/// Field order matches the persisted record layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "schema_name")]
    pub name: String,
    pub sources: Vec<String>,
    pub destination: String,
}

impl Schema {
    pub fn new(
        name: impl Into<String>,
        sources: impl IntoIterator<Item = impl Into<String>>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            destination: destination.into(),
        }
    }

    /// Runs the path validator against the current filesystem.
    pub fn validate(&self) -> PathValidation {
        validate_paths(&self.sources, &self.destination)
    }

    /// Checks the invariants a record must satisfy before it is persisted.
    pub fn check_complete(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::Invalid("Schema name cannot be empty.".to_string()));
        }
        if self.sources.is_empty() {
            return Err(SchemaError::Invalid(
                "Schema must have at least one source path.".to_string(),
            ));
        }
        if self.destination.trim().is_empty() {
            return Err(SchemaError::Invalid(
                "Schema must have a destination path.".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds a schema from a raw YAML document.
    ///
    /// The three keys must be present. Their values are taken leniently so a
    /// malformed record still loads; the accompanying validation reports what
    /// is wrong with it.
    pub(crate) fn from_document(
        document: &Value,
        path: &Path,
    ) -> Result<(Self, PathValidation), SchemaError> {
        let mapping = document
            .as_mapping()
            .ok_or_else(|| SchemaError::MissingField {
                path: path.to_path_buf(),
                key: "schema_name",
            })?;

        for key in ["schema_name", "sources", "destination"] {
            if !mapping.contains_key(key) {
                return Err(SchemaError::MissingField {
                    path: path.to_path_buf(),
                    key,
                });
            }
        }

        let name = match mapping.get("schema_name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => scalar_to_string(other),
            None => String::new(),
        };

        let sources = match mapping.get("sources") {
            Some(Value::Sequence(items)) => items.iter().map(scalar_to_string).collect(),
            _ => Vec::new(),
        };

        let destination = mapping
            .get("destination")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let validation = validate_document(document);
        Ok((
            Self {
                name,
                sources,
                destination,
            },
            validation,
        ))
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// A schema as read from the store, with validity computed at load time.
///
/// The validity fields and the file path are never written back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedSchema {
    pub schema: Schema,
    pub validation: PathValidation,
    pub path: PathBuf,
}

impl LoadedSchema {
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn is_valid(&self) -> bool {
        self.validation.is_valid
    }

    pub fn invalid_paths(&self) -> &[String] {
        &self.validation.problems
    }
}
