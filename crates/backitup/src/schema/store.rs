//! YAML-backed schema persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde_yaml::Value;
use walkdir::WalkDir;

use super::model::{LoadedSchema, Schema};
use crate::error::SchemaError;
use crate::sanitize::sanitize_filename;

const SCHEMA_EXTENSION: &str = "yaml";

/// Directory of schema records, one `<sanitized name>.yaml` per schema.
#[derive(Debug, Clone)]
pub struct SchemaStore {
    dir: PathBuf,
}

impl SchemaStore {
    /// Opens the store, creating the directory if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SchemaError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SchemaError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `name`, whether or not it exists.
    pub fn schema_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_filename(name), SCHEMA_EXTENSION))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.schema_path(name).exists()
    }

    /// Loads every record in the directory, keyed by the name stored inside
    /// each file.
    ///
    /// Unreadable or incomplete files are skipped and logged.
    pub fn load_all(&self) -> BTreeMap<String, LoadedSchema> {
        let mut schemas = BTreeMap::new();

        let entries = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", self.dir, e);
                    None
                }
            })
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().and_then(|e| e.to_str()) == Some(SCHEMA_EXTENSION)
            });

        for entry in entries {
            match read_record(entry.path()) {
                Ok(loaded) => {
                    if let Some(previous) = schemas.insert(loaded.name().to_string(), loaded) {
                        warn!(
                            "Schema '{}' defined more than once, ignoring {:?}",
                            previous.name(),
                            previous.path
                        );
                    }
                }
                Err(SchemaError::MissingField { path, key }) => {
                    warn!(
                        "Skipping invalid schema file (missing '{}'): {:?}",
                        key,
                        path.file_name().unwrap_or_default()
                    );
                }
                Err(e) => error!("Error loading schema file: {}", e),
            }
        }

        schemas
    }

    /// Loads a single schema by name.
    ///
    /// Returns `Ok(None)` when no record exists for the name.
    pub fn load(&self, name: &str) -> Result<Option<LoadedSchema>, SchemaError> {
        let path = self.schema_path(name);
        if !path.exists() {
            warn!(
                "Schema file not found for name: {} (expected: {:?})",
                name,
                path.file_name().unwrap_or_default()
            );
            return Ok(None);
        }

        let loaded = read_record(&path)?;
        if loaded.name() != name {
            return Err(SchemaError::NameMismatch {
                path,
                expected: name.to_string(),
                found: loaded.name().to_string(),
            });
        }
        Ok(Some(loaded))
    }

    /// Writes `schema`, replacing any existing record with the same
    /// sanitized name. Returns the path written.
    pub fn save(&self, schema: &Schema) -> Result<PathBuf, SchemaError> {
        schema.check_complete()?;

        let path = self.schema_path(&schema.name);
        let yaml = serde_yaml::to_string(schema).map_err(|e| SchemaError::SerializeYaml {
            name: schema.name.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, yaml).map_err(|e| SchemaError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(
            "Schema '{}' saved to {:?}",
            schema.name,
            path.file_name().unwrap_or_default()
        );
        Ok(path)
    }

    /// Removes the record for `name`.
    pub fn delete(&self, name: &str) -> Result<(), SchemaError> {
        let path = self.schema_path(name);
        if !path.exists() {
            return Err(SchemaError::NotFound(name.to_string()));
        }

        fs::remove_file(&path).map_err(|e| SchemaError::DeleteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(
            "Schema file {:?} deleted",
            path.file_name().unwrap_or_default()
        );
        Ok(())
    }
}

fn read_record(path: &Path) -> Result<LoadedSchema, SchemaError> {
    let content = fs::read_to_string(path).map_err(|e| SchemaError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let document: Value = serde_yaml::from_str(&content).map_err(|e| SchemaError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (schema, validation) = Schema::from_document(&document, path)?;

    Ok(LoadedSchema {
        schema,
        validation,
        path: path.to_path_buf(),
    })
}
