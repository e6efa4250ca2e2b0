//! Schema management commands.

use serde::Serialize;

use backitup::schema::{LoadedSchema, Schema, SchemaStore};
use backitup::{BackitupError, SchemaError};

/// Envelope for `--json` output.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

pub fn print_json<T: Serialize>(response: &ApiResponse<T>) {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize output: {}", e),
    }
}

fn print_schema(loaded: &LoadedSchema) {
    let marker = if loaded.is_valid() { "ok" } else { "invalid" };
    println!("{} [{}]", loaded.name(), marker);
    for source in &loaded.schema.sources {
        println!("  source:      {}", source);
    }
    println!("  destination: {}", loaded.schema.destination);
    for problem in loaded.invalid_paths() {
        println!("  missing:     {}", problem);
    }
}

pub fn list(store: &SchemaStore, json: bool) -> Result<bool, BackitupError> {
    let schemas = store.load_all();
    if json {
        let all: Vec<&LoadedSchema> = schemas.values().collect();
        print_json(&ApiResponse::ok(all));
        return Ok(true);
    }

    if schemas.is_empty() {
        println!("No schemas in {}", store.dir().display());
    }
    for loaded in schemas.values() {
        print_schema(loaded);
    }
    Ok(true)
}

pub fn show(store: &SchemaStore, name: &str, json: bool) -> Result<bool, BackitupError> {
    let loaded = store
        .load(name)?
        .ok_or_else(|| SchemaError::NotFound(name.to_string()))?;
    if json {
        print_json(&ApiResponse::ok(&loaded));
    } else {
        print_schema(&loaded);
    }
    Ok(true)
}

pub fn save(
    store: &SchemaStore,
    schema: Schema,
    force: bool,
    json: bool,
) -> Result<bool, BackitupError> {
    if store.exists(&schema.name) && !force {
        let message = format!(
            "Schema '{}' already exists; pass --force to overwrite it",
            schema.name
        );
        if json {
            print_json(&ApiResponse::<()>::err(message));
        } else {
            eprintln!("{}", message);
        }
        return Ok(false);
    }

    let validation = schema.validate();
    let path = store.save(&schema)?;

    if json {
        print_json(&ApiResponse::ok(path.display().to_string()));
        return Ok(true);
    }
    println!("Saved '{}' to {}", schema.name, path.display());
    if !validation.is_valid {
        println!("Warning: {}", validation.summary());
    }
    Ok(true)
}

pub fn delete(store: &SchemaStore, name: &str, json: bool) -> Result<bool, BackitupError> {
    store.delete(name)?;
    if json {
        print_json(&ApiResponse::ok(name));
    } else {
        println!("Deleted '{}'", name);
    }
    Ok(true)
}

pub fn validate(store: &SchemaStore, name: &str, json: bool) -> Result<bool, BackitupError> {
    let loaded = store
        .load(name)?
        .ok_or_else(|| SchemaError::NotFound(name.to_string()))?;
    let validation = loaded.schema.validate();

    if json {
        print_json(&ApiResponse::ok(&validation));
    } else if validation.is_valid {
        println!("'{}' is valid", name);
    } else {
        println!("'{}' is invalid:", name);
        for problem in &validation.problems {
            println!("  {}", problem);
        }
    }
    Ok(validation.is_valid)
}
