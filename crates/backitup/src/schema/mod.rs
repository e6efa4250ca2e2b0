//! Backup schemas and their on-disk store.
//!
//! A schema is a named set of source paths and one destination. Each schema
//! is persisted as one YAML file in the store directory, addressed by the
//! sanitized form of its name.

pub mod model;
pub mod store;

pub use model::{LoadedSchema, Schema};
pub use store::SchemaStore;
