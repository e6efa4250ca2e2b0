//! Path validation for backup schemas.
//!
//! Validation never fails: every problem, including malformed input, is
//! reported as a human-readable entry in [`PathValidation::problems`].
//! Results describe the filesystem at call time only.

use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;

/// Outcome of checking a schema's sources and destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathValidation {
    pub is_valid: bool,
    pub problems: Vec<String>,
}

impl PathValidation {
    fn from_problems(problems: Vec<String>) -> Self {
        Self {
            is_valid: problems.is_empty(),
            problems,
        }
    }

    /// Problems joined into a single line.
    pub fn summary(&self) -> String {
        self.problems.join(", ")
    }
}

/// Checks that the destination and every source exist.
pub fn validate_paths<S: AsRef<str>>(sources: &[S], destination: &str) -> PathValidation {
    let mut problems = Vec::new();

    check_destination(Some(destination), &mut problems);

    if sources.is_empty() {
        problems.push("No source paths configured".to_string());
    }
    for source in sources {
        let source = source.as_ref();
        if !exists(source) {
            problems.push(format!("Source: {}", source));
        }
    }

    PathValidation::from_problems(problems)
}

/// Validates a raw schema document as read from disk.
///
/// Unlike [`validate_paths`] this accepts whatever shape the YAML has: a
/// `sources` key that is not a list or a `destination` that is not a string
/// becomes a problem entry instead of an error.
pub fn validate_document(document: &Value) -> PathValidation {
    let mapping = match document.as_mapping() {
        Some(mapping) if !mapping.is_empty() => mapping,
        _ => return PathValidation::from_problems(vec!["Schema data is empty".to_string()]),
    };

    let mut problems = Vec::new();

    let mut malformed_sources = false;
    let sources: &[Value] = match mapping.get("sources") {
        Some(Value::Sequence(items)) => items.as_slice(),
        Some(Value::Null) | None => &[],
        Some(_) => {
            malformed_sources = true;
            problems.push("Sources format is invalid".to_string());
            &[]
        }
    };

    check_destination(mapping.get("destination").and_then(Value::as_str), &mut problems);

    if sources.is_empty() && !malformed_sources {
        problems.push("No source paths configured".to_string());
    }
    for source in sources {
        match source.as_str() {
            Some(path) if exists(path) => {}
            Some(path) => problems.push(format!("Source: {}", path)),
            None => problems.push(format!("Source: {}", render_scalar(source))),
        }
    }

    PathValidation::from_problems(problems)
}

fn check_destination(destination: Option<&str>, problems: &mut Vec<String>) {
    match destination {
        None | Some("") => problems.push("Destination path is missing or invalid".to_string()),
        Some(dest) if !exists(dest) => problems.push(format!("Destination: {}", dest)),
        Some(_) => {}
    }
}

fn exists(path: &str) -> bool {
    !path.is_empty() && Path::new(path).exists()
}

fn render_scalar(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_all_paths_exist() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();

        let result = validate_paths(
            &[src.to_string_lossy().to_string()],
            &dir.path().to_string_lossy(),
        );
        assert!(result.is_valid);
        assert!(result.problems.is_empty());
    }

    #[test]
    fn test_missing_source_is_reported() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let missing = missing.to_string_lossy().to_string();

        let result = validate_paths(&[missing.clone()], &dir.path().to_string_lossy());
        assert!(!result.is_valid);
        assert_eq!(result.problems, vec![format!("Source: {}", missing)]);
    }

    #[test]
    fn test_missing_destination_is_reported() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nowhere");
        let dest = dest.to_string_lossy().to_string();

        let result = validate_paths(&[dir.path().to_string_lossy().to_string()], &dest);
        assert!(!result.is_valid);
        assert!(result.problems[0].contains(&dest));
    }

    #[test]
    fn test_empty_destination() {
        let dir = TempDir::new().unwrap();
        let result = validate_paths(&[dir.path().to_string_lossy().to_string()], "");
        assert_eq!(
            result.problems,
            vec!["Destination path is missing or invalid".to_string()]
        );
    }

    #[test]
    fn test_every_missing_path_listed() {
        let result = validate_paths(&["/definitely/not/here/a", "/definitely/not/here/b"], "/");
        assert_eq!(result.problems.len(), 2);
        assert!(result.summary().contains("/definitely/not/here/a"));
        assert!(result.summary().contains("/definitely/not/here/b"));
    }

    #[test]
    fn test_no_sources() {
        let sources: [&str; 0] = [];
        let result = validate_paths(&sources, "/");
        assert!(!result.is_valid);
        assert_eq!(result.problems, vec!["No source paths configured".to_string()]);
    }

    #[test]
    fn test_document_sources_not_a_list() {
        let doc: Value =
            serde_yaml::from_str("schema_name: x\nsources: /tmp\ndestination: /\n").unwrap();
        let result = validate_document(&doc);
        assert!(!result.is_valid);
        assert_eq!(result.problems, vec!["Sources format is invalid".to_string()]);
    }

    #[test]
    fn test_document_destination_wrong_type() {
        let doc: Value =
            serde_yaml::from_str("schema_name: x\nsources: [/]\ndestination: 42\n").unwrap();
        let result = validate_document(&doc);
        assert_eq!(
            result.problems,
            vec!["Destination path is missing or invalid".to_string()]
        );
    }

    #[test]
    fn test_document_non_string_source() {
        let doc: Value =
            serde_yaml::from_str("schema_name: x\nsources: [/, 7]\ndestination: /\n").unwrap();
        let result = validate_document(&doc);
        assert_eq!(result.problems, vec!["Source: 7".to_string()]);
    }

    #[test]
    fn test_document_empty() {
        let result = validate_document(&Value::Null);
        assert_eq!(result.problems, vec!["Schema data is empty".to_string()]);
    }
}
