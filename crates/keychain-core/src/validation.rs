// ABOUTME: Field-scoped validation errors accumulated across schema and semantic checks.
// ABOUTME: Errors are dotted paths like "keychain_credential_create.attributes.public_key".

use serde::Serialize;
use std::fmt;

/// A single problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

/// An ordered collection of field errors, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Merge `child` with every path nested under `prefix`.
    pub fn add_child(&mut self, prefix: &str, child: ValidationErrors) {
        self.errors
            .extend(child.errors.into_iter().map(|e| ValidationError {
                path: format!("{prefix}.{}", e.path),
                message: e.message,
            }));
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    /// Messages recorded against exactly `path`.
    pub fn messages_for(&self, path: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// `Ok(())` when empty, otherwise the whole set as an error.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "[{}] {}", e.path, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_child_prefixes_paths() {
        let mut child = ValidationErrors::new();
        child.add("port", "Not an integer");
        child.add("host", "attribute required");

        let mut parent = ValidationErrors::new();
        parent.add("create.name", "taken");
        parent.add_child("create.attributes", child);

        let paths: Vec<&str> = parent.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["create.name", "create.attributes.port", "create.attributes.host"]
        );
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.add("x", "bad");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_display_lists_every_error() {
        let mut errors = ValidationErrors::new();
        errors.add("a.b", "first");
        errors.add("a.c", "second");
        assert_eq!(errors.to_string(), "[a.b] first; [a.c] second");
    }

    #[test]
    fn test_messages_for() {
        let mut errors = ValidationErrors::new();
        errors.add("s.public_key", "mismatch");
        errors.add("s.public_key", "invalid");
        errors.add("s.private_key", "bad");
        assert_eq!(errors.messages_for("s.public_key"), vec!["mismatch", "invalid"]);
        assert!(errors.messages_for("s.other").is_empty());
    }

    #[test]
    fn test_serializes_as_list() {
        let mut errors = ValidationErrors::new();
        errors.add("p", "m");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!([{"path": "p", "message": "m"}]));
    }
}
