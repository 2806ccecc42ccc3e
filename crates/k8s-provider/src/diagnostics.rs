//! Terraform-style diagnostics.
//!
//! Lifecycle operations fail with typed errors, which are presented to users as a
//! [`Diagnostic`] with a short summary and a detailed explanation. Plan validation instead
//! collects every problem into [`Diagnostics`], each pointing at the offending attribute.

use std::fmt::Display;

use serde::Serialize;

use crate::schema::AttributePath;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            path: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary, detail)
        }
    }

    /// Attaches `path`, unless it points at the resource root.
    pub fn with_path(mut self, path: AttributePath) -> Self {
        self.path = (!path.is_empty()).then_some(path);
        self
    }

    pub fn missing_required(path: AttributePath) -> Self {
        Self::error(
            "Missing required argument",
            format!(
                "The argument {path:?} is required, but no definition was found.",
                path = path.to_string()
            ),
        )
        .with_path(path)
    }

    pub fn unsupported_argument(path: AttributePath) -> Self {
        Self::error(
            "Unsupported argument",
            format!("An argument named {path:?} is not expected here.", path = path.to_string()),
        )
        .with_path(path)
    }

    pub fn read_only(path: AttributePath) -> Self {
        Self::error(
            "Invalid Configuration for Read-Only Attribute",
            format!(
                "Cannot set value for attribute {path:?} as it is computed by the provider.",
                path = path.to_string()
            ),
        )
        .with_path(path)
    }

    pub fn incorrect_type(path: AttributePath, expected: impl Display) -> Self {
        Self::error(
            "Incorrect attribute value type",
            format!(
                "Inappropriate value for attribute {path:?}: {expected} required.",
                path = path.to_string()
            ),
        )
        .with_path(path)
    }

    pub fn invalid_value(path: AttributePath, detail: impl Display) -> Self {
        Self::error(
            "Invalid Attribute Value",
            format!("Attribute {path} {detail}"),
        )
        .with_path(path)
    }

    pub fn requires_replace(path: AttributePath) -> Self {
        Self::error(
            "Resource requires replacement",
            format!(
                "Changing {path:?} forces the resource to be destroyed and created again.",
                path = path.to_string()
            ),
        )
        .with_path(path)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if let Some(path) = &self.path {
            write!(f, " (at {path})")?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// An ordered collection of [`Diagnostic`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Returns the diagnostics which point at exactly the given path.
    pub fn at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.0.iter().filter(move |diagnostic| {
            diagnostic
                .path
                .as_ref()
                .is_some_and(|p| p.to_string() == path)
        })
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
