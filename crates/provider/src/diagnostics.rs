//! Building tfplugin6 diagnostics

use crate::tfplugin6::{attribute_path, diagnostic, AttributePath, Diagnostic};

pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Diagnostic {
    Diagnostic {
        severity: diagnostic::Severity::Error as i32,
        summary: summary.into(),
        detail: detail.into(),
        attribute: None,
    }
}

pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Diagnostic {
    Diagnostic {
        severity: diagnostic::Severity::Warning as i32,
        summary: summary.into(),
        detail: detail.into(),
        attribute: None,
    }
}

/// Attach the attribute the diagnostic refers to
pub fn at(mut diagnostic: Diagnostic, path: &[PathStep]) -> Diagnostic {
    diagnostic.attribute = Some(attribute_path(path));
    diagnostic
}

/// One step of a path into a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Attribute(String),
    Index(i64),
}

pub fn attribute_path(steps: &[PathStep]) -> AttributePath {
    AttributePath {
        steps: steps
            .iter()
            .map(|step| attribute_path::Step {
                selector: Some(match step {
                    PathStep::Attribute(name) => {
                        attribute_path::step::Selector::AttributeName(name.clone())
                    }
                    PathStep::Index(i) => attribute_path::step::Selector::ElementKeyInt(*i),
                }),
            })
            .collect(),
    }
}

/// Path naming a single top-level attribute
pub fn attribute(name: &str) -> AttributePath {
    attribute_path(&[PathStep::Attribute(name.to_string())])
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.severity == diagnostic::Severity::Error as i32)
}

/// Render an error chain the way `anyhow` prints it with `{:#}`
pub fn from_anyhow(summary: &str, err: &anyhow::Error) -> Diagnostic {
    error(summary, format!("{:#}", err))
}
