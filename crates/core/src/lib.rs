//! kmeta core types: manifests, kinds, identities, validation issues and errors.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod kind;
pub mod manifest;

pub use kind::{Provider, ResourceKind, UnknownKind, UnknownProvider, KAGENT_GROUP};
pub use manifest::{Manifest, ParseLimits, SERVER_MANAGED_METADATA};

/// Sole external key of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { kind, namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Severity::Error => "error", Severity::Warning => "warning" })
    }
}

/// One finding of the validator. `Error` blocks an apply by convention; `Warning` is advisory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Dotted path of the offending field (`spec.declarative.modelConfig`).
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, field: field.into(), message: message.into() }
    }

    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, field: field.into(), message: message.into() }
    }

    pub fn is_error(&self) -> bool { self.severity == Severity::Error }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Created,
    Updated,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { ApplyAction::Created => "created", ApplyAction::Updated => "updated" })
    }
}

/// What an apply did, or would do under dry-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub action: ApplyAction,
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "dryRun")]
    pub dry_run: bool,
}

/// Manifest text could not be turned into (or back from) a document tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid YAML: {0}")]
    Yaml(String),
    #[error("manifest must be a mapping at the top level")]
    NotAMapping,
    #[error("YAML payload too large (>{0} bytes)")]
    TooLarge(usize),
    #[error("YAML document too complex (>{0} nodes)")]
    TooComplex(usize),
    #[error("encoding manifest: {0}")]
    Encode(String),
}

/// Failures reported by a resource store. Propagated verbatim, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound { kind: ResourceKind, namespace: String, name: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("api error ({code}): {message}")]
    Api { code: u16, message: String },
    #[error("store backend: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(r: &ResourceRef) -> Self {
        StoreError::NotFound { kind: r.kind, namespace: r.namespace.clone(), name: r.name.clone() }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, StoreError::NotFound { .. }) }

    pub fn is_conflict(&self) -> bool { matches!(self, StoreError::Conflict(_)) }
}

/// Caller-visible error taxonomy shared by the reconciler and the tool layer.
#[derive(Debug, thiserror::Error)]
pub enum KmetaError {
    /// Missing or unusable argument; no store call was attempted.
    #[error("{0}")]
    Input(String),
    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UnknownKind> for KmetaError {
    fn from(e: UnknownKind) -> Self { KmetaError::Input(e.to_string()) }
}

pub type KmetaResult<T> = Result<T, KmetaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_serializes_with_lowercase_severity() {
        let i = ValidationIssue::warning("spec.description", "missing");
        let v = serde_json::to_value(&i).unwrap();
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["field"], "spec.description");
    }

    #[test]
    fn outcome_uses_dry_run_camel_case() {
        let o = ApplyOutcome {
            action: ApplyAction::Updated,
            kind: ResourceKind::McpServer,
            name: "fs".into(),
            namespace: "kagent".into(),
            dry_run: true,
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["action"], "updated");
        assert_eq!(v["kind"], "MCPServer");
        assert_eq!(v["dryRun"], true);
    }

    #[test]
    fn store_errors_render_identity() {
        let r = ResourceRef::new(ResourceKind::ModelConfig, "kagent", "gpt");
        assert_eq!(StoreError::not_found(&r).to_string(), "ModelConfig 'gpt' not found in namespace 'kagent'");
        assert_eq!(r.to_string(), "ModelConfig kagent/gpt");
    }
}
