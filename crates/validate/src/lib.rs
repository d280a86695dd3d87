//! kmeta validate: rule-based checks over a generic manifest tree.
//!
//! Global checks run first (`apiVersion`, `kind`, `metadata.name`), then the
//! rule set of the manifest's kind. Every rule runs; nothing short-circuits,
//! so identical input always yields the identical issue sequence.

#![forbid(unsafe_code)]

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use kmeta_core::{Manifest, ParseError, Provider, ResourceKind, ResourceRef, Severity, ValidationIssue};
use kmeta_kubehub::ResourceStore;

mod report;

pub use report::render_report;

/// System messages shorter than this draw a strict-mode warning.
pub const MIN_SYSTEM_MESSAGE_CHARS: usize = 100;

pub const REMOTE_PROTOCOLS: [&str; 2] = ["STREAMABLE_HTTP", "SSE"];

pub struct Validator {
    store: Arc<dyn ResourceStore>,
    default_namespace: String,
}

impl Validator {
    pub fn new(store: Arc<dyn ResourceStore>, default_namespace: impl Into<String>) -> Self {
        Self { store, default_namespace: default_namespace.into() }
    }

    /// Parse then validate. A parse failure is returned instead of an issue list.
    pub async fn validate_text(&self, text: &str, strict: bool) -> Result<Vec<ValidationIssue>, ParseError> {
        let manifest = Manifest::from_yaml(text)?;
        Ok(self.validate(&manifest, strict).await)
    }

    pub async fn validate(&self, m: &Manifest, strict: bool) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if m.api_version().is_none() {
            issues.push(ValidationIssue::error("apiVersion", "apiVersion is required"));
        }
        if m.kind().is_none() {
            issues.push(ValidationIssue::error("kind", "kind is required"));
        }
        if m.name().is_none() {
            issues.push(ValidationIssue::error("metadata.name", "metadata.name is required"));
        }

        let raw_kind = m.kind().unwrap_or_default();
        match raw_kind.parse::<ResourceKind>() {
            Ok(ResourceKind::Agent) => issues.extend(self.agent(m, strict).await),
            Ok(ResourceKind::ModelConfig) => issues.extend(model_config(m)),
            Ok(ResourceKind::McpServer) => issues.extend(mcp_server(m)),
            Ok(ResourceKind::RemoteMcpServer) => issues.extend(remote_mcp_server(m)),
            Err(_) => issues.push(ValidationIssue::warning(
                "kind",
                format!("Unknown kind '{raw_kind}'. Expected: Agent, ModelConfig, MCPServer, or RemoteMCPServer"),
            )),
        }

        let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
        let warnings = issues.len() - errors;
        counter!("validate_runs", 1u64);
        counter!("validate_errors", errors as u64);
        counter!("validate_warnings", warnings as u64);
        debug!(kind = %raw_kind, name = m.name().unwrap_or("-"), strict, errors, warnings, "validate: done");
        issues
    }

    async fn agent(&self, m: &Manifest, strict: bool) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let spec_type = m.str_at("spec.type");
        if spec_type.is_none() {
            issues.push(ValidationIssue::error("spec.type", "spec.type is required (should be 'Declarative' or 'BYO')"));
        }

        if spec_type == Some("Declarative") {
            match m.str_at("spec.declarative.modelConfig") {
                None => issues.push(ValidationIssue::error(
                    "spec.declarative.modelConfig",
                    "spec.declarative.modelConfig is required for Declarative agents",
                )),
                Some(mc) => {
                    if let Some(issue) = self.model_config_reference(m, mc).await {
                        issues.push(issue);
                    }
                }
            }

            match m.str_at("spec.declarative.systemMessage") {
                None => issues.push(ValidationIssue::error(
                    "spec.declarative.systemMessage",
                    "spec.declarative.systemMessage is required for Declarative agents",
                )),
                Some(msg) if strict && msg.chars().count() < MIN_SYSTEM_MESSAGE_CHARS => {
                    issues.push(ValidationIssue::warning(
                        "spec.declarative.systemMessage",
                        format!(
                            "System message seems short ({} characters). Consider providing more detailed instructions for the agent.",
                            msg.chars().count()
                        ),
                    ))
                }
                Some(_) => {}
            }
        }

        if strict && m.str_at("spec.description").is_none() {
            issues.push(ValidationIssue::warning(
                "spec.description",
                "Consider adding a description to help users understand the agent's purpose",
            ));
        }
        issues
    }

    /// The referenced ModelConfig may be applied later, so a miss is only a warning.
    async fn model_config_reference(&self, m: &Manifest, mc: &str) -> Option<ValidationIssue> {
        let ns = m.namespace().unwrap_or(&self.default_namespace);
        let r = ResourceRef::new(ResourceKind::ModelConfig, ns, mc);
        match self.store.get_opt(&r).await {
            Ok(Some(_)) => None,
            Ok(None) => Some(ValidationIssue::warning(
                "spec.declarative.modelConfig",
                format!("ModelConfig '{mc}' not found in namespace '{ns}'. Ensure it exists before applying."),
            )),
            Err(e) => {
                warn!(error = %e, target_ref = %r, "validate: reference lookup failed");
                Some(ValidationIssue::warning(
                    "spec.declarative.modelConfig",
                    format!("Could not verify ModelConfig '{mc}' in namespace '{ns}': {e}"),
                ))
            }
        }
    }
}

fn model_config(m: &Manifest) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let provider = match m.str_at("spec.provider").map(str::parse::<Provider>) {
        None => {
            issues.push(ValidationIssue::error("spec.provider", "spec.provider is required"));
            None
        }
        Some(Err(e)) => {
            issues.push(ValidationIssue::error("spec.provider", e.to_string()));
            None
        }
        Some(Ok(p)) => Some(p),
    };

    if m.str_at("spec.model").is_none() {
        issues.push(ValidationIssue::error("spec.model", "spec.model is required"));
    }

    // an unknown or missing provider still needs a key
    if m.str_at("spec.apiKeySecret").is_none() && provider.map_or(true, |p| p.requires_api_key()) {
        issues.push(ValidationIssue::error("spec.apiKeySecret", "spec.apiKeySecret is required for non-Ollama providers"));
    }
    issues
}

fn mcp_server(m: &Manifest) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if m.str_at("spec.deployment.image").is_none() {
        issues.push(ValidationIssue::error("spec.deployment.image", "spec.deployment.image is required for MCPServer"));
    }
    if let Some(t) = m.str_at("spec.transportType").filter(|t| *t != "stdio") {
        issues.push(ValidationIssue::warning(
            "spec.transportType",
            format!("Unexpected transportType '{t}'. MCPServer typically uses 'stdio'"),
        ));
    }
    issues
}

fn remote_mcp_server(m: &Manifest) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match m.str_at("spec.url") {
        None => issues.push(ValidationIssue::error("spec.url", "spec.url is required for RemoteMCPServer")),
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
            issues.push(ValidationIssue::error("spec.url", "spec.url must start with http:// or https://"))
        }
        Some(_) => {}
    }
    if let Some(p) = m.str_at("spec.protocol").filter(|p| !REMOTE_PROTOCOLS.contains(p)) {
        issues.push(ValidationIssue::error(
            "spec.protocol",
            format!("spec.protocol must be 'STREAMABLE_HTTP' or 'SSE' (got '{p}')"),
        ));
    }
    issues
}
