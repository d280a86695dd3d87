//! kmeta tool layer.
//!
//! Every operation is a named tool taking a flat argument object and
//! returning text. Failures of any kind come back as an error result; the
//! server keeps serving across arbitrary input.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::{info, warn};

use kmeta_apply::Reconciler;
use kmeta_core::KmetaError;
use kmeta_kubehub::ResourceStore;
use kmeta_validate::Validator;

mod args;
pub mod catalogue;
mod discovery;
mod generation;
mod manifests;
pub mod rpc;

use args::Args;
pub use catalogue::{ParamType, ToolSpec, TOOLS};

/// Text payload of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub text: String,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(text: impl Into<String>) -> Self { Self { text: text.into(), is_error: false } }

    pub fn error(text: impl Into<String>) -> Self { Self { text: text.into(), is_error: true } }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// Store failure annotated with the operation that hit it.
    #[error("{context}: {source}")]
    Failed { context: &'static str, source: KmetaError },
    #[error(transparent)]
    Kmeta(#[from] KmetaError),
}

pub type ToolOutcome = Result<String, ToolError>;

/// Prefix store failures with what was being attempted. Input and parse
/// errors already say what went wrong and pass through unchanged.
pub(crate) trait Context<T> {
    fn context(self, context: &'static str) -> Result<T, ToolError>;
}

impl<T, E: Into<KmetaError>> Context<T> for Result<T, E> {
    fn context(self, context: &'static str) -> Result<T, ToolError> {
        self.map_err(|e| match e.into() {
            e @ KmetaError::Store(_) => ToolError::Failed { context, source: e },
            e => ToolError::Kmeta(e),
        })
    }
}

/// Shared state of every tool: the store and the configured namespace.
pub struct ToolServer {
    store: Arc<dyn ResourceStore>,
    validator: Validator,
    reconciler: Reconciler,
    namespace: String,
}

impl ToolServer {
    pub fn new(store: Arc<dyn ResourceStore>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            validator: Validator::new(store.clone(), namespace.clone()),
            reconciler: Reconciler::new(store.clone(), namespace.clone()),
            store,
            namespace,
        }
    }

    pub fn namespace(&self) -> &str { &self.namespace }

    pub fn tools(&self) -> &'static [ToolSpec] { TOOLS }

    /// Invoke a tool by name. Never fails; errors are folded into the result.
    pub async fn call(&self, name: &str, args: &Map<String, Json>) -> ToolResult {
        let t0 = Instant::now();
        let Some(spec) = catalogue::find(name) else {
            warn!(tool = %name, "api: unknown tool");
            return ToolResult::error(ToolError::UnknownTool(name.to_string()).to_string());
        };
        info!(tool = spec.name, "api: call start");
        let res = self.dispatch(spec.name, Args(args)).await;
        let ms = t0.elapsed().as_secs_f64() * 1000.0;
        histogram!("tool_latency_ms", ms, "tool" => spec.name);
        match res {
            Ok(text) => {
                counter!("tool_calls_ok", 1u64, "tool" => spec.name);
                info!(tool = spec.name, took_ms = %t0.elapsed().as_millis(), "api: call ok");
                ToolResult::ok(text)
            }
            Err(e) => {
                counter!("tool_calls_err", 1u64, "tool" => spec.name);
                warn!(tool = spec.name, error = %e, took_ms = %t0.elapsed().as_millis(), "api: call failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    async fn dispatch(&self, name: &'static str, args: Args<'_>) -> ToolOutcome {
        match name {
            "list_agents" => self.list_agents(args).await,
            "get_agent" => self.get_agent(args).await,
            "list_model_configs" => self.list_model_configs().await,
            "list_mcp_servers" => self.list_mcp_servers(args).await,
            "create_agent_manifest" => self.create_agent_manifest(args),
            "update_agent_manifest" => self.update_agent_manifest(args).await,
            "create_model_config_manifest" => self.create_model_config_manifest(args),
            "create_mcp_server_manifest" => self.create_mcp_server_manifest(args),
            "generate_rbac_manifest" => self.generate_rbac_manifest(args),
            "validate_manifest" => self.validate_manifest(args).await,
            "diff_manifest" => self.diff_manifest(args).await,
            "apply_manifest" => self.apply_manifest(args).await,
            "delete_agent" => self.delete_agent(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmeta_core::{ResourceKind, ResourceRef, StoreError};

    #[test]
    fn context_only_wraps_store_failures() {
        let store: Result<(), StoreError> = Err(StoreError::Backend("down".into()));
        assert_eq!(store.context("Failed to list agents").unwrap_err().to_string(), "Failed to list agents: store backend: down");

        let input: Result<(), KmetaError> = Err(KmetaError::Input("name is required".into()));
        assert_eq!(input.context("Failed to get agent").unwrap_err().to_string(), "name is required");

        let missing: Result<(), StoreError> =
            Err(StoreError::not_found(&ResourceRef::new(ResourceKind::Agent, "kagent", "x")));
        assert_eq!(
            missing.context("Failed to get agent").unwrap_err().to_string(),
            "Failed to get agent: Agent 'x' not found in namespace 'kagent'"
        );
    }
}
