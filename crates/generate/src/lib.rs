//! kmeta generate: manifest templates.
//!
//! Every template is a pure function from a parameter struct and a target
//! namespace to a manifest tree. Nothing here reads or writes a store; the
//! caller fetches whatever an edit starts from.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use kmeta_core::{KmetaError, KmetaResult, Manifest, ResourceKind};

mod mcp;
mod model;
mod rbac;

pub use mcp::{mcp_server, remote_mcp_server, McpServerParams, RemoteMcpServerParams, DEFAULT_MCP_PORT};
pub use model::{model_config, ModelConfigParams};
pub use rbac::{rbac, Permissions, PolicyRule};

/// Tools an agent uses from one MCP server (`tools_json` element).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRef {
    #[serde(rename = "mcpServer")]
    pub mcp_server: String,
    /// MCPServer when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ToolRef {
    fn to_spec(&self) -> Json {
        let kind = if self.kind.is_empty() { ResourceKind::McpServer.as_str() } else { self.kind.as_str() };
        let mut server = json!({ "name": self.mcp_server, "kind": kind });
        if !self.tools.is_empty() {
            server["toolNames"] = json!(self.tools);
        }
        json!({ "type": "McpServer", "mcpServer": server })
    }
}

/// A2A skill advertised by an agent (`skills_json` element).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AgentParams {
    pub name: String,
    pub description: String,
    pub system_message: String,
    pub model_config: String,
    pub tools: Vec<ToolRef>,
    pub skills: Vec<Skill>,
}

/// Declarative Agent.
pub fn agent(p: &AgentParams, namespace: &str) -> KmetaResult<Manifest> {
    if p.name.is_empty() || p.system_message.is_empty() || p.model_config.is_empty() {
        return Err(KmetaError::Input("name, system_message, and model_config are required".into()));
    }
    let mut declarative = json!({ "modelConfig": p.model_config, "systemMessage": p.system_message });
    if !p.tools.is_empty() {
        declarative["tools"] = Json::Array(p.tools.iter().map(ToolRef::to_spec).collect());
    }
    let mut spec = json!({ "type": "Declarative" });
    if !p.description.is_empty() {
        spec["description"] = json!(p.description);
    }
    spec["declarative"] = declarative;
    if !p.skills.is_empty() {
        spec["a2aConfig"] = json!({ "skills": p.skills });
    }

    let mut m = Manifest::new(ResourceKind::Agent.api_version(), ResourceKind::Agent.as_str());
    m.set_path("metadata", json!({ "name": p.name, "namespace": namespace }));
    m.set_path("spec", spec);
    Ok(m)
}

/// Modifications to an existing Agent. Empty fields leave the current value alone.
#[derive(Debug, Clone, Default)]
pub struct AgentEdits {
    pub description: Option<String>,
    pub system_message: Option<String>,
    pub model_config: Option<String>,
    pub add_tools: Vec<ToolRef>,
    /// Tool entries served by these MCP servers are dropped before `add_tools` is appended.
    pub remove_tool_servers: Vec<String>,
}

impl AgentEdits {
    fn touches_declarative(&self) -> bool {
        self.system_message.as_deref().is_some_and(|s| !s.is_empty())
            || self.model_config.as_deref().is_some_and(|s| !s.is_empty())
            || !self.add_tools.is_empty()
            || !self.remove_tool_servers.is_empty()
    }
}

/// Apply `edits` to a fetched Agent, returning a manifest ready for diff/apply.
pub fn update_agent(mut current: Manifest, edits: &AgentEdits) -> KmetaResult<Manifest> {
    current.strip_server_managed();
    current.set_str_at("apiVersion", ResourceKind::Agent.api_version());
    current.set_str_at("kind", ResourceKind::Agent.as_str());

    if let Some(d) = edits.description.as_deref().filter(|s| !s.is_empty()) {
        current.set_str_at("spec.description", d);
    }
    if !edits.touches_declarative() {
        return Ok(current);
    }
    if !current.get_path("spec.declarative").is_some_and(Json::is_object) {
        return Err(KmetaError::Input(format!(
            "Agent '{}' has no declarative spec; system_message, model_config and tools cannot be changed",
            current.name().unwrap_or_default()
        )));
    }

    if let Some(s) = edits.system_message.as_deref().filter(|s| !s.is_empty()) {
        current.set_str_at("spec.declarative.systemMessage", s);
    }
    if let Some(mc) = edits.model_config.as_deref().filter(|s| !s.is_empty()) {
        current.set_str_at("spec.declarative.modelConfig", mc);
    }

    if !edits.add_tools.is_empty() || !edits.remove_tool_servers.is_empty() {
        let existing = current.get_path("spec.declarative.tools").and_then(Json::as_array).cloned().unwrap_or_default();
        let mut tools: Vec<Json> = existing
            .into_iter()
            .filter(|t| {
                let server = t.pointer("/mcpServer/name").and_then(Json::as_str);
                !server.is_some_and(|n| edits.remove_tool_servers.iter().any(|r| r == n))
            })
            .collect();
        tools.extend(edits.add_tools.iter().map(ToolRef::to_spec));
        if tools.is_empty() {
            current.remove_path("spec.declarative.tools");
        } else {
            current.set_path("spec.declarative.tools", Json::Array(tools));
        }
    }
    Ok(current)
}
