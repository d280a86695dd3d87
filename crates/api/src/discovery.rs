//! Read-only tools over live state.

use serde_json::{json, Map, Value as Json};

use kmeta_core::{KmetaError, Manifest, ResourceKind, ResourceRef};

use crate::{Args, Context, ToolOutcome, ToolServer};

fn pretty(rows: &[Json]) -> ToolOutcome {
    serde_json::to_string_pretty(rows).map_err(|e| KmetaError::Input(format!("encoding result: {e}")).into())
}

fn text(m: &Manifest, path: &str) -> Json { json!(m.str_at(path).unwrap_or_default()) }

fn identity(m: &Manifest) -> Map<String, Json> {
    let mut row = Map::new();
    row.insert("name".into(), text(m, "metadata.name"));
    row.insert("namespace".into(), text(m, "metadata.namespace"));
    row
}

impl ToolServer {
    pub(crate) async fn list_agents(&self, args: Args<'_>) -> ToolOutcome {
        let include_status = args.bool_or("include_status", false)?;
        let agents = self.store.list(ResourceKind::Agent, &self.namespace).await.context("Failed to list agents")?;
        if agents.is_empty() {
            return Ok("No agents found in the namespace.".into());
        }
        let rows: Vec<Json> = agents
            .iter()
            .map(|a| {
                let mut row = identity(a);
                row.insert("type".into(), text(a, "spec.type"));
                row.insert("description".into(), text(a, "spec.description"));
                if a.get_path("spec.declarative").is_some_and(Json::is_object) {
                    row.insert("modelConfig".into(), text(a, "spec.declarative.modelConfig"));
                    let tools = a.get_path("spec.declarative.tools").and_then(Json::as_array).map_or(0, Vec::len);
                    row.insert("toolCount".into(), json!(tools));
                }
                if include_status {
                    for flag in ["ready", "accepted"] {
                        let v = a.get_path(&format!("status.{flag}")).and_then(Json::as_bool).unwrap_or(false);
                        row.insert(flag.into(), json!(v));
                    }
                }
                Json::Object(row)
            })
            .collect();
        pretty(&rows)
    }

    pub(crate) async fn get_agent(&self, args: Args<'_>) -> ToolOutcome {
        let name = args.require("name")?;
        let format = args.str("output_format")?.unwrap_or("yaml");
        if format != "yaml" && format != "json" {
            return Err(KmetaError::Input("output_format must be 'yaml' or 'json'".into()).into());
        }
        let r = ResourceRef::new(ResourceKind::Agent, &self.namespace, name);
        let mut agent = self.store.get(&r).await.context("Failed to get agent")?;
        agent.set_str_at("apiVersion", ResourceKind::Agent.api_version());
        agent.set_str_at("kind", ResourceKind::Agent.as_str());
        let out = if format == "json" { agent.to_json_pretty() } else { agent.to_yaml() };
        Ok(out.map_err(KmetaError::from)?)
    }

    pub(crate) async fn list_model_configs(&self) -> ToolOutcome {
        let configs =
            self.store.list(ResourceKind::ModelConfig, &self.namespace).await.context("Failed to list model configs")?;
        if configs.is_empty() {
            return Ok("No ModelConfigs found in the namespace. Use create_model_config_manifest to create one.".into());
        }
        let rows: Vec<Json> = configs
            .iter()
            .map(|c| {
                let mut row = identity(c);
                for (key, path) in [("provider", "spec.provider"), ("model", "spec.model"), ("apiKeySecret", "spec.apiKeySecret")] {
                    row.insert(key.into(), text(c, path));
                }
                Json::Object(row)
            })
            .collect();
        pretty(&rows)
    }

    pub(crate) async fn list_mcp_servers(&self, args: Args<'_>) -> ToolOutcome {
        let include_remote = args.bool_or("include_remote", true)?;
        let mut rows = Vec::new();
        let local = self.store.list(ResourceKind::McpServer, &self.namespace).await.context("Failed to list MCP servers")?;
        for s in &local {
            let mut row = identity(s);
            row.insert("kind".into(), json!(ResourceKind::McpServer.as_str()));
            row.insert("transportType".into(), text(s, "spec.transportType"));
            row.insert("description".into(), text(s, "spec.description"));
            if let Some(image) = s.str_at("spec.deployment.image") {
                row.insert("image".into(), json!(image));
            }
            rows.push(Json::Object(row));
        }
        if include_remote {
            let remote = self
                .store
                .list(ResourceKind::RemoteMcpServer, &self.namespace)
                .await
                .context("Failed to list remote MCP servers")?;
            for s in &remote {
                let mut row = identity(s);
                row.insert("kind".into(), json!(ResourceKind::RemoteMcpServer.as_str()));
                row.insert("url".into(), text(s, "spec.url"));
                row.insert("protocol".into(), text(s, "spec.protocol"));
                row.insert("description".into(), text(s, "spec.description"));
                rows.push(Json::Object(row));
            }
        }
        if rows.is_empty() {
            return Ok("No MCP servers found in the namespace. Use create_mcp_server_manifest to create one.".into());
        }
        pretty(&rows)
    }
}
