use kmeta_core::{KmetaError, KmetaResult, Manifest, Provider, ResourceKind, ResourceRef};
use kmeta_generate::{
    AgentEdits, AgentParams, McpServerParams, ModelConfigParams, Permissions, PolicyRule, RemoteMcpServerParams, Skill, ToolRef,
};

use crate::{Args, Context, ToolOutcome, ToolServer};

fn yaml(m: &Manifest) -> KmetaResult<String> { Ok(m.to_yaml()?) }

impl ToolServer {
    pub(crate) fn create_agent_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let params = AgentParams {
            name: args.string("name")?,
            description: args.string("description")?,
            system_message: args.string("system_message")?,
            model_config: args.string("model_config")?,
            tools: args.json_list::<ToolRef>("tools_json")?,
            skills: args.json_list::<Skill>("skills_json")?,
        };
        let m = kmeta_generate::agent(&params, &self.namespace)?;
        Ok(format!(
            "# Generated Agent Manifest\n# IMPORTANT: Review this manifest carefully before applying.\n# Use validate_manifest to check for issues, then apply_manifest to deploy.\n\n{}",
            yaml(&m)?
        ))
    }

    pub(crate) async fn update_agent_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let name = args.require("name")?;
        let edits = AgentEdits {
            description: args.str("description")?.map(String::from),
            system_message: args.str("system_message")?.map(String::from),
            model_config: args.str("model_config")?.map(String::from),
            add_tools: args.json_list::<ToolRef>("add_tools_json")?,
            remove_tool_servers: args.csv("remove_tool_servers")?,
        };
        let r = ResourceRef::new(ResourceKind::Agent, &self.namespace, name);
        let current = self.store.get(&r).await.context("Failed to get agent")?;
        let m = kmeta_generate::update_agent(current, &edits)?;
        Ok(format!(
            "# Updated Agent Manifest\n# IMPORTANT: Review the changes before applying.\n# Use diff_manifest to see changes, then apply_manifest to deploy.\n\n{}",
            yaml(&m)?
        ))
    }

    pub(crate) fn create_model_config_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let (name, provider, model, secret) =
            match (args.str("name")?, args.str("provider")?, args.str("model")?, args.str("api_key_secret")?) {
                (Some(n), Some(p), Some(m), Some(s)) => (n, p, m, s),
                _ => return Err(KmetaError::Input("name, provider, model, and api_key_secret are required".into()).into()),
            };
        let provider: Provider = provider.parse().map_err(|e: kmeta_core::UnknownProvider| KmetaError::Input(e.to_string()))?;
        let params = ModelConfigParams {
            name: name.into(),
            provider,
            model: model.into(),
            api_key_secret: secret.into(),
            api_key_secret_key: args.str("api_key_secret_key")?.map(String::from),
            base_url: args.str("base_url")?.map(String::from),
        };
        let m = kmeta_generate::model_config(&params, &self.namespace)?;
        Ok(format!(
            "# Generated ModelConfig Manifest\n# IMPORTANT: Ensure the Kubernetes Secret '{}' exists with key '{}' containing the API key.\n# Use validate_manifest to check, then apply_manifest to deploy.\n\n{}",
            secret,
            m.str_at("spec.apiKeySecretKey").unwrap_or_default(),
            yaml(&m)?
        ))
    }

    pub(crate) fn create_mcp_server_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let (name, server_type) = match (args.str("name")?, args.str("server_type")?) {
            (Some(n), Some(t)) => (n, t),
            _ => return Err(KmetaError::Input("name and server_type are required".into()).into()),
        };
        let description = args.string("description")?;
        match server_type.parse::<ResourceKind>() {
            Ok(ResourceKind::McpServer) => {
                let port = match args.number("port")? {
                    None => None,
                    Some(p) if (1.0..=f64::from(u16::MAX)).contains(&p) && p.fract() == 0.0 => Some(p as u16),
                    Some(p) => return Err(KmetaError::Input(format!("port must be an integer between 1 and 65535 (got {p})")).into()),
                };
                let params = McpServerParams {
                    name: name.into(),
                    description,
                    image: args.string("image")?,
                    command: args.str("command")?.map(String::from),
                    args: args.json_list::<String>("args_json")?,
                    port,
                };
                let m = kmeta_generate::mcp_server(&params, &self.namespace)?;
                Ok(format!(
                    "# Generated MCPServer Manifest\n# This creates a local MCP server running as a container with stdio transport.\n# Use validate_manifest to check, then apply_manifest to deploy.\n\n{}",
                    yaml(&m)?
                ))
            }
            Ok(ResourceKind::RemoteMcpServer) => {
                let params = RemoteMcpServerParams {
                    name: name.into(),
                    description,
                    url: args.string("url")?,
                    protocol: args.str("protocol")?.map(String::from),
                    timeout: args.str("timeout")?.map(String::from),
                };
                let m = kmeta_generate::remote_mcp_server(&params, &self.namespace)?;
                Ok(format!(
                    "# Generated RemoteMCPServer Manifest\n# This connects to an external MCP server at {} using {} protocol.\n# Use validate_manifest to check, then apply_manifest to deploy.\n\n{}",
                    m.str_at("spec.url").unwrap_or_default(),
                    m.str_at("spec.protocol").unwrap_or_default(),
                    yaml(&m)?
                ))
            }
            _ => Err(KmetaError::Input("server_type must be 'MCPServer' or 'RemoteMCPServer'".into()).into()),
        }
    }

    pub(crate) fn generate_rbac_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let name = args.require("name")?;
        let permissions: Permissions = args.str("permissions")?.map(str::parse::<Permissions>).transpose()?.unwrap_or_default();
        let extra = args.json_list::<PolicyRule>("additional_rules_json")?;
        let docs = kmeta_generate::rbac(name, permissions, &extra, &self.namespace)?;

        let mut out = format!(
            "# Generated RBAC Manifests for '{name}'\n# Permission level: {}\n# {}\n# Review these manifests before applying.\n\n",
            permissions.as_str(),
            permissions.describe()
        );
        for d in &docs {
            out.push_str("---\n");
            out.push_str(&yaml(d)?);
        }
        Ok(out)
    }
}
