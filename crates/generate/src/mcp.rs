use serde_json::json;

use kmeta_core::{KmetaError, KmetaResult, Manifest, ResourceKind};

pub const DEFAULT_MCP_PORT: u16 = 3000;

/// In-cluster MCP server container speaking stdio.
#[derive(Debug, Clone, Default)]
pub struct McpServerParams {
    pub name: String,
    pub description: String,
    pub image: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteMcpServerParams {
    pub name: String,
    pub description: String,
    pub url: String,
    /// STREAMABLE_HTTP when unset.
    pub protocol: Option<String>,
    /// 30s when unset.
    pub timeout: Option<String>,
}

pub fn mcp_server(p: &McpServerParams, namespace: &str) -> KmetaResult<Manifest> {
    if p.name.is_empty() {
        return Err(KmetaError::Input("name and server_type are required".into()));
    }
    if p.image.is_empty() {
        return Err(KmetaError::Input("image is required for MCPServer type".into()));
    }
    let mut deployment = json!({ "image": p.image });
    if let Some(cmd) = p.command.as_deref().filter(|s| !s.is_empty()) {
        deployment["cmd"] = json!(cmd);
    }
    if !p.args.is_empty() {
        deployment["args"] = json!(p.args);
    }
    deployment["port"] = json!(p.port.unwrap_or(DEFAULT_MCP_PORT));

    let mut spec = json!({});
    if !p.description.is_empty() {
        spec["description"] = json!(p.description);
    }
    spec["deployment"] = deployment;
    spec["transportType"] = json!("stdio");
    spec["stdioTransport"] = json!({});

    let mut m = Manifest::new(ResourceKind::McpServer.api_version(), ResourceKind::McpServer.as_str());
    m.set_path("metadata", json!({ "name": p.name, "namespace": namespace }));
    m.set_path("spec", spec);
    Ok(m)
}

pub fn remote_mcp_server(p: &RemoteMcpServerParams, namespace: &str) -> KmetaResult<Manifest> {
    if p.name.is_empty() {
        return Err(KmetaError::Input("name and server_type are required".into()));
    }
    if p.url.is_empty() {
        return Err(KmetaError::Input("url is required for RemoteMCPServer type".into()));
    }
    let protocol = p.protocol.as_deref().filter(|s| !s.is_empty()).unwrap_or("STREAMABLE_HTTP");
    let timeout = p.timeout.as_deref().filter(|s| !s.is_empty()).unwrap_or("30s");

    let mut spec = json!({});
    if !p.description.is_empty() {
        spec["description"] = json!(p.description);
    }
    spec["url"] = json!(p.url);
    spec["protocol"] = json!(protocol);
    spec["timeout"] = json!(timeout);
    spec["sseReadTimeout"] = json!("5m0s");
    spec["terminateOnClose"] = json!(true);

    let mut m = Manifest::new(ResourceKind::RemoteMcpServer.api_version(), ResourceKind::RemoteMcpServer.as_str());
    m.set_path("metadata", json!({ "name": p.name, "namespace": namespace }));
    m.set_path("spec", spec);
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_server_defaults() {
        let p = McpServerParams { name: "fs".into(), image: "mcp/filesystem:1.0".into(), ..Default::default() };
        let m = mcp_server(&p, "kagent").unwrap();
        assert_eq!(m.api_version(), Some("kagent.dev/v1alpha1"));
        assert_eq!(
            m.get_path("spec"),
            Some(&json!({
                "deployment": { "image": "mcp/filesystem:1.0", "port": 3000 },
                "transportType": "stdio",
                "stdioTransport": {}
            }))
        );
    }

    #[test]
    fn stdio_server_with_command() {
        let p = McpServerParams {
            name: "fs".into(),
            image: "node:22".into(),
            command: Some("npx".into()),
            args: vec!["-y".into(), "@modelcontextprotocol/server-filesystem".into()],
            port: Some(8080),
            ..Default::default()
        };
        let m = mcp_server(&p, "kagent").unwrap();
        assert_eq!(m.str_at("spec.deployment.cmd"), Some("npx"));
        assert_eq!(m.get_path("spec.deployment.port"), Some(&json!(8080)));
        assert_eq!(m.get_path("spec.deployment.args").and_then(|a| a.as_array()).map(Vec::len), Some(2));
    }

    #[test]
    fn remote_server_defaults() {
        let p = RemoteMcpServerParams { name: "docs".into(), url: "https://mcp.example.com/mcp".into(), ..Default::default() };
        let m = remote_mcp_server(&p, "kagent").unwrap();
        assert_eq!(m.str_at("spec.protocol"), Some("STREAMABLE_HTTP"));
        assert_eq!(m.str_at("spec.timeout"), Some("30s"));
        assert_eq!(m.str_at("spec.sseReadTimeout"), Some("5m0s"));
        assert_eq!(m.get_path("spec.terminateOnClose"), Some(&json!(true)));
    }

    #[test]
    fn required_fields_per_type() {
        let e = mcp_server(&McpServerParams { name: "fs".into(), ..Default::default() }, "kagent").unwrap_err();
        assert_eq!(e.to_string(), "image is required for MCPServer type");
        let e = remote_mcp_server(&RemoteMcpServerParams { name: "r".into(), ..Default::default() }, "kagent").unwrap_err();
        assert_eq!(e.to_string(), "url is required for RemoteMCPServer type");
    }
}
