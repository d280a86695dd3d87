//! Static tool catalogue: names, descriptions and argument schemas.

use serde_json::{json, Map, Value as Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Boolean,
    Number,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Number => "number",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

const fn required(name: &'static str, description: &'static str) -> Param {
    Param { name, ty: ParamType::String, required: true, description }
}

const fn string(name: &'static str, description: &'static str) -> Param {
    Param { name, ty: ParamType::String, required: false, description }
}

const fn boolean(name: &'static str, description: &'static str) -> Param {
    Param { name, ty: ParamType::Boolean, required: false, description }
}

const fn number(name: &'static str, description: &'static str) -> Param {
    Param { name, ty: ParamType::Number, required: false, description }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [Param],
}

impl ToolSpec {
    /// JSON schema of the argument object.
    pub fn input_schema(&self) -> Json {
        let mut props = Map::new();
        for p in self.params {
            props.insert(p.name.to_string(), json!({ "type": p.ty.as_str(), "description": p.description }));
        }
        let required: Vec<&str> = self.params.iter().filter(|p| p.required).map(|p| p.name).collect();
        json!({ "type": "object", "properties": props, "required": required })
    }
}

pub fn find(name: &str) -> Option<&'static ToolSpec> { TOOLS.iter().find(|t| t.name == name) }

pub static TOOLS: &[ToolSpec] = &[
    // discovery
    ToolSpec {
        name: "list_agents",
        description: "List all kagent Agents in the namespace. Returns name, description, type, and status for each agent.",
        params: &[boolean("include_status", "Include status information (ready, accepted) in the output")],
    },
    ToolSpec {
        name: "get_agent",
        description: "Get detailed information about a specific kagent Agent including its full specification.",
        params: &[
            required("name", "Name of the agent to retrieve"),
            string("output_format", "Output format: 'yaml' (default) or 'json'"),
        ],
    },
    ToolSpec {
        name: "list_model_configs",
        description: "List all kagent ModelConfig resources in the namespace. Returns provider, model, and secret reference for each.",
        params: &[],
    },
    ToolSpec {
        name: "list_mcp_servers",
        description: "List all MCPServer and RemoteMCPServer resources in the namespace.",
        params: &[boolean("include_remote", "Include RemoteMCPServer resources (default: true)")],
    },
    // generation
    ToolSpec {
        name: "create_agent_manifest",
        description: "Generate a new kagent Agent manifest. Returns YAML that should be reviewed and validated before applying.",
        params: &[
            required("name", "Name for the new agent"),
            required("description", "Human-readable description of what the agent does"),
            required("system_message", "The system prompt that defines the agent's behavior, capabilities, and constraints"),
            required("model_config", "Name of the ModelConfig resource to use for LLM configuration"),
            string(
                "tools_json",
                "JSON array of tool configurations. Format: [{\"mcpServer\": \"server-name\", \"kind\": \"MCPServer\", \"tools\": [\"tool1\", \"tool2\"]}]",
            ),
            string(
                "skills_json",
                "JSON array of A2A skill configurations. Format: [{\"id\": \"skill-id\", \"name\": \"Skill Name\", \"description\": \"...\"}]",
            ),
        ],
    },
    ToolSpec {
        name: "update_agent_manifest",
        description: "Generate an updated manifest for an existing Agent. Fetches current state and applies the specified modifications.",
        params: &[
            required("name", "Name of the agent to update"),
            string("system_message", "New system prompt (optional, keeps current if not provided)"),
            string("description", "New description (optional)"),
            string("model_config", "New ModelConfig reference (optional)"),
            string(
                "add_tools_json",
                "JSON array of tools to add. Format: [{\"mcpServer\": \"name\", \"kind\": \"MCPServer\", \"tools\": [\"tool1\"]}]",
            ),
            string("remove_tool_servers", "Comma-separated list of MCP server names to remove from the agent"),
        ],
    },
    ToolSpec {
        name: "create_model_config_manifest",
        description: "Generate a new ModelConfig manifest for LLM provider configuration. Returns YAML for review before applying.",
        params: &[
            required("name", "Name for the ModelConfig resource"),
            required("provider", "LLM provider: OpenAI, AzureOpenAI, Anthropic, Gemini, Ollama, or Custom"),
            required("model", "Model identifier (e.g., gpt-4o, claude-sonnet-4-20250514, gemini-2.5-pro)"),
            required("api_key_secret", "Name of Kubernetes Secret containing the API key"),
            string("api_key_secret_key", "Key within the secret that holds the API key (default varies by provider)"),
            string("base_url", "Custom base URL for the API (for Custom provider or proxies)"),
        ],
    },
    ToolSpec {
        name: "create_mcp_server_manifest",
        description: "Generate a new MCPServer or RemoteMCPServer manifest. MCPServer runs as a container with stdio transport; RemoteMCPServer connects to an external HTTP endpoint.",
        params: &[
            required("name", "Name for the MCP server resource"),
            required("server_type", "Type: 'MCPServer' (local container with stdio) or 'RemoteMCPServer' (external HTTP endpoint)"),
            string("description", "Human-readable description of the server's purpose"),
            string("image", "Container image for MCPServer (required for MCPServer type)"),
            string("command", "Command to run in the container"),
            string("args_json", "JSON array of command arguments"),
            number("port", "Container port (default: 3000)"),
            string("url", "URL for RemoteMCPServer (required for RemoteMCPServer type)"),
            string("protocol", "Protocol for RemoteMCPServer: 'STREAMABLE_HTTP' (default) or 'SSE'"),
            string("timeout", "Request timeout (e.g., '30s', '5m')"),
        ],
    },
    ToolSpec {
        name: "generate_rbac_manifest",
        description: "Generate RBAC manifests (ServiceAccount, Role, RoleBinding) for a kagent agent. Provides appropriate permissions for the agent to access its required resources.",
        params: &[
            required("name", "Base name for RBAC resources (e.g., 'my-agent' creates 'my-agent' ServiceAccount, 'my-agent-role' Role, etc.)"),
            string(
                "permissions",
                "Permission preset: 'readonly' (read kagent resources), 'standard' (read/write kagent resources), or 'admin' (full kagent + RBAC management). Default: 'readonly'",
            ),
            string(
                "additional_rules_json",
                "JSON array of additional RBAC rules. Format: [{\"apiGroups\": [\"...\"], \"resources\": [\"...\"], \"verbs\": [\"...\"]}]",
            ),
        ],
    },
    // validation and mutation
    ToolSpec {
        name: "validate_manifest",
        description: "Validate a kagent manifest for correctness and completeness. Checks required fields, references, and best practices.",
        params: &[
            required("manifest", "YAML manifest to validate"),
            boolean("strict", "Enable strict validation including best practice checks (default: true)"),
        ],
    },
    ToolSpec {
        name: "diff_manifest",
        description: "Show the differences between a manifest and the current cluster state. Helps review changes before applying.",
        params: &[required("manifest", "YAML manifest to compare against current state")],
    },
    ToolSpec {
        name: "apply_manifest",
        description: "Apply a validated manifest to the Kubernetes cluster. IMPORTANT: Always validate and show diff to user before applying. Use dry_run=true to preview without applying.",
        params: &[
            required("manifest", "YAML manifest to apply"),
            boolean("dry_run", "Perform a server-side dry-run without actually applying (default: false)"),
        ],
    },
    ToolSpec {
        name: "delete_agent",
        description: "Delete a kagent Agent from the cluster. IMPORTANT: This action is destructive. Use dry_run=true to preview without deleting.",
        params: &[
            required("name", "Name of the agent to delete"),
            boolean("dry_run", "If true, only simulate the deletion without actually removing the agent"),
        ],
    },
];
