//! Closed set of kagent resource kinds and model providers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// kagent API group shared by every kind this crate knows about.
pub const KAGENT_GROUP: &str = "kagent.dev";

/// A kagent resource kind. Drives both validation dispatch and the store endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Agent,
    ModelConfig,
    #[serde(rename = "MCPServer")]
    McpServer,
    #[serde(rename = "RemoteMCPServer")]
    RemoteMcpServer,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Agent,
        ResourceKind::ModelConfig,
        ResourceKind::McpServer,
        ResourceKind::RemoteMcpServer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Agent => "Agent",
            ResourceKind::ModelConfig => "ModelConfig",
            ResourceKind::McpServer => "MCPServer",
            ResourceKind::RemoteMcpServer => "RemoteMCPServer",
        }
    }

    pub fn group(&self) -> &'static str { KAGENT_GROUP }

    /// Served version. MCPServer still lives in v1alpha1.
    pub fn version(&self) -> &'static str {
        match self {
            ResourceKind::McpServer => "v1alpha1",
            _ => "v1alpha2",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Agent => "agents",
            ResourceKind::ModelConfig => "modelconfigs",
            ResourceKind::McpServer => "mcpservers",
            ResourceKind::RemoteMcpServer => "remotemcpservers",
        }
    }

    /// `group/version` as it appears in a manifest's `apiVersion`.
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::McpServer => "kagent.dev/v1alpha1",
            _ => "kagent.dev/v1alpha2",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// LLM provider accepted in `ModelConfig.spec.provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    OpenAI,
    AzureOpenAI,
    Anthropic,
    Gemini,
    Ollama,
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::OpenAI,
        Provider::AzureOpenAI,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::Ollama,
        Provider::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::AzureOpenAI => "AzureOpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Gemini => "Gemini",
            Provider::Ollama => "Ollama",
            Provider::Custom => "Custom",
        }
    }

    /// Key inside the API-key Secret when the caller does not name one.
    pub fn default_secret_key(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::AzureOpenAI => "AZURE_OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Gemini => "GOOGLE_API_KEY",
            Provider::Ollama | Provider::Custom => "API_KEY",
        }
    }

    /// Name of the provider-specific settings block under `spec`, if the CRD has one.
    pub fn settings_field(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAI => Some("openai"),
            Provider::AzureOpenAI => Some("azure"),
            Provider::Anthropic => Some("anthropic"),
            Provider::Gemini => Some("gemini"),
            Provider::Ollama => Some("ollama"),
            Provider::Custom => None,
        }
    }

    pub fn requires_api_key(&self) -> bool { !matches!(self, Provider::Ollama) }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid provider '{0}'. Must be one of: OpenAI, AzureOpenAI, Anthropic, Gemini, Ollama, Custom")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_strings() {
        for k in ResourceKind::ALL {
            assert_eq!(k.as_str().parse::<ResourceKind>().unwrap(), k);
        }
        assert_eq!("Deployment".parse::<ResourceKind>().unwrap_err().to_string(), "unknown kind: Deployment");
    }

    #[test]
    fn mcp_server_is_served_from_v1alpha1() {
        assert_eq!(ResourceKind::McpServer.api_version(), "kagent.dev/v1alpha1");
        assert_eq!(ResourceKind::RemoteMcpServer.api_version(), "kagent.dev/v1alpha2");
        assert_eq!(ResourceKind::McpServer.plural(), "mcpservers");
    }

    #[test]
    fn provider_parsing_is_case_sensitive() {
        assert_eq!("Anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("anthropic".parse::<Provider>().is_err());
        assert!(!Provider::Ollama.requires_api_key());
        assert_eq!(Provider::Gemini.default_secret_key(), "GOOGLE_API_KEY");
    }
}
