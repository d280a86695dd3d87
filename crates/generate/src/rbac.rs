//! ServiceAccount + Role + RoleBinding for an agent.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use kmeta_core::{KmetaError, KmetaResult, Manifest, KAGENT_GROUP};

const RBAC_API_VERSION: &str = "rbac.authorization.k8s.io/v1";
const KAGENT_RESOURCES: [&str; 4] = ["agents", "modelconfigs", "mcpservers", "remotemcpservers"];
const READ: [&str; 3] = ["get", "list", "watch"];
const READ_WRITE: [&str; 7] = ["get", "list", "watch", "create", "update", "patch", "delete"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Permissions {
    #[default]
    ReadOnly,
    Standard,
    Admin,
}

impl Permissions {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permissions::ReadOnly => "readonly",
            Permissions::Standard => "standard",
            Permissions::Admin => "admin",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Permissions::ReadOnly => "This grants read-only access to kagent resources (agents, model configs, MCP servers).",
            Permissions::Standard => "This grants read/write access to kagent resources and read access to secrets for validation.",
            Permissions::Admin => "This grants full access to kagent resources plus the ability to manage RBAC and ServiceAccounts.",
        }
    }

    pub fn rules(&self) -> Vec<PolicyRule> {
        let verbs: &[&str] = if *self == Permissions::ReadOnly { &READ } else { &READ_WRITE };
        let mut rules = vec![
            PolicyRule::new(&[KAGENT_GROUP], &KAGENT_RESOURCES, verbs),
            PolicyRule::new(&[KAGENT_GROUP], &["agents/status"], &READ),
        ];
        if *self == Permissions::ReadOnly {
            return rules;
        }
        rules.push(PolicyRule::new(&[""], &["secrets"], &["get", "list"]));
        if *self == Permissions::Admin {
            rules.push(PolicyRule::new(&[""], &["serviceaccounts"], &READ_WRITE));
            rules.push(PolicyRule::new(&["rbac.authorization.k8s.io"], &["roles", "rolebindings"], &READ_WRITE));
        }
        rules
    }
}

impl FromStr for Permissions {
    type Err = KmetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readonly" => Ok(Permissions::ReadOnly),
            "standard" => Ok(Permissions::Standard),
            "admin" => Ok(Permissions::Admin),
            _ => Err(KmetaError::Input("permissions must be 'readonly', 'standard', or 'admin'".into())),
        }
    }
}

/// One Role rule; also the element type of `additional_rules_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default)]
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

impl PolicyRule {
    fn new(groups: &[&str], resources: &[&str], verbs: &[&str]) -> Self {
        let own = |xs: &[&str]| -> Vec<String> { xs.iter().map(|s| s.to_string()).collect() };
        Self { api_groups: own(groups), resources: own(resources), verbs: own(verbs) }
    }
}

/// `[ServiceAccount name, Role name-role, RoleBinding name-rolebinding]`.
pub fn rbac(name: &str, permissions: Permissions, extra: &[PolicyRule], namespace: &str) -> KmetaResult<Vec<Manifest>> {
    if name.is_empty() {
        return Err(KmetaError::Input("name is required".into()));
    }
    if let Some(bad) = extra.iter().find(|r| r.resources.is_empty() || r.verbs.is_empty()) {
        return Err(KmetaError::Input(format!("additional rule needs resources and verbs: {bad:?}")));
    }
    let labels = json!({ "app.kubernetes.io/name": name, "app.kubernetes.io/component": "rbac" });
    let role_name = format!("{name}-role");

    let mut sa = Manifest::new("v1", "ServiceAccount");
    sa.set_path("metadata", json!({ "name": name, "namespace": namespace, "labels": labels }));

    let mut rules = permissions.rules();
    rules.extend(extra.iter().cloned());
    let mut role = Manifest::new(RBAC_API_VERSION, "Role");
    role.set_path("metadata", json!({ "name": role_name, "namespace": namespace, "labels": labels }));
    role.set_path("rules", json!(rules));

    let mut binding = Manifest::new(RBAC_API_VERSION, "RoleBinding");
    binding.set_path("metadata", json!({ "name": format!("{name}-rolebinding"), "namespace": namespace, "labels": labels }));
    binding.set_path("subjects", json!([{ "kind": "ServiceAccount", "name": name, "namespace": namespace }]));
    binding.set_path("roleRef", json!({ "kind": "Role", "name": role_name, "apiGroup": "rbac.authorization.k8s.io" }));

    Ok(vec![sa, role, binding])
}
