use serde_json::json;

use kmeta_core::{KmetaError, KmetaResult, Manifest, Provider, ResourceKind};

#[derive(Debug, Clone)]
pub struct ModelConfigParams {
    pub name: String,
    pub provider: Provider,
    pub model: String,
    pub api_key_secret: String,
    /// Provider default (`OPENAI_API_KEY`, ...) when unset.
    pub api_key_secret_key: Option<String>,
    pub base_url: Option<String>,
}

pub fn model_config(p: &ModelConfigParams, namespace: &str) -> KmetaResult<Manifest> {
    if p.name.is_empty() || p.model.is_empty() || p.api_key_secret.is_empty() {
        return Err(KmetaError::Input("name, provider, model, and api_key_secret are required".into()));
    }
    let secret_key = p
        .api_key_secret_key
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| p.provider.default_secret_key());

    let mut spec = json!({
        "provider": p.provider.as_str(),
        "model": p.model,
        "apiKeySecret": p.api_key_secret,
        "apiKeySecretKey": secret_key,
    });
    if let Some(url) = p.base_url.as_deref().filter(|s| !s.is_empty()) {
        spec["baseUrl"] = json!(url);
    }
    if let Some(field) = p.provider.settings_field() {
        spec[field] = json!({});
    }

    let mut m = Manifest::new(ResourceKind::ModelConfig.api_version(), ResourceKind::ModelConfig.as_str());
    m.set_path("metadata", json!({ "name": p.name, "namespace": namespace }));
    m.set_path("spec", spec);
    Ok(m)
}
