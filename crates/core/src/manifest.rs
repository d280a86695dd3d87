//! Generic manifest tree and its YAML codec.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use smallvec::SmallVec;

use crate::ParseError;

/// Metadata fields the API server owns; they churn on every read.
pub const SERVER_MANAGED_METADATA: [&str; 5] =
    ["creationTimestamp", "generation", "resourceVersion", "uid", "managedFields"];

/// Size guards applied before and after decoding a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_bytes: usize,
    pub max_nodes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self { Self { max_bytes: 1_000_000, max_nodes: 100_000 } }
}

impl ParseLimits {
    /// Defaults overridden by `KMETA_MAX_YAML_BYTES` / `KMETA_MAX_YAML_NODES`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_bytes: std::env::var("KMETA_MAX_YAML_BYTES").ok().and_then(|s| s.parse().ok()).unwrap_or(d.max_bytes),
            max_nodes: std::env::var("KMETA_MAX_YAML_NODES").ok().and_then(|s| s.parse().ok()).unwrap_or(d.max_nodes),
        }
    }
}

fn node_budget_exceeded(v: &Json, max: usize) -> bool {
    fn walk(v: &Json, cur: &mut usize, max: usize) {
        if *cur > max { return; }
        *cur += 1;
        match v {
            Json::Object(map) => {
                for vv in map.values() {
                    if *cur > max { break; }
                    walk(vv, cur, max);
                }
            }
            Json::Array(arr) => {
                for vv in arr {
                    if *cur > max { break; }
                    walk(vv, cur, max);
                }
            }
            _ => {}
        }
    }
    let mut count = 0usize;
    walk(v, &mut count, max);
    count > max
}

fn segments(path: &str) -> SmallVec<[&str; 6]> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// A resource document: an ordered mapping at the top level.
///
/// Kind-specific fields stay untyped so extension fields survive a
/// validate/diff/apply round trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct Manifest(Json);

impl TryFrom<Json> for Manifest {
    type Error = ParseError;

    fn try_from(v: Json) -> Result<Self, Self::Error> {
        if v.is_object() { Ok(Self(v)) } else { Err(ParseError::NotAMapping) }
    }
}

impl From<Manifest> for Json {
    fn from(m: Manifest) -> Self { m.0 }
}

impl Manifest {
    pub fn from_yaml(text: &str) -> Result<Self, ParseError> {
        Self::from_yaml_with(text, &ParseLimits::from_env())
    }

    pub fn from_yaml_with(text: &str, limits: &ParseLimits) -> Result<Self, ParseError> {
        if text.len() > limits.max_bytes {
            return Err(ParseError::TooLarge(limits.max_bytes));
        }
        let val: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| ParseError::Yaml(e.to_string()))?;
        let json = serde_json::to_value(val).map_err(|e| ParseError::Yaml(e.to_string()))?;
        if node_budget_exceeded(&json, limits.max_nodes) {
            return Err(ParseError::TooComplex(limits.max_nodes));
        }
        Self::try_from(json)
    }

    /// Empty document carrying only type information.
    pub fn new(api_version: &str, kind: &str) -> Self {
        let mut m = Map::new();
        m.insert("apiVersion".into(), Json::String(api_version.to_string()));
        m.insert("kind".into(), Json::String(kind.to_string()));
        Self(Json::Object(m))
    }

    pub fn as_json(&self) -> &Json { &self.0 }

    pub fn into_json(self) -> Json { self.0 }

    pub fn to_yaml(&self) -> Result<String, ParseError> {
        serde_yaml::to_string(&self.0).map_err(|e| ParseError::Encode(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, ParseError> {
        serde_json::to_string_pretty(&self.0).map_err(|e| ParseError::Encode(e.to_string()))
    }

    /// Value at a dotted path of object keys (`spec.deployment.image`).
    pub fn get_path(&self, path: &str) -> Option<&Json> {
        let mut cur = &self.0;
        for seg in segments(path) {
            cur = cur.as_object()?.get(seg)?;
        }
        Some(cur)
    }

    /// Non-empty string at `path`. Absent, empty and non-string values all read as `None`.
    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(Json::as_str).filter(|s| !s.is_empty())
    }

    /// Set `path` to `value`, creating (or replacing non-object) intermediate nodes.
    pub fn set_path(&mut self, path: &str, value: Json) {
        let segs = segments(path);
        let Some((last, parents)) = segs.split_last() else { return };
        let mut cur = &mut self.0;
        for seg in parents {
            let obj = ensure_object(cur);
            cur = obj.entry(seg.to_string()).or_insert_with(|| Json::Object(Map::new()));
        }
        ensure_object(cur).insert(last.to_string(), value);
    }

    pub fn set_str_at(&mut self, path: &str, value: &str) {
        self.set_path(path, Json::String(value.to_string()));
    }

    pub fn remove_path(&mut self, path: &str) -> Option<Json> {
        let segs = segments(path);
        let (last, parents) = segs.split_last()?;
        let mut cur = &mut self.0;
        for seg in parents {
            cur = cur.as_object_mut()?.get_mut(*seg)?;
        }
        cur.as_object_mut()?.remove(*last)
    }

    pub fn api_version(&self) -> Option<&str> { self.str_at("apiVersion") }
    pub fn kind(&self) -> Option<&str> { self.str_at("kind") }
    pub fn name(&self) -> Option<&str> { self.str_at("metadata.name") }
    pub fn namespace(&self) -> Option<&str> { self.str_at("metadata.namespace") }
    pub fn resource_version(&self) -> Option<&str> { self.str_at("metadata.resourceVersion") }

    pub fn set_namespace(&mut self, ns: &str) { self.set_str_at("metadata.namespace", ns); }

    pub fn set_resource_version(&mut self, rv: &str) { self.set_str_at("metadata.resourceVersion", rv); }

    /// Drop `status` and every server-managed metadata field.
    pub fn strip_server_managed(&mut self) {
        if let Some(obj) = self.0.as_object_mut() {
            obj.remove("status");
        }
        for field in SERVER_MANAGED_METADATA {
            self.remove_path(&format!("metadata.{field}"));
        }
    }
}

fn ensure_object(v: &mut Json) -> &mut Map<String, Json> {
    if !v.is_object() {
        *v = Json::Object(Map::new());
    }
    match v {
        Json::Object(map) => map,
        _ => unreachable!("replaced with an object above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_are_friendly() {
        let e = Manifest::from_yaml("kind: [unterminated\n").unwrap_err();
        assert!(matches!(e, ParseError::Yaml(_)), "e={e}");

        let e = Manifest::from_yaml("- a\n- b\n").unwrap_err();
        assert_eq!(e, ParseError::NotAMapping);

        let e = Manifest::from_yaml("just a string").unwrap_err();
        assert_eq!(e, ParseError::NotAMapping);
    }

    #[test]
    fn limits_reject_oversized_and_deep_documents() {
        let limits = ParseLimits { max_bytes: 16, max_nodes: 100 };
        let e = Manifest::from_yaml_with("apiVersion: kagent.dev/v1alpha2\n", &limits).unwrap_err();
        assert_eq!(e, ParseError::TooLarge(16));

        let limits = ParseLimits { max_bytes: 1_000, max_nodes: 3 };
        let e = Manifest::from_yaml_with("a: 1\nb: 2\nc: 3\n", &limits).unwrap_err();
        assert_eq!(e, ParseError::TooComplex(3));
    }

    #[test]
    fn node_budget_is_inclusive() {
        // root mapping plus two scalars
        let limits = ParseLimits { max_bytes: 1_000, max_nodes: 3 };
        let m = Manifest::from_yaml_with("a: 1\nb: 2\n", &limits).unwrap();
        assert_eq!(m.get_path("b"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn string_accessors_treat_empty_and_non_string_as_absent() {
        let m = Manifest::from_yaml("apiVersion: 7\nkind: ''\nmetadata:\n  name: x\nspec:\n  url: http://a\n").unwrap();
        assert_eq!(m.api_version(), None);
        assert_eq!(m.kind(), None);
        assert_eq!(m.name(), Some("x"));
        assert_eq!(m.str_at("spec.url"), Some("http://a"));
        assert_eq!(m.str_at("spec.url.deeper"), None);
    }

    #[test]
    fn set_path_creates_intermediates_and_keeps_order() {
        let mut m = Manifest::new("kagent.dev/v1alpha2", "Agent");
        m.set_str_at("metadata.name", "a");
        m.set_str_at("spec.declarative.modelConfig", "mc");
        m.set_namespace("kagent");
        assert_eq!(m.str_at("spec.declarative.modelConfig"), Some("mc"));
        let keys: Vec<_> = m.as_json().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["apiVersion", "kind", "metadata", "spec"]);
    }

    #[test]
    fn strip_server_managed_prunes_status_and_metadata() {
        let mut m = Manifest::try_from(serde_json::json!({
            "apiVersion": "kagent.dev/v1alpha2",
            "kind": "Agent",
            "metadata": {
                "name": "x",
                "namespace": "ns",
                "managedFields": [ {"manager": "kubectl"} ],
                "resourceVersion": "123",
                "uid": "abc",
                "generation": 5,
                "creationTimestamp": "2020-01-01T00:00:00Z"
            },
            "status": { "ready": true },
            "spec": { "type": "Declarative" }
        }))
        .unwrap();
        m.strip_server_managed();
        let meta = m.get_path("metadata").unwrap().as_object().unwrap();
        assert_eq!(meta.len(), 2);
        assert!(m.get_path("status").is_none());
        assert_eq!(m.str_at("spec.type"), Some("Declarative"));
    }

    #[test]
    fn deserialize_rejects_non_objects() {
        assert!(serde_json::from_value::<Manifest>(serde_json::json!([1, 2])).is_err());
        assert!(serde_json::from_value::<Manifest>(serde_json::json!({"kind": "Agent"})).is_ok());
    }
}
