//! kmeta kubehub: the resource store port and its Kubernetes implementation.

#![forbid(unsafe_code)]

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, ListParams, PostParams},
    core::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta},
    Client,
};
use metrics::{counter, histogram};
use tracing::{debug, info};

use kmeta_core::{Manifest, ResourceKind, ResourceRef, StoreError};

/// Generic resource backend keyed by kind + namespace + name.
///
/// Implementations own existence and the `metadata.resourceVersion` token;
/// callers never retry on their behalf.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Manifest>, StoreError>;

    async fn get(&self, r: &ResourceRef) -> Result<Manifest, StoreError>;

    async fn create(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError>;

    /// Replace an existing object. The manifest must carry the fetched resourceVersion.
    async fn update(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError>;

    async fn delete(&self, r: &ResourceRef, dry_run: bool) -> Result<(), StoreError>;

    /// `get` with NotFound folded into `None`.
    async fn get_opt(&self, r: &ResourceRef) -> Result<Option<Manifest>, StoreError> {
        match self.get(r).await {
            Ok(m) => Ok(Some(m)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Static API resource for a kagent kind; no discovery round trip needed.
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.as_str());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

/// Store backed by the cluster the current kubeconfig (or in-cluster config) points at.
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self { Self { client } }

    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        info!("kube client ready");
        Ok(Self::new(client))
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource(kind))
    }
}

fn map_kube_error(e: kube::Error, r: &ResourceRef) -> StoreError {
    match e {
        kube::Error::Api(resp) if resp.code == 404 => StoreError::not_found(r),
        kube::Error::Api(resp) if resp.code == 409 => StoreError::Conflict(resp.message),
        kube::Error::Api(resp) => StoreError::Api { code: resp.code, message: resp.message },
        other => StoreError::Backend(other.to_string()),
    }
}

fn to_dynamic(manifest: Manifest) -> Result<DynamicObject, StoreError> {
    serde_json::from_value(manifest.into_json()).map_err(|e| StoreError::Backend(format!("encoding object: {e}")))
}

fn from_dynamic(kind: ResourceKind, mut obj: DynamicObject) -> Result<Manifest, StoreError> {
    // List items may come back without type information.
    if obj.types.is_none() {
        obj.types = Some(TypeMeta { api_version: kind.api_version().to_string(), kind: kind.as_str().to_string() });
    }
    let v = serde_json::to_value(&obj).map_err(|e| StoreError::Backend(format!("decoding object: {e}")))?;
    Manifest::try_from(v).map_err(|e| StoreError::Backend(e.to_string()))
}

fn identity(kind: ResourceKind, namespace: &str, manifest: &Manifest) -> ResourceRef {
    ResourceRef::new(kind, namespace, manifest.name().unwrap_or_default())
}

fn observe(op: &'static str, t0: Instant) {
    counter!("store_requests", 1u64, "op" => op);
    histogram!("store_latency_ms", t0.elapsed().as_secs_f64() * 1000.0, "op" => op);
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Manifest>, StoreError> {
        let t0 = Instant::now();
        let r = ResourceRef::new(kind, namespace, "");
        let list = self.api(kind, namespace).list(&ListParams::default()).await.map_err(|e| map_kube_error(e, &r))?;
        observe("list", t0);
        debug!(kind = %kind, ns = %namespace, count = list.items.len(), "store: list");
        list.items.into_iter().map(|o| from_dynamic(kind, o)).collect()
    }

    async fn get(&self, r: &ResourceRef) -> Result<Manifest, StoreError> {
        let t0 = Instant::now();
        let obj = self.api(r.kind, &r.namespace).get(&r.name).await.map_err(|e| map_kube_error(e, r))?;
        observe("get", t0);
        from_dynamic(r.kind, obj)
    }

    async fn create(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        let t0 = Instant::now();
        let r = identity(kind, namespace, &manifest);
        let pp = PostParams { dry_run, ..Default::default() };
        let obj = self.api(kind, namespace).create(&pp, &to_dynamic(manifest)?).await.map_err(|e| map_kube_error(e, &r))?;
        observe("create", t0);
        info!(target_ref = %r, dry_run, "store: created");
        from_dynamic(kind, obj)
    }

    async fn update(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        let t0 = Instant::now();
        let r = identity(kind, namespace, &manifest);
        let pp = PostParams { dry_run, ..Default::default() };
        let obj = self
            .api(kind, namespace)
            .replace(&r.name, &pp, &to_dynamic(manifest)?)
            .await
            .map_err(|e| map_kube_error(e, &r))?;
        observe("update", t0);
        info!(target_ref = %r, dry_run, "store: replaced");
        from_dynamic(kind, obj)
    }

    async fn delete(&self, r: &ResourceRef, dry_run: bool) -> Result<(), StoreError> {
        let t0 = Instant::now();
        let dp = DeleteParams { dry_run, ..Default::default() };
        self.api(r.kind, &r.namespace).delete(&r.name, &dp).await.map_err(|e| map_kube_error(e, r))?;
        observe("delete", t0);
        info!(target_ref = %r, dry_run, "store: deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_err(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse { status: "Failure".into(), message: message.into(), reason: String::new(), code })
    }

    #[test]
    fn api_resource_uses_static_plural_and_version() {
        let ar = api_resource(ResourceKind::McpServer);
        assert_eq!(ar.group, "kagent.dev");
        assert_eq!(ar.version, "v1alpha1");
        assert_eq!(ar.plural, "mcpservers");
        assert_eq!(ar.api_version, "kagent.dev/v1alpha1");
    }

    #[test]
    fn kube_errors_map_onto_store_taxonomy() {
        let r = ResourceRef::new(ResourceKind::Agent, "kagent", "a");
        assert!(map_kube_error(api_err(404, "nope"), &r).is_not_found());
        assert_eq!(map_kube_error(api_err(409, "the object has been modified"), &r), StoreError::Conflict("the object has been modified".into()));
        assert_eq!(map_kube_error(api_err(403, "forbidden"), &r), StoreError::Api { code: 403, message: "forbidden".into() });
    }

    #[test]
    fn dynamic_objects_keep_type_and_extension_fields() {
        let m = Manifest::try_from(serde_json::json!({
            "apiVersion": "kagent.dev/v1alpha2",
            "kind": "Agent",
            "metadata": { "name": "a", "namespace": "kagent" },
            "spec": { "type": "Declarative", "x-extension": { "k": 1 } }
        }))
        .unwrap();
        let mut obj = to_dynamic(m.clone()).unwrap();
        assert_eq!(obj.metadata.name.as_deref(), Some("a"));
        obj.types = None;
        let back = from_dynamic(ResourceKind::Agent, obj).unwrap();
        assert_eq!(back.kind(), Some("Agent"));
        assert_eq!(back.get_path("spec.x-extension.k"), Some(&serde_json::json!(1)));
    }
}
