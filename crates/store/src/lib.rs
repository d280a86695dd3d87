//! kmeta store: in-RAM `ResourceStore` with resourceVersion concurrency and dry-run.
//!
//! Readers load an immutable snapshot; writers clone, modify and publish a new one
//! under a mutex that also owns the resourceVersion counter.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use tracing::debug;
use uuid::Uuid;

use kmeta_core::{Manifest, ResourceKind, ResourceRef, StoreError};
use kmeta_kubehub::ResourceStore;

type Objects = FxHashMap<ResourceRef, Manifest>;

pub struct MemoryStore {
    state: ArcSwap<Objects>,
    /// Last issued resourceVersion.
    writer: Mutex<u64>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { state: ArcSwap::from_pointee(Objects::default()), writer: Mutex::new(0) }
    }

    /// Insert a fixture as-is, assigning a resourceVersion when it has none.
    pub fn seed(&self, mut manifest: Manifest) -> Result<ResourceRef, StoreError> {
        let kind: ResourceKind = manifest
            .kind()
            .unwrap_or_default()
            .parse()
            .map_err(|e| StoreError::Backend(format!("seed: {e}")))?;
        let name = manifest.name().ok_or_else(|| StoreError::Backend("seed: metadata.name is required".into()))?.to_string();
        let namespace = manifest.namespace().unwrap_or("default").to_string();
        let r = ResourceRef::new(kind, namespace, name);
        let mut ver = self.lock()?;
        if manifest.resource_version().is_none() {
            *ver += 1;
            manifest.set_resource_version(&ver.to_string());
        }
        manifest.set_namespace(&r.namespace);
        self.publish(|objs| {
            objs.insert(r.clone(), manifest);
        });
        Ok(r)
    }

    /// Every stored object, ordered by identity.
    pub fn objects(&self) -> Vec<Manifest> {
        let snap = self.state.load();
        let mut items: Vec<_> = snap.iter().collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        items.into_iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn len(&self) -> usize { self.state.load().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, u64>, StoreError> {
        self.writer.lock().map_err(|_| StoreError::Backend("store writer lock poisoned".into()))
    }

    fn publish(&self, f: impl FnOnce(&mut Objects)) {
        let mut next = (**self.state.load()).clone();
        f(&mut next);
        self.state.store(Arc::new(next));
    }

    fn identity(kind: ResourceKind, namespace: &str, manifest: &Manifest) -> Result<ResourceRef, StoreError> {
        let name = manifest
            .name()
            .ok_or_else(|| StoreError::Api { code: 422, message: "metadata.name: Required value".into() })?;
        Ok(ResourceRef::new(kind, namespace, name))
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Manifest>, StoreError> {
        let snap = self.state.load();
        let mut items: Vec<_> = snap.iter().filter(|(r, _)| r.kind == kind && r.namespace == namespace).collect();
        items.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(items.into_iter().map(|(_, m)| m.clone()).collect())
    }

    async fn get(&self, r: &ResourceRef) -> Result<Manifest, StoreError> {
        self.state.load().get(r).cloned().ok_or_else(|| StoreError::not_found(r))
    }

    async fn create(&self, kind: ResourceKind, namespace: &str, mut manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        let r = Self::identity(kind, namespace, &manifest)?;
        let mut ver = self.lock()?;
        if self.state.load().contains_key(&r) {
            return Err(StoreError::Conflict(format!("{} '{}' already exists", r.kind, r.name)));
        }
        let next = *ver + 1;
        manifest.remove_path("status");
        manifest.set_namespace(namespace);
        manifest.set_str_at("metadata.uid", &Uuid::new_v4().to_string());
        manifest.set_str_at("metadata.creationTimestamp", &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
        manifest.set_path("metadata.generation", Json::from(1));
        manifest.set_resource_version(&next.to_string());
        debug!(target_ref = %r, dry_run, rv = next, "memory: create");
        if !dry_run {
            *ver = next;
            let stored = manifest.clone();
            self.publish(|objs| {
                objs.insert(r, stored);
            });
        }
        Ok(manifest)
    }

    async fn update(&self, kind: ResourceKind, namespace: &str, mut manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        let r = Self::identity(kind, namespace, &manifest)?;
        let mut ver = self.lock()?;
        let current = self.state.load().get(&r).cloned().ok_or_else(|| StoreError::not_found(&r))?;
        match manifest.resource_version() {
            None => return Err(StoreError::Conflict("metadata.resourceVersion must be specified for an update".into())),
            Some(rv) if Some(rv) != current.resource_version() => {
                return Err(StoreError::Conflict(format!(
                    "Operation cannot be fulfilled on {} \"{}\": the object has been modified; please apply your changes to the latest version and try again",
                    r.kind.plural(),
                    r.name
                )))
            }
            Some(_) => {}
        }
        let next = *ver + 1;
        manifest.set_namespace(namespace);
        for field in ["uid", "creationTimestamp"] {
            let path = format!("metadata.{field}");
            match current.get_path(&path) {
                Some(v) => manifest.set_path(&path, v.clone()),
                None => {
                    manifest.remove_path(&path);
                }
            }
        }
        // status is owned by controllers; a plain update never changes it.
        manifest.remove_path("status");
        if let Some(status) = current.get_path("status") {
            manifest.set_path("status", status.clone());
        }
        let generation = current.get_path("metadata.generation").and_then(Json::as_i64).unwrap_or(1);
        let generation = if current.get_path("spec") != manifest.get_path("spec") { generation + 1 } else { generation };
        manifest.set_path("metadata.generation", Json::from(generation));
        manifest.set_resource_version(&next.to_string());
        debug!(target_ref = %r, dry_run, rv = next, generation, "memory: update");
        if !dry_run {
            *ver = next;
            let stored = manifest.clone();
            self.publish(|objs| {
                objs.insert(r, stored);
            });
        }
        Ok(manifest)
    }

    async fn delete(&self, r: &ResourceRef, dry_run: bool) -> Result<(), StoreError> {
        let _ver = self.lock()?;
        if !self.state.load().contains_key(r) {
            return Err(StoreError::not_found(r));
        }
        debug!(target_ref = %r, dry_run, "memory: delete");
        if !dry_run {
            self.publish(|objs| {
                objs.remove(r);
            });
        }
        Ok(())
    }
}

/// Store whose every call fails with the same error; stands in for an unreachable API server.
pub struct UnavailableStore(pub StoreError);

#[async_trait]
impl ResourceStore for UnavailableStore {
    async fn list(&self, _kind: ResourceKind, _namespace: &str) -> Result<Vec<Manifest>, StoreError> { Err(self.0.clone()) }

    async fn get(&self, _r: &ResourceRef) -> Result<Manifest, StoreError> { Err(self.0.clone()) }

    async fn create(&self, _kind: ResourceKind, _namespace: &str, _manifest: Manifest, _dry_run: bool) -> Result<Manifest, StoreError> {
        Err(self.0.clone())
    }

    async fn update(&self, _kind: ResourceKind, _namespace: &str, _manifest: Manifest, _dry_run: bool) -> Result<Manifest, StoreError> {
        Err(self.0.clone())
    }

    async fn delete(&self, _r: &ResourceRef, _dry_run: bool) -> Result<(), StoreError> { Err(self.0.clone()) }
}
