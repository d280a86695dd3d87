#![forbid(unsafe_code)]

use std::sync::Arc;

use async_trait::async_trait;
use kmeta_apply::{DiffResult, Reconciler};
use kmeta_core::{ApplyAction, KmetaError, Manifest, ResourceKind, ResourceRef, StoreError};
use kmeta_kubehub::ResourceStore;
use kmeta_store::{MemoryStore, UnavailableStore};

fn doc(v: serde_json::Value) -> Manifest { Manifest::try_from(v).unwrap() }

fn agent(system_message: &str) -> Manifest {
    doc(serde_json::json!({
        "apiVersion": "kagent.dev/v1alpha2",
        "kind": "Agent",
        "metadata": { "name": "helper" },
        "spec": {
            "type": "Declarative",
            "description": "k8s helper",
            "declarative": { "modelConfig": "default-model-config", "systemMessage": system_message }
        }
    }))
}

fn helper_ref() -> ResourceRef { ResourceRef::new(ResourceKind::Agent, "kagent", "helper") }

fn setup() -> (Arc<MemoryStore>, Reconciler) {
    let store = Arc::new(MemoryStore::new());
    let rec = Reconciler::new(store.clone(), "kagent");
    (store, rec)
}

#[tokio::test]
async fn first_apply_creates_second_updates() {
    let (store, rec) = setup();
    let created = rec.apply(agent("v1"), false).await.unwrap();
    assert_eq!(created.action, ApplyAction::Created);
    assert_eq!(created.namespace, "kagent");
    assert!(!created.dry_run);

    let updated = rec.apply(agent("v2"), false).await.unwrap();
    assert_eq!(updated.action, ApplyAction::Updated);

    let live = store.get(&helper_ref()).await.unwrap();
    assert_eq!(live.str_at("spec.declarative.systemMessage"), Some("v2"));
    assert_eq!(live.get_path("metadata.generation"), Some(&serde_json::json!(2)));
}

#[tokio::test]
async fn update_carries_the_live_token_even_when_caller_sent_a_stale_one() {
    let (store, rec) = setup();
    rec.apply(agent("v1"), false).await.unwrap();
    let mut stale = agent("v2");
    stale.set_resource_version("0");
    rec.apply(stale, false).await.unwrap();
    assert_eq!(store.get(&helper_ref()).await.unwrap().resource_version(), Some("2"));
}

#[tokio::test]
async fn dry_run_reports_the_real_action_without_changing_anything() {
    let (store, rec) = setup();
    let o = rec.apply(agent("v1"), true).await.unwrap();
    assert_eq!(o.action, ApplyAction::Created);
    assert!(o.dry_run);
    assert!(store.is_empty());

    rec.apply(agent("v1"), false).await.unwrap();
    let before = store.objects();
    let o = rec.apply(agent("v2"), true).await.unwrap();
    assert_eq!(o.action, ApplyAction::Updated);
    assert_eq!(store.objects(), before);

    // the dry run consumed no resourceVersion
    rec.apply(agent("v2"), false).await.unwrap();
    assert_eq!(store.get(&helper_ref()).await.unwrap().resource_version(), Some("2"));
}

/// Lets another writer slip in between the reconciler's fetch and its update.
struct RacingStore {
    inner: MemoryStore,
}

#[async_trait]
impl ResourceStore for RacingStore {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<Manifest>, StoreError> {
        self.inner.list(kind, namespace).await
    }

    async fn get(&self, r: &ResourceRef) -> Result<Manifest, StoreError> {
        let seen = self.inner.get(r).await?;
        let mut theirs = seen.clone();
        theirs.set_str_at("spec.description", "edited elsewhere");
        self.inner.update(r.kind, &r.namespace, theirs, false).await?;
        Ok(seen)
    }

    async fn create(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        self.inner.create(kind, namespace, manifest, dry_run).await
    }

    async fn update(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        self.inner.update(kind, namespace, manifest, dry_run).await
    }

    async fn delete(&self, r: &ResourceRef, dry_run: bool) -> Result<(), StoreError> { self.inner.delete(r, dry_run).await }
}

/// Reads fail as if the API server dropped the connection; writes still land.
struct BrokenReadStore {
    inner: MemoryStore,
}

#[async_trait]
impl ResourceStore for BrokenReadStore {
    async fn list(&self, _kind: ResourceKind, _namespace: &str) -> Result<Vec<Manifest>, StoreError> {
        Err(StoreError::Backend("connection reset".into()))
    }

    async fn get(&self, _r: &ResourceRef) -> Result<Manifest, StoreError> { Err(StoreError::Backend("connection reset".into())) }

    async fn create(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        self.inner.create(kind, namespace, manifest, dry_run).await
    }

    async fn update(&self, kind: ResourceKind, namespace: &str, manifest: Manifest, dry_run: bool) -> Result<Manifest, StoreError> {
        self.inner.update(kind, namespace, manifest, dry_run).await
    }

    async fn delete(&self, r: &ResourceRef, dry_run: bool) -> Result<(), StoreError> { self.inner.delete(r, dry_run).await }
}

#[tokio::test]
async fn failed_lookup_aborts_apply_instead_of_creating() {
    let store = Arc::new(BrokenReadStore { inner: MemoryStore::new() });
    let rec = Reconciler::new(store.clone(), "kagent");
    for dry_run in [true, false] {
        let err = rec.apply(agent("v1"), dry_run).await.unwrap_err();
        assert!(matches!(err, KmetaError::Store(StoreError::Backend(_))), "{err:?}");
    }
    assert!(store.inner.is_empty());

    let down = Reconciler::new(Arc::new(UnavailableStore(StoreError::Backend("connection refused".into()))), "kagent");
    let err = down.apply(agent("v1"), false).await.unwrap_err();
    assert!(matches!(err, KmetaError::Store(StoreError::Backend(_))), "{err:?}");
}

#[tokio::test]
async fn concurrent_write_surfaces_as_conflict() {
    let inner = MemoryStore::new();
    let mut seeded = agent("v1");
    seeded.set_namespace("kagent");
    inner.seed(seeded).unwrap();
    let store = Arc::new(RacingStore { inner });
    let rec = Reconciler::new(store.clone(), "kagent");

    let err = rec.apply(agent("mine"), false).await.unwrap_err();
    assert!(matches!(err, KmetaError::Store(StoreError::Conflict(_))), "{err:?}");
    let live = store.inner.get(&helper_ref()).await.unwrap();
    assert_eq!(live.str_at("spec.description"), Some("edited elsewhere"));
    assert_eq!(live.str_at("spec.declarative.systemMessage"), Some("v1"));
}

#[tokio::test]
async fn diff_ignores_server_managed_fields() {
    let (store, rec) = setup();
    assert!(rec.diff(&agent("v1")).await.unwrap().is_new());
    rec.apply(agent("v1"), false).await.unwrap();

    let mut live = store.get(&helper_ref()).await.unwrap();
    live.set_path("status", serde_json::json!({ "ready": true }));
    assert!(rec.diff(&live).await.unwrap().is_no_change());
    assert!(rec.diff(&agent("v1")).await.unwrap().is_no_change());
}

#[tokio::test]
async fn diff_after_apply_is_empty() {
    let (_store, rec) = setup();
    rec.apply(agent("v1"), false).await.unwrap();
    match rec.diff(&agent("v2")).await.unwrap() {
        DiffResult::Changed { summary, entries, .. } => {
            assert_eq!((summary.adds, summary.updates, summary.removes), (0, 1, 0));
            assert_eq!(entries[0].path, "spec.declarative.systemMessage");
        }
        other => panic!("expected a change, got {other:?}"),
    }
    rec.apply(agent("v2"), false).await.unwrap();
    assert!(rec.diff(&agent("v2")).await.unwrap().is_no_change());
}

#[tokio::test]
async fn identity_errors_are_input_errors() {
    let (store, rec) = setup();
    let nameless = doc(serde_json::json!({ "apiVersion": "v1", "kind": "Agent", "metadata": {} }));
    assert!(matches!(rec.apply(nameless, false).await, Err(KmetaError::Input(_))));
    let foreign = doc(serde_json::json!({ "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "c" } }));
    match rec.diff(&foreign).await {
        Err(KmetaError::Input(msg)) => assert_eq!(msg, "unknown kind: ConfigMap"),
        other => panic!("expected input error, got {other:?}"),
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn delete_honours_dry_run_and_reports_missing() {
    let (store, rec) = setup();
    rec.apply(agent("v1"), false).await.unwrap();

    let target = rec.delete("Agent", "helper", None, true).await.unwrap();
    assert_eq!(target, helper_ref());
    assert_eq!(store.len(), 1);

    rec.delete("Agent", "helper", Some("kagent"), false).await.unwrap();
    assert!(store.is_empty());

    let err = rec.delete("Agent", "helper", None, false).await.unwrap_err();
    assert_eq!(err.to_string(), "Agent 'helper' not found in namespace 'kagent'");
    assert!(matches!(rec.delete("Pod", "x", None, false).await, Err(KmetaError::Input(_))));
}
