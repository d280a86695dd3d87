//! kmeta apply: field-stripped diffs and get-or-create-then-update apply.
//!
//! The fetch/decide/submit sequence is not transactional. A concurrent write
//! between fetch and submit comes back from the store as a conflict and is
//! handed to the caller untouched; the caller re-diffs and resubmits.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use kmeta_core::{ApplyAction, ApplyOutcome, KmetaError, KmetaResult, Manifest, ResourceKind, ResourceRef};
use kmeta_kubehub::ResourceStore;

pub mod diff;

pub use diff::{render_entries, structural_diff, Change, DiffEntry, DiffSummary};

/// Result of comparing a proposed manifest with live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum DiffResult {
    /// Nothing stored under this identity; apply would create it.
    New { target: ResourceRef },
    Changed { target: ResourceRef, summary: DiffSummary, entries: Vec<DiffEntry> },
    NoChange { target: ResourceRef },
}

impl DiffResult {
    pub fn target(&self) -> &ResourceRef {
        match self {
            DiffResult::New { target } | DiffResult::Changed { target, .. } | DiffResult::NoChange { target } => target,
        }
    }

    pub fn is_new(&self) -> bool { matches!(self, DiffResult::New { .. }) }

    pub fn is_no_change(&self) -> bool { matches!(self, DiffResult::NoChange { .. }) }

    /// Rendered `- / +` lines; empty unless `Changed`.
    pub fn structural_diff_text(&self) -> String {
        match self {
            DiffResult::Changed { entries, .. } => render_entries(entries),
            _ => String::new(),
        }
    }
}

/// Text shown to the caller of `diff_manifest`.
pub fn render_diff(result: &DiffResult, proposed_yaml: &str) -> String {
    let t = result.target();
    match result {
        DiffResult::New { .. } => format!(
            "# New Resource\n\n{} '{}' does not exist in namespace '{}'.\nThis will CREATE a new resource.\n\nProposed manifest:\n---\n{}",
            t.kind, t.name, t.namespace, proposed_yaml
        ),
        DiffResult::NoChange { .. } => format!("No changes detected. {} '{}' is already up to date.", t.kind, t.name),
        DiffResult::Changed { summary, .. } => format!(
            "# Diff: {} '{}'\n\nChanges that will be applied ({} added, {} changed, {} removed):\n\n{}\nLegend: - removed, + added",
            t.kind,
            t.name,
            summary.adds,
            summary.updates,
            summary.removes,
            result.structural_diff_text()
        ),
    }
}

/// Text shown to the caller of `apply_manifest`.
pub fn render_outcome(o: &ApplyOutcome) -> String {
    if o.dry_run {
        format!(
            "# Dry Run Successful\n\n{} '{}' in namespace '{}' would be {}.\n\nTo actually apply, run apply_manifest with dry_run=false.",
            o.kind, o.name, o.namespace, o.action
        )
    } else {
        format!("# Successfully Applied\n\n{} '{}' in namespace '{}' has been {}.", o.kind, o.name, o.namespace, o.action)
    }
}

/// Copy of `m` with server-managed fields gone and the namespace filled in.
fn cleaned(m: &Manifest, namespace: &str) -> Manifest {
    let mut c = m.clone();
    c.strip_server_managed();
    if c.namespace().is_none() {
        c.set_namespace(namespace);
    }
    c
}

pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    default_namespace: String,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ResourceStore>, default_namespace: impl Into<String>) -> Self {
        Self { store, default_namespace: default_namespace.into() }
    }

    /// (kind, namespace, name) of a manifest; namespace falls back to the configured default.
    pub fn resolve(&self, m: &Manifest) -> KmetaResult<ResourceRef> {
        let kind: ResourceKind = m.kind().ok_or_else(|| KmetaError::Input("kind is required".into()))?.parse()?;
        let name = m.name().ok_or_else(|| KmetaError::Input("metadata.name is required".into()))?;
        let namespace = m.namespace().unwrap_or(&self.default_namespace);
        Ok(ResourceRef::new(kind, namespace, name))
    }

    pub async fn diff(&self, proposed: &Manifest) -> KmetaResult<DiffResult> {
        counter!("diff_runs", 1u64);
        let target = self.resolve(proposed)?;
        let Some(live) = self.store.get_opt(&target).await? else {
            info!(target_ref = %target, "diff: resource absent");
            return Ok(DiffResult::New { target });
        };
        let live = cleaned(&live, &target.namespace);
        let proposed = cleaned(proposed, &target.namespace);
        let entries = structural_diff(live.as_json(), proposed.as_json());
        if entries.is_empty() {
            return Ok(DiffResult::NoChange { target });
        }
        let summary = DiffSummary::from_entries(&entries);
        info!(target_ref = %target, adds = summary.adds, updates = summary.updates, removes = summary.removes, "diff: computed");
        Ok(DiffResult::Changed { target, summary, entries })
    }

    pub async fn apply(&self, mut manifest: Manifest, dry_run: bool) -> KmetaResult<ApplyOutcome> {
        let t0 = Instant::now();
        counter!("apply_attempts", 1u64);
        let target = self.resolve(&manifest)?;
        if manifest.namespace().is_none() {
            manifest.set_namespace(&target.namespace);
        }

        let res = match self.store.get_opt(&target).await {
            Ok(Some(existing)) => {
                // Without the fetched token the store rejects the update as a conflict.
                match existing.resource_version() {
                    Some(rv) => manifest.set_resource_version(rv),
                    None => warn!(target_ref = %target, "apply: live object has no resourceVersion"),
                }
                self.store
                    .update(target.kind, &target.namespace, manifest, dry_run)
                    .await
                    .map(|_| ApplyAction::Updated)
            }
            Ok(None) => {
                manifest.remove_path("metadata.resourceVersion");
                self.store
                    .create(target.kind, &target.namespace, manifest, dry_run)
                    .await
                    .map(|_| ApplyAction::Created)
            }
            Err(e) => Err(e),
        };

        let action = match res {
            Ok(a) => a,
            Err(e) => {
                counter!("apply_err", 1u64);
                if e.is_conflict() {
                    counter!("apply_conflicts", 1u64);
                }
                warn!(target_ref = %target, dry_run, error = %e, "apply: store rejected");
                return Err(e.into());
            }
        };
        histogram!("apply_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        counter!(if dry_run { "apply_dry_ok" } else { "apply_ok" }, 1u64);
        info!(target_ref = %target, %action, dry_run, "apply: done");
        Ok(ApplyOutcome { action, kind: target.kind, name: target.name, namespace: target.namespace, dry_run })
    }

    /// Pass-through delete with identity resolution only.
    pub async fn delete(&self, kind: &str, name: &str, namespace: Option<&str>, dry_run: bool) -> KmetaResult<ResourceRef> {
        let kind: ResourceKind = kind.parse()?;
        if name.is_empty() {
            return Err(KmetaError::Input("name is required".into()));
        }
        let target = ResourceRef::new(kind, namespace.unwrap_or(&self.default_namespace), name);
        self.store.delete(&target, dry_run).await?;
        info!(target_ref = %target, dry_run, "delete: done");
        Ok(target)
    }
}
