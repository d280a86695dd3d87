//! Validate, diff, apply and delete.

use kmeta_apply::{render_diff, render_outcome};
use kmeta_core::{KmetaError, Manifest, ResourceKind, ResourceRef};
use kmeta_validate::render_report;

use crate::{Args, Context, ToolOutcome, ToolServer};

fn parse(text: &str) -> Result<Manifest, KmetaError> { Ok(Manifest::from_yaml(text)?) }

impl ToolServer {
    pub(crate) async fn validate_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let text = args.require("manifest")?;
        let strict = args.bool_or("strict", true)?;
        let issues = self.validator.validate_text(text, strict).await.map_err(KmetaError::from)?;
        Ok(render_report(&issues))
    }

    pub(crate) async fn diff_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let text = args.require("manifest")?;
        let proposed = parse(text)?;
        let result = self.reconciler.diff(&proposed).await.context("Failed to diff manifest")?;
        Ok(render_diff(&result, text))
    }

    pub(crate) async fn apply_manifest(&self, args: Args<'_>) -> ToolOutcome {
        let text = args.require("manifest")?;
        let dry_run = args.bool_or("dry_run", false)?;
        let manifest = parse(text)?;
        let outcome = self.reconciler.apply(manifest, dry_run).await.context("Failed to apply manifest")?;
        Ok(render_outcome(&outcome))
    }

    /// Existence is checked first so a dry run can describe what would go.
    pub(crate) async fn delete_agent(&self, args: Args<'_>) -> ToolOutcome {
        let name = args.require("name")?;
        let dry_run = args.bool_or("dry_run", false)?;
        let r = ResourceRef::new(ResourceKind::Agent, &self.namespace, name);
        let agent = self.store.get(&r).await.context("Agent not found")?;

        self.reconciler
            .delete(ResourceKind::Agent.as_str(), name, Some(&self.namespace), dry_run)
            .await
            .context("Failed to delete agent")?;
        if dry_run {
            return Ok(format!(
                "# Dry Run: Delete Agent\n\nThe following agent would be deleted:\n- Name: {}\n- Namespace: {}\n- Description: {}\n\nTo actually delete, call delete_agent with dry_run=false.",
                name,
                agent.namespace().unwrap_or(&self.namespace),
                agent.str_at("spec.description").unwrap_or_default()
            ));
        }
        Ok(format!("Successfully deleted agent '{name}'."))
    }
}
