use std::fmt::Write as _;

use kmeta_core::{Severity, ValidationIssue};

/// Human-readable report returned by the `validate_manifest` tool.
pub fn render_report(issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return "Validation passed. Manifest is valid and ready to apply.".to_string();
    }
    let mut out = String::from("Validation Results:\n\n");
    for issue in issues {
        let prefix = match issue.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };
        let _ = writeln!(out, "{prefix} [{}]: {}", issue.field, issue.message);
    }
    out.push('\n');
    if issues.iter().any(ValidationIssue::is_error) {
        out.push_str("Manifest has errors and should not be applied until they are resolved.");
    } else {
        out.push_str("Manifest has warnings but can be applied. Consider addressing warnings for best practices.");
    }
    out
}
