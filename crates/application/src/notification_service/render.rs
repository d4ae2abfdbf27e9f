use std::fmt::Write as _;

use grantwatch_core::ResourceId;
use grantwatch_domain::ChangeKind;

use crate::detection_ports::Change;

const DETAILED_CHANGE_LIMIT: usize = 10;

/// Renders the plain-text subject and body for one bundle.
pub(super) fn render_bundle(resource_id: &ResourceId, changes: &[Change]) -> (String, String) {
    let subject = if changes.len() == 1 {
        format!("1 permission change detected for {resource_id}")
    } else {
        format!(
            "{} permission changes detected for {resource_id}",
            changes.len()
        )
    };

    let mut body = format!("Drift against the active baseline for {resource_id}:\n\n");
    for change in changes.iter().take(DETAILED_CHANGE_LIMIT) {
        let _ = writeln!(body, "- {}", describe(change));
    }
    if changes.len() > DETAILED_CHANGE_LIMIT {
        let _ = writeln!(
            body,
            "... and {} more",
            changes.len() - DETAILED_CHANGE_LIMIT
        );
    }

    (subject, body)
}

fn describe(change: &Change) -> String {
    match change.kind {
        ChangeKind::Added => format!(
            "added: '{}' granted '{}' on {}",
            change.principal_id,
            change.new_role.as_deref().unwrap_or("unknown"),
            change.resource_path
        ),
        ChangeKind::Removed => format!(
            "removed: '{}' lost '{}' on {}",
            change.principal_id,
            change.old_role.as_deref().unwrap_or("unknown"),
            change.resource_path
        ),
        ChangeKind::Modified => format!(
            "modified: '{}' changed from '{}' to '{}' on {}",
            change.principal_id,
            change.old_role.as_deref().unwrap_or("unknown"),
            change.new_role.as_deref().unwrap_or("unknown"),
            change.resource_path
        ),
    }
}
