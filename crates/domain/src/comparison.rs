use std::collections::BTreeMap;
use std::str::FromStr;

use grantwatch_core::AppError;
use serde::{Deserialize, Serialize};

use crate::grant::Grant;
use crate::snapshot::Snapshot;

/// Kind of detected drift between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Grant present in the live snapshot but not in the baseline.
    Added,
    /// Grant present in the baseline but not in the live snapshot.
    Removed,
    /// Grant present in both snapshots with a different role.
    Modified,
}

impl ChangeKind {
    /// Returns a stable storage value for this change kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "added" => Ok(Self::Added),
            "removed" => Ok(Self::Removed),
            "modified" => Ok(Self::Modified),
            _ => Err(AppError::Validation(format!(
                "unknown change kind '{value}'"
            ))),
        }
    }
}

/// One unit of drift produced by comparing a baseline against live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrantChange {
    /// A grant appeared that the baseline does not contain.
    Added {
        /// Path of the granted item.
        resource_path: String,
        /// Principal holding the new grant.
        principal_id: String,
        /// Role observed in the live snapshot.
        role: String,
    },
    /// A baseline grant is no longer present.
    Removed {
        /// Path of the granted item.
        resource_path: String,
        /// Principal whose grant disappeared.
        principal_id: String,
        /// Role recorded in the baseline.
        role: String,
    },
    /// A grant exists in both snapshots with different roles.
    Modified {
        /// Path of the granted item.
        resource_path: String,
        /// Principal whose role changed.
        principal_id: String,
        /// Role recorded in the baseline.
        old_role: String,
        /// Role observed in the live snapshot.
        new_role: String,
    },
}

impl GrantChange {
    /// Returns the change kind.
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Added { .. } => ChangeKind::Added,
            Self::Removed { .. } => ChangeKind::Removed,
            Self::Modified { .. } => ChangeKind::Modified,
        }
    }

    /// Returns the path of the affected item.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        match self {
            Self::Added { resource_path, .. }
            | Self::Removed { resource_path, .. }
            | Self::Modified { resource_path, .. } => resource_path.as_str(),
        }
    }

    /// Returns the affected principal.
    #[must_use]
    pub fn principal_id(&self) -> &str {
        match self {
            Self::Added { principal_id, .. }
            | Self::Removed { principal_id, .. }
            | Self::Modified { principal_id, .. } => principal_id.as_str(),
        }
    }

    /// Returns the role held before the change, when one existed.
    #[must_use]
    pub fn old_role(&self) -> Option<&str> {
        match self {
            Self::Added { .. } => None,
            Self::Removed { role, .. } => Some(role.as_str()),
            Self::Modified { old_role, .. } => Some(old_role.as_str()),
        }
    }

    /// Returns the role held after the change, when one exists.
    #[must_use]
    pub fn new_role(&self) -> Option<&str> {
        match self {
            Self::Added { role, .. } => Some(role.as_str()),
            Self::Removed { .. } => None,
            Self::Modified { new_role, .. } => Some(new_role.as_str()),
        }
    }
}

/// Compares a baseline snapshot against live state and returns the drift.
///
/// Grants are matched by `(resource_path, principal_id)`. A pair only in the
/// live snapshot is reported as added, a pair only in the baseline as
/// removed, and a pair in both with different roles as modified. When one
/// snapshot repeats a pair the last occurrence wins. Output is ordered by
/// resource path, then principal.
#[must_use]
pub fn compare_snapshots(baseline: &Snapshot, live: &Snapshot) -> Vec<GrantChange> {
    let baseline_index = grant_index(baseline.grants());
    let live_index = grant_index(live.grants());

    let mut changes = Vec::new();

    for (key, baseline_grant) in &baseline_index {
        match live_index.get(key) {
            None => changes.push(GrantChange::Removed {
                resource_path: baseline_grant.resource_path().to_owned(),
                principal_id: baseline_grant.principal_id().to_owned(),
                role: baseline_grant.role().to_owned(),
            }),
            Some(live_grant) if live_grant.role() != baseline_grant.role() => {
                changes.push(GrantChange::Modified {
                    resource_path: baseline_grant.resource_path().to_owned(),
                    principal_id: baseline_grant.principal_id().to_owned(),
                    old_role: baseline_grant.role().to_owned(),
                    new_role: live_grant.role().to_owned(),
                });
            }
            Some(_) => {}
        }
    }

    for (key, live_grant) in &live_index {
        if !baseline_index.contains_key(key) {
            changes.push(GrantChange::Added {
                resource_path: live_grant.resource_path().to_owned(),
                principal_id: live_grant.principal_id().to_owned(),
                role: live_grant.role().to_owned(),
            });
        }
    }

    changes.sort_by(|left, right| {
        left.resource_path()
            .cmp(right.resource_path())
            .then_with(|| left.principal_id().cmp(right.principal_id()))
    });

    changes
}

fn grant_index(grants: &[Grant]) -> BTreeMap<(&str, &str), &Grant> {
    let mut index = BTreeMap::new();
    for grant in grants {
        index.insert((grant.resource_path(), grant.principal_id()), grant);
    }

    index
}
