use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::grant::{Grant, PrincipalKind};

/// Immutable set of grants captured from one resource tree at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    grants: Vec<Grant>,
    captured_at: DateTime<Utc>,
    content_hash: String,
}

impl Snapshot {
    /// Creates a snapshot and computes its content hash.
    #[must_use]
    pub fn new(grants: Vec<Grant>, captured_at: DateTime<Utc>) -> Self {
        let content_hash = content_hash(&grants);

        Self {
            grants,
            captured_at,
            content_hash,
        }
    }

    /// Returns the captured grants in source order.
    #[must_use]
    pub fn grants(&self) -> &[Grant] {
        self.grants.as_slice()
    }

    /// Returns the capture timestamp.
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns the hex-encoded SHA-256 content hash.
    ///
    /// The hash covers grant identities sorted lexicographically, so two
    /// snapshots holding the same grants in a different order share a hash.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        self.content_hash.as_str()
    }

    /// Returns summary statistics over the captured grants.
    #[must_use]
    pub fn statistics(&self) -> SnapshotStatistics {
        let mut unique_paths = BTreeSet::new();
        let mut unique_principals = BTreeSet::new();
        let mut unique_users = BTreeSet::new();
        let mut unique_groups = BTreeSet::new();
        let mut inherited_count = 0_usize;
        let mut grants_by_role: BTreeMap<String, usize> = BTreeMap::new();

        for grant in &self.grants {
            unique_paths.insert(grant.resource_path());
            unique_principals.insert(grant.principal_id());

            match grant.principal_kind() {
                PrincipalKind::User => {
                    unique_users.insert(grant.principal_id());
                }
                PrincipalKind::Group => {
                    unique_groups.insert(grant.principal_id());
                }
                PrincipalKind::App => {}
            }

            if grant.inherited() {
                inherited_count += 1;
            }

            *grants_by_role.entry(grant.role().to_owned()).or_insert(0) += 1;
        }

        SnapshotStatistics {
            total_grants: self.grants.len(),
            unique_paths: unique_paths.len(),
            unique_principals: unique_principals.len(),
            unique_users: unique_users.len(),
            unique_groups: unique_groups.len(),
            inherited_count,
            grants_by_role,
        }
    }
}

/// Aggregate counts describing the contents of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStatistics {
    /// Total number of captured grants.
    pub total_grants: usize,
    /// Number of distinct granted item paths.
    pub unique_paths: usize,
    /// Number of distinct principals across all kinds.
    pub unique_principals: usize,
    /// Number of distinct user principals.
    pub unique_users: usize,
    /// Number of distinct group principals.
    pub unique_groups: usize,
    /// Number of grants inherited from parent items.
    pub inherited_count: usize,
    /// Grant counts keyed by permission level.
    pub grants_by_role: BTreeMap<String, usize>,
}

fn content_hash(grants: &[Grant]) -> String {
    let mut identities: Vec<String> = grants
        .iter()
        .map(|grant| {
            format!(
                "{}|{}|{}",
                grant.resource_path(),
                grant.principal_id(),
                grant.role()
            )
        })
        .collect();
    identities.sort();

    let mut hasher = Sha256::new();
    for identity in &identities {
        hasher.update(identity.as_bytes());
        hasher.update(b"\n");
    }

    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::Snapshot;
    use crate::grant::{Grant, GrantInput, PrincipalKind};

    fn grant(path: &str, principal: &str, kind: PrincipalKind, role: &str) -> Grant {
        Grant::new(GrantInput {
            resource_path: path.to_owned(),
            principal_id: principal.to_owned(),
            principal_kind: kind,
            role: role.to_owned(),
            inherited: false,
        })
        .unwrap_or_else(|_| unreachable!("test grant input is valid"))
    }

    #[test]
    fn content_hash_is_stable_under_reordering() {
        let first = grant("/docs", "alice@example.test", PrincipalKind::User, "Read");
        let second = grant("/docs", "auditors", PrincipalKind::Group, "Write");
        let captured_at = Utc::now();

        let forward = Snapshot::new(vec![first.clone(), second.clone()], captured_at);
        let reversed = Snapshot::new(vec![second, first], captured_at);

        assert_eq!(forward.content_hash(), reversed.content_hash());
    }

    #[test]
    fn content_hash_changes_when_a_role_changes() {
        let captured_at = Utc::now();
        let read = Snapshot::new(
            vec![grant("/docs", "alice@example.test", PrincipalKind::User, "Read")],
            captured_at,
        );
        let write = Snapshot::new(
            vec![grant("/docs", "alice@example.test", PrincipalKind::User, "Write")],
            captured_at,
        );

        assert_ne!(read.content_hash(), write.content_hash());
    }

    #[test]
    fn statistics_count_distinct_principals_by_kind() {
        let snapshot = Snapshot::new(
            vec![
                grant("/docs", "alice@example.test", PrincipalKind::User, "Read"),
                grant("/docs/hr", "alice@example.test", PrincipalKind::User, "Read"),
                grant("/docs", "auditors", PrincipalKind::Group, "Write"),
                grant("/docs", "reporting-bot", PrincipalKind::App, "Read"),
            ],
            Utc::now(),
        );

        let statistics = snapshot.statistics();
        assert_eq!(statistics.total_grants, 4);
        assert_eq!(statistics.unique_paths, 2);
        assert_eq!(statistics.unique_principals, 3);
        assert_eq!(statistics.unique_users, 1);
        assert_eq!(statistics.unique_groups, 1);
        assert_eq!(statistics.grants_by_role.get("Read"), Some(&3));
        assert_eq!(statistics.grants_by_role.get("Write"), Some(&1));
    }
}
