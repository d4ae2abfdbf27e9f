use chrono::{DateTime, Utc};
use grantwatch_core::{AppResult, NonEmptyString, ResourceId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::snapshot::Snapshot;

/// Named reference snapshot for one resource tree.
///
/// At most one baseline per resource is active at a time; detection cycles
/// compare live state against the active baseline only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    id: Uuid,
    resource_id: ResourceId,
    name: NonEmptyString,
    snapshot: Snapshot,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    is_active: bool,
}

/// Input payload used to construct a validated baseline.
#[derive(Debug, Clone)]
pub struct BaselineInput {
    /// Baseline identifier.
    pub id: Uuid,
    /// Resource tree the baseline belongs to.
    pub resource_id: ResourceId,
    /// Baseline name, unique within the resource.
    pub name: String,
    /// Captured reference snapshot.
    pub snapshot: Snapshot,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional identity of the creator.
    pub created_by: Option<String>,
    /// Whether the baseline is the active comparison reference.
    pub is_active: bool,
}

impl Baseline {
    /// Creates a validated baseline.
    pub fn new(input: BaselineInput) -> AppResult<Self> {
        let BaselineInput {
            id,
            resource_id,
            name,
            snapshot,
            created_at,
            created_by,
            is_active,
        } = input;

        let created_by = created_by.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            id,
            resource_id,
            name: NonEmptyString::new(name)?,
            snapshot,
            created_at,
            created_by,
            is_active,
        })
    }

    /// Returns the baseline identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the resource tree the baseline belongs to.
    #[must_use]
    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Returns the baseline name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the captured reference snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the identity of the creator, when recorded.
    #[must_use]
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Returns whether the baseline is the active comparison reference.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the same baseline with the active flag replaced.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use grantwatch_core::ResourceId;
    use uuid::Uuid;

    use super::{Baseline, BaselineInput};
    use crate::snapshot::Snapshot;

    fn resource_id() -> ResourceId {
        ResourceId::new("sites/engineering").unwrap_or_else(|_| unreachable!("valid resource id"))
    }

    #[test]
    fn baseline_rejects_blank_name() {
        let baseline = Baseline::new(BaselineInput {
            id: Uuid::new_v4(),
            resource_id: resource_id(),
            name: "   ".to_owned(),
            snapshot: Snapshot::new(Vec::new(), Utc::now()),
            created_at: Utc::now(),
            created_by: None,
            is_active: false,
        });

        assert!(baseline.is_err());
    }

    #[test]
    fn baseline_normalizes_blank_creator_to_none() {
        let baseline = Baseline::new(BaselineInput {
            id: Uuid::new_v4(),
            resource_id: resource_id(),
            name: "pre-migration".to_owned(),
            snapshot: Snapshot::new(Vec::new(), Utc::now()),
            created_at: Utc::now(),
            created_by: Some("   ".to_owned()),
            is_active: false,
        });

        assert!(baseline.is_ok_and(|baseline| baseline.created_by().is_none()));
    }
}
