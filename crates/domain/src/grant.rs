use std::str::FromStr;

use grantwatch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Kind of principal an access grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Individual user account.
    User,
    /// Security or distribution group.
    Group,
    /// Service or application identity.
    App,
}

impl PrincipalKind {
    /// Returns a stable storage value for this principal kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::App => "app",
        }
    }
}

impl FromStr for PrincipalKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "app" => Ok(Self::App),
            _ => Err(AppError::Validation(format!(
                "unknown principal kind '{value}'"
            ))),
        }
    }
}

/// One access assignment captured from a resource tree.
///
/// Grants are identified by the `(resource_path, principal_id, role)`
/// composite. `principal_kind` and `inherited` are descriptive metadata and
/// do not participate in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    resource_path: String,
    principal_id: String,
    principal_kind: PrincipalKind,
    role: String,
    inherited: bool,
}

/// Input payload used to construct a validated grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantInput {
    /// Path of the granted item relative to the resource tree root.
    pub resource_path: String,
    /// Stable identifier of the principal holding the grant.
    pub principal_id: String,
    /// Kind of principal holding the grant.
    pub principal_kind: PrincipalKind,
    /// Granted permission level.
    pub role: String,
    /// Whether the grant is inherited from a parent item.
    pub inherited: bool,
}

impl Grant {
    /// Creates a validated grant.
    ///
    /// A grant with an empty path, principal, or role cannot be compared, so
    /// construction fails with [`AppError::MalformedSnapshot`] and the
    /// surrounding snapshot is rejected as a whole.
    pub fn new(input: GrantInput) -> AppResult<Self> {
        let GrantInput {
            resource_path,
            principal_id,
            principal_kind,
            role,
            inherited,
        } = input;

        if resource_path.trim().is_empty() {
            return Err(AppError::MalformedSnapshot(
                "grant resource_path must not be empty".to_owned(),
            ));
        }

        if principal_id.trim().is_empty() {
            return Err(AppError::MalformedSnapshot(format!(
                "grant on '{resource_path}' has an empty principal_id"
            )));
        }

        if role.trim().is_empty() {
            return Err(AppError::MalformedSnapshot(format!(
                "grant for principal '{principal_id}' on '{resource_path}' has an empty role"
            )));
        }

        Ok(Self {
            resource_path,
            principal_id,
            principal_kind,
            role,
            inherited,
        })
    }

    /// Returns the path of the granted item.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        self.resource_path.as_str()
    }

    /// Returns the principal identifier.
    #[must_use]
    pub fn principal_id(&self) -> &str {
        self.principal_id.as_str()
    }

    /// Returns the principal kind.
    #[must_use]
    pub fn principal_kind(&self) -> PrincipalKind {
        self.principal_kind
    }

    /// Returns the granted permission level.
    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_str()
    }

    /// Returns whether the grant is inherited from a parent item.
    #[must_use]
    pub fn inherited(&self) -> bool {
        self.inherited
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Grant, GrantInput, PrincipalKind};

    #[test]
    fn grant_rejects_empty_role() {
        let grant = Grant::new(GrantInput {
            resource_path: "/docs/finance".to_owned(),
            principal_id: "alice@example.test".to_owned(),
            principal_kind: PrincipalKind::User,
            role: "   ".to_owned(),
            inherited: false,
        });

        assert!(grant.is_err());
    }

    #[test]
    fn grant_rejects_empty_resource_path() {
        let grant = Grant::new(GrantInput {
            resource_path: String::new(),
            principal_id: "alice@example.test".to_owned(),
            principal_kind: PrincipalKind::User,
            role: "Read".to_owned(),
            inherited: false,
        });

        assert!(grant.is_err());
    }

    #[test]
    fn principal_kind_round_trips_through_storage_value() {
        for kind in [PrincipalKind::User, PrincipalKind::Group, PrincipalKind::App] {
            let parsed = PrincipalKind::from_str(kind.as_str());
            assert_eq!(parsed.ok(), Some(kind));
        }
    }
}
