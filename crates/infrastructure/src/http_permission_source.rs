use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use grantwatch_application::PermissionSource;
use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{Grant, GrantInput, Snapshot};

/// HTTP adapter for the permission source port.
///
/// Fetches the flat grant rows for one resource tree from
/// `GET {base_url}/permissions?resource_id=...`, authenticated with an
/// optional bearer token.
pub struct HttpPermissionSource {
    http_client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpPermissionSource {
    /// Creates a permission source against one collector endpoint.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        bearer_token: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();

        Self {
            http_client,
            base_url,
            bearer_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PermissionRow {
    resource_path: String,
    principal_id: String,
    #[serde(default = "default_principal_kind")]
    principal_kind: String,
    role: String,
    #[serde(default)]
    inherited: bool,
}

fn default_principal_kind() -> String {
    "user".to_owned()
}

fn snapshot_from_rows(
    resource_id: &ResourceId,
    rows: Vec<PermissionRow>,
    captured_at: DateTime<Utc>,
) -> AppResult<Snapshot> {
    let mut grants = Vec::with_capacity(rows.len());
    for row in rows {
        let principal_kind = row.principal_kind.parse().map_err(|_| {
            AppError::MalformedSnapshot(format!(
                "grant on '{}' for '{resource_id}' has unknown principal kind '{}'",
                row.resource_path, row.principal_kind
            ))
        })?;

        grants.push(Grant::new(GrantInput {
            resource_path: row.resource_path,
            principal_id: row.principal_id,
            principal_kind,
            role: row.role,
            inherited: row.inherited,
        })?);
    }

    Ok(Snapshot::new(grants, captured_at))
}

#[async_trait]
impl PermissionSource for HttpPermissionSource {
    async fn fetch_snapshot(&self, resource_id: &ResourceId) -> AppResult<Snapshot> {
        let mut request = self
            .http_client
            .get(format!("{}/permissions", self.base_url))
            .query(&[("resource_id", resource_id.as_str())]);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|error| {
            AppError::SourceUnavailable(format!(
                "failed to reach permission source for '{resource_id}': {error}"
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "permission source returned status {status} for '{resource_id}'"
            )));
        }

        let rows: Vec<PermissionRow> = response.json().await.map_err(|error| {
            AppError::MalformedSnapshot(format!(
                "permission source returned unreadable rows for '{resource_id}': {error}"
            ))
        })?;

        snapshot_from_rows(resource_id, rows, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use grantwatch_core::{AppError, ResourceId};
    use grantwatch_domain::PrincipalKind;

    use super::{PermissionRow, snapshot_from_rows};

    fn resource_id() -> ResourceId {
        ResourceId::new("sites/engineering").unwrap_or_else(|_| unreachable!("valid resource id"))
    }

    #[test]
    fn rows_convert_with_defaulted_metadata() {
        let rows = vec![PermissionRow {
            resource_path: "/docs/finance".to_owned(),
            principal_id: "alice@example.test".to_owned(),
            principal_kind: "user".to_owned(),
            role: "Read".to_owned(),
            inherited: false,
        }];

        let snapshot = snapshot_from_rows(&resource_id(), rows, Utc::now());
        assert!(snapshot.is_ok_and(|snapshot| {
            snapshot.grants().len() == 1
                && snapshot.grants()[0].principal_kind() == PrincipalKind::User
                && !snapshot.grants()[0].inherited()
        }));
    }

    #[test]
    fn unknown_principal_kind_is_a_malformed_snapshot() {
        let rows = vec![PermissionRow {
            resource_path: "/docs/finance".to_owned(),
            principal_id: "alice@example.test".to_owned(),
            principal_kind: "robot".to_owned(),
            role: "Read".to_owned(),
            inherited: false,
        }];

        let snapshot = snapshot_from_rows(&resource_id(), rows, Utc::now());
        assert!(matches!(snapshot, Err(AppError::MalformedSnapshot(_))));
    }

    #[test]
    fn empty_role_is_a_malformed_snapshot() {
        let rows = vec![PermissionRow {
            resource_path: "/docs/finance".to_owned(),
            principal_id: "alice@example.test".to_owned(),
            principal_kind: "group".to_owned(),
            role: "  ".to_owned(),
            inherited: true,
        }];

        let snapshot = snapshot_from_rows(&resource_id(), rows, Utc::now());
        assert!(matches!(snapshot, Err(AppError::MalformedSnapshot(_))));
    }

    #[test]
    fn row_parsing_defaults_optional_fields() {
        let parsed: Result<Vec<PermissionRow>, _> = serde_json::from_str(
            r#"[{"resource_path": "/docs", "principal_id": "auditors", "role": "Write"}]"#,
        );

        assert!(parsed.is_ok_and(|rows| {
            rows.len() == 1 && rows[0].principal_kind == "user" && !rows[0].inherited
        }));
    }

    #[test]
    fn rows_missing_required_fields_fail_to_parse() {
        let parsed: Result<Vec<PermissionRow>, _> =
            serde_json::from_str(r#"[{"resource_path": "/docs", "role": "Write"}]"#);

        assert!(parsed.is_err());
    }
}
