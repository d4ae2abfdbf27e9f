use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantwatch_core::{AppError, AppResult, ResourceId};
use uuid::Uuid;

/// Terminal and in-flight states of one detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionRunStatus {
    /// Cycle claimed the resource and is executing.
    Running,
    /// Cycle finished and persisted its result.
    Succeeded,
    /// Cycle aborted with a recorded failure.
    Failed,
    /// Cycle found no active baseline and deliberately did nothing.
    NoBaseline,
}

impl DetectionRunStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::NoBaseline => "no_baseline",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "no_baseline" => Ok(Self::NoBaseline),
            _ => Err(AppError::Validation(format!(
                "unknown detection run status '{value}'"
            ))),
        }
    }
}

/// Failure classification recorded on failed detection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleFailureKind {
    /// Permission source transport or auth failure.
    SourceUnavailable,
    /// Source returned rows that do not form a well-formed snapshot.
    MalformedSnapshot,
    /// Persistence store rejected or lost the cycle's writes.
    Store,
    /// Cycle exceeded its deadline.
    Timeout,
    /// Unexpected failure.
    Internal,
}

impl CycleFailureKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
            Self::MalformedSnapshot => "malformed_snapshot",
            Self::Store => "store",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "source_unavailable" => Ok(Self::SourceUnavailable),
            "malformed_snapshot" => Ok(Self::MalformedSnapshot),
            "store" => Ok(Self::Store),
            "timeout" => Ok(Self::Timeout),
            "internal" => Ok(Self::Internal),
            _ => Err(AppError::Validation(format!(
                "unknown cycle failure kind '{value}'"
            ))),
        }
    }
}

impl From<&AppError> for CycleFailureKind {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::SourceUnavailable(_) => Self::SourceUnavailable,
            AppError::MalformedSnapshot(_) => Self::MalformedSnapshot,
            AppError::Store(_) => Self::Store,
            AppError::Timeout(_) => Self::Timeout,
            _ => Self::Internal,
        }
    }
}

/// Persisted record of one detection cycle.
///
/// A `running` row younger than the stale threshold doubles as the
/// per-resource in-flight marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRun {
    /// Run identifier.
    pub id: Uuid,
    /// Resource the cycle ran against.
    pub resource_id: ResourceId,
    /// Current run state.
    pub status: DetectionRunStatus,
    /// Cycle start timestamp.
    pub started_at: DateTime<Utc>,
    /// Cycle finish timestamp, absent while running.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure classification for failed runs.
    pub failure_kind: Option<CycleFailureKind>,
    /// Failure details for failed runs.
    pub failure_message: Option<String>,
    /// Number of newly persisted changes.
    pub new_change_count: i64,
}

/// Repository port for detection run records.
#[async_trait]
pub trait DetectionRunRepository: Send + Sync {
    /// Claims the per-resource in-flight marker by inserting a `running`
    /// run row.
    ///
    /// Returns `None` when another run for the resource is already in
    /// flight. A `running` row started before `stale_before` belongs to a
    /// crashed cycle; it is marked failed and no longer blocks the claim.
    async fn try_begin_run(
        &self,
        resource_id: &ResourceId,
        started_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>>;

    /// Marks one run succeeded and releases the marker.
    async fn complete_run(
        &self,
        run_id: Uuid,
        finished_at: DateTime<Utc>,
        new_change_count: i64,
    ) -> AppResult<()>;

    /// Marks one run failed and releases the marker.
    async fn fail_run(
        &self,
        run_id: Uuid,
        finished_at: DateTime<Utc>,
        failure_kind: CycleFailureKind,
        failure_message: &str,
    ) -> AppResult<()>;

    /// Marks one run finished with no active baseline and releases the
    /// marker.
    async fn mark_no_baseline(&self, run_id: Uuid, finished_at: DateTime<Utc>) -> AppResult<()>;

    /// Lists recent runs, newest first, optionally scoped to one resource.
    async fn list_recent(
        &self,
        resource_id: Option<&ResourceId>,
        limit: usize,
    ) -> AppResult<Vec<DetectionRun>>;
}
