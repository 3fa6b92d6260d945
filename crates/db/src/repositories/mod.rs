use async_trait::async_trait;
use thiserror::Error;

use outreach_core::domain::draft::{Draft, DraftId, DraftStatus};
use outreach_core::domain::run::{Run, RunId};
use outreach_core::errors::ApplicationError;

pub mod memory;

pub use memory::{InMemoryDraftRepository, InMemoryRunRepository, InMemorySessionRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record `{0}` already exists and is immutable")]
    Immutable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Immutable(id) => {
                ApplicationError::Conflict(format!("record `{id}` is immutable"))
            }
            RepositoryError::Storage(message) => ApplicationError::Persistence(message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DraftFilter {
    /// Empty means every status.
    pub statuses: Vec<DraftStatus>,
    pub run_id: Option<RunId>,
}

impl DraftFilter {
    pub fn awaiting_decision() -> Self {
        Self { statuses: DraftStatus::AWAITING_DECISION.to_vec(), run_id: None }
    }

    pub fn with_status(status: DraftStatus) -> Self {
        Self { statuses: vec![status], run_id: None }
    }

    pub fn matches(&self, draft: &Draft) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&draft.status);
        let run_ok = self.run_id.as_ref().map_or(true, |run_id| &draft.run_id == run_id);
        status_ok && run_ok
    }
}

#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn find_by_id(&self, id: &DraftId) -> Result<Option<Draft>, RepositoryError>;
    async fn save(&self, draft: Draft) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list(&self, filter: &DraftFilter) -> Result<Vec<Draft>, RepositoryError>;
    /// Drops drafts outside `kept_runs` that no longer await a decision. Returns how many.
    async fn remove_settled_outside(&self, kept_runs: &[RunId]) -> Result<usize, RepositoryError>;
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn find_by_id(&self, id: &RunId) -> Result<Option<Run>, RepositoryError>;
    /// Runs are written once; a second save of the same id fails.
    async fn save(&self, run: Run) -> Result<(), RepositoryError>;
    async fn list_recent(&self, limit: usize) -> Result<Vec<Run>, RepositoryError>;
    /// Keeps the `limit` newest runs and returns their ids.
    async fn retain_recent(&self, limit: usize) -> Result<Vec<RunId>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, token: String) -> Result<(), RepositoryError>;
    async fn contains(&self, token: &str) -> Result<bool, RepositoryError>;
    async fn remove(&self, token: &str) -> Result<bool, RepositoryError>;
}
