pub mod repositories;

use std::sync::Arc;

pub use repositories::{
    DraftFilter, DraftRepository, InMemoryDraftRepository, InMemoryRunRepository,
    InMemorySessionRepository, RepositoryError, RunRepository, SessionRepository,
};

/// Process-owned state handed to the runtime and HTTP handlers. Nothing survives a restart.
#[derive(Clone)]
pub struct Store {
    pub drafts: Arc<dyn DraftRepository>,
    pub runs: Arc<dyn RunRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            drafts: Arc::new(InMemoryDraftRepository::default()),
            runs: Arc::new(InMemoryRunRepository::default()),
            sessions: Arc::new(InMemorySessionRepository::default()),
        }
    }

    /// Bounds memory for long-lived processes: keeps the `keep_runs` newest runs, their
    /// drafts, and every draft still awaiting a decision. Returns the drafts dropped.
    pub async fn prune(&self, keep_runs: usize) -> Result<usize, RepositoryError> {
        let kept = self.runs.retain_recent(keep_runs).await?;
        self.drafts.remove_settled_outside(&kept).await
    }
}
