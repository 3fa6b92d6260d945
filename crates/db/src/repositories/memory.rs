use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use outreach_core::domain::draft::{Draft, DraftId};
use outreach_core::domain::run::{Run, RunId};

use super::{DraftFilter, DraftRepository, RepositoryError, RunRepository, SessionRepository};

#[derive(Default)]
pub struct InMemoryDraftRepository {
    drafts: RwLock<HashMap<String, Draft>>,
}

#[async_trait::async_trait]
impl DraftRepository for InMemoryDraftRepository {
    async fn find_by_id(&self, id: &DraftId) -> Result<Option<Draft>, RepositoryError> {
        let drafts = self.drafts.read().await;
        Ok(drafts.get(&id.0).cloned())
    }

    async fn save(&self, draft: Draft) -> Result<(), RepositoryError> {
        let mut drafts = self.drafts.write().await;
        drafts.insert(draft.id.0.clone(), draft);
        Ok(())
    }

    async fn list(&self, filter: &DraftFilter) -> Result<Vec<Draft>, RepositoryError> {
        let drafts = self.drafts.read().await;
        let mut matching =
            drafts.values().filter(|draft| filter.matches(draft)).cloned().collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(matching)
    }

    async fn remove_settled_outside(&self, kept_runs: &[RunId]) -> Result<usize, RepositoryError> {
        let mut drafts = self.drafts.write().await;
        let before = drafts.len();
        drafts.retain(|_, draft| {
            draft.status.is_awaiting_decision() || kept_runs.contains(&draft.run_id)
        });
        Ok(before - drafts.len())
    }
}

#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<String, Run>>,
}

#[async_trait::async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn find_by_id(&self, id: &RunId) -> Result<Option<Run>, RepositoryError> {
        let runs = self.runs.read().await;
        Ok(runs.get(&id.0).cloned())
    }

    async fn save(&self, run: Run) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.id.0) {
            return Err(RepositoryError::Immutable(run.id.0));
        }
        runs.insert(run.id.0.clone(), run);
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Run>, RepositoryError> {
        let runs = self.runs.read().await;
        let mut recent = runs.values().cloned().collect::<Vec<_>>();
        recent.sort_by(|left, right| right.started_at.cmp(&left.started_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn retain_recent(&self, limit: usize) -> Result<Vec<RunId>, RepositoryError> {
        let mut runs = self.runs.write().await;
        let mut ordered =
            runs.values().map(|run| (run.started_at, run.id.clone())).collect::<Vec<_>>();
        ordered.sort_by(|left, right| right.0.cmp(&left.0));

        let kept = ordered.into_iter().take(limit).map(|(_, id)| id).collect::<Vec<_>>();
        runs.retain(|_, run| kept.contains(&run.id));
        Ok(kept)
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    tokens: RwLock<HashSet<String>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, token: String) -> Result<(), RepositoryError> {
        self.tokens.write().await.insert(token);
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool, RepositoryError> {
        Ok(self.tokens.read().await.contains(token))
    }

    async fn remove(&self, token: &str) -> Result<bool, RepositoryError> {
        Ok(self.tokens.write().await.remove(token))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use outreach_core::domain::conversation::{Conversation, ConversationId, Prospect};
    use outreach_core::domain::draft::{Draft, DraftStatus};
    use outreach_core::domain::run::{Run, RunId, RunMode, RunSummary};

    use crate::repositories::{
        DraftFilter, DraftRepository, InMemoryDraftRepository, InMemoryRunRepository,
        InMemorySessionRepository, RepositoryError, RunRepository, SessionRepository,
    };

    fn draft(run_id: &RunId, status: DraftStatus, minutes_ago: i64) -> Draft {
        let conversation = Conversation {
            id: ConversationId(format!("conv-{minutes_ago}")),
            account_id: 93126,
            campaign_id: None,
            prospect: Prospect::default(),
            tags: Vec::new(),
            messages: Vec::new(),
            last_sender: None,
        };
        let mut draft =
            Draft::new(run_id.clone(), &conversation, Utc::now() - Duration::minutes(minutes_ago));
        draft.status = status;
        draft
    }

    fn run(minutes_ago: i64) -> Run {
        let started_at = Utc::now() - Duration::minutes(minutes_ago);
        Run {
            id: RunId::generate(),
            mode: RunMode::DryRun,
            started_at,
            finished_at: started_at,
            duration_ms: 0,
            summary: RunSummary::default(),
            errors: Vec::new(),
            draft_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn draft_list_filters_by_status_newest_first() {
        let repo = InMemoryDraftRepository::default();
        let run_id = RunId::generate();
        let older = draft(&run_id, DraftStatus::PendingApproval, 10);
        let newer = draft(&run_id, DraftStatus::Escalated, 1);
        let sent = draft(&run_id, DraftStatus::Sent, 5);

        for item in [older.clone(), newer.clone(), sent.clone()] {
            repo.save(item).await.expect("save draft");
        }

        let awaiting = repo.list(&DraftFilter::awaiting_decision()).await.expect("list drafts");
        let ids = awaiting.iter().map(|d| d.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids, vec![newer.id, older.id]);

        let only_sent =
            repo.list(&DraftFilter::with_status(DraftStatus::Sent)).await.expect("list sent");
        assert_eq!(only_sent.len(), 1);
        assert_eq!(only_sent[0].id, sent.id);
    }

    #[tokio::test]
    async fn draft_save_replaces_existing_record() {
        let repo = InMemoryDraftRepository::default();
        let mut item = draft(&RunId::generate(), DraftStatus::Ready, 0);
        repo.save(item.clone()).await.expect("save draft");

        item.status = DraftStatus::Rejected;
        repo.save(item.clone()).await.expect("update draft");

        let found = repo.find_by_id(&item.id).await.expect("find draft");
        assert_eq!(found.map(|d| d.status), Some(DraftStatus::Rejected));
    }

    #[tokio::test]
    async fn runs_are_write_once_and_listed_newest_first() {
        let repo = InMemoryRunRepository::default();
        let first = run(30);
        let second = run(5);

        repo.save(first.clone()).await.expect("save first run");
        repo.save(second.clone()).await.expect("save second run");

        let duplicate = repo.save(first.clone()).await;
        assert!(matches!(duplicate, Err(RepositoryError::Immutable(_))));

        let recent = repo.list_recent(1).await.expect("list runs");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second.id);
        assert_eq!(repo.find_by_id(&first.id).await.expect("find run"), Some(first));
    }

    #[tokio::test]
    async fn retention_drops_old_runs_and_their_settled_drafts() {
        let runs = InMemoryRunRepository::default();
        let drafts = InMemoryDraftRepository::default();
        let old_run = run(60);
        let new_run = run(1);
        runs.save(old_run.clone()).await.expect("save old run");
        runs.save(new_run.clone()).await.expect("save new run");

        let old_sent = draft(&old_run.id, DraftStatus::Sent, 60);
        let old_pending = draft(&old_run.id, DraftStatus::PendingApproval, 59);
        let new_skipped = draft(&new_run.id, DraftStatus::Skipped, 1);
        for item in [old_sent.clone(), old_pending.clone(), new_skipped.clone()] {
            drafts.save(item).await.expect("save draft");
        }

        let kept = runs.retain_recent(1).await.expect("retain runs");
        assert_eq!(kept, vec![new_run.id.clone()]);
        assert_eq!(runs.find_by_id(&old_run.id).await.expect("find run"), None);

        let removed = drafts.remove_settled_outside(&kept).await.expect("prune drafts");
        assert_eq!(removed, 1);
        assert_eq!(drafts.find_by_id(&old_sent.id).await.expect("find draft"), None);
        assert!(drafts.find_by_id(&old_pending.id).await.expect("find draft").is_some());
        assert!(drafts.find_by_id(&new_skipped.id).await.expect("find draft").is_some());
    }

    #[tokio::test]
    async fn sessions_can_be_revoked() {
        let repo = InMemorySessionRepository::default();
        repo.insert("token-1".to_string()).await.expect("insert token");

        assert!(repo.contains("token-1").await.expect("contains"));
        assert!(repo.remove("token-1").await.expect("remove"));
        assert!(!repo.contains("token-1").await.expect("contains after remove"));
        assert!(!repo.remove("token-1").await.expect("second remove"));
    }
}
