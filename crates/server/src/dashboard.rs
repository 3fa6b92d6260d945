//! Dashboard and trigger API.
//!
//! Endpoints (all behind [`crate::auth::require_session`]):
//! - `GET  /status`                       - service info
//! - `POST /process`                      - manual run trigger
//! - `POST /cron/nightly`                 - scheduled live run
//! - `POST /api/runs`, `GET /api/runs`    - start a run, list recent runs
//! - `GET  /api/runs/{id}`                - one stored run
//! - `GET  /api/drafts?status=`           - drafts, awaiting decision by default
//! - `GET  /api/drafts/{id}`              - one draft
//! - `POST /api/drafts/{id}/approve`      - send a draft, optionally edited
//! - `POST /api/drafts/{id}/reject`       - reject a draft
//! - `POST /api/drafts/approve-all`       - send every auto-approve eligible draft
//! - `GET  /api/stats`                    - CRM stats plus local counters

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use outreach_agent::{RunOptions, RuntimeError};
use outreach_core::domain::decision::Action;
use outreach_core::domain::draft::{Draft, DraftId, DraftStatus};
use outreach_core::domain::run::{Run, RunErrorEntry, RunId, RunMode, RunSummary};
use outreach_core::errors::{ApplicationError, InterfaceError};
use outreach_db::{DraftFilter, RepositoryError};
use outreach_heyreach::{OutboundMessage, StatsQuery};

use crate::auth;
use crate::state::AppState;

const RECENT_RUNS: usize = 20;
const PREVIEW_CHARS: usize = 100;
const DEFAULT_REJECTION_REASON: &str = "Manual rejection";

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(service_status))
        .route("/process", post(process))
        .route("/cron/nightly", post(nightly))
        .route("/api/runs", post(start_run).get(list_runs))
        .route("/api/runs/{id}", get(get_run))
        .route("/api/drafts", get(list_drafts))
        .route("/api/drafts/approve-all", post(approve_all))
        .route("/api/drafts/{id}", get(get_draft))
        .route("/api/drafts/{id}/approve", post(approve_draft))
        .route("/api/drafts/{id}/reject", post(reject_draft))
        .route("/api/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state, auth::require_session))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

type ApiFailure = (StatusCode, Json<ApiError>);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProcessRequest {
    pub dry_run: bool,
    pub max_messages: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StartRunRequest {
    pub mode: RunMode,
    pub max_messages: Option<u32>,
}

impl Default for StartRunRequest {
    fn default() -> Self {
        Self { mode: RunMode::DryRun, max_messages: None }
    }
}

#[derive(Debug, Serialize)]
pub struct DraftPreview {
    pub draft_id: DraftId,
    pub conversation_id: String,
    pub prospect_name: String,
    pub status: DraftStatus,
    pub action: Option<Action>,
    pub confidence: f64,
    pub auto_approve_eligible: bool,
    pub message_preview: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub run_id: RunId,
    pub mode: RunMode,
    pub duration_ms: i64,
    pub summary: RunSummary,
    pub errors: Vec<RunErrorEntry>,
    pub drafts_count: usize,
    pub drafts: Vec<DraftPreview>,
}

#[derive(Debug, Serialize)]
pub struct RunListItem {
    pub run_id: RunId,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
}

#[derive(Debug, Serialize)]
pub struct RunList {
    pub runs: Vec<RunListItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DraftListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DraftList {
    pub count: usize,
    pub drafts: Vec<Draft>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApproveRequest {
    pub edited_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub success: bool,
    pub draft_id: DraftId,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RejectResponse {
    pub success: bool,
    pub draft_id: DraftId,
}

#[derive(Debug, Serialize)]
pub struct BulkFailure {
    pub draft_id: DraftId,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkApproveResponse {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub errors: Vec<BulkFailure>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct LocalStats {
    pub total_drafts: usize,
    pub pending_approval: usize,
    pub sent: usize,
    pub rejected: usize,
    pub escalated: usize,
    pub auto_approved: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub heyreach: Value,
    pub local_stats: LocalStats,
    pub send_enabled: bool,
    pub auto_approve_confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub run_in_progress: bool,
    pub send_enabled: bool,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        service: "outreach",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.settings.environment.clone(),
        run_in_progress: state.runtime.is_running(),
        send_enabled: state.settings.send_enabled,
        timestamp: Utc::now(),
    })
}

async fn process(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RunReport>, ApiFailure> {
    let request: ProcessRequest = parse_body(&body)?;
    let mode = if request.dry_run { RunMode::DryRun } else { RunMode::Live };
    execute_run(&state, "manual", RunOptions { mode, max_messages: request.max_messages }).await
}

async fn nightly(State(state): State<AppState>) -> Result<Json<RunReport>, ApiFailure> {
    let max_messages = Some(state.settings.max_messages_per_run);
    execute_run(&state, "nightly", RunOptions { mode: RunMode::Live, max_messages }).await
}

async fn start_run(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RunReport>, ApiFailure> {
    let request: StartRunRequest = parse_body(&body)?;
    let options = RunOptions { mode: request.mode, max_messages: request.max_messages };
    execute_run(&state, "api", options).await
}

async fn execute_run(
    state: &AppState,
    trigger: &'static str,
    options: RunOptions,
) -> Result<Json<RunReport>, ApiFailure> {
    info!(
        event_name = "server.run.triggered",
        correlation_id = trigger,
        trigger,
        mode = ?options.mode,
        "processing run requested"
    );

    let run = state.runtime.process(options).await.map_err(|error| match error {
        RuntimeError::AlreadyRunning => {
            api_error(StatusCode::CONFLICT, "A processing run is already in progress")
        }
        RuntimeError::Repository(error) => repository_failure(error, trigger),
    })?;

    let mut drafts = Vec::with_capacity(run.draft_ids.len());
    for draft_id in &run.draft_ids {
        let found = state
            .store
            .drafts
            .find_by_id(draft_id)
            .await
            .map_err(|error| repository_failure(error, trigger))?;
        if let Some(draft) = found {
            drafts.push(preview(&draft));
        }
    }

    Ok(Json(RunReport {
        success: !run.has_fatal_error(),
        run_id: run.id,
        mode: run.mode,
        duration_ms: run.duration_ms,
        summary: run.summary,
        errors: run.errors,
        drafts_count: drafts.len(),
        drafts,
    }))
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

async fn list_runs(State(state): State<AppState>) -> Result<Json<RunList>, ApiFailure> {
    let runs = state
        .store
        .runs
        .list_recent(RECENT_RUNS)
        .await
        .map_err(|error| repository_failure(error, "runs"))?;

    Ok(Json(RunList {
        runs: runs
            .into_iter()
            .map(|run| RunListItem {
                run_id: run.id,
                mode: run.mode,
                started_at: run.started_at,
                finished_at: run.finished_at,
                summary: run.summary,
            })
            .collect(),
    }))
}

async fn get_run(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Run>, ApiFailure> {
    let run_id = RunId(id);
    state
        .store
        .runs
        .find_by_id(&run_id)
        .await
        .map_err(|error| repository_failure(error, &run_id.0))?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Run not found"))
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

async fn list_drafts(
    Query(query): Query<DraftListQuery>,
    State(state): State<AppState>,
) -> Result<Json<DraftList>, ApiFailure> {
    let filter = draft_filter(query.status.as_deref())?;
    let drafts = state
        .store
        .drafts
        .list(&filter)
        .await
        .map_err(|error| repository_failure(error, "drafts"))?;

    Ok(Json(DraftList { count: drafts.len(), drafts }))
}

fn draft_filter(raw_status: Option<&str>) -> Result<DraftFilter, ApiFailure> {
    let normalized = raw_status.map(|value| value.trim().to_ascii_lowercase());
    match normalized.as_deref() {
        None | Some("") => Ok(DraftFilter::awaiting_decision()),
        Some("all") => Ok(DraftFilter::default()),
        Some(other) => other
            .parse::<DraftStatus>()
            .map(DraftFilter::with_status)
            .map_err(|error| api_error(StatusCode::BAD_REQUEST, error.to_string())),
    }
}

async fn get_draft(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Draft>, ApiFailure> {
    load_draft(&state, &DraftId(id)).await.map(Json)
}

async fn approve_draft(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApproveResponse>), ApiFailure> {
    let request: ApproveRequest = parse_body(&body)?;
    let draft_id = DraftId(id);
    let _approval = state.approvals.lock().await;

    let mut draft = load_draft(&state, &draft_id).await?;
    if !draft.can_transition_to(DraftStatus::Sent) {
        return Err(domain_conflict(&draft, DraftStatus::Sent));
    }

    let edited = request
        .edited_message
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned);
    let Some(text) = edited.or_else(|| draft.outgoing_text().map(str::to_owned)) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No message to send"));
    };

    if !state.settings.send_enabled {
        return Err(api_error(StatusCode::CONFLICT, "Sending is disabled (send_enabled=false)"));
    }

    if let Err(error) = send_draft(&state, &draft, &text).await {
        warn!(
            event_name = "server.draft.send_failed",
            correlation_id = %draft.id,
            conversation_id = %draft.conversation_id,
            error = %error,
            "approved draft could not be sent"
        );
        return Ok((
            StatusCode::BAD_GATEWAY,
            Json(ApproveResponse {
                success: false,
                draft_id: draft.id,
                sent_at: None,
                error: Some(error.to_string()),
            }),
        ));
    }

    let now = Utc::now();
    draft.mark_sent(text, false, now).map_err(|error| domain_failure(error, &draft_id))?;
    save_draft(&state, draft).await?;

    info!(
        event_name = "server.draft.approved",
        correlation_id = %draft_id,
        "draft approved and sent"
    );

    Ok((
        StatusCode::OK,
        Json(ApproveResponse { success: true, draft_id, sent_at: Some(now), error: None }),
    ))
}

async fn reject_draft(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RejectResponse>, ApiFailure> {
    let request: RejectRequest = parse_body(&body)?;
    let draft_id = DraftId(id);
    let _approval = state.approvals.lock().await;

    let mut draft = load_draft(&state, &draft_id).await?;
    let reason = request
        .reason
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());

    draft.reject(reason, Utc::now()).map_err(|error| domain_failure(error, &draft_id))?;
    save_draft(&state, draft).await?;

    info!(event_name = "server.draft.rejected", correlation_id = %draft_id, "draft rejected");
    Ok(Json(RejectResponse { success: true, draft_id }))
}

async fn approve_all(
    State(state): State<AppState>,
) -> Result<Json<BulkApproveResponse>, ApiFailure> {
    if !state.settings.send_enabled {
        return Err(api_error(StatusCode::CONFLICT, "Sending is disabled (send_enabled=false)"));
    }
    let _approval = state.approvals.lock().await;

    let filter = DraftFilter {
        statuses: vec![DraftStatus::Ready, DraftStatus::PendingApproval],
        run_id: None,
    };
    let eligible = state
        .store
        .drafts
        .list(&filter)
        .await
        .map_err(|error| repository_failure(error, "approve-all"))?
        .into_iter()
        .filter(|draft| draft.auto_approve_eligible)
        .collect::<Vec<_>>();

    let mut response =
        BulkApproveResponse { total: eligible.len(), ..BulkApproveResponse::default() };
    for mut draft in eligible {
        let Some(text) = draft.outgoing_text().map(str::to_owned) else {
            response.failed += 1;
            response
                .errors
                .push(BulkFailure { draft_id: draft.id, error: "No message to send".to_string() });
            continue;
        };

        if let Err(error) = send_draft(&state, &draft, &text).await {
            response.failed += 1;
            response.errors.push(BulkFailure { draft_id: draft.id, error: error.to_string() });
            continue;
        }

        let draft_id = draft.id.clone();
        if let Err(error) = draft.mark_sent(text, true, Utc::now()) {
            response.failed += 1;
            response.errors.push(BulkFailure { draft_id, error: error.to_string() });
            continue;
        }
        save_draft(&state, draft).await?;
        response.sent += 1;
    }

    info!(
        event_name = "server.draft.bulk_approved",
        correlation_id = "approve-all",
        total = response.total,
        sent = response.sent,
        failed = response.failed,
        "bulk approval finished"
    );
    Ok(Json(response))
}

async fn send_draft(
    state: &AppState,
    draft: &Draft,
    text: &str,
) -> Result<(), outreach_heyreach::CrmError> {
    let message = OutboundMessage {
        account_id: draft.account_id,
        conversation_id: draft.conversation_id.clone(),
        message: text.to_string(),
    };
    state.crm.send_message(&message).await
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

async fn stats(
    Query(params): Query<StatsParams>,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiFailure> {
    let query = StatsQuery {
        account_ids: state.settings.account_ids.clone(),
        campaign_ids: state.settings.campaign_ids.clone(),
        start_date: params.start_date,
        end_date: params.end_date,
    };
    let heyreach = state
        .crm
        .overall_stats(&query)
        .await
        .map_err(|error| api_error(StatusCode::BAD_GATEWAY, error.to_string()))?;

    let drafts = state
        .store
        .drafts
        .list(&DraftFilter::default())
        .await
        .map_err(|error| repository_failure(error, "stats"))?;

    Ok(Json(StatsResponse {
        heyreach,
        local_stats: local_stats(&drafts),
        send_enabled: state.settings.send_enabled,
        auto_approve_confidence: state.settings.auto_approve_confidence,
    }))
}

fn local_stats(drafts: &[Draft]) -> LocalStats {
    let with_status = |status: DraftStatus| drafts.iter().filter(|d| d.status == status).count();
    LocalStats {
        total_drafts: drafts.len(),
        pending_approval: drafts
            .iter()
            .filter(|draft| {
                matches!(draft.status, DraftStatus::Ready | DraftStatus::PendingApproval)
            })
            .count(),
        sent: with_status(DraftStatus::Sent),
        rejected: with_status(DraftStatus::Rejected),
        escalated: with_status(DraftStatus::Escalated),
        auto_approved: drafts.iter().filter(|draft| draft.auto_approved).count(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn preview(draft: &Draft) -> DraftPreview {
    DraftPreview {
        draft_id: draft.id.clone(),
        conversation_id: draft.conversation_id.0.clone(),
        prospect_name: draft.prospect_name.clone(),
        status: draft.status,
        action: draft.action,
        confidence: draft.confidence,
        auto_approve_eligible: draft.auto_approve_eligible,
        message_preview: draft.message.as_deref().map(truncate_preview),
    }
}

fn truncate_preview(message: &str) -> String {
    if message.chars().count() <= PREVIEW_CHARS {
        return message.to_string();
    }
    let head = message.chars().take(PREVIEW_CHARS).collect::<String>();
    format!("{head}...")
}

async fn load_draft(state: &AppState, draft_id: &DraftId) -> Result<Draft, ApiFailure> {
    state
        .store
        .drafts
        .find_by_id(draft_id)
        .await
        .map_err(|error| repository_failure(error, &draft_id.0))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Draft not found"))
}

async fn save_draft(state: &AppState, draft: Draft) -> Result<(), ApiFailure> {
    let correlation_id = draft.id.0.clone();
    state
        .store
        .drafts
        .save(draft)
        .await
        .map_err(|error| repository_failure(error, &correlation_id))
}

/// An empty body means every field takes its default.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|error| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {error}")))
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (status, Json(ApiError { error: message.into(), correlation_id: None }))
}

fn domain_conflict(draft: &Draft, next: DraftStatus) -> ApiFailure {
    let error = outreach_core::errors::DomainError::InvalidDraftTransition {
        from: draft.status,
        to: next,
    };
    domain_failure(error, &draft.id)
}

fn domain_failure(error: outreach_core::errors::DomainError, draft_id: &DraftId) -> ApiFailure {
    interface_failure(ApplicationError::from(error).into_interface(draft_id.0.clone()))
}

fn repository_failure(error: RepositoryError, correlation_id: &str) -> ApiFailure {
    interface_failure(ApplicationError::from(error).into_interface(correlation_id))
}

fn interface_failure(error: InterfaceError) -> ApiFailure {
    let (status, message) = match &error {
        InterfaceError::BadRequest { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
        InterfaceError::NotFound { message, .. } => (StatusCode::NOT_FOUND, message.clone()),
        InterfaceError::Conflict { message, .. } => (StatusCode::CONFLICT, message.clone()),
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, error.user_message().to_string())
        }
        InterfaceError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, error.user_message().to_string())
        }
    };

    (
        status,
        Json(ApiError { error: message, correlation_id: Some(error.correlation_id().to_string()) }),
    )
}
