use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use outreach_heyreach::CrmClient;

use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub heyreach: HealthCheck,
    pub checked_at: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let heyreach = heyreach_check(state.crm.as_ref()).await;
    let ready = heyreach.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("outreach-server running in {}", state.settings.environment),
        },
        heyreach,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

pub async fn heyreach_check(crm: &dyn CrmClient) -> HealthCheck {
    match crm.check_api_key().await {
        Ok(()) => HealthCheck { status: "ready", detail: "api key accepted".to_string() },
        Err(error) => {
            warn!(
                event_name = "system.health.heyreach_degraded",
                correlation_id = "health",
                error = %error,
                "heyreach api key check failed"
            );
            HealthCheck { status: "degraded", detail: format!("api key check failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::health;
    use crate::testing::{settings, state_with, FakeCrm};

    #[tokio::test]
    async fn health_returns_ready_when_heyreach_accepts_the_key() {
        let state = state_with(Arc::new(FakeCrm::default()), settings(None, false));

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.heyreach.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_key_is_rejected() {
        let crm = FakeCrm { key_rejected: true, ..FakeCrm::default() };
        let state = state_with(Arc::new(crm), settings(None, false));

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert!(payload.heyreach.detail.contains("401"));
        assert_eq!(payload.service.status, "ready");
    }
}
