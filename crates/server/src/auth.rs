//! Shared-password sessions for the dashboard.
//!
//! When no dashboard password is configured every route is open. Otherwise a
//! client logs in once and presents the returned token as `x-session-token`
//! (or `Authorization: Bearer <token>`) on gated routes.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub password_required: bool,
    pub authenticated: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/status", get(status))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

/// Gate for dashboard routes. Open when no password is configured.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.settings.password_required() {
        return next.run(request).await;
    }

    let token = session_token(request.headers()).map(str::to_owned);
    if is_valid_session(&state, token.as_deref()).await {
        return next.run(request).await;
    }

    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response()
}

pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let explicit = headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok());
    let bearer = || {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    };

    explicit.or_else(bearer).map(str::trim).filter(|token| !token.is_empty())
}

async fn is_valid_session(state: &AppState, token: Option<&str>) -> bool {
    let Some(token) = token else {
        return false;
    };

    match state.store.sessions.contains(token).await {
        Ok(found) => found,
        Err(error) => {
            warn!(
                event_name = "server.auth.session_lookup_failed",
                correlation_id = "auth",
                error = %error,
                "session lookup failed"
            );
            false
        }
    }
}

async fn status(State(state): State<AppState>, headers: HeaderMap) -> Json<AuthStatus> {
    let password_required = state.settings.password_required();
    let authenticated =
        !password_required || is_valid_session(&state, session_token(&headers)).await;

    Json(AuthStatus { password_required, authenticated })
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> (StatusCode, Json<LoginResponse>) {
    let accepted = match state.settings.dashboard_password.as_ref() {
        None => true,
        Some(expected) => body.password.as_deref() == Some(expected.expose_secret()),
    };

    if !accepted {
        warn!(
            event_name = "server.auth.login_rejected",
            correlation_id = "auth",
            "dashboard login rejected"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse {
                success: false,
                token: None,
                error: Some("Invalid password".to_string()),
            }),
        );
    }

    let token = Uuid::new_v4().simple().to_string();
    if let Err(error) = state.store.sessions.insert(token.clone()).await {
        warn!(
            event_name = "server.auth.session_store_failed",
            correlation_id = "auth",
            error = %error,
            "could not store session"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LoginResponse {
                success: false,
                token: None,
                error: Some("Could not create session".to_string()),
            }),
        );
    }

    info!(event_name = "server.auth.login", correlation_id = "auth", "dashboard session started");
    (StatusCode::OK, Json(LoginResponse { success: true, token: Some(token), error: None }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    if let Some(token) = session_token(&headers) {
        if let Err(error) = state.store.sessions.remove(token).await {
            warn!(
                event_name = "server.auth.logout_failed",
                correlation_id = "auth",
                error = %error,
                "could not revoke session"
            );
        }
    }

    Json(json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::testing::{app, state_with_password, state_without_password};

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("x-session-token", token);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    #[tokio::test]
    async fn gated_routes_reject_missing_session() {
        let router = app(state_with_password("hunter2"));

        let (status, body) = send(router, get("/api/drafts", None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn login_issues_token_that_unlocks_dashboard_until_logout() {
        let state = state_with_password("hunter2");

        let (status, body) = send(
            app(state.clone()),
            post_json("/api/auth/login", json!({ "password": "hunter2" }), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().expect("token").to_string();

        let (status, _) = send(app(state.clone()), get("/api/drafts", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);

        let (_, auth) = send(app(state.clone()), get("/api/auth/status", Some(&token))).await;
        assert_eq!(auth, json!({ "password_required": true, "authenticated": true }));

        let (status, _) =
            send(app(state.clone()), post_json("/api/auth/logout", json!({}), Some(&token))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(app(state), get("/api/drafts", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let router = app(state_with_password("hunter2"));

        let (status, body) =
            send(router, post_json("/api/auth/login", json!({ "password": "nope" }), None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid password");
    }

    #[tokio::test]
    async fn open_dashboard_needs_no_session() {
        let state = state_without_password();

        let (status, _) = send(app(state.clone()), get("/status", None)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, auth) = send(app(state), get("/api/auth/status", None)).await;
        assert_eq!(auth, json!({ "password_required": false, "authenticated": true }));
    }

    #[tokio::test]
    async fn health_is_never_gated() {
        let router = app(state_with_password("hunter2"));

        let (status, body) = send(router, get("/health", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["heyreach"]["status"], "ready");
    }
}
