//! Bearer-token authentication middleware for the admin HTTP surface.
//!
//! When `ADMIN_TOKEN` is configured, every protected route requires an
//! `Authorization: Bearer <token>` header. Requests with a missing or
//! incorrect token are rejected with `401 Unauthorized`. When `ADMIN_TOKEN`
//! is absent the middleware is a no-op — acceptable only when the admin
//! listener is firewalled to trusted hosts (§6).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;

pub async fn admin_auth_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(expected) = &state.config.admin_token else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected.as_str() => next.run(req).await,
        Some(_) => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer realm=\"cost-router admin\"")],
            "Invalid admin token.",
        )
            .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer realm=\"cost-router admin\"")],
            "Admin API requires Authorization: Bearer <token>.",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::test_double::InMemoryBroker;
    use crate::broker::BrokerAdapter;
    use crate::config::Config;
    use crate::events::RoutingEventLog;
    use axum::{body::Body, http::Request};
    use std::sync::Mutex;
    use tower::ServiceExt;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn state_with_token(token: Option<&str>) -> Arc<AppState> {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("BROKER_URL", "amqp://localhost:5672");
            match token {
                Some(t) => std::env::set_var("ADMIN_TOKEN", t),
                None => std::env::remove_var("ADMIN_TOKEN"),
            }
        }
        let config = Arc::new(Config::from_env().unwrap());
        unsafe {
            std::env::remove_var("BROKER_URL");
            std::env::remove_var("ADMIN_TOKEN");
        }
        Arc::new(AppState::new(
            config,
            Arc::new(InMemoryBroker::new()) as Arc<dyn BrokerAdapter>,
            Arc::new(RoutingEventLog::new(10)),
        ))
    }

    #[tokio::test]
    async fn status_accessible_without_token_when_auth_disabled() {
        let app = crate::api::router(state_with_token(None));
        let req = Request::builder().method("GET").uri("/status").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_rejected_without_bearer_when_token_configured() {
        let app = crate::api::router(state_with_token(Some("s3cret")));
        let req = Request::builder().method("GET").uri("/status").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_accepted_with_correct_bearer_token() {
        let app = crate::api::router(state_with_token(Some("s3cret")));
        let req = Request::builder()
            .method("GET")
            .uri("/status")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_never_requires_a_token() {
        let app = crate::api::router(state_with_token(Some("s3cret")));
        let req = Request::builder().method("GET").uri("/healthz").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
