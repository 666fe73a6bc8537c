use crate::errors::{AppError, ApiResult, FLEET_UNAVAILABLE_MESSAGE};
use crate::extractors::RequestSession;
use crate::models::dtos::fleet::{SessionDto, SignInDto};
use crate::state::AppState;
use crate::telemetry::FleetApi;
use anyhow::anyhow;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Stores the token in both session stores, then checks it upstream. A token
/// that does not validate is removed again before answering.
pub async fn sign_in<A: FleetApi>(
    State(state): State<AppState<A>>,
    RequestSession(session): RequestSession,
    body: Option<Json<SignInDto>>,
) -> ApiResult<Response> {
    let token = body
        .and_then(|Json(dto)| dto.token)
        .filter(|it| !it.trim().is_empty())
        .or_else(|| state.config.upstream.default_token.clone())
        .ok_or_else(|| AppError::BadRequest(anyhow!("A session token is required")))?;
    session.set_token(&token);
    match state.api().validate_session(&token).await {
        Ok(info) => {
            tracing::info!(user_id = ?info.user_id, "session started");
            let dto: SessionDto = info;
            Ok((AppendHeaders(session.pending_headers()), Json(dto)).into_response())
        }
        Err(err) => {
            tracing::warn!(reason = %err, "sign-in rejected");
            session.clear_token();
            state.registry.remove(&token);
            Ok((
                StatusCode::UNAUTHORIZED,
                AppendHeaders(session.pending_headers()),
                Json(json!({ "message": FLEET_UNAVAILABLE_MESSAGE })),
            )
                .into_response())
        }
    }
}

pub async fn sign_out<A: FleetApi>(
    State(state): State<AppState<A>>,
    RequestSession(session): RequestSession,
) -> Response {
    if let Some(token) = session.get_token() {
        state.registry.remove(&token);
    }
    session.clear_token();
    tracing::debug!("session cleared");
    (
        StatusCode::NO_CONTENT,
        AppendHeaders(session.pending_headers()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use crate::routes::build;
    use crate::routes::testing::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn sign_in_request(body: serde_json::Value) -> Request<Body> {
        Request::post("/api/session")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_token_is_stored_in_both_stores() {
        let app = build(state(Arc::default()));
        let res = send(&app, sign_in_request(json!({ "token": GOOD_TOKEN }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            set_cookies(&res),
            vec!["fleet_token=good-token; Path=/; Max-Age=604800; SameSite=Strict"]
        );
        assert_eq!(res.headers()["x-session-token"], GOOD_TOKEN);
        assert_eq!(json_body(res).await, json!({ "valid": true, "userId": 42 }));
    }

    #[tokio::test]
    async fn rejected_token_is_cleared_again() {
        let app = build(state(Arc::default()));
        let res = send(&app, sign_in_request(json!({ "token": "forged" }))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            set_cookies(&res),
            vec!["fleet_token=; Path=/; Max-Age=0; SameSite=Strict"]
        );
        assert_eq!(res.headers()["x-session-token"], "");
        assert_eq!(
            json_body(res).await["message"],
            "Unable to load fleet data. Please sign in again."
        );
    }

    #[tokio::test]
    async fn empty_body_falls_back_to_default_token() {
        let api = Arc::new(StubApi::default());
        let app = build(state(api.clone()));
        let res = send(
            &app,
            Request::post("/api/session").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(api.validations.load(Ordering::SeqCst), 1);

        let mut config = config();
        config.upstream.default_token = None;
        let state = crate::state::AppState::with_api(
            Arc::new(config),
            api,
            tokio_util::sync::CancellationToken::new(),
        );
        let res = send(&build(state), sign_in_request(json!({ "token": "  " }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sign_out_clears_and_evicts() {
        let state = state(Arc::default());
        let registry = state.registry.clone();
        registry.get_or_start(GOOD_TOKEN);
        let app = build(state);
        let res = send(
            &app,
            Request::delete("/api/session")
                .header("cookie", format!("fleet_token={GOOD_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            set_cookies(&res),
            vec!["fleet_token=; Path=/; Max-Age=0; SameSite=Strict"]
        );
        assert!(registry.get(GOOD_TOKEN).is_none());

        // signing out without a session still answers with clearing headers
        let res = send(&app, Request::delete("/api/session").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(set_cookies(&res).len(), 1);
    }
}
