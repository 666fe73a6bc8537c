mod fleet;
mod session;
mod system;

use crate::middlewares::route_guard::route_guard;
use crate::middlewares::trace_id::{TraceId, TraceIdLayer};
use crate::state::AppState;
use crate::telemetry::FleetApi;
use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::response::Response;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::time::Duration;
use tracing::Span;

pub fn build<A: FleetApi>(state: AppState<A>) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(system::health))
        .route("/api/version", get(system::version))
        // ======== session ========
        .route(
            "/api/session",
            post(session::sign_in::<A>).delete(session::sign_out::<A>),
        )
        // ======== fleet ========
        .route("/api/fleet", get(fleet::fleet::<A>))
        .route("/api/fleet/refresh", post(fleet::refresh::<A>))
        .route("/api/fleet/stream", get(fleet::stream::<A>));
    if let Some(dir) = state.config.public_dir() {
        let static_files_service = tower_http::services::ServeDir::new(&dir)
            .append_index_html_on_directories(true)
            .fallback(tower_http::services::ServeFile::new(dir.join("index.html")));
        router = router.fallback_service(static_files_service);
    }
    let mut allowed_headers = vec![axum::http::header::CONTENT_TYPE];
    let mut cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any);
    if let Ok(name) = HeaderName::from_bytes(state.config.session.header_name.as_bytes()) {
        allowed_headers.push(name.clone());
        cors = cors.expose_headers([name]);
    }
    let cors = cors.allow_headers(allowed_headers);
    router
        .layer(middleware::from_fn_with_state(state.guard.clone(), route_guard))
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| match request
                    .extensions()
                    .get::<TraceId>()
                {
                    Some(trace_id) => tracing::debug_span!("request", trace_id = %trace_id),
                    None => tracing::debug_span!("request"),
                })
                .on_request(|req: &Request<Body>, _span: &Span| {
                    tracing::trace!(
                        method = %req.method(),
                        uri = %req.uri(),
                        version = %format!("{:?}", req.version()),
                        "started processing request"
                    );
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::trace!(
                        status = ?res.status(),
                        latency = %format!("{}ms", latency.as_millis()),
                        "finished processing request"
                    );
                }),
        )
        .layer(TraceIdLayer::new())
        .layer(cors)
}
