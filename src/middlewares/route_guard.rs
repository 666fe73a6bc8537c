//! Gates the dashboard pages on the presence of a session token.
//!
//! Only the token cookie is consulted: page navigations carry cookies but not
//! the secondary session header.

use crate::config::RoutesConfig;
use crate::session::read_cookie;
use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    RedirectToLogin { from: String },
    RedirectToHome,
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    protected: Vec<String>,
    public: Vec<String>,
    login: String,
    home: String,
    cookie_name: String,
}

fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

impl RouteGuard {
    pub fn new(routes: &RoutesConfig, cookie_name: impl Into<String>) -> Self {
        Self {
            protected: routes.protected.clone(),
            public: routes.public.clone(),
            login: routes.login.clone(),
            home: routes.home.clone(),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn decide(&self, path: &str, has_token: bool) -> GuardDecision {
        if self.public.iter().any(|prefix| under(path, prefix)) {
            return GuardDecision::Pass;
        }
        if !has_token && self.protected.iter().any(|prefix| under(path, prefix)) {
            return GuardDecision::RedirectToLogin {
                from: path.to_string(),
            };
        }
        if has_token && path == self.login {
            return GuardDecision::RedirectToHome;
        }
        GuardDecision::Pass
    }

    pub fn login_location(&self, from: &str) -> String {
        format!("{}?redirectedFrom={}", self.login, urlencoding::encode(from))
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    fn has_token(&self, request: &Request) -> bool {
        request
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|header| read_cookie(header, &self.cookie_name).is_some())
    }
}

pub async fn route_guard(
    State(guard): State<Arc<RouteGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let has_token = guard.has_token(&request);
    match guard.decide(request.uri().path(), has_token) {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::RedirectToLogin { from } => {
            tracing::debug!(path = %from, "no session token, redirecting to login");
            Redirect::temporary(&guard.login_location(&from)).into_response()
        }
        GuardDecision::RedirectToHome => Redirect::temporary(guard.home()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::http::header::LOCATION;
    use axum::routing::get;
    use tower::ServiceExt;

    fn guard() -> RouteGuard {
        RouteGuard::new(&RoutesConfig::default(), "fleet_token")
    }

    #[test]
    fn protected_pages_need_a_token() {
        let guard = guard();
        assert_eq!(
            guard.decide("/dashboard", false),
            GuardDecision::RedirectToLogin {
                from: "/dashboard".to_string()
            }
        );
        assert_eq!(
            guard.decide("/dashboard/vehicles/7", false),
            GuardDecision::RedirectToLogin {
                from: "/dashboard/vehicles/7".to_string()
            }
        );
        assert_eq!(guard.decide("/dashboard", true), GuardDecision::Pass);
    }

    #[test]
    fn preview_is_exempt() {
        let guard = guard();
        assert_eq!(guard.decide("/dashboard/preview", false), GuardDecision::Pass);
        assert_eq!(guard.decide("/dashboard/preview/map", false), GuardDecision::Pass);
    }

    #[test]
    fn login_with_token_goes_home() {
        let guard = guard();
        assert_eq!(guard.decide("/login", true), GuardDecision::RedirectToHome);
        assert_eq!(guard.decide("/login", false), GuardDecision::Pass);
    }

    #[test]
    fn other_paths_are_ignored() {
        let guard = guard();
        for path in ["/", "/api/fleet", "/dashboards", "/assets/app.js"] {
            assert_eq!(guard.decide(path, false), GuardDecision::Pass, "{path}");
        }
    }

    #[test]
    fn login_location_encodes_the_origin() {
        assert_eq!(
            guard().login_location("/dashboard/a b"),
            "/login?redirectedFrom=%2Fdashboard%2Fa%20b"
        );
    }

    fn app() -> Router {
        Router::new()
            .route("/dashboard", get(|| async { "fleet" }))
            .route("/login", get(|| async { "login" }))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(guard()),
                route_guard,
            ))
    }

    async fn get_with(uri: &str, cookie: Option<&str>) -> Response {
        let mut request = axum::http::Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn middleware_redirects_by_cookie() {
        let res = get_with("/dashboard", None).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[LOCATION], "/login?redirectedFrom=%2Fdashboard");

        let res = get_with("/dashboard", Some("theme=dark; fleet_token=abc")).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = get_with("/login", Some("fleet_token=abc")).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()[LOCATION], "/dashboard");

        // an emptied cookie counts as signed out
        let res = get_with("/login", Some("fleet_token=")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
