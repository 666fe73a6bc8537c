use crate::config::Config;
use crate::errors::AppError;
use crate::session::{CookieStorage, HeaderStorage, SessionStore};
use crate::state::AppState;
use crate::telemetry::FleetApi;
use anyhow::Context;
use axum::extract::FromRequestParts;
use axum::http::HeaderName;
use axum::http::header::COOKIE;
use axum::http::request::Parts;

/// Session store bound to the current request: the token cookie plus the
/// secondary session header.
pub struct RequestSession(pub SessionStore);

impl RequestSession {
    pub fn from_parts(parts: &Parts, config: &Config) -> anyhow::Result<Self> {
        let header_name = HeaderName::from_bytes(config.session.header_name.as_bytes())
            .with_context(|| format!("Invalid session header name '{}'", config.session.header_name))?;
        let cookie_header = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        let incoming_header = parts
            .headers
            .get(&header_name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let cookie = CookieStorage::new(
            config.session.cookie_name.as_str(),
            Some(cookie_header).filter(|it| !it.is_empty()),
            config.session.max_age_secs,
            is_encrypted(parts, config.server.trust_forwarded_proto),
        );
        let persistent = HeaderStorage::new(header_name, incoming_header);
        Ok(Self(SessionStore::new(cookie, persistent)))
    }
}

fn is_encrypted(parts: &Parts, trust_forwarded_proto: bool) -> bool {
    if parts.uri.scheme_str() == Some("https") {
        return true;
    }
    trust_forwarded_proto
        && parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

impl<A: FleetApi> FromRequestParts<AppState<A>> for RequestSession {
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<A>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts, &state.config)?)
    }
}
