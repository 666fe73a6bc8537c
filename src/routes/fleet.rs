use crate::errors::FLEET_UNAVAILABLE_MESSAGE;
use crate::extractors::RequestSession;
use crate::fleet::view::{self, StatusFilter};
use crate::fleet::{FleetPoller, FleetStatus, Phase};
use crate::models::dtos::fleet::{FleetQueryDto, FleetViewDto, RedirectDto};
use crate::session::SessionStore;
use crate::state::AppState;
use crate::telemetry::FleetApi;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse, Response, Sse, sse};
use axum::Json;
use futures::stream::once;
use futures::{StreamExt, future};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::WatchStream;

/// Poller of the request's session. `None` means the client has to sign in
/// again: there is no token, or its poller ended in the error state.
fn session_poller<A: FleetApi>(
    state: &AppState<A>,
    session: &SessionStore,
) -> Option<Arc<FleetPoller<A>>> {
    let Some(token) = session.get_token() else {
        tracing::debug!("request carries no session token");
        return None;
    };
    let poller = state.registry.get_or_start(&token);
    let ended = poller.take_redirect() || (poller.is_stopped() && poller.status().failure.is_some());
    if ended {
        tracing::warn!("fleet session ended, client must sign in again");
        state.registry.remove(&token);
        return None;
    }
    if poller.is_stale() {
        tracing::debug!("fleet snapshot is stale, revalidating");
        poller.refresh();
    }
    Some(poller)
}

fn sign_in_again<A>(state: &AppState<A>, session: &SessionStore) -> Response {
    session.clear_token();
    (
        StatusCode::UNAUTHORIZED,
        AppendHeaders(session.pending_headers()),
        Json(redirect_dto(state)),
    )
        .into_response()
}

fn redirect_dto<A>(state: &AppState<A>) -> RedirectDto {
    RedirectDto {
        message: FLEET_UNAVAILABLE_MESSAGE,
        redirect: state.config.routes.login.clone(),
    }
}

pub fn fleet_view(status: &FleetStatus, query: &FleetQueryDto) -> FleetViewDto {
    let filter = StatusFilter::parse(query.status.as_deref());
    let text = query.q.as_deref().unwrap_or_default();
    let (locations, updated_at) = match &status.snapshot {
        Some(snapshot) => (
            snapshot.locations.as_slice(),
            Some(snapshot.fetched_at.to_rfc3339()),
        ),
        None => (&[][..], None),
    };
    let rendered = view::render(locations, &filter, text);
    FleetViewDto {
        phase: status.phase().as_str(),
        refreshing: status.is_refreshing(),
        status_options: rendered.status_options,
        vehicles: rendered.vehicles,
        total: rendered.total,
        updated_at,
        viewport: rendered.viewport,
    }
}

pub async fn fleet<A: FleetApi>(
    State(state): State<AppState<A>>,
    RequestSession(session): RequestSession,
    Query(query): Query<FleetQueryDto>,
) -> Response {
    match session_poller(&state, &session) {
        Some(poller) => Json(fleet_view(&poller.status(), &query)).into_response(),
        None => sign_in_again(&state, &session),
    }
}

pub async fn refresh<A: FleetApi>(
    State(state): State<AppState<A>>,
    RequestSession(session): RequestSession,
) -> Response {
    match session_poller(&state, &session) {
        Some(poller) => {
            poller.refresh();
            StatusCode::ACCEPTED.into_response()
        }
        None => sign_in_again(&state, &session),
    }
}

/// Pushes the view every time the poller publishes. Once the poller reaches
/// the error state the stream sends a single `redirect` event and ends.
pub async fn stream<A: FleetApi>(
    State(state): State<AppState<A>>,
    RequestSession(session): RequestSession,
    Query(query): Query<FleetQueryDto>,
) -> Response {
    let Some(poller) = session_poller(&state, &session) else {
        return sign_in_again(&state, &session);
    };
    let updates = WatchStream::new(poller.subscribe())
        .take_while(|status| future::ready(status.phase() != Phase::Error))
        .map(move |status| {
            sse::Event::default()
                .event("fleet")
                .json_data(fleet_view(&status, &query))
        });
    let ended = once(future::ready(
        sse::Event::default()
            .event("redirect")
            .json_data(redirect_dto(&state)),
    ));
    // open streams would otherwise hold up graceful shutdown
    let events = updates
        .chain(ended)
        .take_until(state.shutdown_signal.clone().cancelled_owned());
    Sse::new(events)
        .keep_alive(
            sse::KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("ping"),
        )
        .into_response()
}
