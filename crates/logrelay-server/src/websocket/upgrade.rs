//! `GET /ws` handler: authenticate, then upgrade into a subscriber session.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::session::{SessionSettings, run_ws_session};
use crate::auth::AuthOutcome;
use crate::landing::landing_page;
use crate::metrics::WS_AUTH_FAILURES_TOTAL;
use crate::server::AppState;

/// Query string accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// Presented ticket.
    pub auth: Option<String>,
}

/// GET /ws
pub async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match state
        .authenticator
        .authenticate(&headers, Some(peer), query.auth.as_deref())
    {
        AuthOutcome::Landing => landing_page().into_response(),
        AuthOutcome::Rejected { reason, .. } => {
            counter!(WS_AUTH_FAILURES_TOTAL, "reason" => reason.as_str()).increment(1);
            let body = json!({ "success": false, "reason": reason.as_str() });
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        AuthOutcome::Accepted { client_ip } => match upgrade {
            Ok(ws) => {
                let registry = state.registry.clone();
                let settings = SessionSettings::from_config(&state.config);
                let shutdown = state.shutdown.token();
                ws.on_upgrade(move |socket| {
                    run_ws_session(socket, client_ip, registry, settings, shutdown)
                })
            }
            Err(rejection) => {
                debug!(%client_ip, error = %rejection, "authenticated request without websocket upgrade");
                rejection.into_response()
            }
        },
    }
}
