use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::api::state::AppState;
use crate::domain::{Signal, SignalPayload};
use crate::error::FlareError;
use crate::router::{ExitOutcome, SignalOutcome};

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}

fn status_for(error: &FlareError) -> StatusCode {
    match error {
        FlareError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handle an alerting-tool webhook
pub async fn webhook(
    State(state): State<AppState>,
    payload: Result<Json<SignalPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("rejected webhook body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let (alert_type, signal) = match Signal::from_payload(&payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("rejected webhook payload: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    match state.router.handle(signal).await {
        Ok(SignalOutcome::EntryPlaced { order_id }) => Json(json!({
            "status": "success",
            "alertType": alert_type.as_str(),
            "orderId": order_id,
        }))
        .into_response(),
        Ok(SignalOutcome::Exited(outcome)) => {
            let result = match outcome {
                ExitOutcome::NoPosition => json!("no_position"),
                ExitOutcome::Closed { contracts } => json!({ "closed": contracts }),
            };
            Json(json!({
                "status": "success",
                "alertType": alert_type.as_str(),
                "result": result,
            }))
            .into_response()
        }
        Err(e) => error_response(status_for(&e), &e.to_string()),
    }
}

/// Current trading status with a best-effort live position snapshot
pub async fn status(State(state): State<AppState>) -> Response {
    let snapshot = state.registry.snapshot().await;

    // Best effort: a failed exchange call is reported in-band, the
    // endpoint itself still answers.
    let position = match state.exchange.position().await {
        Ok(Some(position)) => json!({
            "size": position.size,
            "entryPrice": position.entry_price.map(|p| p.to_string()),
            "symbol": position.symbol,
        }),
        Ok(None) => serde_json::Value::Null,
        Err(e) => json!({ "error": e.to_string() }),
    };

    let uptime = (chrono::Utc::now() - state.started_at).num_seconds().max(0);

    Json(json!({
        "status": "success",
        "symbol": state.symbol,
        "positionState": snapshot.position.as_str(),
        "trackedOrders": snapshot.orders.len(),
        "stopLossLinks": snapshot.stop_links.len(),
        "orders": snapshot.orders.iter().map(|o| o.id).collect::<Vec<_>>(),
        "position": position,
        "uptimeSeconds": uptime,
    }))
    .into_response()
}

/// Manually cancel every open order
pub async fn cancel_all(State(state): State<AppState>) -> Response {
    match state.router.cancel_all().await {
        Ok(cancelled) => Json(json!({
            "status": "success",
            "cancelled": cancelled,
        }))
        .into_response(),
        Err(e) => error_response(status_for(&e), &e.to_string()),
    }
}

/// Manually flatten the current position
pub async fn close_position(State(state): State<AppState>) -> Response {
    match state.router.on_exit().await {
        Ok(ExitOutcome::NoPosition) => Json(json!({
            "status": "success",
            "result": "no_position",
        }))
        .into_response(),
        Ok(ExitOutcome::Closed { contracts }) => Json(json!({
            "status": "success",
            "result": "closed",
            "contracts": contracts,
        }))
        .into_response(),
        Err(e) => error_response(status_for(&e), &e.to_string()),
    }
}
