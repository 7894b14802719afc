//! # Payment Handlers
//!
//! STK push initiation and the gateway callback endpoint.
//!
//! The callback endpoint acknowledges every syntactically valid envelope with
//! `{"ResultCode": 0}` so the gateway stops redelivering, even when internal
//! reconciliation could not resolve the order. Only an unparseable body gets
//! an error status; non-POST methods get 405 from the method router.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::models::PaymentAttempt;
use crate::mpesa::CallbackEnvelope;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub user_id: i64,
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentInitiationResponse {
    pub attempt_id: i64,
    pub order_id: i64,
    pub amount: Decimal,
    pub status: String,
    pub accepted: bool,
    pub message: String,
}

/// Initiate an STK push for an order: POST /v1/orders/:id/payments
pub async fn initiate_payment(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(request): Json<InitiatePaymentRequest>,
) -> ApiResult<Json<PaymentInitiationResponse>> {
    let initiation = state
        .checkout_service()
        .initiate_payment(order_id, request.user_id, &request.phone_number)
        .await?;

    Ok(Json(PaymentInitiationResponse {
        attempt_id: initiation.attempt.id,
        order_id,
        amount: initiation.attempt.amount,
        status: initiation.attempt.status.clone(),
        accepted: initiation.accepted,
        message: initiation.message,
    }))
}

#[derive(Debug, Serialize)]
pub struct PaymentAttemptResponse {
    pub id: i64,
    pub amount: Decimal,
    pub phone_number: String,
    pub status: String,
    pub mpesa_receipt: Option<String>,
    pub checkout_request_id: Option<String>,
}

/// Full payment attempt history for an order: GET /v1/orders/:id/payments
pub async fn list_order_payments(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<Vec<PaymentAttemptResponse>>> {
    let attempts = PaymentAttempt::find_for_order(&state.pool, order_id).await?;
    Ok(Json(
        attempts
            .into_iter()
            .map(|a| PaymentAttemptResponse {
                id: a.id,
                amount: a.amount,
                phone_number: a.phone_number,
                status: a.status,
                mpesa_receipt: a.mpesa_receipt,
                checkout_request_id: a.checkout_request_id,
            })
            .collect(),
    ))
}

/// Gateway callback endpoint: POST /v1/payments/mpesa/callback
///
/// The body is taken raw so the exact payload can be persisted for audit
/// before any interpretation happens.
pub async fn mpesa_callback(State(state): State<AppState>, body: String) -> Response {
    let raw: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparseable callback body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": "Invalid JSON"})),
            )
                .into_response();
        }
    };

    let envelope: CallbackEnvelope = match serde_json::from_value(raw.clone()) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Malformed callback envelope");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": "Invalid callback envelope"})),
            )
                .into_response();
        }
    };

    // Internal failures never reach the gateway: the envelope was valid, so
    // it is acknowledged either way and the failure stays in the logs.
    match state
        .reconciliation_service()
        .process_callback(raw, &envelope)
        .await
    {
        Ok(disposition) => {
            info!(?disposition, "Callback reconciled");
        }
        Err(e) => {
            error!(error = %e, "Callback reconciliation failed; acknowledging anyway");
        }
    }

    Json(json!({"ResultCode": 0, "ResultDesc": "Accepted"})).into_response()
}
