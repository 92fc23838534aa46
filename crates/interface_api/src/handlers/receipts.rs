//! Receipt settlement handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use core_kernel::ReceiptId;

use crate::dto::ledger::ReversalResponse;
use crate::dto::receipt::{SettleRequest, SettleResponse};
use crate::middleware::Operator;
use crate::{error::ApiError, AppState};

fn parse_receipt_id(raw: &str) -> Result<ReceiptId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid receipt id '{}'", raw)))
}

/// sent_for_settlement → settled
#[tracing::instrument(skip(state, request))]
pub async fn settle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(operator): Extension<Operator>,
    Json(request): Json<SettleRequest>,
) -> Result<Json<SettleResponse>, ApiError> {
    let receipt_id = parse_receipt_id(&id)?;
    let outcome = state
        .service
        .settle_receipt(receipt_id, request.settlement_type, operator.name())
        .await?;
    Ok(Json(outcome.into()))
}

/// settled → sent_for_settlement
#[tracing::instrument(skip(state))]
pub async fn return_to_settlement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReversalResponse>, ApiError> {
    let receipt_id = parse_receipt_id(&id)?;
    let outcome = state.service.return_settled_to_settlement(receipt_id).await?;
    Ok(Json(outcome.into()))
}

/// sent_for_settlement → approved
#[tracing::instrument(skip(state))]
pub async fn return_to_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReversalResponse>, ApiError> {
    let receipt_id = parse_receipt_id(&id)?;
    let outcome = state.service.return_to_active(receipt_id).await?;
    Ok(Json(outcome.into()))
}
