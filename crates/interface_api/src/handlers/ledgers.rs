//! Manual ledger entry handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use core_kernel::TransactionId;
use domain_settlement::{LedgerEntry, LedgerKind};

use crate::dto::ledger::{ManualEntryRequest, ReversalResponse};
use crate::middleware::Operator;
use crate::{error::ApiError, AppState};

/// Records a credit (cash) or payment (card)
#[tracing::instrument(skip(state, request))]
pub async fn record_payment(
    State(state): State<AppState>,
    Path(ledger): Path<LedgerKind>,
    Extension(operator): Extension<Operator>,
    Json(request): Json<ManualEntryRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    request.validate()?;
    let entry = state
        .service
        .record_payment(request.into_entry(ledger, operator.name()))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Records a debit (cash) or charge (card)
#[tracing::instrument(skip(state, request))]
pub async fn record_charge(
    State(state): State<AppState>,
    Path(ledger): Path<LedgerKind>,
    Extension(operator): Extension<Operator>,
    Json(request): Json<ManualEntryRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    request.validate()?;
    let entry = state
        .service
        .record_charge(request.into_entry(ledger, operator.name()))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Reverses an entry, stepping its receipt back when it has one
#[tracing::instrument(skip(state))]
pub async fn reverse_transaction(
    State(state): State<AppState>,
    Path((ledger, id)): Path<(LedgerKind, String)>,
) -> Result<Json<ReversalResponse>, ApiError> {
    let id: TransactionId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid transaction id '{}'", id)))?;
    let outcome = state.service.reverse_transaction(ledger, id).await?;
    Ok(Json(outcome.into()))
}
