//! Balance handlers

use axum::{extract::State, Json};

use crate::dto::balance::{BalancesResponse, ReceiptContributionResponse};
use crate::{error::ApiError, AppState};

/// Current cash and card balances
pub async fn get_balances(State(state): State<AppState>) -> Result<Json<BalancesResponse>, ApiError> {
    let snapshot = state.service.balances().await?;
    Ok(Json(snapshot.into()))
}

/// What each active receipt contributes
pub async fn get_receipt_breakdown(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReceiptContributionResponse>>, ApiError> {
    let breakdown = state.service.receipt_breakdown().await?;
    Ok(Json(breakdown.into_iter().map(Into::into).collect()))
}
