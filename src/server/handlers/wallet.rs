use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{DynAPI, WalletAPI, WalletOverview},
    auth::Session,
    entities::{TopUpRedirect, Wallet, WalletTransaction},
    error::Error,
};

#[derive(Serialize, Deserialize)]
pub struct TopUpParams {
    amount: f64,
}

#[derive(Serialize, Deserialize)]
pub struct AdjustParams {
    amount: f64,
    reason: String,
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    session: Session,
) -> Result<Json<Wallet>, Error> {
    let wallet = api.wallet(&session).await?;

    Ok(wallet.into())
}

pub async fn transactions(
    Extension(api): Extension<DynAPI>,
    session: Session,
) -> Result<Json<Vec<WalletTransaction>>, Error> {
    let transactions = api.transactions(&session).await?;

    Ok(transactions.into())
}

pub async fn refresh(
    Extension(api): Extension<DynAPI>,
    session: Session,
) -> Result<Json<WalletOverview>, Error> {
    let overview = api.refresh(&session).await?;

    Ok(overview.into())
}

pub async fn top_up(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Json(params): Json<TopUpParams>,
) -> Result<Json<TopUpRedirect>, Error> {
    let redirect = api.top_up(&session, params.amount).await?;

    Ok(redirect.into())
}

pub async fn adjust(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(garage_id): Path<Uuid>,
    Json(params): Json<AdjustParams>,
) -> Result<StatusCode, Error> {
    api.adjust_wallet(&session, garage_id, params.amount, params.reason)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
