use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::{
    api::{BidOutcome, BidReplyAPI, DynAPI},
    auth::Session,
    entities::{BidDraft, BidReply, ContactLink},
    error::Error,
};

/// Places a new bid on the request, or updates the caller's existing one.
pub async fn place(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(request_id): Path<Uuid>,
    Json(params): Json<BidDraft>,
) -> Result<Json<BidOutcome>, Error> {
    let outcome = api.place_bid(&session, request_id, params).await?;

    Ok(outcome.into())
}

pub async fn mine(
    Extension(api): Extension<DynAPI>,
    session: Session,
) -> Result<Json<Vec<BidReply>>, Error> {
    let bids = api.list_my_bids(&session).await?;

    Ok(bids.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<BidReply>, Error> {
    let reply = api.accept_bid(&session, id).await?;

    Ok(reply.into())
}

pub async fn withdraw(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<BidReply>, Error> {
    let reply = api.withdraw_bid(&session, id).await?;

    Ok(reply.into())
}

pub async fn contact(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactLink>, Error> {
    let link = api.contact_counterparty(&session, id).await?;

    Ok(link.into())
}
