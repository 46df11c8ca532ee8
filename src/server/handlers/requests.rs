use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::{
    api::{BidRequestAPI, DynAPI, Listing},
    auth::Session,
    entities::{BidReply, BidRequest, NewBidRequest},
    error::Error,
};

pub async fn available(
    Extension(api): Extension<DynAPI>,
    session: Session,
) -> Result<Json<Listing>, Error> {
    let listing = api.list_available_requests(&session).await?;

    Ok(listing.into())
}

pub async fn mine(
    Extension(api): Extension<DynAPI>,
    session: Session,
) -> Result<Json<Vec<BidRequest>>, Error> {
    let requests = api.list_my_requests(&session).await?;

    Ok(requests.into())
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Json(params): Json<NewBidRequest>,
) -> Result<Json<BidRequest>, Error> {
    let request = api.create_bid_request(&session, params).await?;

    Ok(request.into())
}

pub async fn replies(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BidReply>>, Error> {
    let replies = api.list_replies(&session, id).await?;

    Ok(replies.into())
}
