use axum::{
    extract::{Extension, Json},
    http::StatusCode,
};

use crate::{
    api::{DynAPI, SessionAPI},
    auth::Session,
    error::Error,
    server::Bearer,
};

pub async fn open(
    Extension(api): Extension<DynAPI>,
    Bearer(token): Bearer,
) -> Result<Json<Session>, Error> {
    let session = api.open_session(&token).await?;

    Ok(session.into())
}

pub async fn close(
    Extension(api): Extension<DynAPI>,
    Bearer(token): Bearer,
) -> Result<StatusCode, Error> {
    api.close_session(&token).await?;

    Ok(StatusCode::NO_CONTENT)
}
