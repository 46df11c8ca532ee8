use axum::{
    extract::{Extension, Json, Path, Query},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{DynAPI, RefundAPI, RefundFilter, RefundStats},
    auth::Session,
    entities::RefundRequest,
    error::Error,
};

#[derive(Serialize, Deserialize)]
pub struct ReviewParams {
    notes: String,
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Query(filter): Query<RefundFilter>,
) -> Result<Json<Vec<RefundRequest>>, Error> {
    let refunds = api.list_refunds(&session, filter).await?;

    Ok(refunds.into())
}

pub async fn stats(
    Extension(api): Extension<DynAPI>,
    session: Session,
) -> Result<Json<RefundStats>, Error> {
    let stats = api.refund_stats(&session).await?;

    Ok(stats.into())
}

pub async fn export(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Query(filter): Query<RefundFilter>,
) -> Result<impl IntoResponse, Error> {
    let export = api.export_refunds(&session, filter).await?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export.filename),
        ),
    ];

    Ok((headers, export.content))
}

pub async fn approve(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(id): Path<String>,
    Json(params): Json<ReviewParams>,
) -> Result<Json<RefundRequest>, Error> {
    let refund = api.approve_refund(&session, id, params.notes).await?;

    Ok(refund.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(id): Path<String>,
    Json(params): Json<ReviewParams>,
) -> Result<Json<RefundRequest>, Error> {
    let refund = api.reject_refund(&session, id, params.notes).await?;

    Ok(refund.into())
}

pub async fn process(
    Extension(api): Extension<DynAPI>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<RefundRequest>, Error> {
    let refund = api.process_refund(&session, id).await?;

    Ok(refund.into())
}
