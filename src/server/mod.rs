mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequest, RequestParts},
    http::{header, HeaderMap},
    routing::{get, patch, post, put},
    Router,
};

use crate::api::{DynAPI, SessionAPI, API};
use crate::auth::Session;
use crate::error::Error;
use crate::server::handlers::{bids, refunds, requests, sessions, wallet};

/// Access token taken from `Authorization: Bearer <token>`.
pub struct Bearer(pub String);

fn bearer_token(headers: &HeaderMap) -> Result<String, Error> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .ok_or_else(Error::unauthenticated_error)
}

#[async_trait]
impl<B: Send> FromRequest<B> for Bearer {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        bearer_token(req.headers()).map(Bearer)
    }
}

#[async_trait]
impl<B: Send> FromRequest<B> for Session {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Bearer(token) = Bearer::from_request(req).await?;
        let Extension(api) = Extension::<DynAPI>::from_request(req)
            .await
            .map_err(|_| Error::unexpected_error())?;

        api.find_session(&token).await
    }
}

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/sessions", post(sessions::open).delete(sessions::close))
        .route("/requests", post(requests::create))
        .route("/requests/available", get(requests::available))
        .route("/requests/mine", get(requests::mine))
        .route("/requests/:id/replies", get(requests::replies))
        .route("/requests/:id/bid", put(bids::place))
        .route("/bids/mine", get(bids::mine))
        .route("/bids/:id/accept", patch(bids::accept))
        .route("/bids/:id/withdraw", patch(bids::withdraw))
        .route("/bids/:id/contact", get(bids::contact))
        .route("/wallet", get(wallet::find))
        .route("/wallet/transactions", get(wallet::transactions))
        .route("/wallet/refresh", post(wallet::refresh))
        .route("/wallet/top-up", post(wallet::top_up))
        .route("/admin/wallets/:id/adjust", post(wallet::adjust))
        .route("/admin/refunds", get(refunds::list))
        .route("/admin/refunds/stats", get(refunds::stats))
        .route("/admin/refunds/export", get(refunds::export))
        .route("/admin/refunds/:id/approve", patch(refunds::approve))
        .route("/admin/refunds/:id/reject", patch(refunds::reject))
        .route("/admin/refunds/:id/process", patch(refunds::process))
        .layer(Extension(api))
}

pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    let api = Arc::new(api) as DynAPI;
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|err| {
            tracing::error!(%err, "server stopped");
            Error::unexpected_error()
        })
}

#[test]
fn bearer_token_test() {
    use axum::http::HeaderValue;

    let mut headers = HeaderMap::new();
    assert_eq!(bearer_token(&headers).unwrap_err().code, 102);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert_eq!(bearer_token(&headers).unwrap_err().code, 102);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
    assert_eq!(bearer_token(&headers).unwrap_err().code, 102);

    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer eyJhbGciOi.abc"),
    );
    assert_eq!(bearer_token(&headers).unwrap(), "eyJhbGciOi.abc");
}
