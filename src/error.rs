use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        Error::env_var_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::reqwest_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        Error::authorizor_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            4 => (StatusCode::BAD_GATEWAY, "Upstream Error"),
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            102 => (StatusCode::UNAUTHORIZED, self.message.as_str()),
            103 => (StatusCode::FORBIDDEN, self.message.as_str()),
            104 => (StatusCode::NOT_FOUND, self.message.as_str()),
            105 => (StatusCode::PAYMENT_REQUIRED, self.message.as_str()),
            106 => (StatusCode::LOCKED, self.message.as_str()),
            108 => (StatusCode::CONFLICT, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl Error {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn env_var_error(_: env::VarError) -> Self {
        Self::new(1, "environment variable error")
    }

    pub fn reqwest_error(err: reqwest::Error) -> Self {
        tracing::error!("http client error: {}", err);
        Self::new(3, "reqwest error")
    }

    pub fn upstream_error() -> Self {
        Self::new(4, "upstream error")
    }

    pub fn unexpected_error() -> Self {
        Self::new(5, "unexpected error")
    }

    pub fn authorizor_error<T: Debug>(err: T) -> Self {
        tracing::error!("authorizor error: {:?}", err);
        Self::new(6, "authorizor error")
    }

    pub fn serialization_error<T: Debug>(err: T) -> Self {
        tracing::error!("serialization error: {:?}", err);
        Self::new(7, "serialization error")
    }

    pub fn invalid_state_error(message: impl Into<String>) -> Self {
        Self::new(100, message)
    }

    pub fn invalid_input_error(message: impl Into<String>) -> Self {
        Self::new(101, message)
    }

    pub fn unauthenticated_error() -> Self {
        Self::new(102, "sign in required")
    }

    pub fn forbidden_error(message: impl Into<String>) -> Self {
        Self::new(103, message)
    }

    pub fn not_found_error(message: impl Into<String>) -> Self {
        Self::new(104, message)
    }

    pub fn top_up_required_error() -> Self {
        Self::new(105, "insufficient credits, top up your wallet to place a bid")
    }

    pub fn locked_error() -> Self {
        Self::new(
            106,
            "Messaging is locked until the bid is accepted. This protects both parties and ensures commitment.",
        )
    }

    pub fn out_of_range_error(message: impl Into<String>) -> Self {
        Self::new(107, message)
    }

    pub fn in_flight_error() -> Self {
        Self::new(108, "a submission for this request is already in progress")
    }

    pub fn rejected_error(message: impl Into<String>) -> Self {
        Self::new(109, message)
    }

    pub fn is_invalid_input_error(&self) -> bool {
        self.code == 101
    }

    pub fn is_forbidden_error(&self) -> bool {
        self.code == 103
    }

    pub fn is_not_found_error(&self) -> bool {
        self.code == 104
    }

    pub fn is_top_up_required_error(&self) -> bool {
        self.code == 105
    }

    pub fn is_locked_error(&self) -> bool {
        self.code == 106
    }

    pub fn is_out_of_range_error(&self) -> bool {
        self.code == 107
    }

    pub fn is_in_flight_error(&self) -> bool {
        self.code == 108
    }

    /// Internal errors carry no user-facing detail.
    pub fn is_internal(&self) -> bool {
        (1..=99).contains(&self.code)
    }
}

#[test]
fn internal_errors_hide_message() {
    let response = Error::unexpected_error().into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = Error::upstream_error().into_response();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[test]
fn user_facing_error_statuses() {
    assert_eq!(
        Error::top_up_required_error().into_response().status(),
        StatusCode::PAYMENT_REQUIRED
    );
    assert_eq!(Error::locked_error().into_response().status(), StatusCode::LOCKED);
    assert_eq!(
        Error::forbidden_error("no").into_response().status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        Error::invalid_input_error("missing title").into_response().status(),
        StatusCode::BAD_REQUEST
    );
    assert!(!Error::locked_error().is_internal());
    assert!(Error::upstream_error().is_internal());
}
