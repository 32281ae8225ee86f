//! Some helper functions for the API.

use judging_common::StoreError;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::Response;
use rocket::response::status as rocket_status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use std::time::Instant;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error.";

/// When the current request reached the server, cached per request.
struct RequestStart(Instant);

/// Logs every judging API request with its route and latency.
#[derive(Clone, Copy)]
pub struct RequestTimingFairing;

#[rocket::async_trait]
impl Fairing for RequestTimingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Judging request log",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut rocket::Data<'_>) {
        request.local_cache(|| RequestStart(Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let RequestStart(started_at) = request.local_cache(|| RequestStart(Instant::now()));
        let route = request
            .route()
            .and_then(|route| route.name.as_deref())
            .unwrap_or("none");

        tracing::info!(
            method = %request.method(),
            path = %request.uri(),
            route = route,
            status = response.status().code,
            elapsed_ms = started_at.elapsed().as_millis(),
            "Judging API request served"
        );
    }
}

/// Cross-origin headers for the single frontend origin we serve.
#[derive(Clone)]
pub struct CorsFairing {
    allowed_origin: String,
}

impl CorsFairing {
    pub fn new(allowed_origin: impl Into<String>) -> Self {
        Self {
            allowed_origin: allowed_origin.into(),
        }
    }
}

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new(
            "Access-Control-Allow-Origin",
            self.allowed_origin.clone(),
        ));
        response.set_header(Header::new("Vary", "Origin"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS, PATCH, HEAD",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        response.set_header(Header::new("Access-Control-Max-Age", "86400"));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    NotFound,
    BadRequest,
    UnprocessableEntity,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ApiErrorBody {
    pub error: ApiErrorKind,
    pub message: String,
}

impl ApiErrorBody {
    pub fn new(error: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

pub type ApiError = rocket_status::Custom<Json<ApiErrorBody>>;
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: Status, kind: ApiErrorKind, message: impl Into<String>) -> ApiError {
    rocket_status::Custom(status, Json(ApiErrorBody::new(kind, message)))
}

pub fn not_found_error(message: impl Into<String>) -> ApiError {
    api_error(Status::NotFound, ApiErrorKind::NotFound, message)
}

pub fn bad_request_error(message: impl Into<String>) -> ApiError {
    api_error(Status::BadRequest, ApiErrorKind::BadRequest, message)
}

pub fn unprocessable_entity_error(message: impl Into<String>) -> ApiError {
    api_error(
        Status::UnprocessableEntity,
        ApiErrorKind::UnprocessableEntity,
        message,
    )
}

pub fn internal_error() -> ApiError {
    api_error(
        Status::InternalServerError,
        ApiErrorKind::Internal,
        INTERNAL_ERROR_MESSAGE,
    )
}

/// Map a poster or judge table failure to a response.
/// `not_found_message` is what the client sees when the file is missing.
pub fn reference_error(err: &StoreError, not_found_message: &str) -> ApiError {
    if err.is_not_found() {
        tracing::warn!(error = %err, "Reference data missing");
        not_found_error(not_found_message)
    } else {
        tracing::error!(error = %err, "Reference data unreadable");
        internal_error()
    }
}

/// Map a score submission or listing failure to a response.
pub fn score_error(err: &StoreError) -> ApiError {
    if err.is_invalid() {
        tracing::warn!(error = %err, "Rejected submission");
        bad_request_error(err.to_string())
    } else {
        tracing::error!(error = %err, "Score storage failure");
        internal_error()
    }
}
