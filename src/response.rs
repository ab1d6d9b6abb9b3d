//! JSON envelope shared by every endpoint.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

/// `{ success, message, data?, error? }`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

pub fn success<T: Serialize>(message: &str, data: T) -> Response {
    with_status(StatusCode::OK, message, data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    with_status(StatusCode::CREATED, message, data)
}

fn with_status<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let body = Envelope {
        success: true,
        message: message.to_string(),
        data: Some(data),
        error: None,
    };
    (status, Json(body)).into_response()
}

/// Error body with a stable machine-readable code.
pub fn failure(status: StatusCode, code: &'static str, message: String) -> Response {
    let body: Envelope<()> = Envelope {
        success: false,
        message,
        data: None,
        error: Some(code),
    };
    (status, Json(body)).into_response()
}

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }
}
