//! The `{ "data": ... }` envelope every successful API response uses.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    /// `200 OK` with `data` in the envelope.
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { data })
    }

    /// Any status with `data` in the envelope.
    pub fn with_status(status: StatusCode, data: T) -> (StatusCode, Json<Self>) {
        (status, Json(Self { data }))
    }
}
