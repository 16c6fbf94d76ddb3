// Request parsing utilities for HTTP handlers

use hyper::{Body, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::response_helpers::json_error;
use crate::{sys_debug, sys_warn};

/// Parse a JSON request body into a typed structure.
///
/// On failure the `Err` is a ready-to-send 400 response.
pub async fn parse_json_body<T: DeserializeOwned>(body: Body) -> Result<T, Response<Body>> {
    let body_bytes = match hyper::body::to_bytes(body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            sys_warn!("[REQUEST] Failed to read body: {}", e);
            return Err(json_error(StatusCode::BAD_REQUEST, "Failed to read request body"));
        }
    };

    sys_debug!("[REQUEST] Body is {} bytes", body_bytes.len());

    serde_json::from_slice::<T>(&body_bytes).map_err(|e| {
        sys_warn!("[REQUEST] JSON parsing error: {}", e);
        json_error(StatusCode::BAD_REQUEST, &format!("Invalid JSON format: {e}"))
    })
}
