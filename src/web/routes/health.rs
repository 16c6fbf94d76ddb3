// Health check route handler

use hyper::{Body, Response, StatusCode};
use std::convert::Infallible;

use crate::web::response_helpers::json_response;
use crate::web::state::SharedAppState;

/// Current lifecycle snapshot. Always 200, even while loading or failed.
pub async fn handle(state: SharedAppState) -> Result<Response<Body>, Infallible> {
    Ok(json_response(StatusCode::OK, &state.lifecycle.status()))
}
