// Readiness route handler

use hyper::{Body, Response, StatusCode};
use std::convert::Infallible;

use instructor_embed_types::ReadyResponse;

use crate::web::response_helpers::json_response;
use crate::web::state::SharedAppState;

pub async fn handle(state: SharedAppState) -> Result<Response<Body>, Infallible> {
    let status = state.lifecycle.status();
    Ok(json_response(StatusCode::OK, &ReadyResponse::from(&status)))
}
