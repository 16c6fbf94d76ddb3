// System information route handler

use hyper::{Body, Response, StatusCode};
use std::convert::Infallible;

use instructor_embed_types::{SystemInfoResponse, SystemResourcesView};

use crate::web::response_helpers::json_response;
use crate::web::state::SharedAppState;

/// The startup resource snapshot and the pool parameters derived from it.
/// Not re-sampled per request.
pub async fn handle(state: SharedAppState) -> Result<Response<Body>, Infallible> {
    let body = SystemInfoResponse {
        system_resources: SystemResourcesView::from(&state.resources),
        parameters: state.parameters(),
    };
    Ok(json_response(StatusCode::OK, &body))
}
