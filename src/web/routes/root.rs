// Service banner for `GET /`

use hyper::{Body, Response, StatusCode};
use std::convert::Infallible;

use crate::web::response_helpers::json_response;

pub const SERVICE_NAME: &str = "instructor-embed";

pub async fn handle() -> Result<Response<Body>, Infallible> {
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "Instruction-conditioned sentence embedding service",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }),
    ))
}
