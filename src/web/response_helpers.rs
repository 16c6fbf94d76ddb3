// HTTP response helper functions shared by the route handlers

use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

use crate::sys_error;

/// Standard CORS headers
const CORS_ORIGIN: &str = "*";
const CORS_METHODS: &str = "GET, POST, OPTIONS";
const CORS_HEADERS: &str = "content-type, authorization";

fn with_cors(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(CORS_ORIGIN));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_HEADERS));
    response
}

/// Build a JSON response with CORS headers
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(json) => json_bytes(status, json),
        Err(e) => {
            sys_error!("[RESPONSE] Serialization failed: {}", e);
            json_bytes(
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"Serialization failed"}"#.to_vec(),
            )
        }
    }
}

/// Build a `{"error": message}` response
pub fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &serde_json::json!({ "error": message }))
}

fn json_bytes(status: StatusCode, json: Vec<u8>) -> Response<Body> {
    let mut response = with_cors(status, Body::from(json));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// CORS preflight response
pub fn cors_preflight() -> Response<Body> {
    with_cors(StatusCode::OK, Body::empty())
}
