// Embedding route handler (`POST /embed`, also served as `/vectorize`)

use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::time::Instant;

use instructor_embed_types::{EmbedErrorResponse, EmbedRequest, EmbedResponse, LifecycleState};

use crate::web::error::DispatchError;
use crate::web::request_parsing::parse_json_body;
use crate::web::response_helpers::{json_error, json_response};
use crate::web::state::SharedAppState;
use crate::{sys_debug, sys_error, sys_warn};

pub async fn handle(
    req: Request<Body>,
    state: SharedAppState,
) -> Result<Response<Body>, Infallible> {
    let request: EmbedRequest = match parse_json_body(req.into_body()).await {
        Ok(request) => request,
        Err(error_response) => return Ok(error_response),
    };

    let pairs = match request.into_pairs() {
        Ok(pairs) => pairs,
        Err(message) => {
            sys_warn!("[EMBED] Rejected request: {}", message);
            return Ok(json_error(StatusCode::BAD_REQUEST, &message));
        }
    };

    let count = pairs.len();
    let started = Instant::now();
    match state.dispatcher.dispatch(pairs).await {
        Ok(embeddings) => {
            sys_debug!("[EMBED] {} embeddings in {:?}", count, started.elapsed());
            Ok(json_response(StatusCode::OK, &EmbedResponse { embeddings }))
        }
        Err(err) => Ok(dispatch_error_response(err, &state)),
    }
}

fn dispatch_error_response(err: DispatchError, state: &SharedAppState) -> Response<Body> {
    let (status_code, body) = match err {
        DispatchError::NotReady { state, message } => (
            StatusCode::SERVICE_UNAVAILABLE,
            EmbedErrorResponse {
                error: "Model not ready".to_string(),
                status: state,
                message,
            },
        ),
        DispatchError::Encode(e) => {
            sys_error!("[EMBED] Encoding failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                EmbedErrorResponse {
                    error: "Encoding failed".to_string(),
                    status: LifecycleState::Error,
                    message: e.to_string(),
                },
            )
        }
        DispatchError::ShuttingDown => (
            StatusCode::SERVICE_UNAVAILABLE,
            EmbedErrorResponse {
                error: "Service is shutting down".to_string(),
                status: state.lifecycle.status().state,
                message: "The server is draining and accepts no new work".to_string(),
            },
        ),
    };
    json_response(status_code, &body)
}
