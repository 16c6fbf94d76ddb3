// End-to-end checks of the HTTP surface, driven in-process through the router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::{json, Value};

use instructor_embed::web::backends::hash::HashLoader;
use instructor_embed::web::server::handle_request;
use instructor_embed::web::{
    AppState, EmbeddingModel, EncodeError, LifecycleManager, LoadError, ModelHandle, ModelLoader,
    ProgressReporter, SharedAppState,
};
use instructor_embed_types::{DispatchParameters, EmbedPair, SystemResources};

const GIB: u64 = 1024 * 1024 * 1024;

/// Encodes each pair as [len(instruction), len(text), index parsed from the text].
#[derive(Default)]
struct CountingModel {
    calls: AtomicUsize,
    fail_on: Option<String>,
}

impl EmbeddingModel for CountingModel {
    fn encode(&self, pairs: &[EmbedPair]) -> Result<Vec<Vec<f32>>, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(bad) = &self.fail_on {
            if pairs.iter().any(|p| &p.text == bad) {
                return Err(EncodeError::new(format!("refusing {bad}")));
            }
        }
        Ok(pairs
            .iter()
            .map(|p| {
                let index = p
                    .text
                    .rsplit(' ')
                    .next()
                    .and_then(|n| n.parse::<f32>().ok())
                    .unwrap_or(-1.0);
                vec![p.instruction.len() as f32, p.text.len() as f32, index]
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        3
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Reports some download progress, optionally waits for a go signal, then
/// returns the model or fails.
struct ScriptedLoader {
    model: Arc<CountingModel>,
    fail_with: Option<String>,
    gate: Option<Mutex<std::sync::mpsc::Receiver<()>>>,
}

impl ModelLoader for ScriptedLoader {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn load(&self, progress: &ProgressReporter<'_>) -> Result<ModelHandle, LoadError> {
        progress.report(20, "fetching weights");
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        if let Some(message) = &self.fail_with {
            return Err(LoadError::Acquire(message.clone()));
        }
        let model: ModelHandle = self.model.clone();
        Ok(model)
    }
}

fn state_with(params: DispatchParameters) -> SharedAppState {
    let resources = SystemResources {
        cpu_count: 8,
        total_memory: 16 * GIB,
        available_memory: 8 * GIB,
    };
    Arc::new(AppState::new(Arc::new(LifecycleManager::new()), resources, params).unwrap())
}

fn default_state() -> SharedAppState {
    state_with(DispatchParameters {
        max_workers: 6,
        chunk_size: 32,
    })
}

async fn call(state: &SharedAppState, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = body.map(|v| Body::from(v.to_string())).unwrap_or_else(Body::empty);
    let req = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response: Response<Body> = handle_request(req, state.clone()).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn embed_body(n: usize) -> Value {
    json!({
        "instructions": (0..n).map(|i| format!("Represent item {}", i % 4)).collect::<Vec<_>>(),
        "texts": (0..n).map(|i| format!("sentence number {i}")).collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn health_and_ready_before_loading() {
    let state = default_state();

    let (status, health) = call(&state, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "starting");
    assert_eq!(health["progress"], 0);
    assert_eq!(health["message"], "Starting up...");

    let (status, ready) = call(&state, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ready["status"], "loading");
}

#[tokio::test]
async fn embed_is_rejected_while_downloading() {
    let state = default_state();
    let model = Arc::new(CountingModel::default());
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = state
        .lifecycle
        .start_loading(Arc::new(ScriptedLoader {
            model: model.clone(),
            fail_with: None,
            gate: Some(Mutex::new(rx)),
        }))
        .unwrap();

    // Wait until the loader has published its progress report.
    let mut health = Value::Null;
    for _ in 0..100 {
        health = call(&state, Method::GET, "/health", None).await.1;
        if health["progress"] == 20 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(health["status"], "downloading");
    assert_eq!(health["progress"], 20);

    let (status, body) = call(&state, Method::POST, "/embed", Some(embed_body(5))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Model not ready");
    assert_eq!(body["status"], "downloading");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);

    tx.send(()).unwrap();
    handle.await.unwrap();

    let (_, ready) = call(&state, Method::GET, "/ready", None).await;
    assert_eq!(ready["status"], "ready");
    let (_, health) = call(&state, Method::GET, "/health", None).await;
    assert_eq!(health["progress"], 100);
    assert_eq!(health["message"], "Model is ready!");
}

#[tokio::test]
async fn embed_seventy_pairs_in_order() {
    let state = default_state();
    let model = Arc::new(CountingModel::default());
    state
        .lifecycle
        .start_loading(Arc::new(ScriptedLoader {
            model: model.clone(),
            fail_with: None,
            gate: None,
        }))
        .unwrap()
        .await
        .unwrap();
    let warm_up_calls = model.calls.load(Ordering::SeqCst);

    let (status, body) = call(&state, Method::POST, "/embed", Some(embed_body(70))).await;
    assert_eq!(status, StatusCode::OK);

    let embeddings = body["embeddings"].as_array().unwrap();
    assert_eq!(embeddings.len(), 70);
    for (i, vector) in embeddings.iter().enumerate() {
        assert_eq!(vector[2].as_f64().unwrap() as usize, i);
    }
    // 70 pairs at chunk size 32 are three model calls.
    assert_eq!(model.calls.load(Ordering::SeqCst) - warm_up_calls, 3);
}

#[tokio::test]
async fn encode_failure_is_500_and_isolated() {
    let state = state_with(DispatchParameters {
        max_workers: 2,
        chunk_size: 4,
    });
    let model = Arc::new(CountingModel {
        fail_on: Some("sentence number 6".to_string()),
        ..CountingModel::default()
    });
    state
        .lifecycle
        .start_loading(Arc::new(ScriptedLoader {
            model,
            fail_with: None,
            gate: None,
        }))
        .unwrap()
        .await
        .unwrap();

    let (status, body) = call(&state, Method::POST, "/embed", Some(embed_body(10))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Encoding failed");
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("sentence number 6"));
    assert!(body.get("embeddings").is_none());

    let (status, body) = call(&state, Method::POST, "/embed", Some(embed_body(5))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["embeddings"].as_array().unwrap().len(), 5);

    // The service itself stays ready.
    let (_, ready) = call(&state, Method::GET, "/ready", None).await;
    assert_eq!(ready["status"], "ready");
}

#[tokio::test]
async fn load_failure_is_terminal() {
    let state = default_state();
    state
        .lifecycle
        .start_loading(Arc::new(ScriptedLoader {
            model: Arc::new(CountingModel::default()),
            fail_with: Some("repository not found".to_string()),
            gate: None,
        }))
        .unwrap()
        .await
        .unwrap();

    let (_, health) = call(&state, Method::GET, "/health", None).await;
    assert_eq!(health["status"], "error");
    assert_eq!(health["progress"], 20);
    assert_eq!(health["message"], "Error loading model: repository not found");

    let (_, ready) = call(&state, Method::GET, "/ready", None).await;
    assert_eq!(ready["status"], "error");

    let (status, body) = call(&state, Method::POST, "/embed", Some(embed_body(1))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");

    // A second start request changes nothing.
    assert!(state
        .lifecycle
        .start_loading(Arc::new(HashLoader::new(8)))
        .is_none());
    let (_, health) = call(&state, Method::GET, "/health", None).await;
    assert_eq!(health["status"], "error");
}

#[tokio::test]
async fn bad_requests_are_400() {
    let state = default_state();
    state
        .lifecycle
        .start_loading(Arc::new(HashLoader::new(16)))
        .unwrap()
        .await
        .unwrap();

    let (status, body) = call(
        &state,
        Method::POST,
        "/embed",
        Some(json!({"instructions": ["a", "b"], "texts": ["only one"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("same length"));

    let (status, _) = call(&state, Method::POST, "/embed", Some(json!({"texts": 3}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_request_returns_no_embeddings() {
    let state = default_state();
    state
        .lifecycle
        .start_loading(Arc::new(HashLoader::new(16)))
        .unwrap()
        .await
        .unwrap();

    let (status, body) = call(
        &state,
        Method::POST,
        "/vectorize",
        Some(json!({"instructions": [], "texts": []})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["embeddings"], json!([]));
}

#[tokio::test]
async fn hash_backend_vectors_are_normalized() {
    let state = default_state();
    state
        .lifecycle
        .start_loading(Arc::new(HashLoader::new(64)))
        .unwrap()
        .await
        .unwrap();

    let (status, body) = call(&state, Method::POST, "/embed", Some(embed_body(3))).await;
    assert_eq!(status, StatusCode::OK);
    for vector in body["embeddings"].as_array().unwrap() {
        let values: Vec<f64> = vector
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(values.len(), 64);
        let norm: f64 = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}

#[tokio::test]
async fn system_info_reports_snapshot_and_parameters() {
    let state = default_state();
    let (status, body) = call(&state, Method::GET, "/system-info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["system_resources"]["cpu_count"], 8);
    assert_eq!(body["system_resources"]["available_memory"], 8 * GIB);
    assert_eq!(body["system_resources"]["available_memory_gb"], 8.0);
    assert_eq!(body["parameters"]["max_workers"], 6);
    assert_eq!(body["parameters"]["chunk_size"], 32);
}

#[tokio::test]
async fn root_and_unknown_paths() {
    let state = default_state();
    let (status, body) = call(&state, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "instructor-embed");

    let (status, body) = call(&state, Method::DELETE, "/health", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}
