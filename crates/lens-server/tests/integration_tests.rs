//! Integration tests for lens-server
//!
//! These drive the full router (routes, body limit, error mapping) with a
//! scripted generator standing in for the model.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use lens_core::{
    config::ModelSpec,
    engine::{ModelLoader, Readiness, SimplifierEngine, TextGenerator},
    generation::GenerationParams,
    CoreError,
};
use lens_server::{
    config::ServerConfig,
    server::{create_router, LensServer, ServerState},
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
};
use std::time::Duration;
use tower::ServiceExt;

/// Replies with a fixed completion and records the last parameters it saw
struct ScriptedGenerator {
    reply: String,
    calls: AtomicUsize,
    last_params: Mutex<Option<GenerationParams>>,
}

impl ScriptedGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for ScriptedGenerator {
    fn device(&self) -> &str {
        "cpu"
    }

    fn generate(&self, _prompt: &str, params: &GenerationParams) -> lens_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(*params);
        Ok(self.reply.clone())
    }
}

struct BrokenGenerator;

impl TextGenerator for BrokenGenerator {
    fn device(&self) -> &str {
        "cuda"
    }

    fn generate(&self, _prompt: &str, _params: &GenerationParams) -> lens_core::Result<String> {
        Err(CoreError::generation(
            "GENERATION_FAILED",
            "CUDA out of memory",
            "Lower max_new_tokens",
        ))
    }
}

/// Blocks inside `load` until the test sends on the paired channel
struct GatedLoader {
    release: Mutex<mpsc::Receiver<()>>,
}

impl ModelLoader for GatedLoader {
    fn load(&self, _spec: &ModelSpec) -> lens_core::Result<Arc<dyn TextGenerator>> {
        let _ = self.release.lock().unwrap().recv();
        Ok(ScriptedGenerator::new("Plain text."))
    }
}

fn create_test_state() -> ServerState {
    ServerState::new(
        Arc::new(ServerConfig::default()),
        Arc::new(SimplifierEngine::default()),
    )
}

async fn send_request(
    router: axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Response {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json_body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    router.oneshot(request).await.unwrap()
}

async fn send_raw(router: axum::Router, uri: &str, body: &'static str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    router.oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_unavailable_until_loaded() {
    let state = create_test_state();
    state.engine.mark_loading();
    let router = create_router(state.clone());

    let response = send_request(router.clone(), Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["message"], "Model not loaded or still loading.");
    assert_eq!(json["error"]["details"]["readiness"]["state"], "loading");

    state.engine.install(ScriptedGenerator::new("ok"));

    let response = send_request(router, Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["device"], "cpu");
}

#[tokio::test]
async fn test_health_after_failed_load() {
    let state = create_test_state();
    state.engine.mark_failed("adapter repository not found");
    let router = create_router(state);

    let response = send_request(router, Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["details"]["readiness"]["state"], "failed");
}

#[tokio::test]
async fn test_simplify_end_to_end() {
    let state = create_test_state();
    let generator = ScriptedGenerator::new(
        "  You can't sublet the place unless the landlord says yes.\n<end_of_turn>\n<start_of_turn>user\nmore",
    );
    state.engine.install(generator.clone());
    let router = create_router(state);

    let response = send_request(
        router,
        Method::POST,
        "/simplify",
        Some(json!({
            "clause": "The lessee shall not sublease the premises without consent.",
            "temperature": 0.3,
            "max_new_tokens": 256
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let text = json["simplified_text"].as_str().unwrap();
    assert_eq!(text, "You can't sublet the place unless the landlord says yes.");
    assert!(!text.contains("<end_of_turn>"));
    assert!(!text.contains("<start_of_turn>"));

    assert_eq!(generator.calls(), 1);
    let params = generator.last_params.lock().unwrap().unwrap();
    assert_eq!(params.max_new_tokens, 256);
    assert_eq!(params.temperature, 0.3);
}

#[tokio::test]
async fn test_simplify_applies_defaults() {
    let state = create_test_state();
    let generator = ScriptedGenerator::new("Plain text.");
    state.engine.install(generator.clone());
    let router = create_router(state);

    let response = send_request(
        router,
        Method::POST,
        "/simplify",
        Some(json!({ "clause": "The tenant shall pay rent monthly." })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let params = generator.last_params.lock().unwrap().unwrap();
    assert_eq!(params, GenerationParams::default());
}

#[tokio::test]
async fn test_empty_clause_rejected_without_generating() {
    let state = create_test_state();
    let generator = ScriptedGenerator::new("should not be used");
    state.engine.install(generator.clone());
    let router = create_router(state);

    for clause in ["", "   \n\t  "] {
        let response = send_request(
            router.clone(),
            Method::POST,
            "/simplify",
            Some(json!({ "clause": clause })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["details"]["error_code"], "INVALID_CLAUSE");
    }

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_out_of_range_parameters_rejected() {
    let state = create_test_state();
    let generator = ScriptedGenerator::new("unused");
    state.engine.install(generator.clone());
    let router = create_router(state);

    let cases = [
        (json!({ "clause": "x", "temperature": 0.0 }), "INVALID_TEMPERATURE"),
        (json!({ "clause": "x", "temperature": 5.0 }), "INVALID_TEMPERATURE"),
        (json!({ "clause": "x", "max_new_tokens": 0 }), "INVALID_MAX_NEW_TOKENS"),
        (json!({ "clause": "x", "max_new_tokens": 4096 }), "INVALID_MAX_NEW_TOKENS"),
    ];

    for (body, code) in cases {
        let response = send_request(router.clone(), Method::POST, "/simplify", Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["details"]["error_code"], code);
    }

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_simplify_while_loading_returns_503() {
    let state = create_test_state();
    state.engine.mark_loading();
    let router = create_router(state);

    let response = send_request(
        router,
        Method::POST,
        "/simplify",
        Some(json!({ "clause": "The lessee shall not sublease the premises." })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["details"]["error_code"], "MODEL_NOT_READY");
}

#[tokio::test]
async fn test_generation_failure_returns_500_with_message() {
    let state = create_test_state();
    state.engine.install(Arc::new(BrokenGenerator));
    let router = create_router(state);

    let response = send_request(
        router,
        Method::POST,
        "/simplify",
        Some(json!({ "clause": "The lessee shall not sublease the premises." })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"]["details"]["detail"], "CUDA out of memory");
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let state = create_test_state();
    let generator = ScriptedGenerator::new("unused");
    state.engine.install(generator.clone());
    let router = create_router(state);

    let response = send_raw(router.clone(), "/simplify", "{\"clause\": ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request");

    let response = send_raw(router, "/simplify", "{\"temperature\": 0.3}").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = ServerConfig::default();
    config.limits.max_body_size = 128;
    let state = ServerState::new(Arc::new(config), Arc::new(SimplifierEngine::default()));
    state.engine.install(ScriptedGenerator::new("unused"));
    let router = create_router(state);

    let body = json!({ "clause": "The lessee shall not sublease. ".repeat(20) }).to_string();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/simplify")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "payload_too_large");
    assert_eq!(json["error"]["code"], 413);
    assert!(json["error"]["request_id"].as_str().unwrap().starts_with("req_"));
}

#[tokio::test]
async fn test_oversized_chunked_body_rejected() {
    let mut config = ServerConfig::default();
    config.limits.max_body_size = 128;
    let state = ServerState::new(Arc::new(config), Arc::new(SimplifierEngine::default()));
    state.engine.install(ScriptedGenerator::new("unused"));
    let router = create_router(state);

    let response = send_request(
        router,
        Method::POST,
        "/simplify",
        Some(json!({ "clause": "The lessee shall not sublease. ".repeat(20) })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "payload_too_large");
}

#[tokio::test]
async fn test_index_page_served() {
    let router = create_router(create_test_state());

    let response = send_request(router, Method::GET, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("/simplify"));
    assert!(page.contains("does not constitute legal advice"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_answers_while_model_loads() {
    let (release_tx, release_rx) = mpsc::channel();
    let loader: Arc<dyn ModelLoader> = Arc::new(GatedLoader {
        release: Mutex::new(release_rx),
    });
    let server = LensServer::new(ServerConfig::default(), Some(loader)).unwrap();
    let engine = Arc::clone(&server.state().engine);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(listener, async move {
        let _ = shutdown_rx.await;
    }));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    // The loader is parked, so the service must already be answering
    let response = client.get(format!("{}/health", base_url)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 503);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"]["details"]["readiness"]["state"], "loading");

    let response = client
        .post(format!("{}/simplify", base_url))
        .json(&json!({ "clause": "The lessee shall not sublease the premises." }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 503);

    release_tx.send(()).unwrap();

    let mut healthy = false;
    for _ in 0..100 {
        let response = client.get(format!("{}/health", base_url)).send().await.unwrap();
        if response.status().as_u16() == 200 {
            let json: Value = response.json().await.unwrap();
            assert_eq!(json["device"], "cpu");
            healthy = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(healthy, "model never became ready");

    drop(client);
    shutdown_tx.send(()).unwrap();
    serving.await.unwrap().unwrap();
    assert_eq!(engine.readiness(), Readiness::Idle);
}
