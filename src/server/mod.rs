use crate::classifier::{Prediction, TransformerClassifier};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::HubLoader;
use crate::registry::{self, Availability, TASK};
use crate::resolver::{Request, Resolver};
use axum::{
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tower_http::trace::TraceLayer;

type ClassifierKey = (String, String);

/// Runs CPU- or IO-bound work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
	F: FnOnce() -> Result<T> + Send + 'static,
	T: Send + 'static,
{
	tokio::task::spawn_blocking(f)
		.await
		.map_err(|e| Error::ClassificationError(format!("Blocking task failed: {}", e)))?
}

/// Values loaded at most once per key. Concurrent first requests for one key
/// wait on a single load; a failed load leaves the key empty for a retry.
struct LoadSlots<T> {
	slots: RwLock<HashMap<ClassifierKey, Arc<OnceCell<Arc<Mutex<T>>>>>>,
}

impl<T: Send + 'static> LoadSlots<T> {
	fn new() -> Self {
		Self {
			slots: RwLock::new(HashMap::new()),
		}
	}

	async fn get_or_load<F>(&self, key: ClassifierKey, load: F) -> Result<Arc<Mutex<T>>>
	where
		F: FnOnce() -> Result<T> + Send + 'static,
	{
		let slot = self.slots.write().await.entry(key).or_default().clone();

		let value = slot
			.get_or_try_init(|| async move {
				let value = blocking(load).await?;
				Ok::<_, Error>(Arc::new(Mutex::new(value)))
			})
			.await?;

		Ok(value.clone())
	}

	async fn loaded(&self) -> usize {
		self.slots
			.read()
			.await
			.values()
			.filter(|slot| slot.initialized())
			.count()
	}
}

#[derive(Clone)]
pub struct AppState {
	resolver: Arc<Resolver<HubLoader>>,
	classifiers: Arc<LoadSlots<TransformerClassifier>>,
}

impl AppState {
	pub fn new(config: &Config) -> Self {
		Self {
			resolver: Arc::new(Resolver::from_config(config)),
			classifiers: Arc::new(LoadSlots::new()),
		}
	}

	/// Returns the loaded classifier for a request, resolving it on the
	/// blocking pool the first time.
	async fn classifier(&self, request: Request) -> Result<Arc<Mutex<TransformerClassifier>>> {
		let key = (request.model().to_string(), request.size().to_string());
		let resolver = self.resolver.clone();

		self.classifiers
			.get_or_load(key, move || resolver.resolve_request(&request))
			.await
	}
}

#[derive(Serialize)]
pub struct HealthResponse {
	pub status: String,
	pub task: String,
	pub loaded: usize,
}

#[derive(Serialize)]
pub struct PredictResponse {
	pub model: String,
	pub size: String,
	pub labels: Vec<String>,
	pub predictions: Vec<Prediction>,
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			Error::InvalidType(_)
			| Error::UnsupportedModel(_)
			| Error::UnsupportedSize(_)
			| Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
			Error::NotCached { .. } => (StatusCode::NOT_FOUND, self.to_string()),
			Error::DownloadFailed(_) | Error::ModelLoadFailed(_) | Error::ClassificationError(_) => {
				(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
			}
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
		};

		let body = Json(serde_json::json!({
			"error": message,
		}));

		(status, body).into_response()
	}
}

fn parse_input(payload: &Value) -> Result<Vec<String>> {
	let invalid = || Error::InvalidInput("input must be a non-empty list of strings".to_string());

	let items = payload.get("input").and_then(Value::as_array).ok_or_else(invalid)?;
	if items.is_empty() {
		return Err(invalid());
	}

	items
		.iter()
		.map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
		.collect()
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
	let loaded = state.classifiers.loaded().await;

	Json(HealthResponse {
		status: "ok".to_string(),
		task: TASK.to_string(),
		loaded,
	})
}

async fn available_handler() -> Json<&'static Availability> {
	Json(registry::available_transformer_model())
}

async fn predict_handler(
	State(state): State<AppState>,
	Json(payload): Json<Value>,
) -> Result<Json<PredictResponse>> {
	let request = Request::from_json(&payload)?;
	let input = parse_input(&payload)?;

	let classifier = state.classifier(request).await?;
	let response = blocking(move || {
		let mut classifier = classifier.blocking_lock();
		let predictions = classifier.predict(&input)?;

		Ok(PredictResponse {
			model: classifier.model().to_string(),
			size: classifier.size().to_string(),
			labels: classifier.labels().to_vec(),
			predictions,
		})
	})
	.await?;

	Ok(Json(response))
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/api/health", get(health_handler))
		.route("/api/available", get(available_handler))
		.route("/api/predict", post(predict_handler))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
	let app = create_router(state);
	let addr = format!("{}:{}", host, port);

	tracing::info!("Starting server on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

	axum::serve(listener, app)
		.await
		.map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::Request as HttpRequest;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use tower::ServiceExt;

	fn router() -> (tempfile::TempDir, Router) {
		let dir = tempfile::tempdir().unwrap();
		let config = Config::with_data_dir(dir.path()).unwrap();
		(dir, create_router(AppState::new(&config)))
	}

	async fn send(router: Router, request: HttpRequest<Body>) -> (StatusCode, Value) {
		let response = router.oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap())
	}

	async fn predict(body: Value) -> (StatusCode, Value) {
		let (_dir, router) = router();
		let request = HttpRequest::builder()
			.method("POST")
			.uri("/api/predict")
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap();
		send(router, request).await
	}

	#[tokio::test]
	async fn health_reports_task() {
		let (_dir, router) = router();
		let request = HttpRequest::builder()
			.uri("/api/health")
			.body(Body::empty())
			.unwrap();

		let (status, body) = send(router, request).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"status": "ok", "task": "relevancy", "loaded": 0}));
	}

	#[tokio::test]
	async fn available_lists_registry() {
		let (_dir, router) = router();
		let request = HttpRequest::builder()
			.uri("/api/available")
			.body(Body::empty())
			.unwrap();

		let (status, body) = send(router, request).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"model": ["bert", "xlnet"], "size": ["base", "small"]}));
	}

	#[tokio::test]
	async fn type_errors_are_bad_requests() {
		let (status, body) = predict(json!({"model": 0, "input": ["text"]})).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "model must be a string");

		let (status, body) = predict(json!({"validate": "true", "input": ["text"]})).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "validate must be a boolean");
	}

	#[tokio::test]
	async fn unsupported_names_are_bad_requests() {
		let (status, body) = predict(json!({"model": "roberta", "input": ["text"]})).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(body["error"]
			.as_str()
			.unwrap()
			.contains("available_transformer_model()"));

		let (status, _) = predict(json!({"size": "large", "input": ["text"]})).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn empty_input_is_rejected_before_loading() {
		let (status, body) = predict(json!({"model": "bert", "input": []})).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "Invalid input: input must be a non-empty list of strings");

		let (status, _) = predict(json!({"input": ["ok", 3]})).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn uncached_model_without_validation_is_not_found() {
		let (status, body) = predict(json!({
			"model": "BERT",
			"size": "small",
			"validate": false,
			"input": ["some text"],
		}))
		.await;

		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(
			body["error"],
			"relevancy/bert/small is not available locally, retry with validate enabled"
		);
	}

	async fn error_response(err: Error) -> (StatusCode, Value) {
		let response = err.into_response();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap())
	}

	#[tokio::test]
	async fn loader_failures_are_server_errors_with_their_message() {
		let (status, body) = error_response(Error::DownloadFailed("timed out".to_string())).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["error"], "Download failed: timed out");

		let (status, body) = error_response(Error::ModelLoadFailed("bad graph".to_string())).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["error"], "Failed to load model: bad graph");
	}

	#[tokio::test]
	async fn other_failures_hide_their_details() {
		let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/secret/path");
		let (status, body) = error_response(Error::IoError(io)).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["error"], "Internal server error");

		let (status, body) = error_response(Error::ConfigError("bind".to_string())).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["error"], "Internal server error");
	}

	#[tokio::test]
	async fn concurrent_first_requests_share_one_load() {
		let slots = LoadSlots::<usize>::new();
		let loads = Arc::new(AtomicUsize::new(0));

		let load = |loads: Arc<AtomicUsize>| {
			move || {
				std::thread::sleep(Duration::from_millis(50));
				Ok(loads.fetch_add(1, Ordering::SeqCst))
			}
		};
		let key = || ("bert".to_string(), "base".to_string());

		let (first, second) = tokio::join!(
			slots.get_or_load(key(), load(loads.clone())),
			slots.get_or_load(key(), load(loads.clone())),
		);

		assert_eq!(loads.load(Ordering::SeqCst), 1);
		assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
		assert_eq!(slots.loaded().await, 1);
	}

	#[tokio::test]
	async fn failed_load_is_retried_on_next_request() {
		let slots = LoadSlots::<&'static str>::new();
		let key = || ("xlnet".to_string(), "small".to_string());

		let err = slots
			.get_or_load(key(), || Err(Error::DownloadFailed("offline".to_string())))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::DownloadFailed(_)));
		assert_eq!(slots.loaded().await, 0);

		let value = slots.get_or_load(key(), || Ok("loaded")).await.unwrap();
		assert_eq!(*value.lock().await, "loaded");
		assert_eq!(slots.loaded().await, 1);
	}

	#[tokio::test]
	async fn blocking_work_propagates_errors_and_panics() {
		let err = blocking(|| -> Result<()> { Err(Error::InvalidInput("empty".to_string())) })
			.await
			.unwrap_err();
		assert!(matches!(err, Error::InvalidInput(_)));

		let err = blocking(|| -> Result<()> { panic!("inference crashed") })
			.await
			.unwrap_err();
		assert!(matches!(err, Error::ClassificationError(_)));

		assert_eq!(blocking(|| Ok(2 + 2)).await.unwrap(), 4);
	}
}
