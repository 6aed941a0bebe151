//! Key envelope HTTP API
//!
//! Routes:
//!   POST   /v1/keys/{file_id}  {"file_key": b64}  → 201 {"file_id", "wrapped_key"}
//!   GET    /v1/keys/{file_id}                     → 200 {"file_id", "file_key"}
//!   DELETE /v1/keys/{file_id}                     → 204
//!
//! There is no authentication layer; bind to loopback or put the service
//! behind something that authenticates callers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus_client::registry::Registry;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sharecrypt_core::{ShareCryptError, ShareCryptResult};
use sharecrypt_crypto::{CryptoError, KeyEnvelope, WrappedKey};
use sharecrypt_vault::keystore::validate_file_id;
use sharecrypt_vault::{discard_key, WrappedKeyStore};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::metrics::{self, EnvelopeMetrics};

/// Shared across handlers. The envelope is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub envelope: Arc<KeyEnvelope>,
    pub store: WrappedKeyStore,
    pub metrics: EnvelopeMetrics,
    pub registry: Arc<Registry>,
}

pub fn router(state: AppState, serve_metrics: bool) -> Router {
    let mut app = Router::new()
        .route(
            "/v1/keys/{file_id}",
            post(wrap_key).get(unwrap_key).delete(delete_key),
        )
        .route("/healthz", get(metrics::healthz_handler))
        .route("/readyz", get(metrics::readyz_handler));

    if serve_metrics {
        app = app.route("/metrics", get(metrics::metrics_handler));
    }

    app.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct WrapRequest {
    pub file_key: String,
}

#[derive(Debug, Serialize)]
pub struct WrapResponse {
    pub file_id: String,
    pub wrapped_key: String,
}

#[derive(Debug, Serialize)]
pub struct UnwrapResponse {
    pub file_id: String,
    pub file_key: String,
}

async fn wrap_key(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    payload: Result<Json<WrapRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WrapResponse>), ApiError> {
    let result = match payload {
        Ok(Json(req)) => store_new_key(&state, &file_id, &req.file_key)
            .await
            .map_err(ApiError::from),
        Err(rejection) => Err(ApiError::MalformedBody(rejection.status())),
    };

    let wrapped = observe(&state.metrics, "wrap", &file_id, result)?;
    Ok((
        StatusCode::CREATED,
        Json(WrapResponse {
            file_id,
            wrapped_key: wrapped.into_string(),
        }),
    ))
}

/// Wrap `file_key` and store it. An id that already has a key is refused.
async fn store_new_key(
    state: &AppState,
    file_id: &str,
    file_key: &str,
) -> ShareCryptResult<WrappedKey> {
    validate_file_id(file_id)?;
    let wrapped = state.envelope.wrap(file_key)?;
    state.store.put_new(file_id, &wrapped).await?;
    Ok(wrapped)
}

async fn unwrap_key(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<UnwrapResponse>, ApiError> {
    let result = async {
        let wrapped = state
            .store
            .get(&file_id)
            .await?
            .ok_or_else(|| ShareCryptError::MissingWrappedKey(file_id.clone()))?;
        Ok::<_, ShareCryptError>(state.envelope.unwrap(&wrapped)?)
    }
    .await
    .map_err(ApiError::from);

    let file_key = observe(&state.metrics, "unwrap", &file_id, result)?;
    Ok(Json(UnwrapResponse {
        file_id,
        file_key: file_key.expose_secret().to_string(),
    }))
}

async fn delete_key(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = discard_key(&state.store, &file_id)
        .await
        .map_err(ApiError::from);
    observe(&state.metrics, "delete", &file_id, result)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Count the outcome and log failures at a level matching their severity.
fn observe<T>(
    metrics: &EnvelopeMetrics,
    op: &'static str,
    file_id: &str,
    result: Result<T, ApiError>,
) -> Result<T, ApiError> {
    let err = match result {
        Ok(value) => {
            metrics.record(op, "ok");
            debug!(op, file_id, "envelope op ok");
            return Ok(value);
        }
        Err(err) => err,
    };

    metrics.record(op, err.outcome());
    let status = err.status_code();
    match &err {
        // master key misconfigured or wrapped values corrupted
        ApiError::Service(ShareCryptError::Crypto(c)) if c.is_envelope_failure() => {
            error!(op, file_id, error = %c, "envelope failure");
        }
        ApiError::Service(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
            error!(op, file_id, error = %e, "internal error");
        }
        ApiError::Service(e) if status == StatusCode::SERVICE_UNAVAILABLE => {
            warn!(op, file_id, error = %e, "key store error");
        }
        ApiError::Service(e) => debug!(op, file_id, error = %e, "request rejected"),
        // the rejection text can quote the body, so only the status is logged
        ApiError::MalformedBody(_) => debug!(op, file_id, %status, "malformed request body"),
    }
    Err(err)
}

/// HTTP face of [`ShareCryptError`]. Bodies are fixed strings so key
/// material from the request can never be echoed back.
#[derive(Debug)]
pub enum ApiError {
    Service(ShareCryptError),
    /// The JSON extractor refused the body; carries its status (400, 415 or 422)
    MalformedBody(StatusCode),
}

impl From<ShareCryptError> for ApiError {
    fn from(err: ShareCryptError) -> Self {
        Self::Service(err)
    }
}

impl ApiError {
    /// - Malformed input (bad base64, wrong key length, bad file id): 400
    /// - No wrapped key stored: 404
    /// - File id already has a key: 409
    /// - Key store unreachable: 503
    /// - Envelope and everything else: 500
    pub fn status_code(&self) -> StatusCode {
        let err = match self {
            Self::MalformedBody(status) => return *status,
            Self::Service(err) => err,
        };
        match err {
            ShareCryptError::Crypto(CryptoError::Decode(_) | CryptoError::MissingMetadata(_))
            | ShareCryptError::InvalidFileId(_) => StatusCode::BAD_REQUEST,
            ShareCryptError::MissingWrappedKey(_) => StatusCode::NOT_FOUND,
            ShareCryptError::FileIdExists(_) => StatusCode::CONFLICT,
            ShareCryptError::KeyStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn outcome(&self) -> &'static str {
        if let Self::MalformedBody(_) = self {
            return "bad_request";
        }
        match self.status_code() {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::CONFLICT => "conflict",
            StatusCode::SERVICE_UNAVAILABLE => "store_unavailable",
            _ => "error",
        }
    }

    fn message(&self) -> &'static str {
        let err = match self {
            Self::MalformedBody(_) => return "malformed request body",
            Self::Service(err) => err,
        };
        match err {
            ShareCryptError::Crypto(CryptoError::Decode(_)) => "malformed file key",
            ShareCryptError::Crypto(CryptoError::MissingMetadata(_)) => "missing field",
            ShareCryptError::Crypto(CryptoError::Wrap(_)) => "key wrap failed",
            ShareCryptError::Crypto(CryptoError::Unwrap(_)) => "key unwrap failed",
            ShareCryptError::InvalidFileId(_) => "invalid file id",
            ShareCryptError::MissingWrappedKey(_) => "no key stored for file",
            ShareCryptError::FileIdExists(_) => "file id already has a key",
            ShareCryptError::KeyStore(_) => "key store unavailable",
            _ => "internal error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use sharecrypt_crypto::{generate_file_key, MasterKey};
    use sharecrypt_vault::operator::memory_operator;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let mut registry = Registry::default();
        let metrics = EnvelopeMetrics::new(&mut registry);
        AppState {
            envelope: Arc::new(KeyEnvelope::new(MasterKey::from_bytes([42u8; 32]))),
            store: WrappedKeyStore::new(memory_operator().unwrap(), "test"),
            metrics,
            registry: Arc::new(registry),
        }
    }

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router(state.clone(), true).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    fn post_body(file_id: &str, body: impl Into<Body>) -> Request<Body> {
        Request::post(format!("/v1/keys/{file_id}"))
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn post_key(file_id: &str, file_key: &str) -> Request<Body> {
        let body = serde_json::json!({ "file_key": file_key }).to_string();
        post_body(file_id, body)
    }

    fn get_key(file_id: &str) -> Request<Body> {
        Request::get(format!("/v1/keys/{file_id}"))
            .body(Body::empty())
            .unwrap()
    }

    fn fresh_key() -> String {
        let exported = generate_file_key().unwrap().export_base64();
        exported.expose_secret().to_string()
    }

    #[tokio::test]
    async fn wrap_then_unwrap_returns_same_key() {
        let state = test_state();
        let file_key = fresh_key();

        let (status, body) = send(&state, post_key("doc-1", &file_key)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["file_id"], "doc-1");
        let wrapped = body["wrapped_key"].as_str().unwrap();
        assert_ne!(wrapped, file_key);
        assert_eq!(
            state.store.get("doc-1").await.unwrap(),
            Some(WrappedKey::new(wrapped))
        );

        let (status, body) = send(&state, get_key("doc-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["file_key"], file_key);

        assert_eq!(state.metrics.count("wrap", "ok"), 1);
        assert_eq!(state.metrics.count("unwrap", "ok"), 1);
    }

    #[tokio::test]
    async fn second_wrap_for_same_id_is_409() {
        let state = test_state();
        let first_key = fresh_key();

        let (status, _) = send(&state, post_key("doc-1", &first_key)).await;
        assert_eq!(status, StatusCode::CREATED);
        let stored = state.store.get("doc-1").await.unwrap();

        let (status, body) = send(&state, post_key("doc-1", &fresh_key())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "file id already has a key");
        assert_eq!(state.metrics.count("wrap", "conflict"), 1);
        assert_eq!(state.store.get("doc-1").await.unwrap(), stored);

        let (status, body) = send(&state, get_key("doc-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["file_key"], first_key);
    }

    #[tokio::test]
    async fn unwrap_missing_is_404() {
        let state = test_state();
        let (status, body) = send(&state, get_key("absent")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no key stored for file");
        assert_eq!(state.metrics.count("unwrap", "not_found"), 1);
    }

    #[tokio::test]
    async fn malformed_key_is_400_and_not_echoed() {
        let state = test_state();
        let bogus = "c2VjcmV0LWJ1dC10b28tc2hvcnQ=";
        let resp = router(state.clone(), true)
            .oneshot(post_key("doc", bogus))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains(bogus));
        assert!(state.store.get("doc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_json_body_is_counted() {
        let state = test_state();

        let (status, body) = send(&state, post_body("doc", "{not json")).await;
        assert!(status.is_client_error(), "got {status}");
        assert_eq!(body["error"], "malformed request body");

        let (status, _) = send(&state, post_body("doc", r#"{"key": "x"}"#)).await;
        assert!(status.is_client_error(), "got {status}");

        assert_eq!(state.metrics.count("wrap", "bad_request"), 2);
        assert!(state.store.get("doc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_file_id_is_400() {
        let state = test_state();
        let (status, _) = send(&state, post_key("with@sign", &fresh_key())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.metrics.count("wrap", "bad_request"), 1);
    }

    #[tokio::test]
    async fn corrupted_wrapped_key_is_500() {
        let state = test_state();
        state
            .store
            .put("broken", &WrappedKey::new("AAAA"))
            .await
            .unwrap();

        let (status, body) = send(&state, get_key("broken")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "key unwrap failed");
        assert_eq!(state.metrics.count("unwrap", "error"), 1);
    }

    #[tokio::test]
    async fn delete_then_get_is_404() {
        let state = test_state();
        send(&state, post_key("gone", &fresh_key())).await;

        let req = Request::delete("/v1/keys/gone")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&state, get_key("gone")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_and_metrics_endpoints() {
        let state = test_state();
        state.metrics.record("wrap", "ok");

        let req = Request::get("/healthz").body(Body::empty()).unwrap();
        let resp = router(state.clone(), true).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::get("/readyz").body(Body::empty()).unwrap();
        let resp = router(state.clone(), true).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::get("/metrics").body(Body::empty()).unwrap();
        let resp = router(state.clone(), true).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let text = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let text = String::from_utf8_lossy(&text);
        assert!(text.contains("sharecrypt_envelope_ops_total"), "{text}");

        let req = Request::get("/metrics").body(Body::empty()).unwrap();
        let resp = router(state, false).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (
                ShareCryptError::Crypto(CryptoError::Decode("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ShareCryptError::InvalidFileId("..".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ShareCryptError::MissingWrappedKey("f".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                ShareCryptError::FileIdExists("f".into()),
                StatusCode::CONFLICT,
            ),
            (
                ShareCryptError::Crypto(CryptoError::Wrap("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ShareCryptError::Crypto(CryptoError::Unwrap("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ShareCryptError::KeyStore("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }

        let rejected = ApiError::MalformedBody(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejected.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejected.outcome(), "bad_request");
    }
}
