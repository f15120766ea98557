//! HTTP surface for the reply API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ApiError, ReplyRequest, ResponseService};

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(service: Arc<ResponseService>) -> Router {
    Router::new()
        .route("/predict-retrieval", post(predict_retrieval))
        .route("/predict-generative", post(predict_generative))
        .route("/health", get(health))
        .with_state(service)
}

async fn predict_retrieval(
    State(service): State<Arc<ResponseService>>,
    Json(request): Json<ReplyRequest>,
) -> Response {
    match service.predict_retrieval(&request.text) {
        Ok(reply) => {
            info!("Retrieval: {} → {}", preview(&request.text), reply.sentiment);
            Json(reply).into_response()
        }
        Err(e) => {
            warn!("Retrieval request failed: {e}");
            e.into_response()
        }
    }
}

async fn predict_generative(
    State(service): State<Arc<ResponseService>>,
    Json(request): Json<ReplyRequest>,
) -> Response {
    match service.predict_generative(&request.text).await {
        Ok(reply) => {
            info!("Generative: {}", preview(&request.text));
            Json(reply).into_response()
        }
        Err(e) => {
            warn!("Generative request failed: {e}");
            e.into_response()
        }
    }
}

async fn health(State(service): State<Arc<ResponseService>>) -> Json<serde_json::Value> {
    Json(json!({
        "retrieval": service.retrieval_loaded(),
        "generative": service.generative_loaded(),
    }))
}

fn preview(text: &str) -> String {
    let short: String = text.chars().take(80).collect();
    format!("{short:?}")
}

/// Bind and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, service: Arc<ResponseService>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 Reply API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ReplyTemplates;
    use crate::sentiment::{Classifier, Sentiment};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct AlwaysPositive;

    impl Classifier for AlwaysPositive {
        fn predict(&self, _cleaned: &str) -> Sentiment {
            Sentiment::Positive
        }
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_predict_retrieval_ok() {
        let service = ResponseService::new(Some(Arc::new(AlwaysPositive)), None, ReplyTemplates::default());
        let app = router(Arc::new(service));

        let response = app
            .oneshot(post_json("/predict-retrieval", r#"{"text":"love it"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["sentiment"], "Positive");
        assert_eq!(body["reply"], ReplyTemplates::default().positive);
    }

    #[tokio::test]
    async fn test_predict_retrieval_not_loaded() {
        let app = router(Arc::new(ResponseService::new(None, None, ReplyTemplates::default())));

        let response = app
            .oneshot(post_json("/predict-retrieval", r#"{"text":"love it"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Retrieval model is not loaded.");
    }

    #[tokio::test]
    async fn test_predict_generative_not_loaded() {
        let app = router(Arc::new(ResponseService::new(None, None, ReplyTemplates::default())));

        let response = app
            .oneshot(post_json("/predict-generative", r#"{"text":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"], "Generative model is not loaded.");
    }

    #[tokio::test]
    async fn test_missing_text_rejected() {
        let service = ResponseService::new(Some(Arc::new(AlwaysPositive)), None, ReplyTemplates::default());
        let app = router(Arc::new(service));

        let response = app
            .oneshot(post_json("/predict-retrieval", r#"{"message":"wrong field"}"#))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_health_reports_loaded_models() {
        let service = ResponseService::new(Some(Arc::new(AlwaysPositive)), None, ReplyTemplates::default());
        let app = router(Arc::new(service));

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["retrieval"], true);
        assert_eq!(body["generative"], false);
    }
}
