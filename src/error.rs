use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::io;

use crate::logging::record::INTERNAL_ERROR_MESSAGE;
use crate::logging::{normalize, ApiException, ErrorRecord, Failure, RuntimeKind};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiException),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<&AppError> for Failure {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::Api(exception) => Failure::Api(exception.clone()),
            AppError::Io(e) => Failure::Runtime {
                kind: RuntimeKind::Error,
                message: e.to_string(),
                stack: None,
                trace_id: None,
            },
            AppError::Internal(message) => Failure::error(message.clone()),
        }
    }
}

impl AppError {
    /// Normalized record for this error, as logged by the access log.
    pub fn to_record(&self) -> ErrorRecord {
        normalize(&Failure::from(self))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let record = self.to_record();

        let status = StatusCode::from_u16(record.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Only application errors carry a message meant for clients
        let body = match &self {
            AppError::Api(_) => record.response_body(),
            _ => serde_json::json!({
                "statusCode": status.as_u16(),
                "message": INTERNAL_ERROR_MESSAGE,
            }),
        };

        let mut response = (status, Json(body)).into_response();
        // Picked up by the request logging middleware
        response.extensions_mut().insert(record);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_api_error_defaults_to_500() {
        let response = AppError::from(ApiException::new("Error")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorRecord>().is_some());
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "statusCode": 500, "message": "Error" })
        );
    }

    #[tokio::test]
    async fn test_api_error_uses_declared_status() {
        let response =
            AppError::from(ApiException::new("Service draining").with_status(503)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["message"], "Service draining");
    }

    #[tokio::test]
    async fn test_body_status_matches_sent_status_for_invalid_declared_code() {
        let response = AppError::from(ApiException::new("x").with_status(0)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "statusCode": 500, "message": "x" })
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = AppError::Internal("db password rejected".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let record = response.extensions().get::<ErrorRecord>().cloned().unwrap();
        assert_eq!(record.message, "db password rejected");

        let body = body_json(response).await;
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_io_error_is_generic() {
        let error = AppError::from(io::Error::new(io::ErrorKind::Other, "disk gone"));
        let record = error.to_record();
        assert_eq!(record.status_code, 500);
        assert_eq!(record.kind, crate::logging::ErrorKind::Generic);
    }
}
