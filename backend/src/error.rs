use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use shared::ErrorResponse;

use crate::storage::local_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No file uploaded")]
    NoFileUploaded,
    #[error("No objects detected in the image")]
    NoObjectsDetected,
    #[error("File too large")]
    FileTooLarge,
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    #[error("Storage error: {0}")]
    Storage(StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FileTooLarge => PipelineError::FileTooLarge,
            // A part without a usable filename is treated like no file at all.
            StoreError::InvalidFilename => PipelineError::NoFileUploaded,
            other => PipelineError::Storage(other),
        }
    }
}

impl From<actix_web::error::BlockingError> for PipelineError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::NoFileUploaded
            | PipelineError::NoObjectsDetected
            | PipelineError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            PipelineError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::Storage(_) | PipelineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("Upload failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(ErrorResponse::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: PipelineError) -> (StatusCode, ErrorResponse) {
        let response = err.error_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn client_errors_carry_their_message() {
        let (status, body) = body_of(PipelineError::NoFileUploaded).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "No file uploaded");

        let (status, body) = body_of(PipelineError::NoObjectsDetected).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "No objects detected in the image");

        let (status, body) = body_of(PipelineError::FileTooLarge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body.error, "File too large");
    }

    #[actix_web::test]
    async fn storage_errors_are_generic_500s() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let (status, body) = body_of(StoreError::Io(io).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn store_errors_map_onto_pipeline_errors() {
        assert!(matches!(
            PipelineError::from(StoreError::FileTooLarge),
            PipelineError::FileTooLarge
        ));
        assert!(matches!(
            PipelineError::from(StoreError::InvalidFilename),
            PipelineError::NoFileUploaded
        ));
    }
}
