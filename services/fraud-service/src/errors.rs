use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use fraud_engine::Error as EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Engine(EngineError::AlertNotFound(_)) => "NOT_FOUND",
            ApiError::Engine(EngineError::InvalidTransition(_)) => "INVALID_TRANSITION",
            ApiError::Engine(EngineError::Storage(_)) => "DATABASE_ERROR",
            ApiError::Engine(_) | ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Engine(EngineError::AlertNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Engine(EngineError::InvalidTransition(_)) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string()
        }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_not_found_mapping() {
        let err = ApiError::from(EngineError::AlertNotFound(Uuid::new_v4()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "Fraud alert not found");
    }

    #[test]
    fn test_transition_conflict() {
        let err = ApiError::from(EngineError::InvalidTransition("already RESOLVED".into()));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_is_server_error() {
        let err = ApiError::from(EngineError::Storage("connection reset".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
