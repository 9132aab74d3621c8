use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use event_schema::SchemaError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatisticsError>;

#[derive(Debug, Error)]
pub enum StatisticsError {
    /// Channel unreachable or publish rejected
    #[error("Channel error: {0}")]
    Channel(String),

    /// The channel handle was closed; readers stop on this
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Malformed event: {0}")]
    Malformed(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Post lookup failed: {0}")]
    OwnerLookup(String),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<clickhouse::error::Error> for StatisticsError {
    fn from(err: clickhouse::error::Error) -> Self {
        StatisticsError::Storage(err.to_string())
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for StatisticsError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        StatisticsError::Channel(err.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for StatisticsError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let message = match self {
            StatisticsError::Validation(msg) => msg.clone(),
            StatisticsError::Malformed(SchemaError::UnknownKind(kind)) => {
                format!("Unknown sort type: {}", kind)
            }
            _ => self.to_string(),
        };

        HttpResponse::build(code).json(ErrorResponse {
            error: message,
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            StatisticsError::Validation(_)
            | StatisticsError::Malformed(_)
            | StatisticsError::PostNotFound(_) => StatusCode::BAD_REQUEST,
            StatisticsError::OwnerLookup(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            StatisticsError::Validation("limit".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StatisticsError::Storage("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StatisticsError::PostNotFound("999".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StatisticsError::OwnerLookup("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            StatisticsError::ChannelClosed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
