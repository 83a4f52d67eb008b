//! Closed error taxonomy.
//!
//! Every failure mode the orchestration core distinguishes is one variant
//! here. `error_code` and `http_status` are total functions over the
//! enumeration, so adding a variant forces both mappings to be updated at
//! the match site rather than at scattered call sites.

use thiserror::Error;

pub type TaskforgeResult<T> = Result<T, TaskforgeError>;

#[derive(Debug, Error)]
pub enum TaskforgeError {
    // --- E100xxxx: generic -------------------------------------------------
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    // --- E200xxxx: auth ------------------------------------------------------
    #[error("missing bearer token")]
    MissingBearerToken,
    #[error("unknown api key")]
    UnknownApiKey,
    #[error("invalid internal callback secret")]
    InvalidInternalSecret,

    // --- E300xxxx: task ------------------------------------------------------
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },
    #[error("task already terminal: {task_id}")]
    TaskAlreadyTerminal { task_id: String },
    #[error("max retries exceeded for task {task_id}")]
    MaxRetriesExceeded { task_id: String },

    // --- E400xxxx: inference ---------------------------------------------
    #[error("no worker supports task type: {task_type}")]
    UnsupportedTaskType { task_type: String },
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    // --- E500xxxx: storage ---------------------------------------------------
    #[error("object store unavailable: {0}")]
    ObjectStoreUnavailable(String),
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    // --- E600xxxx: queue -------------------------------------------------------
    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),
    #[error("publish failed: {0}")]
    PublishFailed(String),

    // --- E700xxxx: registry --------------------------------------------------
    #[error("service registry unavailable: {0}")]
    RegistryUnavailable(String),
    #[error("no capable worker available for task type: {task_type}")]
    NoCapableWorker { task_type: String },

    // --- E800xxxx: log (never surfaced to a caller) --------------------------
    #[error("log publish failed: {0}")]
    LogPublishFailed(String),

    // --- E900xxxx: system ------------------------------------------------------
    #[error("internal error: {0}")]
    Internal(String),
    #[error("operation timed out: {0}")]
    Timeout(String),

    // --- transport conversions -------------------------------------------------
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskforgeError {
    /// The closed `EXXXYYYY` error code for this variant.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "E1000001",
            Self::SerializationFailed(_) => "E1000002",

            Self::MissingBearerToken => "E2000001",
            Self::UnknownApiKey => "E2000002",
            Self::InvalidInternalSecret => "E2000003",

            Self::TaskNotFound { .. } => "E3000001",
            Self::TaskAlreadyTerminal { .. } => "E3000002",
            Self::MaxRetriesExceeded { .. } => "E3000003",

            Self::UnsupportedTaskType { .. } => "E4000001",
            Self::InferenceFailed(_) => "E4000002",

            Self::ObjectStoreUnavailable(_) => "E5000001",
            Self::ObjectNotFound { .. } => "E5000002",

            Self::QueueUnavailable(_) => "E6000001",
            Self::PublishFailed(_) => "E6000002",

            Self::RegistryUnavailable(_) => "E7000001",
            Self::NoCapableWorker { .. } => "E7000002",

            Self::LogPublishFailed(_) => "E8000001",

            Self::Internal(_) => "E9000001",
            Self::Timeout(_) => "E9000002",

            // Transport errors surface as transient infrastructure failures.
            Self::Http(_) => "E9000003",
            Self::Redis(_) => "E5000003",
            Self::Amqp(_) => "E6000003",
            Self::Io(_) => "E9000004",
        }
    }

    /// The HTTP status this error maps to, per §6/§7 of the spec.
    pub fn http_status(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Self::InvalidPayload(_) | Self::SerializationFailed(_) => StatusCode::BAD_REQUEST,

            Self::MissingBearerToken | Self::InvalidInternalSecret => StatusCode::UNAUTHORIZED,
            Self::UnknownApiKey => StatusCode::FORBIDDEN,

            Self::TaskNotFound { .. } => StatusCode::NOT_FOUND,
            Self::TaskAlreadyTerminal { .. } => StatusCode::CONFLICT,
            Self::MaxRetriesExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            Self::UnsupportedTaskType { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InferenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,

            Self::ObjectStoreUnavailable(_)
            | Self::QueueUnavailable(_)
            | Self::PublishFailed(_)
            | Self::RegistryUnavailable(_)
            | Self::Redis(_)
            | Self::Amqp(_)
            | Self::Http(_) => StatusCode::SERVICE_UNAVAILABLE,

            Self::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            Self::NoCapableWorker { .. } => StatusCode::SERVICE_UNAVAILABLE,

            Self::LogPublishFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether retrying the same operation is worth attempting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ObjectStoreUnavailable(_)
                | Self::QueueUnavailable(_)
                | Self::PublishFailed(_)
                | Self::RegistryUnavailable(_)
                | Self::Redis(_)
                | Self::Amqp(_)
                | Self::Timeout(_)
        ) || matches!(self, Self::Http(e) if e.is_timeout() || e.is_connect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_is_stable_per_variant() {
        let err = TaskforgeError::TaskNotFound {
            task_id: "abc".into(),
        };
        assert_eq!(err.error_code(), "E3000001");
    }

    #[test]
    fn http_status_matches_taxonomy() {
        assert_eq!(
            TaskforgeError::MissingBearerToken.http_status(),
            http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            TaskforgeError::TaskNotFound {
                task_id: "x".into()
            }
            .http_status(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(
            TaskforgeError::NoCapableWorker {
                task_type: "x".into()
            }
            .http_status(),
            http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn transient_errors_are_recoverable() {
        assert!(TaskforgeError::QueueUnavailable("down".into()).is_recoverable());
        assert!(!TaskforgeError::MissingBearerToken.is_recoverable());
    }
}
