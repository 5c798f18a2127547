// Service error types
// Error hierarchy shared by the join engine, the local engine and the topology loader

use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Broad category of a [`ServiceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Disabled,
    SelfReference,
    SchedulingFailed,
    ActionFailed,
    InvalidInput,
    Io,
    Config,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job is disabled: {0}")]
    Disabled(String),

    #[error("Join points to itself: {0}")]
    SelfReference(String),

    #[error("Scheduling failed: {0}")]
    SchedulingFailed(String),

    #[error("Post-join action failed: {action}: {message}")]
    ActionFailed { action: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Disabled(_) => ErrorKind::Disabled,
            ServiceError::SelfReference(_) => ErrorKind::SelfReference,
            ServiceError::SchedulingFailed(_) => ErrorKind::SchedulingFailed,
            ServiceError::ActionFailed { .. } => ErrorKind::ActionFailed,
            ServiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            ServiceError::Io(_) => ErrorKind::Io,
            ServiceError::Yaml(_) => ErrorKind::Config,
        }
    }

    pub fn action_failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::ActionFailed {
            action: action.into(),
            message: message.into(),
        }
    }
}
