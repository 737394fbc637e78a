use thiserror::Error;
use ulid::Ulid;

use crate::model::RoomId;

/// Error categories callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Capacity,
    Persistence,
    Unauthorized,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Unauthorized => "unauthorized",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("hotel not found: {0}")]
    HotelNotFound(String),
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("room {0} is already reserved")]
    AlreadyReserved(RoomId),
    #[error("room {0} is already vacant")]
    AlreadyVacant(RoomId),
    #[error("hotel name already taken: {0}")]
    NameTaken(String),
    #[error("capacity exceeded: {requested} rooms requested, at most {max} allowed")]
    CapacityExceeded { requested: u64, max: u32 },
    #[error("operation not allowed: {0}")]
    OperationNotAllowed(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("hotel {0} is busy, try again")]
    Busy(Ulid),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::HotelNotFound(_) | EngineError::RoomNotFound(_) => ErrorKind::NotFound,
            EngineError::AlreadyReserved(_)
            | EngineError::AlreadyVacant(_)
            | EngineError::NameTaken(_) => ErrorKind::Conflict,
            EngineError::CapacityExceeded { .. }
            | EngineError::OperationNotAllowed(_)
            | EngineError::LimitExceeded(_) => ErrorKind::Capacity,
            EngineError::Unauthorized => ErrorKind::Unauthorized,
            EngineError::Busy(_) | EngineError::WalError(_) => ErrorKind::Persistence,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }

    /// Message safe to show an end user. Persistence detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Persistence => "temporary storage failure, please retry".to_string(),
            _ => self.to_string(),
        }
    }
}
