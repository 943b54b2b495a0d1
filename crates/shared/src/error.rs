use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    UpstreamUnavailable,
    Misconfigured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Failures the dashboard reports back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    #[error("device {device_id} is not configured")]
    DeviceNotFound { device_id: DeviceId },
    #[error("invalid command type '{command}'")]
    InvalidCommand { command: String },
    #[error("tracking service unavailable: {reason}")]
    UpstreamUnavailable { reason: String },
    #[error("dashboard misconfigured: {reason}")]
    Misconfigured { reason: String },
}

impl DashboardError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DeviceNotFound { .. } => ErrorCode::NotFound,
            Self::InvalidCommand { .. } => ErrorCode::Validation,
            Self::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
            Self::Misconfigured { .. } => ErrorCode::Misconfigured,
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(value: DashboardError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}
