use serde::Serialize;

use crate::time::{get_current_time_in_millis, TimestampMillis};

/// Envelope carried by every REST response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: TimestampMillis,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: get_current_time_in_millis(),
        }
    }

    pub fn err<S: Into<String>>(message: S) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
            timestamp: get_current_time_in_millis(),
        }
    }
}
