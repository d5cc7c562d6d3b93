//! Shared wire representation for service errors.
//!
//! Every HTTP error surfaced by a Trellis service carries the same JSON body:
//! `{"error": "<human-readable message>"}`. Keeping the shape in one crate
//! stops handlers from inventing ad-hoc error payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl<E: std::fmt::Display> From<&E> for ErrorResponse {
    fn from(err: &E) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_error_field_only() {
        let body = ErrorResponse::new("conversation not found");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "conversation not found"}));
    }

    #[test]
    fn builds_from_display_types() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let body: ErrorResponse = (&err).into();
        assert_eq!(body.error, "boom");
    }
}
