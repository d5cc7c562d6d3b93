//! Unified middleware components for Trellis Actix services
//!
//! ## Modules
//! - `jwt`: RS256 token validation backed by the identity service's public key
//! - `jwt_auth`: request middleware extracting the authenticated principal
//! - `request_id`: X-Request-ID propagation
//! - `logging`: request/response tracing

pub mod jwt;
pub mod jwt_auth;
pub mod logging;
pub mod request_id;

pub use jwt::{validate_token, Claims};
pub use jwt_auth::{JwtAuthMiddleware, UserId};
pub use logging::Logging;
pub use request_id::RequestId;
