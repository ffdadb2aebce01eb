//! # doccontrol-auth-api
//!
//! Shared API types for the document-control authentication service.
//! This crate stays WASM-compatible so the front end can reuse the exact
//! request/response shapes and the role enumeration.
//!
//! ## Features
//!
//! - Request DTOs (`LoginRequest`, `RefreshTokenRequest`, `LogoutRequest`)
//! - Response DTOs (`LoginResponse`, `RefreshTokenResponse`, `CleanupResponse`, ...)
//! - Roles (`Role`) with an explicit privilege level
//! - Error response format (`ErrorResponse`, `FieldError`)
//! - Generic response wrapper (`AppResponse`)
//!
//! ## Example
//!
//! ```rust
//! use doccontrol_auth_api::{LoginRequest, Validate};
//!
//! let request = LoginRequest {
//!     email: "controller@example.com".to_string(),
//!     password: "Secret123!".to_string(),
//!     device_id: None,
//! };
//! assert!(request.validate().is_ok());
//! ```

pub mod error;
pub mod requests;
pub mod responses;
pub mod result;
pub mod role;

pub use error::{ErrorResponse, FieldError};
pub use requests::*;
pub use responses::*;
pub use result::{AppResponse, StatusCode};
pub use role::{ParseRoleError, Role};
