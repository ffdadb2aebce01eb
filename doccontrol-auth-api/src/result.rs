use serde::{Deserialize, Serialize};

/// HTTP status codes the auth API can answer with.
/// Kept free of any HTTP crate so the type compiles for WASM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    NoContent = 204,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    TooManyRequests = 429,
    InternalServerError = 500,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.as_u16())
    }
}

/// Generic API response wrapper: a status plus an optional payload.
///
/// The backend wraps this in a type that implements Axum's `IntoResponse`.
///
/// ```rust
/// use doccontrol_auth_api::{AppResponse, StatusCode};
///
/// let response = AppResponse::ok("data");
/// assert_eq!(response.status, StatusCode::Ok);
///
/// let empty: AppResponse<()> = AppResponse::no_content();
/// assert!(empty.data.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub status: StatusCode,
}

impl<T> AppResponse<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        Self {
            status,
            data: Some(data),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self { status, data: None }
    }

    /// 200 OK with data
    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::Ok, data)
    }

    /// 201 Created with data
    pub fn created(data: T) -> Self {
        Self::new(StatusCode::Created, data)
    }
}

impl AppResponse<()> {
    /// 204 No Content
    pub fn no_content() -> Self {
        Self::empty(StatusCode::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_keep_their_numeric_value() {
        assert_eq!(StatusCode::TooManyRequests.as_u16(), 429);
        assert_eq!(StatusCode::Forbidden.as_u16(), 403);
        assert!(StatusCode::NoContent.is_success());
        assert!(!StatusCode::Unauthorized.is_success());
    }

    #[test]
    fn empty_response_skips_data_field() {
        let response: AppResponse<()> = AppResponse::no_content();
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("data"));
    }
}
