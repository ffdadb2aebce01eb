//! Request body extractors that validate at the boundary.

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Request},
};
use doccontrol_auth_api::Validate;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body that must be present, parse, and pass [`Validate`].
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate().map_err(AppError::ValidationError)?;
        Ok(Self(value))
    }
}

/// Like [`ValidatedJson`], but an empty body yields `T::default()`.
///
/// Used where every field is optional and clients commonly send nothing,
/// e.g. a cookie-only refresh. A non-empty body is parsed regardless of
/// `Content-Type`.
#[derive(Debug)]
pub struct JsonOrDefault<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrDefault<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Default,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::invalid_input(e.body_text()))?;

        let value = if body.iter().all(u8::is_ascii_whitespace) {
            T::default()
        } else {
            serde_json::from_slice::<T>(&body)?
        };
        value.validate().map_err(AppError::ValidationError)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, header};
    use doccontrol_auth_api::{LoginRequest, LogoutRequest};

    use super::*;

    fn json_request(body: &str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn invalid_fields_become_validation_error() {
        let req = json_request(r#"{"email":"","password":""}"#);
        let err = ValidatedJson::<LoginRequest>::from_request(req, &()).await.unwrap_err();

        match err {
            AppError::ValidationError(fields) => assert_eq!(fields.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_input() {
        let req = json_request("{not json");
        let err = ValidatedJson::<LoginRequest>::from_request(req, &()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn empty_body_falls_back_to_default() {
        let req = HttpRequest::builder().method("POST").body(Body::empty()).unwrap();
        let JsonOrDefault(request) = JsonOrDefault::<LogoutRequest>::from_request(req, &())
            .await
            .unwrap();
        assert!(!request.logout_all);
    }

    #[tokio::test]
    async fn non_empty_body_is_parsed_without_content_type() {
        let req = HttpRequest::builder()
            .method("POST")
            .body(Body::from(r#"{"logoutAll":true}"#))
            .unwrap();
        let JsonOrDefault(request) = JsonOrDefault::<LogoutRequest>::from_request(req, &())
            .await
            .unwrap();
        assert!(request.logout_all);
    }
}
