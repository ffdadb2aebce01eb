use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Boundary validation for request bodies.
///
/// Returns every rejected field at once so the client can show all messages.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

// -------- REQUEST DTOs --------
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String, // Plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let email = self.email.trim();
        if email.is_empty() {
            errors.push(FieldError::new("email", "Email is required"));
        } else if !looks_like_email(email) {
            errors.push(FieldError::new("email", "Email format is invalid"));
        }

        if self.password.is_empty() {
            errors.push(FieldError::new("password", "Password is required"));
        }

        if let Some(device_id) = &self.device_id {
            validate_device_id(device_id, &mut errors);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    /// Falls back to the `refresh_token` cookie when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Validate for RefreshTokenRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(device_id) = &self.device_id {
            validate_device_id(device_id, &mut errors);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub logout_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Validate for LogoutRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Ok(())
    }
}

const MAX_DEVICE_ID_LEN: usize = 255;

fn validate_device_id(device_id: &str, errors: &mut Vec<FieldError>) {
    if device_id.trim().is_empty() {
        errors.push(FieldError::new("deviceId", "Device id must not be blank"));
    } else if device_id.len() > MAX_DEVICE_ID_LEN {
        errors.push(FieldError::new(
            "deviceId",
            format!("Device id must be at most {MAX_DEVICE_ID_LEN} characters"),
        ));
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
