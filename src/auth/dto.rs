use serde::{Deserialize, Serialize};

use crate::validation::{is_valid_email, PayloadErrors, INVALID, MIN_LENGTH};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), PayloadErrors> {
        let mut errs = PayloadErrors::default();
        if errs.require("email", &self.email) && !is_valid_email(self.email.trim()) {
            errs.add("email", INVALID);
        }
        if errs.require("password", &self.password) && self.password.chars().count() < MIN_PASSWORD_LEN {
            errs.add("password", MIN_LENGTH);
        }
        errs.require("name", &self.name);
        errs.into_result()
    }
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), PayloadErrors> {
        let mut errs = PayloadErrors::default();
        errs.require("email", &self.email);
        errs.require("password", &self.password);
        errs.into_result()
    }
}

/// Partial profile update; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), PayloadErrors> {
        let mut errs = PayloadErrors::default();
        if let Some(email) = &self.email {
            if errs.require("email", email) && !is_valid_email(email.trim()) {
                errs.add("email", INVALID);
            }
        }
        if let Some(name) = &self.name {
            errs.require("name", name);
        }
        errs.into_result()
    }
}

/// Returned by registration and login. The only place a token key leaves
/// the server.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: String,
    pub auth_token: String,
}
