use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::error::ApiError;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?\d{10,15}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub(crate) fn is_valid_gender(gender: &str) -> bool {
    matches!(gender, "Male" | "Female")
}

/// Request body for user registration. Optional profile fields may be
/// filled in later through the profile edit.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub fullname: Option<String>,
    pub dob: Option<Date>,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
}

impl RegisterRequest {
    /// Normalizes and checks the input before it reaches the core: emails
    /// are trimmed and lowercased, usernames trimmed; everything else is
    /// rejected here so the store only ever sees well-formed shapes.
    pub fn normalize_and_validate(&mut self) -> Result<(), ApiError> {
        self.email = self.email.trim().to_lowercase();
        self.username = self.username.trim().to_string();

        if !(3..=100).contains(&self.username.chars().count()) {
            return Err(ApiError::Validation(
                "username must be between 3 and 100 characters".into(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("invalid email address".into()));
        }
        if self.password.chars().count() < 6 {
            return Err(ApiError::Validation(
                "password must be at least 6 characters".into(),
            ));
        }
        if let Some(phone) = self.phone_number.as_deref() {
            if !is_valid_phone(phone) {
                return Err(ApiError::Validation("invalid phone number".into()));
            }
        }
        if let Some(gender) = self.gender.as_deref() {
            if !is_valid_gender(gender) {
                return Err(ApiError::Validation("invalid gender".into()));
            }
        }
        Ok(())
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login, register or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned alongside tokens.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&crate::auth::repo::User> for PublicUser {
    fn from(user: &crate::auth::repo::User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "maribel".into(),
            email: "Maribel@Example.COM ".into(),
            password: "hunter42".into(),
            fullname: Some("Maribel Ortega".into()),
            dob: None,
            gender: Some("Female".into()),
            phone_number: Some("+4915112345678".into()),
        }
    }

    #[test]
    fn normalizes_email_to_lowercase() {
        let mut req = request();
        req.normalize_and_validate().unwrap();
        assert_eq!(req.email, "maribel@example.com");
    }

    #[test]
    fn rejects_short_username() {
        let mut req = request();
        req.username = "ab".into();
        assert!(matches!(
            req.normalize_and_validate(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_email() {
        let mut req = request();
        req.email = "not-an-email".into();
        assert!(matches!(
            req.normalize_and_validate(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn rejects_short_password() {
        let mut req = request();
        req.password = "12345".into();
        assert!(matches!(
            req.normalize_and_validate(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn rejects_bad_phone_number() {
        let mut req = request();
        req.phone_number = Some("call me".into());
        assert!(matches!(
            req.normalize_and_validate(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn phone_number_is_optional() {
        let mut req = request();
        req.phone_number = None;
        assert!(req.normalize_and_validate().is_ok());
    }

    #[test]
    fn rejects_unknown_gender_choice() {
        let mut req = request();
        req.gender = Some("robot".into());
        assert!(matches!(
            req.normalize_and_validate(),
            Err(ApiError::Validation(_))
        ));
    }
}
