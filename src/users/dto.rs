use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::posts::repo::PostView;

/// Public profile page payload. Email and phone number stay private to
/// the owner's own `/me` view.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub fullname: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub cover_photo: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_following: bool,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub following: bool,
}

/// Fields collected from the `multipart/form-data` body of a profile
/// edit, before validation. Absent fields leave the stored value alone.
#[derive(Debug, Default)]
pub struct ProfileUpdateForm {
    pub fullname: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<crate::storage::FileUpload>,
    pub cover_photo: Option<crate::storage::FileUpload>,
}

impl ProfileUpdateForm {
    /// Trims the fullname in place. The edit form treats fullname as
    /// required, so a supplied value must survive the trim; a blank one
    /// is rejected instead of erasing the stored name. Bio may be
    /// cleared.
    pub fn normalize_and_validate(&mut self) -> Result<(), ApiError> {
        if let Some(fullname) = self.fullname.as_mut() {
            *fullname = fullname.trim().to_string();
            if fullname.is_empty() {
                return Err(ApiError::Validation("fullname must not be empty".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fullname_is_rejected() {
        let mut form = ProfileUpdateForm {
            fullname: Some("   ".into()),
            ..ProfileUpdateForm::default()
        };
        assert!(matches!(
            form.normalize_and_validate(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn absent_fullname_passes_untouched() {
        let mut form = ProfileUpdateForm::default();
        assert!(form.normalize_and_validate().is_ok());
        assert_eq!(form.fullname, None);
    }

    #[test]
    fn fullname_is_trimmed_in_place() {
        let mut form = ProfileUpdateForm {
            fullname: Some("  Maribel Ortega  ".into()),
            ..ProfileUpdateForm::default()
        };
        form.normalize_and_validate().unwrap();
        assert_eq!(form.fullname.as_deref(), Some("Maribel Ortega"));
    }
}
