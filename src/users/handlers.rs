use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        jwt::{AuthUser, MaybeAuthUser},
        repo::User,
    },
    error::ApiError,
    posts,
    state::AppState,
    storage::{file_field, remove_best_effort, save_upload, text_field, MediaKind},
    users::{
        dto::{FollowRequest, FollowResponse, ProfileResponse, ProfileUpdateForm},
        repo::{self, ProfileChanges},
    },
};

// --- public routers ---

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:username", get(view_profile))
        .route("/follows", post(toggle_follow))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me/profile", put(update_profile))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn view_profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_username(&state.db, &username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let stats = repo::follow_stats(&state.db, viewer, user.id).await?;
    let posts = posts::repo::list_by_author(&state.db, viewer, user.id).await?;

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
        fullname: user.fullname,
        bio: user.bio,
        profile_pic: user.profile_pic,
        cover_photo: user.cover_photo,
        created_at: user.created_at,
        follower_count: stats.follower_count,
        following_count: stats.following_count,
        is_following: stats.is_following,
        posts,
    }))
}

#[instrument(skip(state, payload))]
pub async fn toggle_follow(
    State(state): State<AppState>,
    AuthUser(follower_id): AuthUser,
    Json(payload): Json<FollowRequest>,
) -> Result<Json<FollowResponse>, ApiError> {
    // Rejected up front, before any store access.
    if payload.user_id == follower_id {
        return Err(ApiError::SelfFollow);
    }
    if User::find_by_id(&state.db, payload.user_id).await?.is_none() {
        return Err(ApiError::NotFound("user"));
    }

    let following = repo::toggle_follow(&state.db, follower_id, payload.user_id).await?;
    info!(%follower_id, followee_id = %payload.user_id, following, "follow toggled");
    Ok(Json(FollowResponse { following }))
}

#[instrument(skip(state, multipart))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<Json<User>, ApiError> {
    let mut form = collect_profile_form(multipart).await?;
    form.normalize_and_validate()?;

    // New files hit the disk before the record points at them.
    let profile_pic = save_upload(&*state.media, MediaKind::ProfilePicture, form.profile_pic).await?;
    let cover_photo =
        match save_upload(&*state.media, MediaKind::CoverPhoto, form.cover_photo).await {
            Ok(name) => name,
            Err(e) => {
                discard(&state, MediaKind::ProfilePicture, profile_pic.as_deref()).await;
                return Err(e);
            }
        };

    let changes = ProfileChanges {
        fullname: form.fullname.as_deref(),
        bio: form.bio.as_deref(),
        profile_pic: profile_pic.as_deref(),
        cover_photo: cover_photo.as_deref(),
    };
    let user = match repo::update_profile(&state.db, user_id, changes).await {
        Ok(user) => user,
        Err(e) => {
            discard(&state, MediaKind::ProfilePicture, profile_pic.as_deref()).await;
            discard(&state, MediaKind::CoverPhoto, cover_photo.as_deref()).await;
            return Err(e);
        }
    };

    info!(%user_id, "profile updated");
    Ok(Json(user))
}

// --- helpers ---

async fn discard(state: &AppState, kind: MediaKind, stored_name: Option<&str>) {
    if let Some(name) = stored_name {
        remove_best_effort(&*state.media, kind, name).await;
    }
}

async fn collect_profile_form(mut multipart: Multipart) -> Result<ProfileUpdateForm, ApiError> {
    let mut form = ProfileUpdateForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("malformed multipart body".into()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("fullname") => form.fullname = Some(text_field(field).await?),
            Some("bio") => form.bio = Some(text_field(field).await?),
            Some("profile_pic") => form.profile_pic = file_field(field).await?,
            Some("cover_photo") => form.cover_photo = file_field(field).await?,
            _ => {}
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn follow_of_self_is_rejected_before_any_query() {
        // Fires on the id comparison alone; the fake state's pool points
        // nowhere, so reaching the store would fail the test instead.
        let actor = Uuid::new_v4();

        let result = toggle_follow(
            State(AppState::fake()),
            AuthUser(actor),
            Json(FollowRequest { user_id: actor }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::SelfFollow)));
    }
}
