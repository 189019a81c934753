use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::jwt::{AuthUser, MaybeAuthUser},
    error::ApiError,
    posts::{
        dto::{CommentRequest, CreatePostForm, LikeResponse, ListPostsParams, PostDetailResponse},
        repo::{self, CommentView, PostCategory, PostView},
    },
    state::AppState,
    storage::{file_field, remove_best_effort, save_upload, text_field, MediaKind},
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:id", get(get_post))
        .route("/posts/:id/comments", get(list_comments))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/:id", delete(delete_post))
        .route("/posts/:id/comments", post(add_comment))
        .route("/posts/:id/like", post(toggle_like))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB, room for video
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(params): Query<ListPostsParams>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let category = params
        .category
        .as_deref()
        .map(str::parse::<PostCategory>)
        .transpose()?;
    let posts = repo::list(&state.db, viewer, category).await?;
    Ok(Json(posts))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let post = repo::find_view(&state.db, viewer, id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    let comments = repo::list_comments(&state.db, id).await?;
    Ok(Json(PostDetailResponse { post, comments }))
}

#[instrument(skip(state, multipart))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<PostView>), ApiError> {
    let form = collect_post_form(multipart).await?;

    let title = required_text(form.title.as_deref(), "title")?;
    let content = required_text(form.content.as_deref(), "content")?;
    let category: PostCategory = form
        .category
        .as_deref()
        .ok_or_else(|| ApiError::Validation("category is required".into()))?
        .parse()?;

    // Files land on disk before the row references them.
    let image = save_upload(&*state.media, MediaKind::PostImage, form.image).await?;
    let video = match save_upload(&*state.media, MediaKind::PostVideo, form.video).await {
        Ok(name) => name,
        Err(e) => {
            discard(&state, MediaKind::PostImage, image.as_deref()).await;
            return Err(e);
        }
    };

    let post = match repo::insert(
        &state.db,
        repo::NewPost {
            user_id,
            title,
            content,
            category,
            image: image.as_deref(),
            video: video.as_deref(),
        },
    )
    .await
    {
        Ok(post) => post,
        Err(e) => {
            discard(&state, MediaKind::PostImage, image.as_deref()).await;
            discard(&state, MediaKind::PostVideo, video.as_deref()).await;
            return Err(e);
        }
    };

    let view = repo::find_view(&state.db, Some(user_id), post.id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("created post missing on read-back")))?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/posts/{}", post.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }

    info!(post_id = %post.id, %user_id, category = %category, "post created");
    Ok((StatusCode::CREATED, headers, Json(view)))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let post = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    if post.user_id != user_id {
        return Err(ApiError::Forbidden);
    }

    // Row first; file cleanup must not be able to fail the deletion.
    repo::delete(&state.db, post.id).await?;
    discard(&state, MediaKind::PostImage, post.image.as_deref()).await;
    discard(&state, MediaKind::PostVideo, post.video.as_deref()).await;

    info!(post_id = %id, %user_id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    if !repo::exists(&state.db, id).await? {
        return Err(ApiError::NotFound("post"));
    }
    let comments = repo::list_comments(&state.db, id).await?;
    Ok(Json(comments))
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("comment must not be empty".into()));
    }
    if !repo::exists(&state.db, id).await? {
        return Err(ApiError::NotFound("post"));
    }

    let comment = repo::insert_comment(&state.db, user_id, id, content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state))]
pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeResponse>, ApiError> {
    if !repo::exists(&state.db, id).await? {
        return Err(ApiError::NotFound("post"));
    }

    let liked = repo::toggle_like(&state.db, user_id, id).await?;
    let like_count = repo::like_count(&state.db, id).await?;
    Ok(Json(LikeResponse { liked, like_count }))
}

// --- helpers ---

async fn discard(state: &AppState, kind: MediaKind, stored_name: Option<&str>) {
    if let Some(name) = stored_name {
        remove_best_effort(&*state.media, kind, name).await;
    }
}

async fn collect_post_form(mut multipart: Multipart) -> Result<CreatePostForm, ApiError> {
    let mut form = CreatePostForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("malformed multipart body".into()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("title") => form.title = Some(text_field(field).await?),
            Some("content") => form.content = Some(text_field(field).await?),
            Some("category") => form.category = Some(text_field(field).await?),
            Some("image") => form.image = file_field(field).await?,
            Some("video") => form.video = file_field(field).await?,
            _ => {}
        }
    }
    Ok(form)
}

fn required_text<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("{field} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_rejects_empty() {
        assert_eq!(required_text(Some("  hello "), "title").unwrap(), "hello");
        assert!(required_text(Some("   "), "title").is_err());
        assert!(required_text(None, "title").is_err());
    }

    #[test]
    fn like_response_serializes_both_fields() {
        let json = serde_json::to_string(&LikeResponse {
            liked: true,
            like_count: 3,
        })
        .unwrap();
        assert!(json.contains("\"liked\":true"));
        assert!(json.contains("\"like_count\":3"));
    }
}
