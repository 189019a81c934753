use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{map_fk_violation, ApiError};

/// Fixed category set, mirrored by the `post_category` enum in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "post_category", rename_all = "lowercase")]
pub enum PostCategory {
    Technology,
    Lifestyle,
    Education,
    Sports,
    Entertainment,
    Business,
    Art,
    Science,
}

impl PostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostCategory::Technology => "technology",
            PostCategory::Lifestyle => "lifestyle",
            PostCategory::Education => "education",
            PostCategory::Sports => "sports",
            PostCategory::Entertainment => "entertainment",
            PostCategory::Business => "business",
            PostCategory::Art => "art",
            PostCategory::Science => "science",
        }
    }
}

impl fmt::Display for PostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostCategory {
    type Err = ApiError;

    /// Case-insensitive, so `?category=Technology` and `technology` both work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "technology" => Ok(PostCategory::Technology),
            "lifestyle" => Ok(PostCategory::Lifestyle),
            "education" => Ok(PostCategory::Education),
            "sports" => Ok(PostCategory::Sports),
            "entertainment" => Ok(PostCategory::Entertainment),
            "business" => Ok(PostCategory::Business),
            "art" => Ok(PostCategory::Art),
            "science" => Ok(PostCategory::Science),
            other => Err(ApiError::Validation(format!("unknown category: {other}"))),
        }
    }
}

/// Raw post row, used for ownership checks and media cleanup.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub image: Option<String>,
    pub video: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct NewPost<'a> {
    pub user_id: Uuid,
    pub title: &'a str,
    pub content: &'a str,
    pub category: PostCategory,
    pub image: Option<&'a str>,
    pub video: Option<&'a str>,
}

/// Post as the presentation layer sees it: author fields joined in and the
/// engagement counters computed at read time. `liked` is relative to the
/// viewer bound as `$1` and is always false for anonymous reads.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_profile_pic: Option<String>,
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub image: Option<String>,
    pub video: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_profile_pic: Option<String>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// $1 is always the viewer (nullable) in queries built on this select.
const POST_VIEW_SELECT: &str = r#"
    SELECT p.id,
           p.user_id AS author_id,
           u.username AS author_username,
           u.profile_pic AS author_profile_pic,
           p.title,
           p.content,
           p.category,
           p.image,
           p.video,
           p.created_at,
           (SELECT count(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
           (SELECT count(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
           EXISTS (
               SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = $1
           ) AS liked
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

pub async fn list(
    db: &PgPool,
    viewer: Option<Uuid>,
    category: Option<PostCategory>,
) -> Result<Vec<PostView>, ApiError> {
    let sql = format!(
        "{POST_VIEW_SELECT} WHERE ($2::post_category IS NULL OR p.category = $2) \
         ORDER BY p.created_at DESC"
    );
    let rows = sqlx::query_as::<_, PostView>(&sql)
        .bind(viewer)
        .bind(category)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn find_view(
    db: &PgPool,
    viewer: Option<Uuid>,
    id: Uuid,
) -> Result<Option<PostView>, ApiError> {
    let sql = format!("{POST_VIEW_SELECT} WHERE p.id = $2");
    let row = sqlx::query_as::<_, PostView>(&sql)
        .bind(viewer)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn list_by_author(
    db: &PgPool,
    viewer: Option<Uuid>,
    author_id: Uuid,
) -> Result<Vec<PostView>, ApiError> {
    let sql = format!("{POST_VIEW_SELECT} WHERE p.user_id = $2 ORDER BY p.created_at DESC");
    let rows = sqlx::query_as::<_, PostView>(&sql)
        .bind(viewer)
        .bind(author_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Posts whose title or body matches the pattern.
pub async fn search_matching(
    db: &PgPool,
    viewer: Option<Uuid>,
    pattern: &str,
) -> Result<Vec<PostView>, ApiError> {
    let sql = format!(
        "{POST_VIEW_SELECT} WHERE p.title ILIKE $2 OR p.content ILIKE $2 \
         ORDER BY p.created_at DESC"
    );
    let rows = sqlx::query_as::<_, PostView>(&sql)
        .bind(viewer)
        .bind(pattern)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Posts written by any author whose username or full name matches.
pub async fn search_by_author(
    db: &PgPool,
    viewer: Option<Uuid>,
    pattern: &str,
) -> Result<Vec<PostView>, ApiError> {
    let sql = format!(
        "{POST_VIEW_SELECT} WHERE u.username ILIKE $2 OR u.fullname ILIKE $2 \
         ORDER BY p.created_at DESC"
    );
    let rows = sqlx::query_as::<_, PostView>(&sql)
        .bind(viewer)
        .bind(pattern)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn insert(db: &PgPool, new: NewPost<'_>) -> Result<Post, ApiError> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (user_id, title, content, category, image, video)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, title, content, category, image, video, created_at
        "#,
    )
    .bind(new.user_id)
    .bind(new.title)
    .bind(new.content)
    .bind(new.category)
    .bind(new.image)
    .bind(new.video)
    .fetch_one(db)
    .await?;
    Ok(post)
}

pub async fn find(db: &PgPool, id: Uuid) -> Result<Option<Post>, ApiError> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, user_id, title, content, category, image, video, created_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(post)
}

/// Removes the row; comments and likes go with it via the cascading
/// foreign keys.
pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn exists(db: &PgPool, id: Uuid) -> Result<bool, ApiError> {
    let (found,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await?;
    Ok(found)
}

/// Flips the like state for (user, post) and reports the new state.
///
/// Delete-first keeps the pair of statements race-safe without a
/// transaction: if the row was there we removed it, otherwise the insert
/// relies on the composite primary key. When two first-time likes race,
/// one insert hits the conflict and is a no-op; the row exists either
/// way, so both callers see `liked = true`. A post deleted between the
/// handler's existence check and the insert surfaces as `NotFound`, not
/// a foreign-key error.
pub async fn toggle_like(db: &PgPool, user_id: Uuid, post_id: Uuid) -> Result<bool, ApiError> {
    let deleted = sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
        .bind(user_id)
        .bind(post_id)
        .execute(db)
        .await?
        .rows_affected();
    if deleted > 0 {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(post_id)
    .execute(db)
    .await
    .map_err(|e| map_fk_violation(e, "post"))?;
    Ok(true)
}

pub async fn like_count(db: &PgPool, post_id: Uuid) -> Result<i64, ApiError> {
    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM post_likes WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Newest first, like the post feed.
pub async fn list_comments(db: &PgPool, post_id: Uuid) -> Result<Vec<CommentView>, ApiError> {
    let rows = sqlx::query_as::<_, CommentView>(
        r#"
        SELECT c.id,
               c.user_id AS author_id,
               u.username AS author_username,
               u.profile_pic AS author_profile_pic,
               c.content,
               c.created_at
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.post_id = $1
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn insert_comment(
    db: &PgPool,
    author_id: Uuid,
    post_id: Uuid,
    content: &str,
) -> Result<CommentView, ApiError> {
    let row = sqlx::query_as::<_, CommentView>(
        r#"
        WITH inserted AS (
            INSERT INTO comments (user_id, post_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, content, created_at
        )
        SELECT i.id,
               i.user_id AS author_id,
               u.username AS author_username,
               u.profile_pic AS author_profile_pic,
               i.content,
               i.created_at
        FROM inserted i
        JOIN users u ON u.id = i.user_id
        "#,
    )
    .bind(author_id)
    .bind(post_id)
    .bind(content)
    .fetch_one(db)
    .await
    .map_err(|e| map_fk_violation(e, "post"))?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!(
            "Technology".parse::<PostCategory>().unwrap(),
            PostCategory::Technology
        );
        assert_eq!(
            "SCIENCE".parse::<PostCategory>().unwrap(),
            PostCategory::Science
        );
    }

    #[test]
    fn unknown_category_is_a_validation_error() {
        let err = "gardening".parse::<PostCategory>().unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn category_round_trips_through_display() {
        for name in [
            "technology",
            "lifestyle",
            "education",
            "sports",
            "entertainment",
            "business",
            "art",
            "science",
        ] {
            let category: PostCategory = name.parse().unwrap();
            assert_eq!(category.to_string(), name);
        }
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&PostCategory::Entertainment).unwrap();
        assert_eq!(json, "\"entertainment\"");
    }
}
