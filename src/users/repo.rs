use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    auth::repo::User,
    error::{map_fk_violation, ApiError},
};

/// Compact user shape for search results and embedded author fields.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub fullname: Option<String>,
    pub profile_pic: Option<String>,
}

/// Follower/following counts plus whether the viewer follows this user.
pub struct FollowStats {
    pub follower_count: i64,
    pub following_count: i64,
    pub is_following: bool,
}

pub async fn follow_stats(
    db: &PgPool,
    viewer: Option<Uuid>,
    user_id: Uuid,
) -> Result<FollowStats, ApiError> {
    let (follower_count, following_count, is_following): (i64, i64, bool) = sqlx::query_as(
        r#"
        SELECT
            (SELECT count(*) FROM follows WHERE followee_id = $1),
            (SELECT count(*) FROM follows WHERE follower_id = $1),
            EXISTS (
                SELECT 1 FROM follows WHERE follower_id = $2 AND followee_id = $1
            )
        "#,
    )
    .bind(user_id)
    .bind(viewer)
    .fetch_one(db)
    .await?;
    Ok(FollowStats {
        follower_count,
        following_count,
        is_following,
    })
}

/// Flips the follow edge for (follower, followee) and reports the new
/// state. Same shape as the like toggle: delete first, otherwise insert
/// with the composite primary key absorbing a concurrent duplicate and a
/// followee deleted in the gap surfacing as `NotFound`.
pub async fn toggle_follow(
    db: &PgPool,
    follower_id: Uuid,
    followee_id: Uuid,
) -> Result<bool, ApiError> {
    let deleted =
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(db)
            .await?
            .rows_affected();
    if deleted > 0 {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(follower_id)
    .bind(followee_id)
    .execute(db)
    .await
    .map_err(|e| map_fk_violation(e, "user"))?;
    Ok(true)
}

pub struct ProfileChanges<'a> {
    pub fullname: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub profile_pic: Option<&'a str>,
    pub cover_photo: Option<&'a str>,
}

/// Partial update: absent fields keep their current value.
pub async fn update_profile(
    db: &PgPool,
    user_id: Uuid,
    changes: ProfileChanges<'_>,
) -> Result<User, ApiError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET fullname = COALESCE($2, fullname),
            bio = COALESCE($3, bio),
            profile_pic = COALESCE($4, profile_pic),
            cover_photo = COALESCE($5, cover_photo)
        WHERE id = $1
        RETURNING id, username, email, password_hash, fullname, bio, dob, gender,
                  phone_number, profile_pic, cover_photo, created_at
        "#,
    )
    .bind(user_id)
    .bind(changes.fullname)
    .bind(changes.bio)
    .bind(changes.profile_pic)
    .bind(changes.cover_photo)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound("user"))?;
    Ok(user)
}

/// Users whose username or full name matches the pattern.
pub async fn search(db: &PgPool, pattern: &str) -> Result<Vec<UserSummary>, ApiError> {
    let rows = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, username, fullname, profile_pic
        FROM users
        WHERE username ILIKE $1 OR fullname ILIKE $1
        ORDER BY username
        "#,
    )
    .bind(pattern)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
