use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{map_unique_violation, ApiError};

/// User record in the database. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub fullname: Option<String>,
    pub bio: Option<String>,
    pub dob: Option<Date>,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub profile_pic: Option<String>,
    pub cover_photo: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub fullname: Option<&'a str>,
    pub dob: Option<Date>,
    pub gender: Option<&'a str>,
    pub phone_number: Option<&'a str>,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, fullname, bio, dob, gender,
                   phone_number, profile_pic, cover_photo, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, fullname, bio, dob, gender,
                   phone_number, profile_pic, cover_photo, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Profile lookup is exact-match on the stored username; only the
    /// uniqueness check below is case-insensitive.
    pub async fn find_by_username(db: &PgPool, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, fullname, bio, dob, gender,
                   phone_number, profile_pic, cover_photo, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Checks username and email uniqueness together, reporting the first
    /// violated field (username takes precedence). The unique indexes remain
    /// the source of truth; `create` maps a lost race to the same error.
    pub async fn duplicate_field(
        db: &PgPool,
        username: &str,
        email: &str,
    ) -> Result<Option<&'static str>, ApiError> {
        let (username_taken, email_taken) = sqlx::query_as::<_, (bool, bool)>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM users WHERE lower(username) = lower($1)),
                EXISTS (SELECT 1 FROM users WHERE email = $2)
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(if username_taken {
            Some("username")
        } else if email_taken {
            Some("email")
        } else {
            None
        })
    }

    pub async fn create(db: &PgPool, new: NewUser<'_>) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, fullname, dob, gender, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, password_hash, fullname, bio, dob, gender,
                      phone_number, profile_pic, cover_photo, created_at
            "#,
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.fullname)
        .bind(new.dob)
        .bind(new.gender)
        .bind(new.phone_number)
        .fetch_one(db)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                &[
                    ("users_username_lower_key", "username"),
                    ("users_email_key", "email"),
                ],
            )
        })?;
        Ok(user)
    }
}
