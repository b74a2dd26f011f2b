//! Database row types — these map directly to SQLite rows.
//! Conversions into the recipebook-types API models are implemented here.

use chrono::{DateTime, NaiveDateTime, Utc};
use recipebook_types::api::{RecipeShort, UserResponse};
use recipebook_types::models::User;
use tracing::warn;
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

/// A user as seen by a particular requester.
pub struct AuthorRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

pub struct RecipeRow {
    pub id: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub image: Option<String>,
    pub pub_date: String,
    pub author: AuthorRow,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

pub struct RecipeShortRow {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: parse_uuid(&row.id),
            created_at: parse_timestamp(&row.created_at),
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

impl From<AuthorRow> for UserResponse {
    fn from(row: AuthorRow) -> Self {
        UserResponse {
            id: parse_uuid(&row.id),
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

impl From<RecipeShortRow> for RecipeShort {
    fn from(row: RecipeShortRow) -> Self {
        RecipeShort {
            id: parse_uuid(&row.id),
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

pub(crate) fn parse_uuid(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
