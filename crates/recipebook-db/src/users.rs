use recipebook_types::api::{RecipeShort, SubscriptionResponse, UserResponse};
use recipebook_types::models::{Ingredient, Tag, User};
use rusqlite::{Connection, OptionalExtension, types::Value};
use tracing::info;
use uuid::Uuid;

use crate::filters::IngredientFilter;
use crate::models::{AuthorRow, RecipeShortRow, UserRow};
use crate::{CoreError, CoreResult, Database};

impl Database {
    // -- Users --

    /// Registration lives with the external auth provider; this is the
    /// hook it (and the test suites) use to create the backing row.
    pub fn create_user(
        &self,
        email: &str,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> CoreResult<User> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, first_name, last_name) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id.to_string(), email, username, first_name, last_name),
            )?;
            info!("Created user {} ({})", username, id);
            query_user(conn, id)?.ok_or_else(|| CoreError::NotFound("User not found".into()))
        })
    }

    pub fn get_user_profile(
        &self,
        id: Uuid,
        requester: Option<Uuid>,
    ) -> CoreResult<Option<UserResponse>> {
        self.with_conn(|conn| Ok(query_author(conn, id, requester)?.map(Into::into)))
    }

    pub fn list_users(&self, requester: Option<Uuid>) -> CoreResult<Vec<UserResponse>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY u.username", AUTHOR_SELECT))?;
            let rows = stmt
                .query_map([requester_param(requester)], author_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
    }

    /// Authors the user follows, each with their newest recipes capped at
    /// `recipes_limit` and the uncapped total.
    pub fn list_subscriptions(
        &self,
        user: Uuid,
        recipes_limit: Option<u32>,
    ) -> CoreResult<Vec<SubscriptionResponse>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.author_id FROM follows f
                 JOIN users u ON u.id = f.author_id
                 WHERE f.user_id = ?1
                 ORDER BY u.username",
            )?;
            let author_ids = stmt
                .query_map([user.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut subscriptions = Vec::with_capacity(author_ids.len());
            for author_id in author_ids {
                let author = crate::models::parse_uuid(&author_id);
                if let Some(card) = subscription_card(conn, author, Some(user), recipes_limit)? {
                    subscriptions.push(card);
                }
            }
            Ok(subscriptions)
        })
    }

    // -- Reference data --

    pub fn create_tag(&self, name: &str, color: &str, slug: &str) -> CoreResult<Tag> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)",
                (name, color, slug),
            )?;
            Ok(Tag {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                color: color.to_string(),
                slug: slug.to_string(),
            })
        })
    }

    pub fn list_tags(&self) -> CoreResult<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, color, slug FROM tags ORDER BY id")?;
            let rows = stmt
                .query_map([], tag_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_tag(&self, id: i64) -> CoreResult<Option<Tag>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, color, slug FROM tags WHERE id = ?1",
                    [id],
                    tag_from_row,
                )
                .optional()?)
        })
    }

    pub fn create_ingredient(&self, name: &str, measurement_unit: &str) -> CoreResult<Ingredient> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO ingredients (name, measurement_unit) VALUES (?1, ?2)",
                (name, measurement_unit),
            )?;
            Ok(Ingredient {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                measurement_unit: measurement_unit.to_string(),
            })
        })
    }

    pub fn list_ingredients(&self, filter: &IngredientFilter) -> CoreResult<Vec<Ingredient>> {
        self.with_conn(|conn| {
            let (clause, params) = filter.to_sql();
            let sql = format!(
                "SELECT id, name, measurement_unit FROM ingredients {} ORDER BY name, id",
                clause
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok(Ingredient {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        measurement_unit: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_ingredient(&self, id: i64) -> CoreResult<Option<Ingredient>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, measurement_unit FROM ingredients WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(Ingredient {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            measurement_unit: row.get(2)?,
                        })
                    },
                )
                .optional()?)
        })
    }
}

/// Selects a user card; the single parameter is the requester id (or NULL,
/// which never matches a follow row).
const AUTHOR_SELECT: &str = "SELECT u.id, u.email, u.username, u.first_name, u.last_name,
        EXISTS(SELECT 1 FROM follows fo WHERE fo.user_id = ?1 AND fo.author_id = u.id)
     FROM users u";

pub(crate) fn requester_param(requester: Option<Uuid>) -> Value {
    match requester {
        Some(id) => Value::Text(id.to_string()),
        None => Value::Null,
    }
}

fn author_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuthorRow> {
    Ok(AuthorRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        is_subscribed: row.get(5)?,
    })
}

fn tag_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        slug: row.get(3)?,
    })
}

fn query_user(conn: &Connection, id: Uuid) -> CoreResult<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, email, username, first_name, last_name, created_at FROM users WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    username: row.get(2)?,
                    first_name: row.get(3)?,
                    last_name: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    Ok(row.map(Into::into))
}

pub(crate) fn query_author(
    conn: &Connection,
    id: Uuid,
    requester: Option<Uuid>,
) -> CoreResult<Option<AuthorRow>> {
    let row = conn
        .query_row(
            &format!("{} WHERE u.id = ?2", AUTHOR_SELECT),
            (requester_param(requester), id.to_string()),
            author_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn user_exists(conn: &Connection, id: Uuid) -> CoreResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id.to_string()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn subscription_card(
    conn: &Connection,
    author: Uuid,
    requester: Option<Uuid>,
    recipes_limit: Option<u32>,
) -> CoreResult<Option<SubscriptionResponse>> {
    let Some(row) = query_author(conn, author, requester)? else {
        return Ok(None);
    };

    // LIMIT -1 means no limit in SQLite
    let limit = recipes_limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(
        "SELECT id, name, image, cooking_time FROM recipes
         WHERE author_id = ?1
         ORDER BY pub_date DESC, rowid DESC
         LIMIT ?2",
    )?;
    let recipes: Vec<RecipeShort> = stmt
        .query_map((author.to_string(), limit), |row| {
            Ok(RecipeShortRow {
                id: row.get(0)?,
                name: row.get(1)?,
                image: row.get(2)?,
                cooking_time: row.get(3)?,
            })
        })?
        .map(|r| r.map(Into::into))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let recipes_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM recipes WHERE author_id = ?1",
        [author.to_string()],
        |r| r.get(0),
    )?;

    Ok(Some(SubscriptionResponse {
        id: crate::models::parse_uuid(&row.id),
        email: row.email,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        is_subscribed: row.is_subscribed,
        recipes,
        recipes_count: recipes_count as u64,
    }))
}

#[cfg(test)]
mod tests {
    use crate::testing::fixture;
    use crate::IngredientFilter;

    #[test]
    fn ingredient_prefix_is_case_sensitive() {
        let fx = fixture();
        for name in ["Apple", "Applesauce", "Pineapple", "apple pie"] {
            fx.db.create_ingredient(name, "g").unwrap();
        }

        let filter = IngredientFilter {
            name: Some("App".into()),
        };
        let names: Vec<String> = fx
            .db
            .list_ingredients(&filter)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Apple", "Applesauce"]);
    }

    #[test]
    fn profile_reports_subscription_for_requester() {
        let fx = fixture();
        fx.db.follow_user(fx.alice, fx.bob, None).unwrap();

        let seen_by_alice = fx.db.get_user_profile(fx.bob, Some(fx.alice)).unwrap().unwrap();
        assert!(seen_by_alice.is_subscribed);

        let seen_anonymously = fx.db.get_user_profile(fx.bob, None).unwrap().unwrap();
        assert!(!seen_anonymously.is_subscribed);
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let fx = fixture();
        let err = fx.db.create_user("other@example.com", "alice", "", "").unwrap_err();
        assert!(matches!(err, crate::CoreError::Conflict(_)));
    }
}
