//! Request filters translated into SQL predicates.
//!
//! Predicates use anonymous `?` placeholders and return their parameters in
//! textual order, so callers can splice them after their own parameters.

use rusqlite::types::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct IngredientFilter {
    /// Case-sensitive "starts with" match on the ingredient name.
    pub name: Option<String>,
}

impl IngredientFilter {
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        match self.name.as_deref() {
            // LIKE is case-insensitive for ASCII in SQLite, so compare the prefix directly
            Some(prefix) if !prefix.is_empty() => (
                "WHERE substr(name, 1, length(?1)) = ?1".to_string(),
                vec![Value::Text(prefix.to_string())],
            ),
            _ => (String::new(), Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    /// Slugs; a recipe matches if it carries any of them.
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeFilter {
    /// Builds the `WHERE` clause over a `recipes r` alias.
    ///
    /// `is_favorited` and `is_in_shopping_cart` only restrict the result for an
    /// authenticated requester. For an anonymous one they are ignored, which
    /// returns the same set as no filter at all.
    pub fn to_sql(&self, requester: Option<Uuid>) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if !self.tags.is_empty() {
            let placeholders = vec!["?"; self.tags.len()].join(", ");
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
                         WHERE rt.recipe_id = r.id AND t.slug IN ({}))",
                placeholders
            ));
            params.extend(self.tags.iter().cloned().map(Value::Text));
        }

        if let Some(author) = self.author {
            clauses.push("r.author_id = ?".to_string());
            params.push(Value::Text(author.to_string()));
        }

        if let Some(user) = requester {
            if self.is_favorited == Some(true) {
                clauses.push(
                    "EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ?)"
                        .to_string(),
                );
                params.push(Value::Text(user.to_string()));
            }
            if self.is_in_shopping_cart == Some(true) {
                clauses.push(
                    "EXISTS (SELECT 1 FROM shopping_list s WHERE s.recipe_id = r.id AND s.user_id = ?)"
                        .to_string(),
                );
                params.push(Value::Text(user.to_string()));
            }
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

/// Parses a boolean query flag: `1`/`true` or `0`/`false`, with the words
/// matched case-insensitively.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}
