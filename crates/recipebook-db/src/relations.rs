use recipebook_types::api::{RecipeShort, SubscriptionResponse};
use recipebook_types::validation::validate_follow;
use rusqlite::OptionalExtension;
use tracing::info;
use uuid::Uuid;

use crate::models::RecipeShortRow;
use crate::users::{subscription_card, user_exists};
use crate::{CoreError, CoreResult, Database};

/// The two per-user recipe collections. Both are (user, recipe) pairs with
/// the same add/remove rules and differ only in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_list",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "the shopping list",
        }
    }
}

impl Database {
    // -- Follows --

    pub fn follow_user(
        &self,
        follower: Uuid,
        author: Uuid,
        recipes_limit: Option<u32>,
    ) -> CoreResult<SubscriptionResponse> {
        validate_follow(follower, author)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !user_exists(&tx, author)? {
                return Err(CoreError::NotFound("User not found".into()));
            }

            let existing = tx
                .query_row(
                    "SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2",
                    (follower.to_string(), author.to_string()),
                    |_| Ok(()),
                )
                .optional()?;
            if existing.is_some() {
                return Err(CoreError::Conflict("Such a subscription already exists".into()));
            }

            // UNIQUE(user_id, author_id) still catches a concurrent duplicate
            tx.execute(
                "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)",
                (follower.to_string(), author.to_string()),
            )?;

            let card = subscription_card(&tx, author, Some(follower), recipes_limit)?
                .ok_or_else(|| CoreError::NotFound("User not found".into()))?;
            tx.commit()?;

            info!("{} now follows {}", follower, author);
            Ok(card)
        })
    }

    pub fn unfollow_user(&self, follower: Uuid, author: Uuid) -> CoreResult<()> {
        self.with_conn_mut(|conn| {
            if !user_exists(conn, author)? {
                return Err(CoreError::NotFound("User not found".into()));
            }
            let removed = conn.execute(
                "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
                (follower.to_string(), author.to_string()),
            )?;
            if removed == 0 {
                return Err(CoreError::NotFound("There is no such subscription".into()));
            }
            info!("{} unfollowed {}", follower, author);
            Ok(())
        })
    }

    // -- Favorites / shopping cart --

    pub fn favorite_recipe(&self, user: Uuid, recipe_id: Uuid) -> CoreResult<RecipeShort> {
        self.add_to_list(RecipeList::Favorites, user, recipe_id)
    }

    pub fn unfavorite_recipe(&self, user: Uuid, recipe_id: Uuid) -> CoreResult<()> {
        self.remove_from_list(RecipeList::Favorites, user, recipe_id)
    }

    pub fn add_to_shopping_list(&self, user: Uuid, recipe_id: Uuid) -> CoreResult<RecipeShort> {
        self.add_to_list(RecipeList::ShoppingCart, user, recipe_id)
    }

    pub fn remove_from_shopping_list(&self, user: Uuid, recipe_id: Uuid) -> CoreResult<()> {
        self.remove_from_list(RecipeList::ShoppingCart, user, recipe_id)
    }

    pub fn add_to_list(
        &self,
        list: RecipeList,
        user: Uuid,
        recipe_id: Uuid,
    ) -> CoreResult<RecipeShort> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let recipe = tx
                .query_row(
                    "SELECT id, name, image, cooking_time FROM recipes WHERE id = ?1",
                    [recipe_id.to_string()],
                    |row| {
                        Ok(RecipeShortRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            image: row.get(2)?,
                            cooking_time: row.get(3)?,
                        })
                    },
                )
                .optional()?
                .ok_or_else(|| CoreError::NotFound("Recipe not found".into()))?;

            let existing = tx
                .query_row(
                    &format!(
                        "SELECT 1 FROM {} WHERE user_id = ?1 AND recipe_id = ?2",
                        list.table()
                    ),
                    (user.to_string(), recipe_id.to_string()),
                    |_| Ok(()),
                )
                .optional()?;
            if existing.is_some() {
                return Err(CoreError::Conflict(format!(
                    "The recipe has already been added to {}",
                    list.label()
                )));
            }

            tx.execute(
                &format!(
                    "INSERT INTO {} (user_id, recipe_id) VALUES (?1, ?2)",
                    list.table()
                ),
                (user.to_string(), recipe_id.to_string()),
            )?;
            tx.commit()?;

            info!("{} added recipe {} to {}", user, recipe_id, list.label());
            Ok(recipe.into())
        })
    }

    pub fn remove_from_list(&self, list: RecipeList, user: Uuid, recipe_id: Uuid) -> CoreResult<()> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2",
                    list.table()
                ),
                (user.to_string(), recipe_id.to_string()),
            )?;
            if removed == 0 {
                return Err(CoreError::NotFound(format!(
                    "The recipe is not in {}",
                    list.label()
                )));
            }
            info!("{} removed recipe {} from {}", user, recipe_id, list.label());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{draft, fixture};
    use recipebook_types::validation::ValidationError;

    #[test]
    fn cannot_follow_self() {
        let fx = fixture();
        let err = fx.db.follow_user(fx.alice, fx.alice, None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::SelfFollow)));
    }

    #[test]
    fn follow_then_duplicate_then_unfollow() {
        let fx = fixture();
        let card = fx.db.follow_user(fx.alice, fx.bob, None).unwrap();
        assert_eq!(card.id, fx.bob);
        assert!(card.is_subscribed);

        assert!(matches!(
            fx.db.follow_user(fx.alice, fx.bob, None),
            Err(CoreError::Conflict(_))
        ));

        fx.db.unfollow_user(fx.alice, fx.bob).unwrap();
        assert!(matches!(
            fx.db.unfollow_user(fx.alice, fx.bob),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn follow_unknown_author() {
        let fx = fixture();
        assert!(matches!(
            fx.db.follow_user(fx.alice, Uuid::new_v4(), None),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn favorite_twice_conflicts_and_remove_twice_is_not_found() {
        let fx = fixture();
        let recipe = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.salt, 10)]))
            .unwrap();

        let short = fx.db.favorite_recipe(fx.bob, recipe.id).unwrap();
        assert_eq!(short.id, recipe.id);
        assert!(matches!(
            fx.db.favorite_recipe(fx.bob, recipe.id),
            Err(CoreError::Conflict(_))
        ));

        fx.db.unfavorite_recipe(fx.bob, recipe.id).unwrap();
        assert!(matches!(
            fx.db.unfavorite_recipe(fx.bob, recipe.id),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn lists_are_independent() {
        let fx = fixture();
        let recipe = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.salt, 10)]))
            .unwrap();

        fx.db.favorite_recipe(fx.bob, recipe.id).unwrap();
        fx.db.add_to_shopping_list(fx.bob, recipe.id).unwrap();
        assert!(matches!(
            fx.db.add_to_shopping_list(fx.bob, recipe.id),
            Err(CoreError::Conflict(_))
        ));
        fx.db.remove_from_shopping_list(fx.bob, recipe.id).unwrap();

        let seen = fx.db.get_recipe(recipe.id, Some(fx.bob)).unwrap().unwrap();
        assert!(seen.is_favorited);
        assert!(!seen.is_in_shopping_cart);
    }

    #[test]
    fn unknown_recipe_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.db.add_to_shopping_list(fx.bob, Uuid::new_v4()),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn subscriptions_cap_embedded_recipes() {
        let fx = fixture();
        for _ in 0..3 {
            fx.db
                .create_recipe(fx.bob, &draft(&[fx.dinner], &[(fx.salt, 1)]))
                .unwrap();
        }
        fx.db.follow_user(fx.alice, fx.bob, None).unwrap();

        let subs = fx.db.list_subscriptions(fx.alice, Some(2)).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].recipes.len(), 2);
        assert_eq!(subs[0].recipes_count, 3);

        let subs = fx.db.list_subscriptions(fx.alice, None).unwrap();
        assert_eq!(subs[0].recipes.len(), 3);
        assert!(fx.db.list_subscriptions(fx.bob, None).unwrap().is_empty());
    }
}
