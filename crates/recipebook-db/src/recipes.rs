use std::collections::HashMap;

use recipebook_types::api::{IngredientAmount, RecipeDraft, RecipeResponse};
use recipebook_types::models::{RecipeIngredient, Tag};
use recipebook_types::validation::validate_recipe;
use rusqlite::{Connection, OptionalExtension, types::Value};
use tracing::info;
use uuid::Uuid;

use crate::filters::RecipeFilter;
use crate::models::{AuthorRow, RecipeRow, parse_timestamp, parse_uuid};
use crate::users::requester_param;
use crate::{CoreError, CoreResult, Database};

/// `?1` is the requester id (NULL when anonymous) for the per-requester flags.
const RECIPE_SELECT: &str = "SELECT r.id, r.name, r.text, r.cooking_time, r.image, r.pub_date,
        u.id, u.email, u.username, u.first_name, u.last_name,
        EXISTS(SELECT 1 FROM follows fo WHERE fo.user_id = ?1 AND fo.author_id = u.id),
        EXISTS(SELECT 1 FROM favorites f WHERE f.user_id = ?1 AND f.recipe_id = r.id),
        EXISTS(SELECT 1 FROM shopping_list s WHERE s.user_id = ?1 AND s.recipe_id = r.id)
     FROM recipes r
     JOIN users u ON u.id = r.author_id";

impl Database {
    // -- Writes --

    /// Validates the draft, then writes the recipe header, its tag links and
    /// its ingredient lines in one transaction.
    pub fn create_recipe(&self, author: Uuid, draft: &RecipeDraft) -> CoreResult<RecipeResponse> {
        validate_recipe(draft)?;

        let recipe_id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            // Dropping `tx` without commit rolls everything back
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO recipes (id, author_id, name, text, cooking_time, image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    recipe_id.to_string(),
                    author.to_string(),
                    draft.name,
                    draft.text,
                    draft.cooking_time,
                    draft.image,
                ],
            )?;
            insert_tags(&tx, recipe_id, &draft.tags)?;
            insert_ingredients(&tx, recipe_id, &draft.ingredients)?;

            let recipe = load_recipe(&tx, recipe_id, Some(author))?
                .ok_or_else(|| CoreError::NotFound("Recipe not found".into()))?;
            tx.commit()?;

            info!(
                "Recipe {} created by {} ({} ingredients, {} tags)",
                recipe_id,
                author,
                draft.ingredients.len(),
                draft.tags.len()
            );
            Ok(recipe)
        })
    }

    /// Replaces the recipe header, tags and ingredient lines wholesale.
    pub fn update_recipe(
        &self,
        requester: Uuid,
        recipe_id: Uuid,
        draft: &RecipeDraft,
    ) -> CoreResult<RecipeResponse> {
        validate_recipe(draft)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_author(&tx, recipe_id, requester)?;

            tx.execute(
                "UPDATE recipes SET name = ?2, text = ?3, cooking_time = ?4, image = ?5 WHERE id = ?1",
                rusqlite::params![
                    recipe_id.to_string(),
                    draft.name,
                    draft.text,
                    draft.cooking_time,
                    draft.image,
                ],
            )?;
            tx.execute(
                "DELETE FROM recipe_tags WHERE recipe_id = ?1",
                [recipe_id.to_string()],
            )?;
            tx.execute(
                "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
                [recipe_id.to_string()],
            )?;
            insert_tags(&tx, recipe_id, &draft.tags)?;
            insert_ingredients(&tx, recipe_id, &draft.ingredients)?;

            let recipe = load_recipe(&tx, recipe_id, Some(requester))?
                .ok_or_else(|| CoreError::NotFound("Recipe not found".into()))?;
            tx.commit()?;

            info!("Recipe {} updated by {}", recipe_id, requester);
            Ok(recipe)
        })
    }

    /// Tag links, ingredient lines, favorites and cart entries go with it.
    pub fn delete_recipe(&self, requester: Uuid, recipe_id: Uuid) -> CoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_author(&tx, recipe_id, requester)?;
            tx.execute("DELETE FROM recipes WHERE id = ?1", [recipe_id.to_string()])?;
            tx.commit()?;

            info!("Recipe {} deleted by {}", recipe_id, requester);
            Ok(())
        })
    }

    // -- Reads --

    pub fn get_recipe(
        &self,
        recipe_id: Uuid,
        requester: Option<Uuid>,
    ) -> CoreResult<Option<RecipeResponse>> {
        self.with_conn(|conn| load_recipe(conn, recipe_id, requester))
    }

    /// Newest first.
    pub fn list_recipes(
        &self,
        filter: &RecipeFilter,
        requester: Option<Uuid>,
    ) -> CoreResult<Vec<RecipeResponse>> {
        self.with_conn(|conn| {
            let (clause, filter_params) = filter.to_sql(requester);
            let sql = format!(
                "{} {} ORDER BY r.pub_date DESC, r.rowid DESC",
                RECIPE_SELECT, clause
            );

            let mut params = Vec::with_capacity(filter_params.len() + 1);
            params.push(requester_param(requester));
            params.extend(filter_params);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), recipe_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            hydrate(conn, rows)
        })
    }
}

fn ensure_author(conn: &Connection, recipe_id: Uuid, requester: Uuid) -> CoreResult<()> {
    let author: Option<String> = conn
        .query_row(
            "SELECT author_id FROM recipes WHERE id = ?1",
            [recipe_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match author {
        None => Err(CoreError::NotFound("Recipe not found".into())),
        Some(author) if parse_uuid(&author) != requester => Err(CoreError::Forbidden(
            "Only the author can modify this recipe".into(),
        )),
        Some(_) => Ok(()),
    }
}

fn insert_tags(conn: &Connection, recipe_id: Uuid, tags: &[i64]) -> CoreResult<()> {
    let mut known = conn.prepare_cached("SELECT 1 FROM tags WHERE id = ?1")?;
    let mut insert =
        conn.prepare_cached("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)")?;

    for tag_id in tags {
        if !known.exists([tag_id])? {
            return Err(CoreError::NotFound(format!("Tag {} not found", tag_id)));
        }
        insert.execute((recipe_id.to_string(), tag_id))?;
    }
    Ok(())
}

fn insert_ingredients(
    conn: &Connection,
    recipe_id: Uuid,
    lines: &[IngredientAmount],
) -> CoreResult<()> {
    let mut known = conn.prepare_cached("SELECT 1 FROM ingredients WHERE id = ?1")?;
    let mut insert = conn.prepare_cached(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?1, ?2, ?3)",
    )?;

    for line in lines {
        if !known.exists([line.id])? {
            return Err(CoreError::NotFound(format!(
                "Ingredient {} not found",
                line.id
            )));
        }
        insert.execute((recipe_id.to_string(), line.id, line.amount))?;
    }
    Ok(())
}

fn recipe_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecipeRow> {
    Ok(RecipeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        text: row.get(2)?,
        cooking_time: row.get(3)?,
        image: row.get(4)?,
        pub_date: row.get(5)?,
        author: AuthorRow {
            id: row.get(6)?,
            email: row.get(7)?,
            username: row.get(8)?,
            first_name: row.get(9)?,
            last_name: row.get(10)?,
            is_subscribed: row.get(11)?,
        },
        is_favorited: row.get(12)?,
        is_in_shopping_cart: row.get(13)?,
    })
}

pub(crate) fn load_recipe(
    conn: &Connection,
    recipe_id: Uuid,
    requester: Option<Uuid>,
) -> CoreResult<Option<RecipeResponse>> {
    let row = conn
        .query_row(
            &format!("{} WHERE r.id = ?2", RECIPE_SELECT),
            (requester_param(requester), recipe_id.to_string()),
            recipe_from_row,
        )
        .optional()?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

/// Attach tags and ingredient lines to a batch of recipe rows with one query
/// each, instead of two per recipe.
fn hydrate(conn: &Connection, rows: Vec<RecipeRow>) -> CoreResult<Vec<RecipeResponse>> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Value> = rows.iter().map(|r| Value::Text(r.id.clone())).collect();
    let placeholders = vec!["?"; ids.len()].join(", ");

    let mut tags: HashMap<String, Vec<Tag>> = HashMap::new();
    let mut stmt = conn.prepare(&format!(
        "SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
         FROM recipe_tags rt
         JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id IN ({})
         ORDER BY t.id",
        placeholders
    ))?;
    let tag_rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
        Ok((
            row.get::<_, String>(0)?,
            Tag {
                id: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
                slug: row.get(4)?,
            },
        ))
    })?;
    for tag_row in tag_rows {
        let (recipe_id, tag) = tag_row?;
        tags.entry(recipe_id).or_default().push(tag);
    }

    let mut ingredients: HashMap<String, Vec<RecipeIngredient>> = HashMap::new();
    let mut stmt = conn.prepare(&format!(
        "SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
         FROM recipe_ingredients ri
         JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id IN ({})
         ORDER BY ri.id",
        placeholders
    ))?;
    let line_rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
        Ok((
            row.get::<_, String>(0)?,
            RecipeIngredient {
                id: row.get(1)?,
                name: row.get(2)?,
                measurement_unit: row.get(3)?,
                amount: row.get(4)?,
            },
        ))
    })?;
    for line_row in line_rows {
        let (recipe_id, line) = line_row?;
        ingredients.entry(recipe_id).or_default().push(line);
    }

    Ok(rows
        .into_iter()
        .map(|row| RecipeResponse {
            id: parse_uuid(&row.id),
            tags: tags.remove(&row.id).unwrap_or_default(),
            ingredients: ingredients.remove(&row.id).unwrap_or_default(),
            author: row.author.into(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: row.image,
            text: row.text,
            cooking_time: row.cooking_time,
            pub_date: parse_timestamp(&row.pub_date),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{draft, fixture};

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn create_reads_back_every_line() {
        let fx = fixture();
        let d = draft(&[fx.breakfast, fx.dinner], &[(fx.salt, 10), (fx.flour, 500), (fx.milk, 250)]);

        let created = fx.db.create_recipe(fx.alice, &d).unwrap();
        assert_eq!(created.author.id, fx.alice);
        assert_eq!(created.tags.len(), 2);

        let read = fx.db.get_recipe(created.id, None).unwrap().unwrap();
        let lines: Vec<(i64, i64)> = read.ingredients.iter().map(|l| (l.id, l.amount)).collect();
        assert_eq!(lines, vec![(fx.salt, 10), (fx.flour, 500), (fx.milk, 250)]);
        assert_eq!(read.ingredients[0].name, "Salt");
        assert_eq!(read.ingredients[0].measurement_unit, "g");
    }

    #[test]
    fn failure_mid_write_leaves_no_rows() {
        let fx = fixture();
        let d = draft(&[fx.breakfast], &[(fx.salt, 10), (9999, 5)]);

        let err = fx.db.create_recipe(fx.alice, &d).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(count(&fx.db, "recipes"), 0);
        assert_eq!(count(&fx.db, "recipe_tags"), 0);
        assert_eq!(count(&fx.db, "recipe_ingredients"), 0);

        let d = draft(&[fx.breakfast, 4242], &[(fx.salt, 10)]);
        assert!(matches!(
            fx.db.create_recipe(fx.alice, &d),
            Err(CoreError::NotFound(_))
        ));
        assert_eq!(count(&fx.db, "recipes"), 0);
    }

    #[test]
    fn invalid_draft_is_rejected_before_writing() {
        let fx = fixture();
        let mut d = draft(&[fx.breakfast], &[(fx.salt, 10), (fx.salt, 20)]);
        assert!(matches!(
            fx.db.create_recipe(fx.alice, &d),
            Err(CoreError::Validation(_))
        ));

        d = draft(&[fx.breakfast], &[(fx.salt, 10)]);
        d.cooking_time = 0;
        assert!(matches!(
            fx.db.create_recipe(fx.alice, &d),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(count(&fx.db, "recipes"), 0);
    }

    #[test]
    fn update_replaces_lines_and_tags() {
        let fx = fixture();
        let created = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.salt, 10), (fx.flour, 200)]))
            .unwrap();

        let mut d = draft(&[fx.dinner], &[(fx.milk, 300)]);
        d.name = "Pancakes".into();
        let updated = fx.db.update_recipe(fx.alice, created.id, &d).unwrap();
        assert_eq!(updated.name, "Pancakes");
        assert_eq!(updated.pub_date, created.pub_date);

        let read = fx.db.get_recipe(created.id, None).unwrap().unwrap();
        let lines: Vec<i64> = read.ingredients.iter().map(|l| l.id).collect();
        assert_eq!(lines, vec![fx.milk]);
        let tags: Vec<i64> = read.tags.iter().map(|t| t.id).collect();
        assert_eq!(tags, vec![fx.dinner]);
    }

    #[test]
    fn failed_update_keeps_previous_state() {
        let fx = fixture();
        let created = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.salt, 10)]))
            .unwrap();

        let bad = draft(&[fx.dinner], &[(fx.milk, 300), (777, 1)]);
        assert!(fx.db.update_recipe(fx.alice, created.id, &bad).is_err());

        let read = fx.db.get_recipe(created.id, None).unwrap().unwrap();
        assert_eq!(read.ingredients.len(), 1);
        assert_eq!(read.ingredients[0].id, fx.salt);
        assert_eq!(read.tags[0].id, fx.breakfast);
    }

    #[test]
    fn only_author_may_modify() {
        let fx = fixture();
        let created = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.salt, 10)]))
            .unwrap();

        let d = draft(&[fx.breakfast], &[(fx.flour, 10)]);
        assert!(matches!(
            fx.db.update_recipe(fx.bob, created.id, &d),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            fx.db.delete_recipe(fx.bob, created.id),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            fx.db.delete_recipe(fx.alice, Uuid::new_v4()),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_cascades() {
        let fx = fixture();
        let created = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.salt, 10)]))
            .unwrap();
        fx.db.favorite_recipe(fx.bob, created.id).unwrap();
        fx.db.add_to_shopping_list(fx.bob, created.id).unwrap();

        fx.db.delete_recipe(fx.alice, created.id).unwrap();
        assert!(fx.db.get_recipe(created.id, None).unwrap().is_none());
        for table in ["recipe_tags", "recipe_ingredients", "favorites", "shopping_list"] {
            assert_eq!(count(&fx.db, table), 0, "{} not cleaned up", table);
        }
    }

    #[test]
    fn list_filters_combine() {
        let fx = fixture();
        let porridge = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.milk, 200)]))
            .unwrap();
        let stew = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.dinner], &[(fx.salt, 5)]))
            .unwrap();
        let toast = fx
            .db
            .create_recipe(fx.bob, &draft(&[fx.breakfast], &[(fx.flour, 100)]))
            .unwrap();
        fx.db.favorite_recipe(fx.bob, porridge.id).unwrap();

        let ids = |filter: &RecipeFilter, requester: Option<Uuid>| -> Vec<Uuid> {
            let mut ids: Vec<Uuid> = fx
                .db
                .list_recipes(filter, requester)
                .unwrap()
                .into_iter()
                .map(|r| r.id)
                .collect();
            ids.sort();
            ids
        };
        let sorted = |mut v: Vec<Uuid>| {
            v.sort();
            v
        };

        let all = ids(&RecipeFilter::default(), None);
        assert_eq!(all, sorted(vec![porridge.id, stew.id, toast.id]));

        let breakfast = RecipeFilter {
            tags: vec!["breakfast".into()],
            ..Default::default()
        };
        assert_eq!(ids(&breakfast, None), sorted(vec![porridge.id, toast.id]));

        let either = RecipeFilter {
            tags: vec!["breakfast".into(), "dinner".into()],
            ..Default::default()
        };
        assert_eq!(ids(&either, None).len(), 3);

        let alices_breakfast = RecipeFilter {
            tags: vec!["breakfast".into()],
            author: Some(fx.alice),
            ..Default::default()
        };
        assert_eq!(ids(&alices_breakfast, None), vec![porridge.id]);

        let favorited = RecipeFilter {
            is_favorited: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(&favorited, Some(fx.bob)), vec![porridge.id]);
        assert_eq!(ids(&favorited, None), all);
    }

    #[test]
    fn cart_filter_follows_requester() {
        let fx = fixture();
        let porridge = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.milk, 200)]))
            .unwrap();
        let stew = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.dinner], &[(fx.salt, 5)]))
            .unwrap();
        let toast = fx
            .db
            .create_recipe(fx.bob, &draft(&[fx.breakfast], &[(fx.flour, 100)]))
            .unwrap();
        fx.db.add_to_shopping_list(fx.bob, porridge.id).unwrap();
        fx.db.add_to_shopping_list(fx.bob, toast.id).unwrap();
        fx.db.add_to_shopping_list(fx.alice, stew.id).unwrap();

        let ids = |filter: &RecipeFilter, requester: Option<Uuid>| -> Vec<Uuid> {
            let mut ids: Vec<Uuid> = fx
                .db
                .list_recipes(filter, requester)
                .unwrap()
                .into_iter()
                .map(|r| r.id)
                .collect();
            ids.sort();
            ids
        };
        let mut bobs_cart = vec![porridge.id, toast.id];
        bobs_cart.sort();

        let in_cart = RecipeFilter {
            is_in_shopping_cart: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(&in_cart, Some(fx.bob)), bobs_cart);
        assert_eq!(ids(&in_cart, Some(fx.alice)), vec![stew.id]);
        assert_eq!(
            ids(&in_cart, None),
            ids(&RecipeFilter::default(), None)
        );
        assert_eq!(ids(&in_cart, None).len(), 3);
    }

    #[test]
    fn flags_are_relative_to_requester() {
        let fx = fixture();
        let created = fx
            .db
            .create_recipe(fx.alice, &draft(&[fx.breakfast], &[(fx.salt, 10)]))
            .unwrap();
        fx.db.favorite_recipe(fx.bob, created.id).unwrap();

        let for_bob = fx.db.get_recipe(created.id, Some(fx.bob)).unwrap().unwrap();
        assert!(for_bob.is_favorited);
        assert!(!for_bob.is_in_shopping_cart);

        let for_alice = fx.db.get_recipe(created.id, Some(fx.alice)).unwrap().unwrap();
        assert!(!for_alice.is_favorited);
    }
}
