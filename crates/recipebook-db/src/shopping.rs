use recipebook_types::shopping::{CartLine, aggregate, render};
use uuid::Uuid;

use crate::{CoreResult, Database};

impl Database {
    /// Plain-text shopping list for every recipe in the user's cart.
    pub fn build_shopping_list(&self, user: Uuid) -> CoreResult<String> {
        let lines = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.name, i.measurement_unit, ri.amount
                 FROM shopping_list s
                 JOIN recipe_ingredients ri ON ri.recipe_id = s.recipe_id
                 JOIN ingredients i ON i.id = ri.ingredient_id
                 WHERE s.user_id = ?1",
            )?;
            let rows = stmt
                .query_map([user.to_string()], |row| {
                    Ok(CartLine {
                        name: row.get(0)?,
                        measurement_unit: row.get(1)?,
                        amount: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(render(&aggregate(lines)))
    }
}
