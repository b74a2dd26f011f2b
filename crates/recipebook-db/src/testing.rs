use recipebook_types::api::{IngredientAmount, RecipeDraft};
use uuid::Uuid;

use crate::Database;

pub(crate) struct Fixture {
    pub db: Database,
    pub alice: Uuid,
    pub bob: Uuid,
    pub breakfast: i64,
    pub dinner: i64,
    pub salt: i64,
    pub flour: i64,
    pub milk: i64,
}

pub(crate) fn fixture() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let alice = db.create_user("alice@example.com", "alice", "Alice", "A").unwrap().id;
    let bob = db.create_user("bob@example.com", "bob", "Bob", "B").unwrap().id;
    let breakfast = db.create_tag("Breakfast", "#E26C2D", "breakfast").unwrap().id;
    let dinner = db.create_tag("Dinner", "#8775D2", "dinner").unwrap().id;
    let salt = db.create_ingredient("Salt", "g").unwrap().id;
    let flour = db.create_ingredient("Flour", "g").unwrap().id;
    let milk = db.create_ingredient("Milk", "ml").unwrap().id;

    Fixture {
        db,
        alice,
        bob,
        breakfast,
        dinner,
        salt,
        flour,
        milk,
    }
}

pub(crate) fn draft(tags: &[i64], lines: &[(i64, i64)]) -> RecipeDraft {
    RecipeDraft {
        name: "Test recipe".into(),
        text: "Mix and cook.".into(),
        cooking_time: 15,
        image: None,
        tags: tags.to_vec(),
        ingredients: lines
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
    }
}
