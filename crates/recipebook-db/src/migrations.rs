use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Dropped without commit on error, which rolls the whole step back
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                username    TEXT NOT NULL UNIQUE,
                first_name  TEXT NOT NULL DEFAULT '',
                last_name   TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE tags (
                id      INTEGER PRIMARY KEY,
                name    TEXT NOT NULL UNIQUE,
                color   TEXT NOT NULL DEFAULT '#FF0000',
                slug    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE ingredients (
                id                  INTEGER PRIMARY KEY,
                name                TEXT NOT NULL,
                measurement_unit    TEXT NOT NULL
            );

            CREATE INDEX idx_ingredients_name ON ingredients(name);

            CREATE TABLE recipes (
                id              TEXT PRIMARY KEY,
                author_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                text            TEXT NOT NULL,
                cooking_time    INTEGER NOT NULL CHECK (cooking_time BETWEEN 1 AND 600),
                image           TEXT,
                pub_date        TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_recipes_author ON recipes(author_id, pub_date);

            CREATE TABLE recipe_tags (
                recipe_id   TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                tag_id      INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (recipe_id, tag_id)
            );

            CREATE TABLE recipe_ingredients (
                id              INTEGER PRIMARY KEY,
                recipe_id       TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                ingredient_id   INTEGER NOT NULL REFERENCES ingredients(id) ON DELETE CASCADE,
                amount          INTEGER NOT NULL CHECK (amount BETWEEN 1 AND 3000),
                UNIQUE(recipe_id, ingredient_id)
            );

            CREATE TABLE follows (
                id          INTEGER PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                CHECK (user_id <> author_id),
                UNIQUE(user_id, author_id)
            );

            CREATE TABLE favorites (
                id          INTEGER PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                recipe_id   TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                UNIQUE(user_id, recipe_id)
            );

            CREATE TABLE shopping_list (
                id          INTEGER PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                recipe_id   TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                UNIQUE(user_id, recipe_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
