use anyhow::{Context, Result};
use rusqlite::OptionalExtension;

use super::JokeStore;

/// A joke row as selected for delivery
#[derive(Debug, Clone)]
pub struct Joke {
    pub id: i64,
    pub text: String,
}

impl JokeStore {
    /// Pick the next joke for delivery: the least-used one, chosen
    /// uniformly at random among rows sharing the minimum usage count.
    /// Returns `None` when the table is empty.
    pub async fn next_joke(&self) -> Result<Option<Joke>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, joke FROM jokes ORDER BY used ASC, RANDOM() LIMIT 1",
            [],
            |row| {
                Ok(Joke {
                    id: row.get(0)?,
                    text: row.get(1)?,
                })
            },
        )
        .optional()
        .context("Failed to select next joke")
    }

    /// Record a delivery. Usage counts only ever go up.
    pub async fn mark_used(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE jokes SET used = used + 1 WHERE id = ?1",
            rusqlite::params![id],
        )
        .context("Failed to increment joke usage")?;
        Ok(())
    }

    /// Add a joke to the rotation. Seeding tools use this; the bot itself
    /// never inserts.
    #[allow(dead_code)]
    pub async fn insert_joke(&self, text: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO jokes (joke) VALUES (?1)",
            rusqlite::params![text],
        )
        .context("Failed to insert joke")?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn count_jokes(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT count(*) FROM jokes", [], |row| row.get(0))
            .context("Failed to count jokes")
    }

    /// Sum of all usage counters, for diagnostics.
    pub async fn total_usage(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT coalesce(sum(used), 0) FROM jokes", [], |row| {
            row.get(0)
        })
        .context("Failed to sum joke usage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> JokeStore {
        let store = JokeStore::open_in_memory().unwrap();
        store.insert_joke("Chuck Norris counted to infinity. Twice.").await.unwrap();
        store.insert_joke("Chuck Norris can divide by zero.").await.unwrap();
        store.insert_joke("Chuck Norris can unit test entire applications with a single assert.").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_next_joke_empty_table() {
        let store = JokeStore::open_in_memory().unwrap();
        assert!(store.next_joke().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_joke_prefers_least_used() {
        let store = seeded_store().await;

        // Push jokes 1 and 3 ahead of joke 2
        store.mark_used(1).await.unwrap();
        store.mark_used(1).await.unwrap();
        store.mark_used(3).await.unwrap();

        let joke = store.next_joke().await.unwrap().unwrap();
        assert_eq!(joke.id, 2);
    }

    #[tokio::test]
    async fn test_next_joke_breaks_ties_within_minimum() {
        let store = seeded_store().await;
        store.mark_used(1).await.unwrap();

        // Jokes 2 and 3 both sit at zero; either may come back, but never 1
        for _ in 0..10 {
            let joke = store.next_joke().await.unwrap().unwrap();
            assert_ne!(joke.id, 1);
        }
    }

    #[tokio::test]
    async fn test_usage_sum_grows_by_one_per_delivery() {
        let store = seeded_store().await;
        let before = store.total_usage().await.unwrap();

        for _ in 0..5 {
            let joke = store.next_joke().await.unwrap().unwrap();
            store.mark_used(joke.id).await.unwrap();
        }

        assert_eq!(store.total_usage().await.unwrap(), before + 5);
        // Rotation never inserts or deletes
        assert_eq!(store.count_jokes().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_mark_used_is_monotonic() {
        let store = seeded_store().await;
        store.mark_used(2).await.unwrap();
        store.mark_used(2).await.unwrap();

        let conn = store.connection();
        let conn = conn.lock().await;
        let used: i64 = conn
            .query_row("SELECT used FROM jokes WHERE id = 2", [], |row| row.get(0))
            .unwrap();
        assert_eq!(used, 2);
    }
}
