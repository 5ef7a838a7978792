use anyhow::{Context, Result};
use rusqlite::OptionalExtension;

use super::JokeStore;

impl JokeStore {
    /// Timestamp of the previous startup, if the bot has run before.
    pub async fn last_run(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT val FROM info WHERE name = 'lastrun' LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to read last-run record")
    }

    /// First startup: create the single last-run record.
    pub async fn record_first_run(&self, timestamp: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO info (name, val) VALUES ('lastrun', ?1)",
            rusqlite::params![timestamp],
        )
        .context("Failed to insert last-run record")?;
        Ok(())
    }

    /// Every later startup: overwrite the record in place.
    pub async fn touch_last_run(&self, timestamp: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE info SET val = ?1 WHERE name = 'lastrun'",
            rusqlite::params![timestamp],
        )
        .context("Failed to update last-run record")?;
        Ok(())
    }
}
