pub mod jokes;
pub mod meta;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// SQLite store holding the joke table and the single-row run metadata.
/// The connection is opened once at startup and shared for the process
/// lifetime.
#[derive(Clone)]
pub struct JokeStore {
    conn: Arc<Mutex<Connection>>,
}

impl JokeStore {
    /// Open the joke database at the given path. The database is seeded
    /// externally; a missing file is a configuration error, not something
    /// to silently create empty.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "database path \"{}\" does not exist or is not readable",
                path.display()
            );
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("joke store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // Seeded databases predate the bot, so migrations only ensure the
    // tables exist; they never touch seeded rows.
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS jokes (
                id INTEGER PRIMARY KEY,
                joke TEXT,
                used INTEGER DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS info (
                name TEXT,
                val TEXT
            );
            ",
        )
        .context("Failed to run store migrations")?;

        Ok(())
    }

    #[allow(dead_code)]
    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}
