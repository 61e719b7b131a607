use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use rusqlite::{Connection, OptionalExtension as _, params};

use crate::error::StoreError;

/// Name of the bucket holding nickname → Trakt username pairs.
pub const BUCKET: &str = "trakt";

/// SQLite-backed nickname store.
///
/// Each `get`/`set` is a single statement in autocommit mode, so a successful
/// `set` is on disk when it returns. Statements run on the blocking pool.
#[derive(Debug, Clone)]
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
}

impl UserStore {
    /// Open (or create) the store at `path` and make sure the bucket exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(open_err)?;
        create_bucket(&conn).map_err(open_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (for tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Query)?;
        create_bucket(&conn).map_err(StoreError::Query)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Trakt username registered for `nick`, if any.
    pub async fn get(&self, nick: &str) -> Result<Option<String>, StoreError> {
        let nick = nick.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT value FROM {BUCKET} WHERE key = ?1"),
                params![nick],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    /// Register `user` for `nick`, replacing any earlier value.
    pub async fn set(&self, nick: &str, user: &str) -> Result<(), StoreError> {
        let (nick, user) = (nick.to_owned(), user.to_owned());
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {BUCKET} (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value"
                ),
                params![nick, user],
            )
        })
        .await?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            // statements are atomic, a poisoned lock holds no partial state
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(StoreError::Task)?
        .map_err(StoreError::Query)
    }
}

fn create_bucket(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {BUCKET} (
            key   TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        );"
    ))
}
