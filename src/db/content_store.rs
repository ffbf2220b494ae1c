use crate::types::{AppError, ContentItem, Result};
use libsql::{Builder, Connection, Database, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Where the content table lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreProvider {
    /// In-memory SQLite database (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based SQLite database, shared across runs
    Local {
        /// Path to the SQLite database file
        path: String,
    },
}

impl StoreProvider {
    /// Pick a provider from a configured path; `:memory:` or an empty path
    /// selects the in-memory database.
    pub fn from_path(path: &str) -> Self {
        if path.is_empty() || path == ":memory:" {
            StoreProvider::Memory
        } else {
            StoreProvider::Local {
                path: path.to_string(),
            }
        }
    }

    pub async fn open(&self) -> Result<ContentStore> {
        match self {
            StoreProvider::Memory => ContentStore::new_memory().await,
            StoreProvider::Local { path } => ContentStore::new_local(path).await,
        }
    }
}

/// Counters for store activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// `get_by_url` lookups that found a row
    pub url_hits: u64,
    /// `get_by_url` lookups that found nothing
    pub url_misses: u64,
    /// Completed upserts
    pub upserts: u64,
}

/// Deduplicating, URL-keyed cache of retrieved documents.
///
/// All reads and writes go through one connection behind one lock, so an
/// upsert on a URL is atomic with respect to any other store operation.
pub struct ContentStore {
    _db: Database,
    conn: Mutex<Connection>,
    url_hits: AtomicU64,
    url_misses: AtomicU64,
    upserts: AtomicU64,
}

const SELECT_COLUMNS: &str = "SELECT id, url, title, snippet, content, source FROM content";

impl ContentStore {
    /// Open an in-memory store. Its contents die with the process.
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_database(db).await
    }

    /// Open (or create) a store backed by a local SQLite file.
    pub async fn new_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open {}: {}", path.display(), e)))?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS content (
                id TEXT PRIMARY KEY,
                url TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL,
                snippet TEXT NOT NULL,
                content TEXT NOT NULL,
                source TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create content table: {}", e)))?;

        Ok(Self {
            _db: db,
            conn: Mutex::new(conn),
            url_hits: AtomicU64::new(0),
            url_misses: AtomicU64::new(0),
            upserts: AtomicU64::new(0),
        })
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(&format!("{} WHERE id = ?", SELECT_COLUMNS), [id])
            .await
            .map_err(|e| AppError::Database(format!("Failed to query content by id: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<ContentItem>> {
        let item = {
            let conn = self.conn.lock().await;
            let mut rows = conn
                .query(&format!("{} WHERE url = ?", SELECT_COLUMNS), [url])
                .await
                .map_err(|e| AppError::Database(format!("Failed to query content by url: {}", e)))?;

            match rows
                .next()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
            {
                Some(row) => Some(row_to_item(&row)?),
                None => None,
            }
        };

        if item.is_some() {
            self.url_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.url_misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(item)
    }

    /// Insert the item, or replace every field of the row holding the same
    /// URL. The caller's id wins.
    pub async fn upsert(&self, item: &ContentItem) -> Result<()> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO content (id, url, title, snippet, content, source)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(url) DO UPDATE SET
                    id = excluded.id,
                    title = excluded.title,
                    snippet = excluded.snippet,
                    content = excluded.content,
                    source = excluded.source",
                (
                    item.id.as_str(),
                    item.url.as_str(),
                    item.title.as_str(),
                    item.snippet.as_str(),
                    item.content.as_str(),
                    item.source.as_str(),
                ),
            )
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to upsert content {}: {}", item.url, e))
            })?;
        }

        self.upserts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id = %item.id, url = %item.url, "Content upserted");
        Ok(())
    }

    /// Remove a row by id. Returns whether anything was deleted.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute("DELETE FROM content WHERE id = ?", [id])
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete content {}: {}", id, e)))?;
        Ok(affected > 0)
    }

    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM content", ())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count content: {}", e)))?;

        let count: i64 = match rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Some(row) => row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
            None => 0,
        };
        Ok(count.max(0) as usize)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            url_hits: self.url_hits.load(Ordering::Relaxed),
            url_misses: self.url_misses.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
        }
    }
}

fn row_to_item(row: &Row) -> Result<ContentItem> {
    Ok(ContentItem {
        id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
        url: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
        title: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
        snippet: row.get(3).map_err(|e| AppError::Database(e.to_string()))?,
        content: row.get(4).map_err(|e| AppError::Database(e.to_string()))?,
        source: row.get(5).map_err(|e| AppError::Database(e.to_string()))?,
    })
}
