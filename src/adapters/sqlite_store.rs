//! SQLite-backed [`ListingStore`].
//!
//! A single connection guarded by a mutex; every query runs on the blocking
//! pool so request tasks never hold the runtime while SQLite works. Images and
//! tags are stored as JSON arrays next to the scalar columns, which keeps an
//! update a single statement.

use crate::domain::model::{Listing, ListingSummary, ListingUpdate};
use crate::domain::ports::ListingStore;
use crate::utils::error::{ListingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const LISTING_COLUMNS: &str =
    "id, title, description, price_range, images, tags, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteListingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteListingStore {
    /// Opens (or creates) the database file, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::info!("Listing database opened at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| ListingError::Internal {
                message: "listing store connection poisoned".to_string(),
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| ListingError::Internal {
            message: format!("listing store task failed: {}", e),
        })?
    }
}

fn register_functions(conn: &Connection) -> Result<()> {
    // SQLite's LIKE/lower() only fold ASCII; titles are often not ASCII.
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: String = ctx.get(0)?;
            let needle: String = ctx.get(1)?;
            Ok(haystack.to_lowercase().contains(&needle.to_lowercase()))
        },
    )?;
    Ok(())
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS listings (
            id              TEXT PRIMARY KEY NOT NULL,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL,
            price_range     TEXT NOT NULL,
            images          TEXT NOT NULL DEFAULT '[]',
            tags            TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    Ok(Listing {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price_range: row.get(3)?,
        images: json_column(row, 4)?,
        tags: json_column(row, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn select_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Listing>> {
    conn.query_row(
        &format!("SELECT {} FROM listings WHERE id = ?1", LISTING_COLUMNS),
        [id],
        listing_from_row,
    )
    .optional()
}

#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<ListingSummary>> {
        let query = query.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title FROM listings
                 WHERE contains_ci(title, ?1)
                 ORDER BY rowid
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![query, limit], |row| {
                Ok(ListingSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                })
            })?;

            let mut summaries = Vec::new();
            for summary in rows {
                summaries.push(summary?);
            }
            Ok(summaries)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM listings ORDER BY rowid",
                LISTING_COLUMNS
            ))?;
            let rows = stmt.query_map([], listing_from_row)?;

            let mut listings = Vec::new();
            for listing in rows {
                listings.push(listing?);
            }
            Ok(listings)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Listing>> {
        let id = id.to_string();
        self.with_conn(move |conn| Ok(select_by_id(conn, &id)?)).await
    }

    async fn insert(&self, listing: Listing) -> Result<Listing> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO listings (id, title, description, price_range, images, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    listing.id,
                    listing.title,
                    listing.description,
                    listing.price_range,
                    serde_json::to_string(&listing.images)?,
                    serde_json::to_string(&listing.tags)?,
                    listing.created_at,
                    listing.updated_at,
                ],
            )?;
            Ok(listing)
        })
        .await
    }

    async fn update(&self, update: ListingUpdate, now: DateTime<Utc>) -> Result<Option<Listing>> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE listings
                 SET title = ?2,
                     description = ?3,
                     price_range = COALESCE(?4, price_range),
                     images = ?5,
                     tags = ?6,
                     updated_at = ?7
                 WHERE id = ?1",
                params![
                    update.id,
                    update.title,
                    update.description,
                    update.price_range,
                    serde_json::to_string(&update.images)?,
                    serde_json::to_string(&update.tags)?,
                    now,
                ],
            )?;

            if changed == 0 {
                return Ok(None);
            }
            Ok(select_by_id(conn, &update.id)?)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM listings WHERE id = ?1", [&id])?;
            Ok(removed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn listing(id: &str, title: &str) -> Listing {
        let now = Utc::now();
        Listing {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{} description", title),
            price_range: "₹5,00,000 - ₹10,00,000".to_string(),
            images: vec![format!("/images/{}.jpg", id)],
            tags: vec!["petrol".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip_fields() {
        let store = SqliteListingStore::open_in_memory().unwrap();
        let inserted = store.insert(listing("1", "Maruti Suzuki Swift")).await.unwrap();

        let fetched = store.get("1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Maruti Suzuki Swift");
        assert_eq!(fetched.images, vec!["/images/1.jpg"]);
        assert_eq!(fetched.tags, vec!["petrol"]);
        assert_eq!(fetched.created_at, inserted.created_at);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_limited() {
        let store = SqliteListingStore::open_in_memory().unwrap();
        store.insert(listing("1", "Maruti Suzuki Swift")).await.unwrap();
        store.insert(listing("2", "Tata Nexon")).await.unwrap();
        for i in 0..15 {
            store
                .insert(listing(&format!("s{}", i), &format!("Swift Dzire {}", i)))
                .await
                .unwrap();
        }

        let results = store.search_titles("swift", 10).await.unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(results[0].id, "1");
        assert!(results.iter().all(|r| r.title.to_lowercase().contains("swift")));

        let results = store.search_titles("NEXON", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Tata Nexon");
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let store = SqliteListingStore::open_in_memory().unwrap();
        store.insert(listing("1", "ŠKODA Octavia")).await.unwrap();

        let results = store.search_titles("škoda", 10).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let store = SqliteListingStore::open_in_memory().unwrap();
        store.insert(listing("1", "Tata Nexon")).await.unwrap();

        assert!(store.search_titles("%", 10).await.unwrap().is_empty());
        assert!(store.search_titles("T_ta", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_fields_and_keeps_price_when_absent() {
        let store = SqliteListingStore::open_in_memory().unwrap();
        let original = store.insert(listing("1", "Tata Nexon")).await.unwrap();

        let update = ListingUpdate {
            id: "1".to_string(),
            title: "Tata Nexon EV".to_string(),
            description: "Electric compact SUV".to_string(),
            price_range: None,
            tags: vec!["electric".to_string()],
            images: vec![],
        };
        let updated = store.update(update, Utc::now()).await.unwrap().unwrap();

        assert_eq!(updated.id, "1");
        assert_eq!(updated.title, "Tata Nexon EV");
        assert_eq!(updated.price_range, original.price_range);
        assert_eq!(updated.tags, vec!["electric"]);
        assert!(updated.images.is_empty());
        assert_eq!(updated.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_listing() {
        let store = SqliteListingStore::open_in_memory().unwrap();
        let update = ListingUpdate {
            id: "ghost".to_string(),
            title: "Ghost".to_string(),
            description: "None".to_string(),
            ..Default::default()
        };

        assert!(store.update(update, Utc::now()).await.unwrap().is_none());
        assert!(!store.delete("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cars.db");

        {
            let store = SqliteListingStore::open(&path).unwrap();
            store.insert(listing("b", "Hyundai Creta")).await.unwrap();
            store.insert(listing("a", "Mahindra XUV700")).await.unwrap();
            assert!(store.delete("b").await.unwrap());
            store.insert(listing("c", "Kia Seltos")).await.unwrap();
        }

        let store = SqliteListingStore::open(&path).unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
