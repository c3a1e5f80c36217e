//! Place store persisted in a `DuckDB` file.
//!
//! Records are kept as whole JSON payloads next to their id and
//! coordinates, so an upsert always replaces the complete record.
//!
//! The database can be opened synchronously with [`DuckDbPlaceStore::open`]
//! or on a background thread with [`DuckDbPlaceStore::open_in_background`].
//! In the latter case every operation waits (bounded) for the open to
//! finish before touching the connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use duckdb::Connection;
use tech_map_place_models::Place;

use crate::{PlaceStore, READY_POLL_INTERVAL, StoreError};

/// Default bound on how long operations wait for a background open.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    conn: OnceLock<Mutex<Connection>>,
    failure: OnceLock<String>,
    ready_timeout: Duration,
}

/// A [`PlaceStore`] backed by a `DuckDB` database file.
#[derive(Debug, Clone)]
pub struct DuckDbPlaceStore {
    inner: Arc<Inner>,
}

impl DuckDbPlaceStore {
    /// Opens (or creates) the store at `path`, blocking until the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory cannot be created or the
    /// database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let store = Self::unopened(path.to_path_buf(), DEFAULT_READY_TIMEOUT);
        let conn = open_connection(path)?;
        // Freshly created lock, so this cannot already be set.
        let _ = store.inner.conn.set(Mutex::new(conn));
        log::info!("Opened place store at {}", path.display());
        Ok(store)
    }

    /// Opens the store at the default data path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&crate::paths::place_store_db_path())
    }

    /// Starts opening the store on a background thread and returns
    /// immediately. Operations wait up to `ready_timeout` for the open to
    /// complete.
    #[must_use]
    pub fn open_in_background(path: PathBuf, ready_timeout: Duration) -> Self {
        let store = Self::unopened(path, ready_timeout);
        let inner = Arc::clone(&store.inner);

        std::thread::spawn(move || match open_connection(&inner.path) {
            Ok(conn) => {
                let _ = inner.conn.set(Mutex::new(conn));
                log::info!("Opened place store at {}", inner.path.display());
            }
            Err(e) => {
                log::error!("Failed to open place store at {}: {e}", inner.path.display());
                let _ = inner.failure.set(e.to_string());
            }
        });

        store
    }

    fn unopened(path: PathBuf, ready_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                conn: OnceLock::new(),
                failure: OnceLock::new(),
                ready_timeout,
            }),
        }
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn ensure_ready(&self) -> Result<(), StoreError> {
        self.wait_until_ready(self.inner.ready_timeout).await
    }

    fn open_failure(&self) -> Option<StoreError> {
        self.inner.failure.get().map(|message| StoreError::OpenFailed {
            message: message.clone(),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        self.ensure_ready().await?;
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let Some(conn) = inner.conn.get() else {
                return Err(StoreError::NotReady {
                    seconds: inner.ready_timeout.as_secs(),
                });
            };
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await?
    }
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS places (
            id TEXT PRIMARY KEY,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL,
            payload TEXT NOT NULL,
            stored_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}

#[async_trait]
impl PlaceStore for DuckDbPlaceStore {
    fn is_ready(&self) -> bool {
        self.inner.conn.get().is_some()
    }

    /// Stops waiting as soon as the background open has failed.
    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), StoreError> {
        let started = Instant::now();
        loop {
            if self.is_ready() {
                return Ok(());
            }
            if let Some(e) = self.open_failure() {
                return Err(e);
            }
            if started.elapsed() >= timeout {
                return Err(StoreError::NotReady {
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn store_places(&self, places: &[Place]) -> Result<(), StoreError> {
        if places.is_empty() {
            return Ok(());
        }

        let rows = places
            .iter()
            .map(|p| Ok((p.id.clone(), p.latitude, p.longitude, serde_json::to_string(p)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO places (id, latitude, longitude, payload)
                     VALUES (?, ?, ?, ?)",
                )?;
                for (id, lat, lng, payload) in &rows {
                    stmt.execute(duckdb::params![id, lat, lng, payload])?;
                }
            }
            tx.commit()?;
            log::debug!("Stored {} places", rows.len());
            Ok(())
        })
        .await
    }

    async fn get_places(&self, ids: &[String]) -> Result<Vec<Place>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let mut payloads: HashMap<String, String> = HashMap::new();

            for chunk in ids.chunks(1000) {
                let placeholders: String =
                    chunk.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                let sql = format!("SELECT id, payload FROM places WHERE id IN ({placeholders})");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(duckdb::params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (id, payload) = row?;
                    payloads.insert(id, payload);
                }
            }

            ids.iter()
                .filter_map(|id| payloads.get(id))
                .map(|payload| Ok(serde_json::from_str::<Place>(payload)?))
                .collect()
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM places", [])?;
            log::info!("Cleared place store");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use tech_map_place_models::TechType;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tech_map_store_test_{}_{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("places.duckdb")
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    fn place(id: &str, tech: TechType) -> Place {
        let mut p = Place::new(id, -33.81, 151.18);
        p.tech_type = tech;
        p.address1 = format!("{id} Example St");
        p
    }

    #[tokio::test]
    async fn stores_and_reads_back_whole_records() {
        let path = temp_path("roundtrip");
        let store = DuckDbPlaceStore::open(&path).unwrap();

        store
            .store_places(&[place("LOC1", TechType::Fttp), place("LOC2", TechType::Hfc)])
            .await
            .unwrap();
        store.store_place(&place("LOC1", TechType::Fttn)).await.unwrap();

        let ids = vec!["LOC2".to_owned(), "nope".to_owned(), "LOC1".to_owned()];
        let got = store.get_places(&ids).await.unwrap();

        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, "LOC2");
        assert_eq!(got[1].tech_type, TechType::Fttn);
        assert_eq!(store.count().await.unwrap(), 2);

        cleanup(&path);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let path = temp_path("reopen");
        {
            let store = DuckDbPlaceStore::open(&path).unwrap();
            store.store_place(&place("LOC9", TechType::Wireless)).await.unwrap();
        }

        let store = DuckDbPlaceStore::open(&path).unwrap();
        let got = store.get_place("LOC9").await.unwrap().unwrap();
        assert_eq!(got.address1, "LOC9 Example St");

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        cleanup(&path);
    }

    #[tokio::test]
    async fn background_open_becomes_ready() {
        let path = temp_path("background");
        let store = DuckDbPlaceStore::open_in_background(path.clone(), Duration::from_secs(10));

        store.store_place(&place("LOC3", TechType::Fttc)).await.unwrap();
        assert!(store.is_ready());
        assert_eq!(store.count().await.unwrap(), 1);

        cleanup(&path);
    }

    #[tokio::test]
    async fn failed_background_open_is_reported() {
        let dir = std::env::temp_dir().join(format!(
            "tech_map_store_test_{}_blocked",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = DuckDbPlaceStore::open_in_background(
            blocker.join("places.duckdb"),
            Duration::from_millis(300),
        );

        let err = store.count().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::OpenFailed { .. } | StoreError::NotReady { .. }
        ));
        assert!(!store.is_ready());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn wait_reports_failed_open_before_the_timeout() {
        let dir = std::env::temp_dir().join(format!(
            "tech_map_store_test_{}_blocked_wait",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = DuckDbPlaceStore::open_in_background(
            blocker.join("places.duckdb"),
            Duration::from_secs(60),
        );

        let started = Instant::now();
        let err = store
            .wait_until_ready(Duration::from_secs(60))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::OpenFailed { .. }));
        assert!(started.elapsed() < Duration::from_secs(30));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
