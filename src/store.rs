//! Persistent photo store backed by SQLite.
//!
//! One table holds every saved photo; a second holds the last submitted form
//! values so the next capture starts prefilled.
//!
//! ```text
//! photos(id INTEGER PRIMARY KEY AUTOINCREMENT,
//!        image BLOB, metadata TEXT /* JSON */, timestamp INTEGER /* epoch ms */,
//!        display_date TEXT)
//!   idx_photos_timestamp ON photos(timestamp)
//!
//! form_defaults(slot INTEGER PRIMARY KEY CHECK (slot = 1), form TEXT /* JSON */)
//! ```
//!
//! ## Pagination
//!
//! The gallery pages newest-first while photos may be saved or deleted
//! between two page reads. A walk is pinned to a [`Snapshot`], the highest id
//! present when its first page was read, and continues from a [`PageCursor`]
//! holding the `(timestamp, id)` of the last record emitted. Ids only grow,
//! so the snapshot fixes which records belong to the walk; the cursor is a
//! position in the sort order rather than a row count, so deleting an
//! already-listed record cannot shift later ones out of view. Records saved
//! after the snapshot are fetched separately with
//! [`PhotoStore::newer_than`]; [`GalleryPager`] stitches the two together.
//!
//! ## Concurrency
//!
//! The connection sits behind a mutex and every call runs on tokio's
//! blocking pool. Each public mutation is a single statement or a single
//! transaction and broadcasts exactly one [`StoreEvent`].

use crate::types::{FormInput, InspectionMetadata};
use chrono::{DateTime, Local};
use rusqlite::{Connection, OptionalExtension, params};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("photo store unavailable: {0}")]
    Unavailable(String),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Layout used for the human-readable `display_date` column.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// A saved photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub id: i64,
    pub image: Vec<u8>,
    pub metadata: InspectionMetadata,
    pub captured_at_ms: i64,
    pub display_date: String,
}

/// Change notification, one per mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Inserted { id: i64 },
    Deleted { ids: Vec<i64> },
}

/// Upper bound of the id range a paged read is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Snapshot(pub i64);

/// Where a paged walk resumes: strictly after `(timestamp, id)` in
/// newest-first order, within `snapshot`.
///
/// Rendered as `snapshot:timestamp:id` so the CLI can hand it back.
///
/// ```
/// use gdr_cam::store::{PageCursor, Snapshot};
///
/// let cursor: PageCursor = "12:1760790645000:9".parse().unwrap();
/// assert_eq!(cursor.snapshot, Snapshot(12));
/// assert_eq!(cursor.to_string(), "12:1760790645000:9");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub snapshot: Snapshot,
    pub timestamp: i64,
    pub id: i64,
}

impl PageCursor {
    fn after(snapshot: Snapshot, record: &PhotoRecord) -> Self {
        Self {
            snapshot,
            timestamp: record.captured_at_ms,
            id: record.id,
        }
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.snapshot.0, self.timestamp, self.id)
    }
}

impl FromStr for PageCursor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [snapshot, timestamp, id] = parts.as_slice() else {
            return Err(format!("expected snapshot:timestamp:id, got {s:?}"));
        };
        let num = |v: &str| v.parse::<i64>().map_err(|e| format!("{v:?}: {e}"));
        Ok(Self {
            snapshot: Snapshot(num(snapshot)?),
            timestamp: num(timestamp)?,
            id: num(id)?,
        })
    }
}

/// One page of newest-first records.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<PhotoRecord>,
    pub has_more: bool,
    pub snapshot: Snapshot,
    /// Resume point for the following page; `None` only when the walk has
    /// not emitted anything yet.
    pub next: Option<PageCursor>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS photos (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    image         BLOB NOT NULL,
    metadata      TEXT NOT NULL,
    timestamp     INTEGER NOT NULL,
    display_date  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_photos_timestamp ON photos(timestamp);
CREATE TABLE IF NOT EXISTS form_defaults (
    slot  INTEGER PRIMARY KEY CHECK (slot = 1),
    form  TEXT NOT NULL
);
";

const EVENT_CAPACITY: usize = 64;

/// Handle to the photo database. Cheap to clone; clones share the connection
/// and the notification channel.
#[derive(Clone)]
pub struct PhotoStore {
    conn: Arc<Mutex<Option<Connection>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl PhotoStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::init(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        info!("photo store ready");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            events,
        })
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Close the connection. Every later call fails with
    /// [`StoreError::Unavailable`].
    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        if guard.take().is_some() {
            info!("photo store closed");
        }
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|p| p.into_inner());
            let conn = guard
                .as_mut()
                .ok_or_else(|| StoreError::Unavailable("store is closed".into()))?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Save a photo captured now.
    pub async fn insert(&self, image: Vec<u8>, metadata: InspectionMetadata) -> Result<i64> {
        self.insert_at(image, metadata, Local::now()).await
    }

    /// Save a photo with an explicit capture instant.
    pub async fn insert_at(
        &self,
        image: Vec<u8>,
        metadata: InspectionMetadata,
        captured_at: DateTime<Local>,
    ) -> Result<i64> {
        let json = serde_json::to_string(&metadata)?;
        let timestamp = captured_at.timestamp_millis();
        let display = captured_at.format(DISPLAY_DATE_FORMAT).to_string();
        let id = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO photos (image, metadata, timestamp, display_date)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![image, json, timestamp, display],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        debug!(id, "photo saved");
        self.notify(StoreEvent::Inserted { id });
        Ok(id)
    }

    /// Fetch one record. Missing ids are `Ok(None)`.
    pub async fn get(&self, id: i64) -> Result<Option<PhotoRecord>> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, image, metadata, timestamp, display_date
                     FROM photos WHERE id = ?1",
                    params![id],
                    raw_row,
                )
                .optional()?;
            row.map(RawRow::into_record).transpose()
        })
        .await
    }

    /// Delete every listed id in one transaction. Ids that do not exist are
    /// skipped. Returns how many rows were removed.
    pub async fn delete_many(&self, ids: &[i64]) -> Result<usize> {
        let ids = ids.to_vec();
        let (removed, deleted_ids) = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let mut deleted = Vec::new();
                {
                    let mut stmt = tx.prepare("DELETE FROM photos WHERE id = ?1")?;
                    for id in ids {
                        if stmt.execute(params![id])? > 0 {
                            deleted.push(id);
                        }
                    }
                }
                tx.commit()?;
                Ok((deleted.len(), deleted))
            })
            .await?;
        debug!(removed, "photos deleted");
        self.notify(StoreEvent::Deleted { ids: deleted_ids });
        Ok(removed)
    }

    pub async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM photos", [], |r| r.get(0))?;
            Ok(n as usize)
        })
        .await
    }

    /// Highest id currently stored (0 when empty).
    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.with_conn(|conn| {
            let max: Option<i64> =
                conn.query_row("SELECT MAX(id) FROM photos", [], |r| r.get(0))?;
            Ok(Snapshot(max.unwrap_or(0)))
        })
        .await
    }

    /// Newest-first page of at most `limit` records.
    ///
    /// With no cursor this starts a walk and pins a fresh snapshot. With a
    /// cursor it continues strictly after the cursor's position and never
    /// re-snapshots, so feeding each page's `next` back in emits every record
    /// of the snapshot exactly once, whatever is saved or deleted between
    /// calls.
    pub async fn page_newest(&self, after: Option<PageCursor>, limit: usize) -> Result<Page> {
        let snapshot = match after {
            Some(cursor) => cursor.snapshot,
            None => self.snapshot().await?,
        };
        let (ts, id) = after.map_or((i64::MAX, i64::MAX), |c| (c.timestamp, c.id));
        let fetch = i64::try_from(limit).unwrap_or(i64::MAX - 1) + 1;
        let mut records = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, image, metadata, timestamp, display_date
                     FROM photos
                     WHERE id <= ?1 AND (timestamp, id) < (?2, ?3)
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?4",
                )?;
                let rows = stmt.query_map(params![snapshot.0, ts, id, fetch], raw_row)?;
                rows.map(|r| r?.into_record()).collect::<Result<Vec<_>>>()
            })
            .await?;
        let has_more = records.len() > limit;
        records.truncate(limit);
        let next = records
            .last()
            .map(|r| PageCursor::after(snapshot, r))
            .or(after);
        Ok(Page {
            records,
            has_more,
            snapshot,
            next,
        })
    }

    /// Records saved after `snapshot`, newest first.
    pub async fn newer_than(&self, snapshot: Snapshot) -> Result<Vec<PhotoRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, image, metadata, timestamp, display_date
                 FROM photos WHERE id > ?1
                 ORDER BY timestamp DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![snapshot.0], raw_row)?;
            rows.map(|r| r?.into_record()).collect()
        })
        .await
    }

    /// Remember the last submitted form values.
    pub async fn save_form_defaults(&self, form: &FormInput) -> Result<()> {
        let json = serde_json::to_string(form)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO form_defaults (slot, form) VALUES (1, ?1)
                 ON CONFLICT(slot) DO UPDATE SET form = excluded.form",
                params![json],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn load_form_defaults(&self) -> Result<Option<FormInput>> {
        self.with_conn(|conn| {
            let json: Option<String> = conn
                .query_row("SELECT form FROM form_defaults WHERE slot = 1", [], |r| {
                    r.get(0)
                })
                .optional()?;
            Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
        })
        .await
    }
}

/// Row as stored, before the metadata JSON is parsed.
struct RawRow {
    id: i64,
    image: Vec<u8>,
    metadata: String,
    timestamp: i64,
    display_date: String,
}

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        image: row.get(1)?,
        metadata: row.get(2)?,
        timestamp: row.get(3)?,
        display_date: row.get(4)?,
    })
}

impl RawRow {
    fn into_record(self) -> Result<PhotoRecord> {
        Ok(PhotoRecord {
            id: self.id,
            image: self.image,
            metadata: serde_json::from_str(&self.metadata)?,
            captured_at_ms: self.timestamp,
            display_date: self.display_date,
        })
    }
}

/// Incremental gallery loader.
///
/// Walks the store newest-first in pages of `page_size`. Once the pinned
/// snapshot is exhausted, photos saved since are returned as one more page
/// and the snapshot advances past them, so every record is yielded exactly
/// once.
pub struct GalleryPager {
    store: PhotoStore,
    page_size: usize,
    snapshot: Option<Snapshot>,
    cursor: Option<PageCursor>,
    exhausted: bool,
}

impl GalleryPager {
    pub fn new(store: PhotoStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            snapshot: None,
            cursor: None,
            exhausted: false,
        }
    }

    /// Next batch of records, or an empty vec when nothing is left.
    pub async fn next_page(&mut self) -> Result<Vec<PhotoRecord>> {
        if !self.exhausted {
            let page = self.store.page_newest(self.cursor, self.page_size).await?;
            self.snapshot = Some(page.snapshot);
            self.cursor = page.next;
            self.exhausted = !page.has_more;
            if !page.records.is_empty() {
                return Ok(page.records);
            }
        }

        let Some(snapshot) = self.snapshot else {
            return Ok(Vec::new());
        };
        let fresh = self.store.newer_than(snapshot).await?;
        if let Some(max) = fresh.iter().map(|r| r.id).max() {
            self.snapshot = Some(Snapshot(max));
        }
        Ok(fresh)
    }

    pub fn has_more(&self) -> bool {
        !self.exhausted
    }
}
