//! Document store and data access facade.
//!
//! Documents are schemaless JSON bodies grouped into named collections and
//! persisted in SQLite. Every write notifies the subscribers of the affected
//! collection with a fresh, complete snapshot.

mod schema;
mod sanitize;

pub use sanitize::sanitize;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Entity, Exam, Note, Resource, Subject, TopicImage};

/// Collections the store accepts. Anything else is rejected as a permission
/// failure, the way the hosted store's access rules would.
pub const COLLECTIONS: &[&str] = &[
    Subject::COLLECTION,
    Exam::COLLECTION,
    Resource::COLLECTION,
    Note::COLLECTION,
    TopicImage::COLLECTION,
];

/// Collections wiped by [`Database::clear_all`].
const CLEARABLE: &[&str] = &[Subject::COLLECTION, Exam::COLLECTION, Resource::COLLECTION];

/// A raw document as stored: its key and its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Value,
}

impl StoredDocument {
    /// Maps the document to its typed model, injecting the key as `id`.
    ///
    /// Returns `None` (and logs) when the body cannot be read as `T` even
    /// after repair.
    pub fn into_entity<T: Entity>(self) -> Option<T> {
        let mut body = match self.body {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(serde_json::Map::new()),
        };
        if let Some(obj) = body.as_object_mut() {
            obj.insert("id".to_string(), Value::String(self.id.clone()));
        }
        T::repair(&mut body);
        match serde_json::from_value(body) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(
                    "Skipping unreadable document {}/{}: {}",
                    T::COLLECTION,
                    self.id,
                    e
                );
                None
            }
        }
    }
}

type DataCallback = Box<dyn Fn(Vec<StoredDocument>) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(Error) + Send + Sync>;

/// Delivery end of one listener.
///
/// Snapshots carry the store revision they were read at. A sink never hands
/// its callback a snapshot older than one it already delivered, so racing
/// writers cannot leave a subscriber on stale state.
struct Sink {
    on_data: DataCallback,
    on_error: ErrorCallback,
    delivered: Mutex<Option<u64>>,
}

impl Sink {
    fn deliver(&self, revision: u64, docs: Vec<StoredDocument>) {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if delivered.is_some_and(|seen| revision <= seen) {
            return;
        }
        *delivered = Some(revision);
        (self.on_data)(docs);
    }

    fn fail(&self, error: Error) {
        (self.on_error)(error);
    }
}

struct Listener {
    id: u64,
    sink: Arc<Sink>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_collection: HashMap<String, Vec<Listener>>,
}

/// A live collection listener. Dropping it releases the listener.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    id: u64,
    collection: String,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Releases the listener. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let Ok(mut listeners) = listeners.lock() else {
            return;
        };
        if let Some(list) = listeners.by_collection.get_mut(&self.collection) {
            list.retain(|l| l.id != self.id);
        }
        tracing::debug!("Released listener {} on {}", self.id, self.collection);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("collection", &self.collection)
            .finish()
    }
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    listeners: Arc<Mutex<Listeners>>,
    /// Bumped under the connection lock by every committed write.
    revision: Arc<AtomicU64>,
}

impl Database {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::debug!("Opened document store at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// Opens the database at `SYLLABUS_TRACK_DB`, or in the platform data
    /// directory when unset.
    pub fn open_default() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var("SYLLABUS_TRACK_DB") {
            return Self::open(PathBuf::from(path));
        }
        let dirs = directories::ProjectDirs::from("", "", "syllabus-track")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("syllabus-track.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        schema::run_migrations(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal(anyhow::anyhow!("database lock poisoned")))
    }

    // ============================================================
    // Subscriptions
    // ============================================================

    /// Subscribes to a typed collection.
    ///
    /// `on_data` receives the full current collection right away and again
    /// after every write to it. Documents that cannot be read are skipped.
    pub fn subscribe<T, F, E>(&self, on_data: F, on_error: E) -> Result<Subscription>
    where
        T: Entity,
        F: Fn(Vec<T>) + Send + Sync + 'static,
        E: Fn(Error) + Send + Sync + 'static,
    {
        self.subscribe_collection(
            T::COLLECTION,
            move |docs| {
                let entities = docs
                    .into_iter()
                    .filter_map(StoredDocument::into_entity::<T>)
                    .collect();
                on_data(entities)
            },
            on_error,
        )
    }

    /// Subscribes to raw documents of a collection by name.
    ///
    /// The listener is registered before the initial snapshot is read, so a
    /// write committed in between is never missed. When the initial snapshot
    /// cannot be read, `on_error` receives a [`Error::RemoteConnection`], the
    /// listener is released and the same error is returned.
    ///
    /// Deliveries to one listener are serialized. Callbacks must not write
    /// to the store.
    pub fn subscribe_collection<F, E>(
        &self,
        collection: &str,
        on_data: F,
        on_error: E,
    ) -> Result<Subscription>
    where
        F: Fn(Vec<StoredDocument>) + Send + Sync + 'static,
        E: Fn(Error) + Send + Sync + 'static,
    {
        let sink = Arc::new(Sink {
            on_data: Box::new(on_data),
            on_error: Box::new(on_error),
            delivered: Mutex::new(None),
        });

        let id = {
            let mut listeners = self
                .listeners
                .lock()
                .map_err(|_| Error::connection(collection, "listener registry poisoned"))?;
            listeners.next_id += 1;
            let id = listeners.next_id;
            listeners
                .by_collection
                .entry(collection.to_string())
                .or_default()
                .push(Listener {
                    id,
                    sink: sink.clone(),
                });
            id
        };
        let subscription = Subscription {
            id,
            collection: collection.to_string(),
            listeners: Arc::downgrade(&self.listeners),
        };

        match self.read_snapshot(collection) {
            Ok((revision, docs)) => {
                tracing::debug!("Registered listener {} on {}", id, collection);
                sink.deliver(revision, docs);
                Ok(subscription)
            }
            Err(e) => {
                tracing::error!("Subscription to {} failed: {}", collection, e);
                drop(subscription);
                sink.fail(Error::connection(collection, e.reason()));
                Err(e)
            }
        }
    }

    /// Number of live listeners on a collection.
    pub fn listener_count(&self, collection: &str) -> usize {
        self.listeners
            .lock()
            .map(|l| l.by_collection.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Delivers a fresh snapshot to every listener of `collection`.
    ///
    /// Callbacks run after the registry and connection locks are released.
    fn notify(&self, collection: &str) {
        let sinks: Vec<Arc<Sink>> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .by_collection
                .get(collection)
                .map(|list| list.iter().map(|l| l.sink.clone()).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };
        if sinks.is_empty() {
            return;
        }

        match self.read_snapshot(collection) {
            Ok((revision, docs)) => {
                for sink in &sinks {
                    sink.deliver(revision, docs.clone());
                }
            }
            Err(e) => {
                tracing::error!("Live update for {} failed: {}", collection, e);
                for sink in &sinks {
                    sink.fail(Error::connection(collection, e.reason()));
                }
            }
        }
    }

    /// Marks a committed write. Callers hold the connection lock.
    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    // ============================================================
    // Reads
    // ============================================================

    /// All documents of a collection, in insertion order.
    pub fn snapshot(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        self.read_snapshot(collection).map(|(_, docs)| docs)
    }

    /// A snapshot together with the store revision it reflects.
    fn read_snapshot(&self, collection: &str) -> Result<(u64, Vec<StoredDocument>)> {
        check_access(collection).map_err(|m| Error::connection(collection, m))?;

        let conn = self.conn()?;
        let revision = self.revision.load(Ordering::SeqCst);
        let mut stmt = conn
            .prepare(
                "SELECT id, body FROM documents WHERE collection = ?
                 ORDER BY created_at, rowid",
            )
            .map_err(|e| Error::connection(collection, e))?;

        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| Error::connection(collection, e))?;

        let docs = rows
            .into_iter()
            .map(|(id, body)| StoredDocument {
                body: parse_body(collection, &id, &body),
                id,
            })
            .collect();
        Ok((revision, docs))
    }

    pub fn list<T: Entity>(&self) -> Result<Vec<T>> {
        Ok(self
            .snapshot(T::COLLECTION)?
            .into_iter()
            .filter_map(StoredDocument::into_entity::<T>)
            .collect())
    }

    pub fn fetch(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        check_access(collection).map_err(|m| Error::connection(collection, m))?;

        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ? AND id = ?",
                (collection, id),
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::connection(collection, e))?;

        Ok(body.map(|body| StoredDocument {
            body: parse_body(collection, id, &body),
            id: id.to_string(),
        }))
    }

    pub fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        Ok(self
            .fetch(T::COLLECTION, id)?
            .and_then(StoredDocument::into_entity::<T>))
    }

    pub fn is_empty(&self, collection: &str) -> Result<bool> {
        Ok(self.snapshot(collection)?.is_empty())
    }

    // ============================================================
    // Writes
    // ============================================================

    /// Writes a typed entity under its own id, or under a generated key when
    /// the id is empty. Returns the key.
    pub fn create<T: Entity>(&self, entity: &T) -> Result<String> {
        let body = serde_json::to_value(entity)
            .map_err(|e| Error::write(T::COLLECTION, format!("unserializable document: {}", e)))?;
        let id = Some(entity.id()).filter(|id| !id.is_empty());
        self.create_document(T::COLLECTION, id, body)
    }

    /// Sanitizes `body` and stores it as a document. An existing document
    /// with the same key is overwritten.
    pub fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        body: Value,
    ) -> Result<String> {
        check_access(collection).map_err(|m| Error::write(collection, m))?;

        let mut body = match sanitize(body) {
            Some(Value::Object(map)) => map,
            _ => return Err(Error::write(collection, "documents must be JSON objects")),
        };
        body.remove("id");

        let key = match id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        let json = Value::Object(body).to_string();
        let now = Utc::now().to_rfc3339();

        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO documents (collection, id, body, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                (collection, &key, &json, &now, &now),
            )
            .map_err(|e| Error::write(collection, e))?;
            self.bump_revision();
        }

        tracing::info!("Wrote document {}/{}", collection, key);
        self.notify(collection);
        Ok(key)
    }

    /// Overwrites one top-level field of an existing document.
    pub fn replace_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<()> {
        check_access(collection).map_err(|m| Error::write(collection, m))?;
        if field == "id" {
            return Err(Error::write(collection, "the document key cannot be replaced"));
        }

        {
            let conn = self.conn()?;
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ? AND id = ?",
                    (collection, id),
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::write(collection, e))?;

            let Some(body) = body else {
                return Err(Error::write(
                    collection,
                    format!("no document '{}' to update", id),
                ));
            };

            let mut body = match parse_body(collection, id, &body) {
                Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            match sanitize(value) {
                Some(value) => body.insert(field.to_string(), value),
                None => body.remove(field),
            };

            conn.execute(
                "UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
                (
                    Value::Object(body).to_string(),
                    Utc::now().to_rfc3339(),
                    collection,
                    id,
                ),
            )
            .map_err(|e| Error::write(collection, e))?;
            self.bump_revision();
        }

        tracing::info!("Replaced {}/{}.{}", collection, id, field);
        self.notify(collection);
        Ok(())
    }

    /// Deletes a document. Deleting a missing document succeeds.
    pub fn remove(&self, collection: &str, id: &str) -> Result<()> {
        check_access(collection).map_err(|m| Error::write(collection, m))?;

        let rows = {
            let conn = self.conn()?;
            let rows = conn
                .execute(
                    "DELETE FROM documents WHERE collection = ? AND id = ?",
                    (collection, id),
                )
                .map_err(|e| Error::write(collection, e))?;
            if rows > 0 {
                self.bump_revision();
            }
            rows
        };

        if rows > 0 {
            tracing::info!("Removed document {}/{}", collection, id);
            self.notify(collection);
        }
        Ok(())
    }

    /// Writes the starter dataset in one transaction, but only when both the
    /// subjects and exams collections are empty. Returns whether it seeded.
    pub fn seed(&self, subjects: &[Subject], exams: &[Exam]) -> Result<bool> {
        let mut docs = Vec::with_capacity(subjects.len() + exams.len());
        for subject in subjects {
            docs.push((Subject::COLLECTION, subject.id.clone(), to_body(subject)?));
        }
        for exam in exams {
            docs.push((Exam::COLLECTION, exam.id.clone(), to_body(exam)?));
        }

        {
            let mut conn = self.conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| Error::write(Subject::COLLECTION, e))?;

            let existing: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection IN (?, ?)",
                    (Subject::COLLECTION, Exam::COLLECTION),
                    |row| row.get(0),
                )
                .map_err(|e| Error::write(Subject::COLLECTION, e))?;
            if existing > 0 {
                tracing::info!("Skipping seed: store already holds {} documents", existing);
                return Ok(false);
            }

            let now = Utc::now().to_rfc3339();
            for (collection, id, body) in &docs {
                let key = if id.is_empty() {
                    Uuid::new_v4().simple().to_string()
                } else {
                    id.clone()
                };
                tx.execute(
                    "INSERT INTO documents (collection, id, body, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)",
                    (collection, &key, body, &now, &now),
                )
                .map_err(|e| Error::write(collection, e))?;
            }

            tx.commit().map_err(|e| Error::write(Subject::COLLECTION, e))?;
            self.bump_revision();
        }

        tracing::info!(
            "Seeded {} subjects and {} exams",
            subjects.len(),
            exams.len()
        );
        self.notify(Subject::COLLECTION);
        self.notify(Exam::COLLECTION);
        Ok(true)
    }

    /// Deletes every subject, exam and resource in one transaction.
    pub fn clear_all(&self) -> Result<()> {
        {
            let mut conn = self.conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| Error::write(Subject::COLLECTION, e))?;
            for collection in CLEARABLE {
                tx.execute("DELETE FROM documents WHERE collection = ?", [collection])
                    .map_err(|e| Error::write(collection, e))?;
            }
            tx.commit().map_err(|e| Error::write(Subject::COLLECTION, e))?;
            self.bump_revision();
        }

        tracing::info!("Cleared all subjects, exams and resources");
        for collection in CLEARABLE {
            self.notify(collection);
        }
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            listeners: self.listeners.clone(),
            revision: self.revision.clone(),
        }
    }
}

fn check_access(collection: &str) -> Result<(), String> {
    if COLLECTIONS.contains(&collection) {
        Ok(())
    } else {
        tracing::warn!("Rejected access to collection '{}'", collection);
        Err(format!("permission denied for collection '{}'", collection))
    }
}

fn to_body<T: Entity>(entity: &T) -> Result<String> {
    let value = serde_json::to_value(entity)
        .map_err(|e| Error::write(T::COLLECTION, format!("unserializable document: {}", e)))?;
    match sanitize(value) {
        Some(Value::Object(mut map)) => {
            map.remove("id");
            Ok(Value::Object(map).to_string())
        }
        _ => Err(Error::write(T::COLLECTION, "documents must be JSON objects")),
    }
}

fn parse_body(collection: &str, id: &str, body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| {
        tracing::warn!("Corrupt body for {}/{}: {}", collection, id, e);
        Value::Object(serde_json::Map::new())
    })
}
