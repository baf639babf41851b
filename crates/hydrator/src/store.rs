//! SQLite storage with connection pooling.
//!
//! Two pools over one database file: a single-connection writer pool (SQLite
//! holds one write lock anyway) and a multi-connection reader pool. The
//! `events` table's id primary key is the final dedup arbiter: every insert
//! is `INSERT OR IGNORE`, so concurrent projectors racing on the same id —
//! even across processes — collapse to one row without errors.

use crate::error::ProjectError;
use crate::record::{DomainRecord, GenericRecord};
use nostr_core::Event;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::PathBuf;
use tracing::{debug, info};

/// Database configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
    /// Maximum number of reader connections
    pub max_reader_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hydrator.db"),
            max_reader_connections: 4,
        }
    }
}

/// Row counts per table, for summaries and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub events: u64,
    pub articles: u64,
    pub comments: u64,
    pub highlights: u64,
    pub media: u64,
}

/// The projected-record store.
pub struct Store {
    writer: Pool<SqliteConnectionManager>,
    reader: Pool<SqliteConnectionManager>,
}

impl Store {
    /// Open (or create) the store at the configured path.
    pub fn open(config: StoreConfig) -> Result<Self, ProjectError> {
        let writer = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::file(&config.path))?;
        let reader = Pool::builder()
            .max_size(config.max_reader_connections)
            .build(SqliteConnectionManager::file(&config.path))?;

        let conn = writer.get()?;
        Self::init_schema(&conn)?;
        drop(conn);

        info!("store initialized at {:?}", config.path);
        Ok(Self { writer, reader })
    }

    fn init_schema(conn: &Connection) -> Result<(), ProjectError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                pubkey TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                kind INTEGER NOT NULL,
                content TEXT NOT NULL,
                sig TEXT NOT NULL,
                tags TEXT NOT NULL,
                source_relay TEXT NOT NULL,
                first_seen INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_kind ON events(kind);
            CREATE INDEX IF NOT EXISTS idx_events_pubkey ON events(pubkey);
            CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);

            CREATE TABLE IF NOT EXISTS articles (
                event_id TEXT PRIMARY KEY REFERENCES events(id),
                pubkey TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                slug TEXT NOT NULL,
                title TEXT,
                summary TEXT,
                image TEXT,
                published_at INTEGER,
                topics TEXT NOT NULL,
                content TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_articles_address ON articles(pubkey, slug);

            CREATE TABLE IF NOT EXISTS comments (
                event_id TEXT PRIMARY KEY REFERENCES events(id),
                pubkey TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                content TEXT NOT NULL,
                root_event_id TEXT,
                root_address TEXT,
                root_kind INTEGER,
                root_pubkey TEXT,
                parent_event_id TEXT,
                parent_address TEXT,
                parent_kind INTEGER,
                parent_pubkey TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_comments_root_event ON comments(root_event_id);
            CREATE INDEX IF NOT EXISTS idx_comments_root_address ON comments(root_address);

            CREATE TABLE IF NOT EXISTS highlights (
                event_id TEXT PRIMARY KEY REFERENCES events(id),
                pubkey TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                content TEXT NOT NULL,
                context TEXT,
                source_event_id TEXT,
                source_address TEXT,
                source_url TEXT,
                attributed_authors TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_highlights_source_event ON highlights(source_event_id);

            CREATE TABLE IF NOT EXISTS media (
                event_id TEXT PRIMARY KEY REFERENCES events(id),
                pubkey TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                url TEXT NOT NULL,
                mime_type TEXT,
                sha256 TEXT,
                size_bytes INTEGER,
                dimensions TEXT,
                blurhash TEXT,
                alt TEXT,
                caption TEXT NOT NULL
            );",
        )?;
        debug!("store schema initialized");
        Ok(())
    }

    /// Look up the projected record for an event id.
    ///
    /// The `events` row keeps the full wire form, so the record is rebuilt
    /// through the same pure mapping that produced it.
    pub fn find_by_id(&self, id: &str) -> Result<Option<DomainRecord>, ProjectError> {
        let conn = self.reader.get()?;
        let row = conn
            .query_row(
                "SELECT id, pubkey, created_at, kind, content, sig, tags
                 FROM events WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u64>(2)?,
                        row.get::<_, u16>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, pubkey, created_at, kind, content, sig, tags_json)) = row else {
            return Ok(None);
        };

        let event = Event {
            id,
            pubkey,
            created_at,
            kind,
            tags: serde_json::from_str(&tags_json)?,
            content,
            sig,
        };

        // Mapping can only fail on events the projector never admitted; a
        // row that no longer maps degrades to its generic form.
        let record = DomainRecord::from_event(&event).unwrap_or_else(|_| {
            DomainRecord::Generic(GenericRecord {
                event_id: event.id.clone(),
                pubkey: event.pubkey.clone(),
                kind: event.kind,
                created_at: event.created_at,
                tags: event.tags.clone(),
                content: event.content.clone(),
            })
        });
        Ok(Some(record))
    }

    /// Insert one record; `Ok(false)` means the id was already present.
    pub fn insert(
        &self,
        record: &DomainRecord,
        event: &Event,
        source_relay: &str,
    ) -> Result<bool, ProjectError> {
        let mut conn = self.writer.get()?;
        let tx = conn.transaction()?;
        let inserted = Self::insert_in_tx(&tx, record, event, source_relay)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert a batch of records in one transaction; returns how many were
    /// newly saved (the rest were already present).
    pub fn insert_batch(
        &self,
        items: &[(DomainRecord, Event, String)],
    ) -> Result<u64, ProjectError> {
        let mut conn = self.writer.get()?;
        let tx = conn.transaction()?;
        let mut saved = 0;
        for (record, event, source_relay) in items {
            if Self::insert_in_tx(&tx, record, event, source_relay)? {
                saved += 1;
            }
        }
        tx.commit()?;
        Ok(saved)
    }

    fn insert_in_tx(
        tx: &Transaction<'_>,
        record: &DomainRecord,
        event: &Event,
        source_relay: &str,
    ) -> Result<bool, ProjectError> {
        let tags_json = serde_json::to_string(&event.tags)?;
        let first_seen = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let changed = tx.execute(
            "INSERT OR IGNORE INTO events
             (id, pubkey, created_at, kind, content, sig, tags, source_relay, first_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id,
                event.pubkey,
                event.created_at,
                event.kind,
                event.content,
                event.sig,
                tags_json,
                source_relay,
                first_seen,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        match record {
            DomainRecord::Article(a) => {
                tx.execute(
                    "INSERT OR IGNORE INTO articles
                     (event_id, pubkey, created_at, slug, title, summary, image, published_at, topics, content)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        a.event_id,
                        a.pubkey,
                        a.created_at,
                        a.slug,
                        a.title,
                        a.summary,
                        a.image,
                        a.published_at,
                        serde_json::to_string(&a.topics)?,
                        a.content,
                    ],
                )?;
            }
            DomainRecord::Comment(c) => {
                tx.execute(
                    "INSERT OR IGNORE INTO comments
                     (event_id, pubkey, created_at, content, root_event_id, root_address, root_kind,
                      root_pubkey, parent_event_id, parent_address, parent_kind, parent_pubkey)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        c.event_id,
                        c.pubkey,
                        c.created_at,
                        c.content,
                        c.root_event_id,
                        c.root_address,
                        c.root_kind,
                        c.root_pubkey,
                        c.parent_event_id,
                        c.parent_address,
                        c.parent_kind,
                        c.parent_pubkey,
                    ],
                )?;
            }
            DomainRecord::Highlight(h) => {
                tx.execute(
                    "INSERT OR IGNORE INTO highlights
                     (event_id, pubkey, created_at, content, context, source_event_id,
                      source_address, source_url, attributed_authors)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        h.event_id,
                        h.pubkey,
                        h.created_at,
                        h.content,
                        h.context,
                        h.source_event_id,
                        h.source_address,
                        h.source_url,
                        serde_json::to_string(&h.attributed_authors)?,
                    ],
                )?;
            }
            DomainRecord::Media(m) => {
                tx.execute(
                    "INSERT OR IGNORE INTO media
                     (event_id, pubkey, created_at, url, mime_type, sha256, size_bytes,
                      dimensions, blurhash, alt, caption)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        m.event_id,
                        m.pubkey,
                        m.created_at,
                        m.url,
                        m.mime_type,
                        m.sha256,
                        m.size,
                        m.dimensions,
                        m.blurhash,
                        m.alt,
                        m.caption,
                    ],
                )?;
            }
            DomainRecord::Generic(_) => {
                // The events row is the generic index.
            }
        }

        Ok(true)
    }

    /// Row counts across all tables.
    pub fn counts(&self) -> Result<StoreCounts, ProjectError> {
        let conn = self.reader.get()?;
        let count = |table: &str| -> Result<u64, rusqlite::Error> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
        };
        Ok(StoreCounts {
            events: count("events")?,
            articles: count("articles")?,
            comments: count("comments")?,
            highlights: count("highlights")?,
            media: count("media")?,
        })
    }
}
