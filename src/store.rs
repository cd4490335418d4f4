//! Post store: SQLite rows plus out-of-line image blobs.
//!
//! # Schema
//!
//! ```text
//! posts(id PK, image_digest, image_len, caption, created_at)
//! tags(id PK, post_id → posts.id ON DELETE CASCADE, position, label)
//! ```
//!
//! A post owns its tags: deleting the post row deletes every tag row via
//! the foreign key. The reverse direction (tag → post) is the indexed
//! `post_id` column; nothing is stored on the tag side beyond that.
//!
//! Image bytes are not stored in `posts`. The row keeps the digest and
//! length of a blob in the [`BlobStore`], so listing the feed never reads
//! image payloads. Call [`PostStore::image_bytes`] to fetch one.
//!
//! # Feed subscription
//!
//! Every successful write publishes a full snapshot of the feed (all posts,
//! `created_at` ascending) on a `tokio::sync::watch` channel. Subscribers
//! always see the latest snapshot; intermediate ones may be skipped if they
//! fall behind, which is fine for a view that re-renders the whole grid.
//!
//! # Ordering
//!
//! The feed is ordered by `created_at`, then by `id`. `created_at` is never
//! allowed to go below the newest existing post, so feed order always
//! matches insertion order even if the wall clock steps backwards.

use crate::blob::{BlobError, BlobStore, ImageRef};
use crate::tagging;
use crate::types::{Post, PostId, Tag, TagId};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;

/// Bump when the schema changes incompatibly.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS posts (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    image_digest TEXT,
    image_len    INTEGER,
    caption      TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS posts_created_at ON posts(created_at, id);
CREATE INDEX IF NOT EXISTS posts_image_digest ON posts(image_digest);

CREATE TABLE IF NOT EXISTS tags (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id  INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    label    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS tags_post_id ON tags(post_id, position);
";

const SELECT_POSTS: &str =
    "SELECT id, image_digest, image_len, caption, created_at FROM posts ORDER BY created_at, id";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),
    #[error("Database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i64, supported: i64 },
    #[error("Store lock poisoned by a panicked writer")]
    Poisoned,
}

/// Live view of the feed. Each value is a full snapshot in feed order.
#[derive(Debug, Clone)]
pub struct FeedSubscription {
    rx: watch::Receiver<Arc<Vec<Post>>>,
}

impl FeedSubscription {
    /// The most recent snapshot, marking it as seen.
    pub fn current(&mut self) -> Arc<Vec<Post>> {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next snapshot. Returns `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Post>>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Whether a snapshot newer than the last one seen is waiting.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}

/// Persistent store of posts and their tags.
pub struct PostStore {
    conn: Mutex<Connection>,
    blobs: BlobStore,
    feed: watch::Sender<Arc<Vec<Post>>>,
}

impl PostStore {
    /// Open (or create) the database at `db_path`, keeping images in `blobs`.
    pub fn open(db_path: &Path, blobs: BlobStore) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        tracing::debug!(path = %db_path.display(), "opened post database");
        Self::with_connection(conn, blobs)
    }

    /// Store backed by an in-memory database. Blobs still go to `blobs`.
    pub fn open_in_memory(blobs: BlobStore) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, blobs)
    }

    fn with_connection(conn: Connection, blobs: BlobStore) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrate(&conn)?;
        let snapshot = load_posts(&conn)?;
        let (feed, _) = watch::channel(Arc::new(snapshot));
        Ok(Self {
            conn: Mutex::new(conn),
            blobs,
            feed,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Re-read the feed and hand it to subscribers. Called with the
    /// connection lock held so snapshots are published in commit order.
    ///
    /// Runs after a commit, so a failed re-read is logged and subscribers
    /// keep the previous snapshot; the write itself has succeeded.
    fn publish(&self, conn: &Connection) {
        match load_posts(conn) {
            Ok(snapshot) => {
                self.feed.send_replace(Arc::new(snapshot));
            }
            Err(e) => tracing::warn!(error = %e, "could not refresh feed snapshot"),
        }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Subscribe to feed snapshots. The current feed is available immediately.
    pub fn subscribe(&self) -> FeedSubscription {
        FeedSubscription {
            rx: self.feed.subscribe(),
        }
    }

    /// Every post, oldest first, with its tags.
    pub fn all_posts(&self) -> Result<Vec<Post>, StoreError> {
        let conn = self.conn()?;
        load_posts(&conn)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Save a new post.
    ///
    /// Hashtags are pulled out of `caption` into one tag each (duplicates
    /// included) and removed from the stored caption. Nothing is validated:
    /// an empty caption, no image, or no hashtags all produce a post.
    pub fn save(&self, caption: &str, image: Option<&[u8]>) -> Result<Post, StoreError> {
        let split = tagging::split_caption(caption);
        let mut conn = self.conn()?;
        // The blob goes in first; if the row insert then fails the orphan is
        // reclaimed by `collect_garbage`.
        let image = image.map(|bytes| self.blobs.put(bytes)).transpose()?;
        let tx = conn.transaction()?;

        let newest: Option<DateTime<Utc>> =
            tx.query_row("SELECT MAX(created_at) FROM posts", [], |row| row.get(0))?;
        let now = Utc::now();
        let created_at = match newest {
            Some(newest) if newest > now => newest,
            _ => now,
        };

        tx.execute(
            "INSERT INTO posts (image_digest, image_len, caption, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                image.as_ref().map(|i| i.digest.as_str()),
                image.as_ref().map(|i| i.len as i64),
                split.caption,
                created_at,
            ],
        )?;
        let post_id = PostId(tx.last_insert_rowid());

        let mut tags = Vec::with_capacity(split.hashtags.len());
        {
            let mut insert = tx.prepare(
                "INSERT INTO tags (post_id, position, label) VALUES (?1, ?2, ?3)",
            )?;
            for (position, label) in split.hashtags.into_iter().enumerate() {
                insert.execute(params![post_id.0, position as i64, label])?;
                tags.push(Tag {
                    id: TagId(tx.last_insert_rowid()),
                    label,
                    post_id,
                });
            }
        }
        tx.commit()?;

        let post = Post {
            id: post_id,
            image,
            caption: split.caption,
            created_at,
            tags,
        };
        tracing::info!(
            id = %post.id,
            tags = post.tags.len(),
            has_image = post.image.is_some(),
            "saved post"
        );
        self.publish(&conn);
        Ok(post)
    }

    /// Look up a single post.
    pub fn get(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let conn = self.conn()?;
        load_post(&conn, id)
    }

    /// The post that owns tag `id`.
    pub fn post_for_tag(&self, id: TagId) -> Result<Option<Post>, StoreError> {
        let conn = self.conn()?;
        let post_id: Option<i64> = conn
            .query_row("SELECT post_id FROM tags WHERE id = ?1", [id.0], |row| {
                row.get(0)
            })
            .optional()?;
        match post_id {
            Some(post_id) => load_post(&conn, PostId(post_id)),
            None => Ok(None),
        }
    }

    /// Delete a post and, through the cascade, its tags.
    ///
    /// The image blob is removed too unless another post shares it. A blob
    /// that cannot be removed is logged and left for [`Self::collect_garbage`].
    /// Returns `false` if no such post existed.
    pub fn delete(&self, id: PostId) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let digest: Option<Option<String>> = tx
            .query_row(
                "SELECT image_digest FROM posts WHERE id = ?1",
                [id.0],
                |row| row.get(0),
            )
            .optional()?;
        let Some(digest) = digest else {
            return Ok(false);
        };

        tx.execute("DELETE FROM posts WHERE id = ?1", [id.0])?;
        let orphaned = match &digest {
            Some(digest) => {
                let users: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM posts WHERE image_digest = ?1",
                    [digest],
                    |row| row.get(0),
                )?;
                users == 0
            }
            None => false,
        };
        tx.commit()?;
        tracing::info!(%id, "deleted post");
        self.publish(&conn);

        // The post is gone either way; a blob that cannot be removed now is
        // left for `collect_garbage`.
        if orphaned
            && let Some(digest) = &digest
            && let Err(e) = self.blobs.remove(digest)
        {
            tracing::warn!(%digest, error = %e, "could not remove blob of deleted post");
        }
        Ok(true)
    }

    /// Read the image payload of `post`, if it has one.
    pub fn image_bytes(&self, post: &Post) -> Result<Option<Vec<u8>>, StoreError> {
        match &post.image {
            Some(image) => Ok(Some(self.blobs.get(image)?)),
            None => Ok(None),
        }
    }

    /// Remove blobs no post references. Returns the removed digests.
    pub fn collect_garbage(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT image_digest FROM posts WHERE image_digest IS NOT NULL")?;
        let live = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        // Holding the connection lock keeps a concurrent save from writing
        // a blob that the sweep would consider unreferenced.
        let removed = self.blobs.sweep(&live)?;
        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), "collected orphaned blobs");
        }
        Ok(removed)
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    conn.execute_batch(SCHEMA)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tracing::debug!(from = version, to = SCHEMA_VERSION, "migrated post schema");
    }
    Ok(())
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let digest: Option<String> = row.get(1)?;
    let len: Option<i64> = row.get(2)?;
    Ok(Post {
        id: PostId(row.get(0)?),
        image: digest.map(|digest| ImageRef {
            digest,
            len: len.unwrap_or(0) as u64,
        }),
        caption: row.get(3)?,
        created_at: row.get(4)?,
        tags: Vec::new(),
    })
}

fn load_posts(conn: &Connection) -> Result<Vec<Post>, StoreError> {
    let mut stmt = conn.prepare(SELECT_POSTS)?;
    let mut posts = stmt
        .query_map([], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT id, post_id, label FROM tags ORDER BY post_id, position")?;
    let mut by_post: HashMap<PostId, Vec<Tag>> = HashMap::new();
    let rows = stmt.query_map([], |row| {
        Ok(Tag {
            id: TagId(row.get(0)?),
            post_id: PostId(row.get(1)?),
            label: row.get(2)?,
        })
    })?;
    for tag in rows {
        let tag = tag?;
        by_post.entry(tag.post_id).or_default().push(tag);
    }

    for post in &mut posts {
        post.tags = by_post.remove(&post.id).unwrap_or_default();
    }
    Ok(posts)
}

fn load_post(conn: &Connection, id: PostId) -> Result<Option<Post>, StoreError> {
    let post = conn
        .query_row(
            "SELECT id, image_digest, image_len, caption, created_at FROM posts WHERE id = ?1",
            [id.0],
            post_from_row,
        )
        .optional()?;
    let Some(mut post) = post else {
        return Ok(None);
    };
    let mut stmt =
        conn.prepare("SELECT id, post_id, label FROM tags WHERE post_id = ?1 ORDER BY position")?;
    post.tags = stmt
        .query_map([id.0], |row| {
            Ok(Tag {
                id: TagId(row.get(0)?),
                post_id: PostId(row.get(1)?),
                label: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(post))
}
