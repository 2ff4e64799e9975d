//! SQLite persistence for the vector index, with similarity search via the
//! `sqlite-vec` extension.
//!
//! Two handles share one schema: [`IndexWriter`] creates a fresh index file
//! (used by the builder, which renames it into place when complete), and
//! [`SqliteVectorIndex`] opens a finished file read-mostly for search.
//!
//! Schema:
//! - `chunks(id, source_id, title, locator, chunk_index, content)`
//! - `chunk_embeddings(id, embedding)` with vectors stored as `vec_f32` blobs
//! - `index_meta(key, value)` recording the embedding model, dimension,
//!   build timestamp, and chunk count

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Once;

use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use super::{ChunkRecord, RetrievedChunk, StoreError};

const META_EMBEDDING_MODEL: &str = "embedding_model";
const META_DIMENSION: &str = "dimension";
const META_BUILT_AT: &str = "built_at";
const META_CHUNK_COUNT: &str = "chunk_count";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    title TEXT NOT NULL,
    locator TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Register the sqlite-vec extension process-wide. Idempotent.
pub(crate) fn register_sqlite_vec() -> Result<(), StoreError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(StoreError::Storage)
}

async fn verify_vec_extension(conn: &Connection) -> Result<(), StoreError> {
    conn.call(|conn| {
        conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
            .map_err(tokio_rusqlite::Error::Error)
    })
    .await
    .map(|_| ())
    .map_err(|err| StoreError::Storage(err.to_string()))
}

/// Metadata recorded when an index is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMeta {
    /// Model id of the embedding provider that built the index.
    pub embedding_model: String,
    /// Dimension of every stored vector.
    pub dimension: usize,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
    /// Total chunks stored.
    pub chunk_count: usize,
}

/// Write handle for building a fresh index file.
///
/// Created against a scratch path by the builder; [`finalize`](Self::finalize)
/// writes the metadata and closes the connection so the file can be renamed
/// into place.
pub struct IndexWriter {
    conn: Connection,
    path: PathBuf,
}

impl IndexWriter {
    /// Create a new index file at `path`, replacing any stale file there.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        register_sqlite_vec()?;
        let path = path.as_ref().to_path_buf();

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let conn = Connection::open(&path)
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))?;
        verify_vec_extension(&conn).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Error)
        })
        .await
        .map_err(|err| StoreError::Storage(err.to_string()))?;

        Ok(Self { conn, path })
    }

    /// Insert a batch of chunks with their embeddings, transactionally.
    pub async fn insert_chunks(
        &self,
        batch: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        // Encode vectors before entering the connection thread
        let mut rows = Vec::with_capacity(batch.len());
        for (record, embedding) in batch {
            let embedding_json = serde_json::to_string(&embedding)
                .map_err(|err| StoreError::Storage(err.to_string()))?;
            rows.push((record, embedding_json));
        }

        self.conn
            .call(move |conn| -> Result<(), tokio_rusqlite::Error> {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Error)?;
                for (record, embedding_json) in rows {
                    tx.execute(
                        "INSERT OR REPLACE INTO chunks \
                         (id, source_id, title, locator, chunk_index, content) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        (
                            &record.id,
                            &record.source_id,
                            &record.title,
                            &record.locator,
                            record.index as i64,
                            &record.text,
                        ),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                    tx.execute(
                        "INSERT OR REPLACE INTO chunk_embeddings (id, embedding) \
                         VALUES (?1, vec_f32(?2))",
                        (&record.id, &embedding_json),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))
    }

    /// Record build metadata and close the file.
    ///
    /// After this returns the file is complete and safe to rename over the
    /// live index path.
    pub async fn finalize(self, meta: IndexMeta) -> Result<PathBuf, StoreError> {
        let rows = vec![
            (META_EMBEDDING_MODEL, meta.embedding_model.clone()),
            (META_DIMENSION, meta.dimension.to_string()),
            (META_BUILT_AT, meta.built_at.to_rfc3339()),
            (META_CHUNK_COUNT, meta.chunk_count.to_string()),
        ];

        self.conn
            .call(move |conn| -> Result<(), tokio_rusqlite::Error> {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Error)?;
                for (key, value) in rows {
                    tx.execute(
                        "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
                        (key, &value),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))?;

        self.conn
            .close()
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))?;
        Ok(self.path)
    }
}

/// Read handle over a finished index file.
#[derive(Debug)]
pub struct SqliteVectorIndex {
    conn: Connection,
    meta: IndexMeta,
}

impl SqliteVectorIndex {
    /// Open an index file and load its metadata.
    ///
    /// Fails with [`StoreError::MissingMeta`] when the file was never
    /// finalized (or is not an index file at all).
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))?;
        verify_vec_extension(&conn).await?;

        let meta = Self::load_meta(&conn).await?;
        Ok(Self { conn, meta })
    }

    async fn read_meta_value(conn: &Connection, key: &'static str) -> Result<Option<String>, StoreError> {
        conn.call(move |conn| {
            conn.query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(tokio_rusqlite::Error::Error)
        })
        .await
        .map_err(|err| StoreError::Storage(err.to_string()))
    }

    async fn load_meta(conn: &Connection) -> Result<IndexMeta, StoreError> {
        let embedding_model = Self::read_meta_value(conn, META_EMBEDDING_MODEL)
            .await?
            .ok_or(StoreError::MissingMeta {
                key: META_EMBEDDING_MODEL,
            })?;
        let dimension = Self::read_meta_value(conn, META_DIMENSION)
            .await?
            .ok_or(StoreError::MissingMeta { key: META_DIMENSION })?
            .parse::<usize>()
            .map_err(|err| StoreError::Storage(format!("unparseable dimension: {err}")))?;
        let built_at = Self::read_meta_value(conn, META_BUILT_AT)
            .await?
            .ok_or(StoreError::MissingMeta { key: META_BUILT_AT })?;
        let built_at = DateTime::parse_from_rfc3339(&built_at)
            .map_err(|err| StoreError::Storage(format!("unparseable built_at: {err}")))?
            .with_timezone(&Utc);
        let chunk_count = Self::read_meta_value(conn, META_CHUNK_COUNT)
            .await?
            .ok_or(StoreError::MissingMeta {
                key: META_CHUNK_COUNT,
            })?
            .parse::<usize>()
            .map_err(|err| StoreError::Storage(format!("unparseable chunk_count: {err}")))?;

        Ok(IndexMeta {
            embedding_model,
            dimension,
            built_at,
            chunk_count,
        })
    }

    /// Build metadata loaded at open.
    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Cosine similarity search, best matches first.
    ///
    /// Returns up to `top_k` chunks with similarity `1.0 - cosine_distance`,
    /// sorted non-increasing. The query vector must match the index
    /// dimension.
    pub async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        if query.len() != self.meta.dimension {
            return Err(StoreError::DimensionMismatch {
                index: self.meta.dimension,
                provider: query.len(),
            });
        }

        let embedding_json =
            serde_json::to_string(query).map_err(|err| StoreError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| -> Result<Vec<RetrievedChunk>, tokio_rusqlite::Error> {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT c.id, c.source_id, c.title, c.locator, c.chunk_index, c.content, \
                         vec_distance_cosine(e.embedding, vec_f32(?1)) as distance \
                         FROM chunks c \
                         JOIN chunk_embeddings e ON c.id = e.id \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Error)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let record = ChunkRecord {
                            id: row.get(0)?,
                            source_id: row.get(1)?,
                            title: row.get(2)?,
                            locator: row.get(3)?,
                            index: row.get::<_, i64>(4)? as usize,
                            text: row.get(5)?,
                        };
                        let distance: f32 = row.get(6)?;
                        Ok(RetrievedChunk {
                            record,
                            score: 1.0 - distance,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))
    }

    /// Count chunks actually stored (cross-check against metadata).
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.conn
            .call(|conn| -> Result<usize, tokio_rusqlite::Error> {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| StoreError::Storage(err.to_string()))
    }
}
