//! A single locally-hosted engine instance and its raw-protocol entry point.

use crate::wire::{value_to_json, WireResponse};
use crate::{EngineError, EngineSettings};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

type EnginePool = Pool<SqliteConnectionManager>;

/// One locally-hosted database engine, backed by a pooled SQLite file.
///
/// Instances are created and owned exclusively by the
/// [`InstanceRegistry`](crate::InstanceRegistry); at most one exists per
/// identifier for the lifetime of the process.
pub struct EngineInstance {
    id: String,
    pool: EnginePool,
}

impl std::fmt::Debug for EngineInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInstance")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl EngineInstance {
    /// Opens (or creates) the database file for `id` under `data_dir`.
    ///
    /// Blocking: performs filesystem and SQLite work. Callers run this inside
    /// `spawn_blocking`.
    pub(crate) fn open(
        data_dir: &Path,
        id: &str,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let instantiation = |reason: String| EngineError::Instantiation {
            id: id.to_string(),
            reason,
        };

        std::fs::create_dir_all(data_dir)
            .map_err(|e| instantiation(format!("cannot create data directory: {}", e)))?;

        let db_path = data_dir.join(format!("{}.db", id));
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let busy_timeout_ms = settings.busy_timeout_ms;
        let manager = SqliteConnectionManager::file(&db_path)
            .with_flags(flags)
            .with_init(move |conn| {
                // Set WAL mode and verify it was accepted.
                let journal_mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
                if journal_mode != "wal" {
                    return Err(rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                        Some(format!(
                            "failed to set WAL journal mode, got: {}",
                            journal_mode
                        )),
                    ));
                }
                conn.execute_batch(&format!(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = {};",
                    busy_timeout_ms
                ))
            });

        let pool = Pool::builder()
            .max_size(settings.pool_max_size)
            .build(manager)
            .map_err(|e| instantiation(e.to_string()))?;

        tracing::info!(id = %id, path = %db_path.display(), "engine instance ready");

        Ok(Self {
            id: id.to_string(),
            pool,
        })
    }

    /// The identifier this instance is registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Executes one complete raw protocol request frame and returns the
    /// complete response frame.
    ///
    /// The frame is interpreted as the engine's native wire format (one UTF-8
    /// SQL statement); see [`crate::wire`]. Statement-level failures — bad
    /// SQL, constraint violations, non-UTF-8 input — are representable in the
    /// protocol and come back as `Ok` with an in-band `error` frame.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Execution`] only for engine-level failures the
    /// protocol cannot represent (pool exhaustion, task join failure).
    pub async fn execute_raw(&self, frame: &[u8]) -> Result<Vec<u8>, EngineError> {
        let pool = self.pool.clone();
        let frame = frame.to_vec();

        let result =
            tokio::task::spawn_blocking(move || execute_blocking(&pool, &frame)).await;

        match result {
            Ok(response) => response,
            Err(e) => Err(EngineError::Execution(format!("task join error: {}", e))),
        }
    }
}

/// Runs one request frame against a pooled connection.
fn execute_blocking(pool: &EnginePool, frame: &[u8]) -> Result<Vec<u8>, EngineError> {
    let conn = pool
        .get()
        .map_err(|e| EngineError::Execution(format!("pool error: {}", e)))?;

    let sql = match std::str::from_utf8(frame) {
        Ok(s) => s.trim(),
        Err(_) => return Ok(WireResponse::error("request frame is not valid UTF-8").encode()),
    };
    if sql.is_empty() {
        return Ok(WireResponse::error("empty statement").encode());
    }

    let response = match run_statement(&conn, sql) {
        Ok(response) => response,
        Err(e) => WireResponse::error(e.to_string()),
    };

    Ok(response.encode())
}

/// Prepares and executes a single SQL statement.
fn run_statement(conn: &Connection, sql: &str) -> Result<WireResponse, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;

    if stmt.column_count() == 0 {
        let rows_affected = stmt.execute([])? as u64;
        return Ok(WireResponse::exec(rows_affected));
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = Vec::new();
    let mut result_rows = stmt.query([])?;
    while let Some(row) = result_rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(value_to_json(row.get_ref(i)?));
        }
        rows.push(values);
    }

    Ok(WireResponse::rows(columns, rows))
}
