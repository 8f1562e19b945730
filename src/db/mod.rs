//! Per-shard SQLite persistence: schema, connection pool, vector encoding.
//!
//! Each shard owns one database file with a single `memory` table
//! `(id PRIMARY KEY, vector BLOB, metadata TEXT)` plus a `meta` version table.
//! Connections come from a small bounded pool so concurrent readers do not
//! starve on a single handle.

use crate::error::Result;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

/// Default number of pooled connections per shard.
pub const DEFAULT_POOL_SIZE: usize = 5;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memory (
    id TEXT PRIMARY KEY,
    vector BLOB NOT NULL,
    metadata TEXT
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Open (or create) a shard database, with WAL enabled and schema applied.
pub fn open_shard_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;

    // WAL for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;
    init_schema(&conn)?;

    Ok(conn)
}

/// Initialize the shard schema. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    Ok(())
}

/// Encode an f32 vector as little-endian bytes for the `vector` BLOB column.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for x in vector {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Decode a `vector` BLOB back into f32s. Trailing partial floats are dropped.
pub fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Bounded pool of connections to one shard database.
///
/// `acquire` blocks until a handle is free and returns an RAII guard that
/// checks the connection back in on drop, including on error paths.
pub struct ConnectionPool {
    path: PathBuf,
    size: usize,
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
}

impl ConnectionPool {
    pub fn open(path: impl Into<PathBuf>, size: usize) -> Result<Self> {
        let path = path.into();
        let size = size.max(1);
        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            idle.push(open_shard_database(&path)?);
        }
        Ok(Self {
            path,
            size,
            idle: Mutex::new(idle),
            available: Condvar::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check out a connection, blocking until one is idle.
    pub fn acquire(&self) -> PooledConn<'_> {
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        loop {
            if let Some(conn) = idle.pop() {
                return PooledConn {
                    pool: self,
                    conn: Some(conn),
                };
            }
            idle = self
                .available
                .wait(idle)
                .expect("pool mutex poisoned");
        }
    }

    /// Close every connection and reopen against the database file. Blocks
    /// until all handles have been checked back in, so callers must not hold
    /// a [`PooledConn`] across this call.
    pub fn reset(&self) -> Result<()> {
        self.reset_with(|_| Ok(()))
    }

    /// Like [`reset`](Self::reset), but runs `swap` while every connection is
    /// closed — the window in which the database file may be replaced on disk.
    pub fn reset_with(&self, swap: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        while idle.len() < self.size {
            idle = self
                .available
                .wait(idle)
                .expect("pool mutex poisoned");
        }
        idle.clear();
        swap(&self.path)?;
        for _ in 0..self.size {
            idle.push(open_shard_database(&self.path)?);
        }
        Ok(())
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        idle.push(conn);
        self.available.notify_one();
    }
}

/// RAII guard for a pooled connection.
pub struct PooledConn<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }
}

impl DerefMut for PooledConn<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let version: String = conn
            .query_row("SELECT value FROM meta WHERE key='schema_version'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(version, "1");
    }

    #[test]
    fn vector_bytes_roundtrip() {
        let v = vec![0.5f32, -1.25, 3.0, f32::MIN_POSITIVE];
        assert_eq!(bytes_to_vector(&vector_to_bytes(&v)), v);
    }

    #[test]
    fn pool_hands_out_all_connections() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("shard_0.sqlite"), 3).unwrap();

        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        a.execute(
            "INSERT OR REPLACE INTO memory (id, vector, metadata) VALUES (?1, ?2, ?3)",
            params!["x", vector_to_bytes(&[1.0]), "{}"],
        )
        .unwrap();
        drop((a, b, c));

        // All released — acquire works again and sees the write.
        let conn = pool.acquire();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM memory", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn pool_reset_reopens_connections() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("shard_0.sqlite"), 2).unwrap();
        {
            let conn = pool.acquire();
            conn.execute(
                "INSERT OR REPLACE INTO memory (id, vector, metadata) VALUES (?1, ?2, ?3)",
                params!["x", vector_to_bytes(&[1.0]), "{}"],
            )
            .unwrap();
        }
        pool.reset().unwrap();
        let conn = pool.acquire();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM memory", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }
}
