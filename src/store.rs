use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where rendered documents live. Paths are relative document names.
pub trait DocumentStore {
    fn read(&self, path: &str) -> Result<Option<String>, StoreError>;
    fn write(&mut self, path: &str, content: &str) -> Result<(), StoreError>;
}

/// Markdown files under a vault directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentStore for FsStore {
    fn read(&self, path: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.root.join(path)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailed {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn write(&mut self, path: &str, content: &str) -> Result<(), StoreError> {
        let full = self.root.join(path);
        let write_failed = |e: std::io::Error| StoreError::WriteFailed {
            path: path.to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }
        fs::write(&full, content).map_err(write_failed)
    }
}

/// Documents kept in a single SQLite table, keyed by path.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                path TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(SqliteStore { conn })
    }
}

impl DocumentStore for SqliteStore {
    fn read(&self, path: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT content FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    fn write(&mut self, path: &str, content: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO documents (path, content) VALUES (?1, ?2)
                 ON CONFLICT(path) DO UPDATE SET
                    content = excluded.content,
                    updated_at = CURRENT_TIMESTAMP",
                params![path, content],
            )
            .map(|_| ())
            .map_err(|e| StoreError::WriteFailed {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}
