//! SQLite catalog store.

use super::{
    CatalogStats, CatalogTable, DuplicateKey, EmptyFolderRecord, MediaKind, MediaRecord,
};
use crate::error::CatalogError;
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const MEDIA_COLUMNS: &str =
    "id, kind, name, size, content_hash, created_at, modified_at, perceptual_hash, path";

/// Handle on the catalog database
///
/// Uses WAL (Write-Ahead Logging) so detectors can read while a crawl
/// writes. Each crawler or detector invocation opens its own handle and
/// drops it when done.
pub struct CatalogStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl CatalogStore {
    /// Open or create the catalog at the given path
    ///
    /// The schema is created idempotently.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CatalogError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| CatalogError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        // A crawl commits one row at a time; readers wait instead of failing
        conn.busy_timeout(Duration::from_secs(5))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS media (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                content_hash TEXT,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                perceptual_hash TEXT,
                path TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS empty_folder (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                path TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
        let kind_str: String = row.get(1)?;
        let kind = kind_str.parse::<MediaKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;

        Ok(MediaRecord {
            id: row.get(0)?,
            kind,
            name: row.get(2)?,
            size: row.get::<_, i64>(3)? as u64,
            content_hash: row.get(4)?,
            created_at: row.get(5)?,
            modified_at: row.get(6)?,
            perceptual_hash: row.get(7)?,
            path: row.get(8)?,
        })
    }

    fn query_media(&self, sql: &str) -> Result<Vec<MediaRecord>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], Self::media_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert a media record
    ///
    /// Returns `false` when a row with the same id already exists; the
    /// first sighting of an item wins.
    pub fn insert(&self, record: &MediaRecord) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        debug!(name = %record.name, id = %record.id, "Inserting media row");

        let changed = conn.execute(
            "INSERT OR IGNORE INTO media
             (id, kind, name, size, content_hash, created_at, modified_at, perceptual_hash, path)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.kind.as_str(),
                record.name,
                record.size as i64,
                record.content_hash,
                record.created_at,
                record.modified_at,
                record.perceptual_hash,
                record.path,
            ],
        )?;

        Ok(changed == 1)
    }

    /// Insert an empty-folder record
    pub fn insert_empty_folder(&self, record: &EmptyFolderRecord) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        debug!(name = %record.name, id = %record.id, "Inserting empty folder row");

        let changed = conn.execute(
            "INSERT OR IGNORE INTO empty_folder (id, name, size, path) VALUES (?, ?, ?, ?)",
            params![record.id, record.name, record.size as i64, record.path],
        )?;

        Ok(changed == 1)
    }

    /// Remove every row from both tables
    pub fn clear(&self) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        info!(path = %self.db_path.display(), "Clearing catalog");
        conn.execute_batch("DELETE FROM media; DELETE FROM empty_folder;")?;
        Ok(())
    }

    /// Number of rows in a table
    pub fn count(&self, table: CatalogTable) -> Result<usize, CatalogError> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
        let count = conn.query_row(&sql, [], |row| row.get::<_, i64>(0).map(|v| v as usize))?;
        Ok(count)
    }

    /// Remove one item (media or empty folder) by id
    ///
    /// Returns `true` if a row was removed.
    pub fn remove(&self, id: &str) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        let media = conn.execute("DELETE FROM media WHERE id = ?", [id])?;
        let folders = conn.execute("DELETE FROM empty_folder WHERE id = ?", [id])?;
        Ok(media + folders > 0)
    }

    /// Rows whose key is shared by exactly two rows, ordered by key then id
    ///
    /// Consecutive rows (2i, 2i+1) form one group. Keys shared by three or
    /// more rows are not returned, and NULL keys never group.
    pub fn find_duplicates_by_key(&self, key: DuplicateKey) -> Result<Vec<MediaRecord>, CatalogError> {
        let sql = match key {
            DuplicateKey::NameAndSize => format!(
                "SELECT {MEDIA_COLUMNS} FROM media
                 WHERE (name, size) IN (
                     SELECT name, size FROM media
                     GROUP BY name, size
                     HAVING COUNT(*) = 2
                 )
                 ORDER BY name, size, id"
            ),
            DuplicateKey::Size => format!(
                "SELECT {MEDIA_COLUMNS} FROM media
                 WHERE size IN (
                     SELECT size FROM media
                     GROUP BY size
                     HAVING COUNT(*) = 2
                 )
                 ORDER BY size, id"
            ),
            DuplicateKey::ContentHash => format!(
                "SELECT {MEDIA_COLUMNS} FROM media
                 WHERE content_hash IN (
                     SELECT content_hash FROM media
                     WHERE content_hash IS NOT NULL AND content_hash != ''
                     GROUP BY content_hash
                     HAVING COUNT(*) = 2
                 )
                 ORDER BY content_hash, id"
            ),
        };

        let rows = self.query_media(&sql)?;
        info!(?key, rows = rows.len(), "Duplicate-key query");
        Ok(rows)
    }

    /// Every record carrying a perceptual hash, in insertion order
    pub fn all_with_perceptual_hash(&self) -> Result<Vec<MediaRecord>, CatalogError> {
        let rows = self.query_media(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media
             WHERE perceptual_hash IS NOT NULL AND perceptual_hash != ''
             ORDER BY rowid"
        ))?;
        info!(rows = rows.len(), "Loaded perceptual hashes");
        Ok(rows)
    }

    /// Every media record, in insertion order
    pub fn all_media_records(&self) -> Result<Vec<MediaRecord>, CatalogError> {
        self.query_media(&format!("SELECT {MEDIA_COLUMNS} FROM media ORDER BY rowid"))
    }

    /// Every empty-folder record, in insertion order
    pub fn all_empty_folders(&self) -> Result<Vec<EmptyFolderRecord>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, size, path FROM empty_folder ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EmptyFolderRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    path: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Per-kind counts and total size
    pub fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.lock()?;
        let mut stats = CatalogStats::default();

        let mut stmt =
            conn.prepare("SELECT kind, COUNT(*), COALESCE(SUM(size), 0) FROM media GROUP BY kind")?;
        let per_kind = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)? as usize,
                    row.get::<_, i64>(2)? as u64,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        for (kind, count, bytes) in per_kind {
            match kind.parse::<MediaKind>() {
                Ok(MediaKind::Image) => stats.images = count,
                Ok(MediaKind::Video) => stats.videos = count,
                Ok(MediaKind::Document) => stats.documents = count,
                Err(_) => {
                    return Err(CatalogError::Corrupted {
                        path: self.db_path.clone(),
                    })
                }
            }
            stats.total_size_bytes += bytes;
        }

        stats.hashed_images = conn.query_row(
            "SELECT COUNT(*) FROM media WHERE perceptual_hash IS NOT NULL AND perceptual_hash != ''",
            [],
            |row| row.get::<_, i64>(0).map(|v| v as usize),
        )?;
        stats.empty_folders = conn.query_row("SELECT COUNT(*) FROM empty_folder", [], |row| {
            row.get::<_, i64>(0).map(|v| v as usize)
        })?;

        Ok(stats)
    }
}
