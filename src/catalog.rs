use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{named_params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;

use crate::error::AppError;
use crate::probe::ImageMetadata;
use crate::word_index::{NoisePolicy, WordIndex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    original_path TEXT UNIQUE NOT NULL,
    file_name     TEXT NOT NULL,
    folder_path   TEXT NOT NULL,
    file_size     INTEGER,
    created_at_os INTEGER,
    width         INTEGER,
    height        INTEGER,
    format        TEXT,
    metadata_json TEXT,
    png_info      TEXT,
    registered_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    memo          TEXT
);
CREATE INDEX IF NOT EXISTS idx_folder_path ON images (folder_path);
CREATE INDEX IF NOT EXISTS idx_file_name ON images (file_name);
"#;

// created_at_os is only written on first registration.
const UPSERT_FILE: &str = r#"
INSERT INTO images (original_path, file_name, folder_path, file_size, created_at_os, registered_at)
VALUES (:original_path, :file_name, :folder_path, :file_size, :created_at_os, CURRENT_TIMESTAMP)
ON CONFLICT(original_path) DO UPDATE SET
    file_name = excluded.file_name,
    folder_path = excluded.folder_path,
    file_size = excluded.file_size,
    registered_at = CURRENT_TIMESTAMP
"#;

const UPDATE_METADATA: &str = r#"
UPDATE images
SET width = :width, height = :height, format = :format, metadata_json = :metadata_json
WHERE original_path = :original_path
"#;

const UPDATE_PNG_INFO: &str =
    "UPDATE images SET png_info = :png_info WHERE original_path = :original_path";

const SUMMARY_COLUMNS: &str = "id, original_path, file_name, width, height, format, memo";

#[derive(Debug, Clone, PartialEq)]
pub struct ScannedImage {
    pub path: PathBuf,
    pub file_size: u64,
    /// OS creation time in milliseconds since the Unix epoch.
    pub created_at_os: Option<i64>,
    /// `None` when the probe failed; existing columns are then left alone.
    pub metadata: Option<ImageMetadata>,
    /// `None` clears any text stored by an earlier scan.
    pub png_info: Option<String>,
}

pub trait CatalogStore {
    /// Writes one batch atomically and returns the number of files recorded.
    fn record_batch(&mut self, batch: &[ScannedImage]) -> Result<usize, AppError>;

    /// Every stored PNG text blob, skipping images without one.
    fn png_info_blobs(&self) -> Result<Vec<String>, AppError>;
}

pub fn vocabulary<S, P>(store: &S, index: &WordIndex<P>) -> Result<BTreeSet<String>, AppError>
where
    S: CatalogStore + ?Sized,
    P: NoisePolicy,
{
    let blobs = store.png_info_blobs()?;
    Ok(index.build_par(&blobs))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub id: i64,
    pub original_path: String,
    pub file_name: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub original_path: String,
    pub file_name: String,
    pub folder_path: String,
    pub file_size: Option<i64>,
    pub created_at_os: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub metadata_json: Option<String>,
    pub png_info: Option<String>,
    pub registered_at: Option<String>,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageQuery {
    /// Substring matched against file name, memo and PNG text.
    pub term: Option<String>,
    pub folder: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ImageQuery {
    fn default() -> Self {
        Self {
            term: None,
            folder: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub images: Vec<ImageSummary>,
    pub total: usize,
}

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn list(&self, query: &ImageQuery) -> Result<Page, AppError> {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(term) = query.term.as_deref().filter(|t| !t.is_empty()) {
            clauses.push("(file_name LIKE ? OR memo LIKE ? OR png_info LIKE ?)");
            let pattern = format!("%{term}%");
            params.extend(std::iter::repeat(Value::Text(pattern)).take(3));
        }
        if let Some(folder) = &query.folder {
            clauses.push("folder_path = ?");
            params.push(Value::Text(folder.clone()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM images {where_sql}"),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(to_sql_int(query.limit)));
        params.push(Value::Integer(to_sql_int(query.offset)));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM images {where_sql} ORDER BY id ASC LIMIT ? OFFSET ?"
        ))?;
        let images = stmt
            .query_map(params_from_iter(params.iter()), summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(returned = images.len(), total, "listed images");
        Ok(Page {
            images,
            total: total as usize,
        })
    }

    pub fn get(&self, id: i64) -> Result<ImageRecord, AppError> {
        self.conn
            .query_row(
                r#"
                SELECT id, original_path, file_name, folder_path, file_size, created_at_os,
                       width, height, format, metadata_json, png_info, registered_at, memo
                FROM images WHERE id = ?
                "#,
                [id],
                |row| {
                    Ok(ImageRecord {
                        id: row.get(0)?,
                        original_path: row.get(1)?,
                        file_name: row.get(2)?,
                        folder_path: row.get(3)?,
                        file_size: row.get(4)?,
                        created_at_os: row.get(5)?,
                        width: row.get(6)?,
                        height: row.get(7)?,
                        format: row.get(8)?,
                        metadata_json: row.get(9)?,
                        png_info: row.get(10)?,
                        registered_at: row.get(11)?,
                        memo: row.get(12)?,
                    })
                },
            )
            .optional()?
            .ok_or(AppError::NotFound(id))
    }

    /// Stored PNG text of one image; `Ok(None)` when it has none.
    pub fn png_info(&self, id: i64) -> Result<Option<String>, AppError> {
        self.conn
            .query_row("SELECT png_info FROM images WHERE id = ?", [id], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?
            .ok_or(AppError::NotFound(id))
    }

    pub fn distinct_folders(&self) -> Result<Vec<String>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT folder_path FROM images ORDER BY folder_path ASC")?;
        let folders = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(folders)
    }

    /// Sets the same memo on every listed image; returns rows changed.
    pub fn update_memos(&mut self, ids: &[i64], memo: &str) -> Result<usize, AppError> {
        require_ids(ids)?;
        let mut params = vec![Value::Text(memo.to_string())];
        params.extend(ids.iter().map(|id| Value::Integer(*id)));
        let sql = format!("UPDATE images SET memo = ? WHERE id IN ({})", placeholders(ids.len()));

        let tx = self.conn.transaction()?;
        let changed = tx.execute(&sql, params_from_iter(params.iter()))?;
        tx.commit()?;
        Ok(changed)
    }

    /// Removes catalog rows only; the image files are not touched.
    pub fn delete(&mut self, ids: &[i64]) -> Result<usize, AppError> {
        require_ids(ids)?;
        let sql = format!("DELETE FROM images WHERE id IN ({})", placeholders(ids.len()));

        let tx = self.conn.transaction()?;
        let deleted = tx.execute(&sql, params_from_iter(ids.iter()))?;
        tx.commit()?;
        Ok(deleted)
    }

    pub fn paths_for(&self, ids: &[i64]) -> Result<Vec<(i64, PathBuf)>, AppError> {
        require_ids(ids)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, original_path FROM images WHERE id IN ({}) ORDER BY id ASC",
            placeholders(ids.len())
        ))?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, PathBuf::from(row.get::<_, String>(1)?)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl CatalogStore for SqliteCatalog {
    fn record_batch(&mut self, batch: &[ScannedImage]) -> Result<usize, AppError> {
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare(UPSERT_FILE)?;
            let mut metadata = tx.prepare(UPDATE_METADATA)?;
            let mut png_info = tx.prepare(UPDATE_PNG_INFO)?;
            for image in batch {
                let original_path = image.path.to_string_lossy().to_string();
                let file_name = image
                    .path
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| original_path.clone());
                let folder_path = image
                    .path
                    .parent()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default();

                upsert.execute(named_params! {
                    ":original_path": original_path,
                    ":file_name": file_name,
                    ":folder_path": folder_path,
                    ":file_size": image.file_size as i64,
                    ":created_at_os": image.created_at_os,
                })?;
                if let Some(meta) = &image.metadata {
                    metadata.execute(named_params! {
                        ":width": meta.width,
                        ":height": meta.height,
                        ":format": meta.format,
                        ":metadata_json": meta.to_json()?,
                        ":original_path": original_path,
                    })?;
                }
                png_info.execute(named_params! {
                    ":png_info": image.png_info,
                    ":original_path": original_path,
                })?;
            }
        }
        tx.commit()?;
        Ok(batch.len())
    }

    fn png_info_blobs(&self) -> Result<Vec<String>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT png_info FROM images WHERE png_info IS NOT NULL ORDER BY id ASC")?;
        let blobs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(blobs)
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ImageSummary> {
    Ok(ImageSummary {
        id: row.get(0)?,
        original_path: row.get(1)?,
        file_name: row.get(2)?,
        width: row.get(3)?,
        height: row.get(4)?,
        format: row.get(5)?,
        memo: row.get(6)?,
    })
}

fn require_ids(ids: &[i64]) -> Result<(), AppError> {
    if ids.is_empty() {
        return Err(AppError::Invalid("no images selected".to_string()));
    }
    Ok(())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
