//! Table snapshots
//!
//! Every table is persisted as one JSON document, `<data_dir>/<name>.json`,
//! holding its name, columns and rows. A snapshot is rewritten in full after
//! each mutation: the document goes to `<name>.json.tmp`, is fsynced, and is
//! renamed over the previous snapshot, so a crash leaves either the old or
//! the new version on disk, never a torn one.

use super::row::Row;
use super::table::Column;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Extension appended while a snapshot is being written
const TMP_EXTENSION: &str = "json.tmp";

/// On-disk form of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

/// Borrowed view used when writing, to avoid cloning rows under the lock
#[derive(Serialize)]
struct SnapshotRef<'a> {
    name: &'a str,
    columns: &'a [Column],
    rows: &'a [Row],
}

/// Check that a table name can be used as a snapshot file name
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Reads and writes table snapshots in a data directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open a snapshot directory, creating it if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the snapshot for a table
    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", table, SNAPSHOT_EXTENSION))
    }

    /// Durably replace the snapshot of a table
    pub fn save(&self, name: &str, columns: &[Column], rows: &[Row]) -> Result<()> {
        if !is_valid_table_name(name) {
            return Err(Error::InvalidTableName(name.to_string()));
        }
        let snapshot = SnapshotRef {
            name,
            columns,
            rows,
        };
        self.write_atomic(name, &snapshot)
            .map_err(|source| Error::PersistFailed {
                table: name.to_string(),
                source,
            })?;
        debug!(table = name, rows = rows.len(), "snapshot written");
        Ok(())
    }

    fn write_atomic(&self, name: &str, snapshot: &SnapshotRef<'_>) -> std::io::Result<()> {
        let path = self.path_for(name);
        let tmp_path = self.dir.join(format!("{}.{}", name, TMP_EXTENSION));

        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;
        sync_dir(&self.dir)
    }

    /// Read every snapshot in the directory
    ///
    /// Any snapshot that cannot be read or does not describe a consistent
    /// table is an error: a snapshot is trusted verbatim once loaded.
    pub fn load_all(&self) -> Result<Vec<TableSnapshot>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION)
            {
                paths.push(path);
            }
        }
        paths.sort();

        paths.iter().map(|path| self.load(path)).collect()
    }

    fn load(&self, path: &Path) -> Result<TableSnapshot> {
        let corrupt = |reason: String| Error::CorruptSnapshot {
            path: path.display().to_string(),
            reason,
        };

        let data = fs::read(path).map_err(|e| corrupt(e.to_string()))?;
        let snapshot: TableSnapshot =
            serde_json::from_slice(&data).map_err(|e| corrupt(e.to_string()))?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if snapshot.name != stem {
            return Err(corrupt(format!(
                "table name '{}' does not match file name",
                snapshot.name
            )));
        }
        super::table::validate_columns(&snapshot.name, &snapshot.columns)
            .map_err(|e| corrupt(e.to_string()))?;
        if let Some((i, row)) = snapshot
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != snapshot.columns.len())
        {
            return Err(corrupt(format!(
                "row {} has {} value(s), expected {}",
                i,
                row.len(),
                snapshot.columns.len()
            )));
        }

        Ok(snapshot)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
