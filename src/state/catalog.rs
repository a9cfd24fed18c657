use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::data::FrameRecord;
use crate::error::{DarkError, Result};
use crate::filter::query::{Column, FrameFilter};

/// The FrameCatalog manages one library's SQLite database.
/// It stores the acquisition metadata of every indexed dark frame.
///
/// A catalog is opened for the duration of one operation and dropped
/// afterwards; nothing keeps a connection open between commands.
pub struct FrameCatalog {
    conn: Connection,
    db_path: PathBuf,
}

impl FrameCatalog {
    /// Open (or create) the catalog at `db_path` and make sure the schema exists.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DarkError::io(
                    format!("creating catalog directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let conn = Connection::open(db_path)?;
        debug!("📁 Frame catalog opened at: {}", db_path.display());

        let catalog = FrameCatalog {
            conn,
            db_path: db_path.to_path_buf(),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Open an in-memory catalog (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let catalog = FrameCatalog {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Initialize the database schema.
    /// The CHECK constraint mirrors the indexing rule: ISO or gain must be known.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS darks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                path        TEXT NOT NULL UNIQUE,
                ccd_temp    REAL NOT NULL,
                iso         INTEGER,
                gain        REAL,
                exptime     REAL NOT NULL,
                naxis1      INTEGER NOT NULL,
                naxis2      INTEGER NOT NULL,
                xbinning    INTEGER NOT NULL,
                ybinning    INTEGER NOT NULL,
                CHECK (iso IS NOT NULL OR gain IS NOT NULL)
            )",
            [],
        )?;

        // Temperature is the first (and most selective) criterion
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_darks_ccd_temp ON darks(ccd_temp)",
            [],
        )?;

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a count of frames in the catalog
    pub fn frame_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM darks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Insert frames in one transaction.
    /// Frames whose path is already cataloged are skipped.
    /// Returns the number of rows actually inserted.
    pub fn insert_frames(&mut self, records: &[FrameRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_all(&tx, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Replace the whole catalog content with `records`.
    ///
    /// The delete and the inserts share one transaction, so readers see either
    /// the old set or the new one.
    pub fn replace_frames(&mut self, records: &[FrameRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM darks", [])?;
        let inserted = insert_all(&tx, records)?;
        tx.commit()?;

        info!(
            "🔄 Catalog {} replaced: {} old frames, {} new",
            self.db_path.display(),
            removed,
            inserted
        );
        Ok(inserted)
    }

    /// Distinct values of `column` among frames matching `filter`, rendered as
    /// strings (e.g. "800", "-10", "4144x2822"). Order is unspecified.
    pub fn distinct_values(&self, column: Column, filter: &FrameFilter) -> Result<Vec<String>> {
        let (where_sql, params) = filter.where_clause();
        let sql = format!("SELECT DISTINCT {} FROM darks{}", column.sql(), where_sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, Value>(0))?;

        let mut values = Vec::new();
        for value in rows {
            if let Some(text) = value_to_string(value?) {
                values.push(text);
            }
        }
        Ok(values)
    }

    /// Number of frames matching `filter`
    pub fn count_matching(&self, filter: &FrameFilter) -> Result<u64> {
        let (where_sql, params) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM darks{}", where_sql);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Paths of up to `limit` frames matching `filter`, in storage order
    pub fn matching_paths(&self, filter: &FrameFilter, limit: usize) -> Result<Vec<PathBuf>> {
        let (where_sql, mut params) = filter.where_clause();
        let sql = format!("SELECT path FROM darks{} ORDER BY id LIMIT ?", where_sql);
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&sql)?;
        let paths = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
            .map(|path| path.map(PathBuf::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// All frames, in storage order
    pub fn all_frames(&self) -> Result<Vec<FrameRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, ccd_temp, iso, gain, exptime, naxis1, naxis2, xbinning, ybinning
             FROM darks ORDER BY id",
        )?;

        let frame_iter = stmt.query_map([], |row| {
            Ok(FrameRecord {
                path: row.get(0)?,
                ccd_temp: row.get(1)?,
                iso: row.get(2)?,
                gain: row.get(3)?,
                exptime: row.get(4)?,
                width: row.get(5)?,
                height: row.get(6)?,
                xbinning: row.get(7)?,
                ybinning: row.get(8)?,
            })
        })?;

        let mut frames = Vec::new();
        for frame in frame_iter {
            frames.push(frame?);
        }
        Ok(frames)
    }
}

fn insert_all(conn: &Connection, records: &[FrameRecord]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO darks (path, ccd_temp, iso, gain, exptime,
                            naxis1, naxis2, xbinning, ybinning)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(path) DO NOTHING",
    )?;

    let mut inserted = 0;
    for record in records {
        inserted += stmt.execute(params![
            record.path,
            record.ccd_temp,
            record.iso,
            record.gain,
            record.exptime,
            record.width,
            record.height,
            record.xbinning,
            record.ybinning,
        ])?;
    }
    Ok(inserted)
}

/// Render a stored value the way it is offered as a choice.
/// Whole reals print without a fractional part ("120", not "120.0").
fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Null | Value::Blob(_) => None,
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for FrameCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCatalog")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::filter::query::Predicate;

    pub(crate) fn frame(path: &str, temp: f64, iso: Option<i64>, gain: Option<f64>, exptime: f64) -> FrameRecord {
        FrameRecord {
            path: path.to_string(),
            ccd_temp: temp,
            iso,
            gain,
            exptime,
            width: 4144,
            height: 2822,
            xbinning: 1,
            ybinning: 1,
        }
    }

    #[test]
    fn test_insert_and_count() {
        let mut catalog = FrameCatalog::open_in_memory().unwrap();
        let inserted = catalog
            .insert_frames(&[
                frame("/d/a.fit", -10.0, Some(800), None, 120.0),
                frame("/d/b.fit", -10.0, Some(800), None, 120.0),
                frame("/d/a.fit", -10.0, Some(800), None, 120.0),
            ])
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(catalog.frame_count().unwrap(), 2);
    }

    #[test]
    fn test_schema_rejects_frame_without_iso_or_gain() {
        let mut catalog = FrameCatalog::open_in_memory().unwrap();
        let result = catalog.insert_frames(&[
            frame("/d/ok.fit", -10.0, Some(800), None, 120.0),
            frame("/d/bad.fit", -10.0, None, None, 120.0),
        ]);
        assert!(result.is_err());
        // The failed transaction left nothing behind
        assert_eq!(catalog.frame_count().unwrap(), 0);
    }

    #[test]
    fn test_replace_frames_drops_old_rows() {
        let mut catalog = FrameCatalog::open_in_memory().unwrap();
        catalog
            .insert_frames(&[frame("/d/old.fit", -10.0, Some(800), None, 120.0)])
            .unwrap();
        catalog
            .replace_frames(&[
                frame("/d/new1.fit", -5.0, None, Some(120.0), 60.0),
                frame("/d/new2.fit", -5.0, None, Some(120.0), 60.0),
            ])
            .unwrap();

        let paths: Vec<String> = catalog.all_frames().unwrap().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["/d/new1.fit", "/d/new2.fit"]);
    }

    #[test]
    fn test_distinct_values_render_like_choices() {
        let mut catalog = FrameCatalog::open_in_memory().unwrap();
        catalog
            .insert_frames(&[
                frame("/d/a.fit", -10.0, Some(800), None, 120.0),
                frame("/d/b.fit", -10.0, None, Some(1.5), 0.5),
            ])
            .unwrap();

        let mut iso = catalog.distinct_values(Column::IsoOrGain, &FrameFilter::all()).unwrap();
        iso.sort();
        assert_eq!(iso, vec!["1.5", "800"]);

        let mut exposure = catalog.distinct_values(Column::ExposureTime, &FrameFilter::all()).unwrap();
        exposure.sort();
        assert_eq!(exposure, vec!["0.5", "120"]);

        let resolution = catalog.distinct_values(Column::Resolution, &FrameFilter::all()).unwrap();
        assert_eq!(resolution, vec!["4144x2822"]);
    }

    #[test]
    fn test_matching_paths_in_storage_order_with_limit() {
        let mut catalog = FrameCatalog::open_in_memory().unwrap();
        catalog
            .insert_frames(&[
                frame("/d/c.fit", -10.0, Some(800), None, 120.0),
                frame("/d/a.fit", -10.0, Some(800), None, 120.0),
                frame("/d/b.fit", -10.0, Some(400), None, 120.0),
                frame("/d/d.fit", -10.0, Some(800), None, 120.0),
            ])
            .unwrap();

        let filter = FrameFilter::all().and(Predicate::eq(Column::IsoOrGain, "800"));
        let paths = catalog.matching_paths(&filter, 2).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/d/c.fit"), PathBuf::from("/d/a.fit")]);
        assert_eq!(catalog.matching_paths(&filter, 2).unwrap(), paths);
        assert_eq!(catalog.count_matching(&filter).unwrap(), 3);
    }

    #[test]
    fn test_open_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("stores").join("ScopeA.sqlite");
        let catalog = FrameCatalog::open(&db_path).unwrap();
        assert_eq!(catalog.frame_count().unwrap(), 0);
        assert!(db_path.exists());
    }
}
