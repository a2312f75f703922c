//! [`SqliteIndex`] — the SQLite implementation of [`TrackerIndex`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tracing::info;

use ttn_core::{
  index::{OpenOutcome, TrackerIndex},
  record::{ThingRecord, TrackerRecord},
};

use crate::{
  Error, Result,
  encode::{RawTracker, THING_COLUMNS, TRACKER_COLUMNS, encode_dt, thing_from_row},
  query::fts_query,
  schema::SCHEMA,
};

/// Layout version this build reads and writes. Bump whenever the schema or
/// the meaning of a stored field changes; existing indexes are then rebuilt.
pub const INDEX_VERSION: i64 = 3;

/// Database file inside the index directory.
pub const DB_FILE: &str = "index.sqlite3";

// ─── Index ───────────────────────────────────────────────────────────────────

/// A tracker index backed by a single SQLite file inside an index directory.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// run on the connection's own thread, one at a time, which serialises writes
/// and gives every read a committed snapshot.
#[derive(Clone)]
pub struct SqliteIndex {
  conn: tokio_rusqlite::Connection,
}

impl SqliteIndex {
  /// Open the index in `dir`, creating it if absent and rebuilding it if it
  /// was written by another layout version.
  pub async fn open_or_create(dir: impl AsRef<Path>) -> Result<(Self, OpenOutcome)> {
    Self::open_or_create_versioned(dir, INDEX_VERSION).await
  }

  /// [`open_or_create`](Self::open_or_create) with an explicit expected
  /// version.
  ///
  /// On a mismatch every stored tracker URL is collected, the whole
  /// directory is removed and recreated empty, and the URLs are handed back
  /// in [`OpenOutcome::Rebuilt`] for the caller to crawl again. The index
  /// itself never fetches anything.
  pub async fn open_or_create_versioned(
    dir: impl AsRef<Path>,
    version: i64,
  ) -> Result<(Self, OpenOutcome)> {
    let dir = dir.as_ref();

    if !tokio::fs::try_exists(dir).await? {
      info!(path = %dir.display(), "index directory does not exist, creating index");
      let index = Self::create(dir, version).await?;
      return Ok((index, OpenOutcome::Created));
    }

    let conn = tokio_rusqlite::Connection::open(dir.join(DB_FILE)).await?;
    let (found, previous_urls) = match read_state(&conn).await {
      Ok(state) => state,
      // Nothing is recoverable from a file SQLite cannot read; rebuild it
      // like any other unversioned index.
      Err(e) if is_not_a_database(&e) => {
        info!(path = %dir.display(), error = %e, "index file is not a database");
        (None, Vec::new())
      }
      Err(e) => return Err(e),
    };

    match check_version(found, version) {
      Ok(()) => {
        let index = Self { conn };
        index.init_schema().await?;
        Ok((index, OpenOutcome::Opened))
      }
      Err(mismatch) => {
        info!(
          path = %dir.display(),
          known = previous_urls.len(),
          "{mismatch}, recreating index",
        );
        conn.close().await?;
        tokio::fs::remove_dir_all(dir).await?;
        let index = Self::create(dir, version).await?;
        Ok((index, OpenOutcome::Rebuilt { previous_urls }))
      }
    }
  }

  /// Open an in-memory index — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let index = Self { conn };
    index.init_schema().await?;
    index.write_version(INDEX_VERSION).await?;
    Ok(index)
  }

  /// Close the connection, waiting for SQLite to checkpoint and release the
  /// database files.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  /// The stored layout version, if any.
  pub async fn version(&self) -> Result<Option<i64>> {
    let (found, _) = read_state(&self.conn).await?;
    Ok(found)
  }

  async fn create(dir: &Path, version: i64) -> Result<Self> {
    tokio::fs::create_dir_all(dir).await?;
    let conn = tokio_rusqlite::Connection::open(dir.join(DB_FILE)).await?;
    let index = Self { conn };
    index.init_schema().await?;
    index.write_version(version).await?;
    Ok(index)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn write_version(&self, version: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO index_meta (key, value) VALUES ('version', ?1)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![version],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Read the stored version and every known tracker URL, tolerating a file
/// that has neither table yet.
async fn read_state(conn: &tokio_rusqlite::Connection) -> Result<(Option<i64>, Vec<String>)> {
  let state = conn
    .call(|conn| {
      let has_table = |name: &str| -> rusqlite::Result<bool> {
        conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
          rusqlite::params![name],
          |row| row.get(0),
        )
      };

      let version: Option<i64> = if has_table("index_meta")? {
        conn
          .query_row(
            "SELECT value FROM index_meta WHERE key = 'version'",
            [],
            |row| row.get(0),
          )
          .optional()?
      } else {
        None
      };

      let urls = if has_table("trackers")? {
        let mut stmt = conn.prepare("SELECT url FROM trackers ORDER BY id")?;
        stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?
      } else {
        Vec::new()
      };

      Ok((version, urls))
    })
    .await?;
  Ok(state)
}

fn is_not_a_database(e: &Error) -> bool {
  matches!(
    e,
    Error::Database(tokio_rusqlite::Error::Rusqlite(e))
      if e.sqlite_error_code() == Some(rusqlite::ErrorCode::NotADatabase)
  )
}

fn check_version(found: Option<i64>, expected: i64) -> Result<()> {
  if found == Some(expected) {
    Ok(())
  } else {
    Err(Error::VersionMismatch { found, expected })
  }
}

// ─── TrackerIndex impl ───────────────────────────────────────────────────────

impl TrackerIndex for SqliteIndex {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_tracker(&self, record: TrackerRecord) -> Result<()> {
    let updated  = encode_dt(record.updated);
    let accessed = encode_dt(record.accessed);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO trackers (url, description, updated, accessed)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(url) DO UPDATE SET
             description = excluded.description,
             updated     = excluded.updated,
             accessed    = excluded.accessed",
          rusqlite::params![record.url, record.description, updated, accessed],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_thing(&self, record: ThingRecord) -> Result<()> {
    self.upsert_things(vec![record]).await
  }

  async fn upsert_things(&self, records: Vec<ThingRecord>) -> Result<()> {
    if records.is_empty() {
      return Ok(());
    }

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO things (
               thing_id, url, title, description, authors, licenses, tags, tracker
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(thing_id) DO UPDATE SET
               url         = excluded.url,
               title       = excluded.title,
               description = excluded.description,
               authors     = excluded.authors,
               licenses    = excluded.licenses,
               tags        = excluded.tags,
               tracker     = excluded.tracker",
          )?;
          for r in &records {
            stmt.execute(rusqlite::params![
              r.id,
              r.url,
              r.title,
              r.description,
              r.authors,
              r.licenses,
              r.tags,
              r.tracker,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Lookups ───────────────────────────────────────────────────────────────

  async fn find_tracker_by_url(&self, url: &str) -> Result<Option<TrackerRecord>> {
    let url = url.to_owned();

    let raw: Option<RawTracker> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {TRACKER_COLUMNS} FROM trackers t WHERE t.url = ?1"),
              rusqlite::params![url],
              RawTracker::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTracker::into_record).transpose()
  }

  async fn get_thing(&self, id: &str) -> Result<Option<ThingRecord>> {
    let id = id.to_owned();

    let thing = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {THING_COLUMNS} FROM things t WHERE t.thing_id = ?1"),
              rusqlite::params![id],
              thing_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(thing)
  }

  async fn tracker_for_thing_url(&self, thing_url: &str) -> Result<Option<String>> {
    let thing_url = thing_url.to_owned();

    let tracker = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT tracker FROM things WHERE url = ?1 ORDER BY id LIMIT 1",
              rusqlite::params![thing_url],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(tracker)
  }

  // ── Search ────────────────────────────────────────────────────────────────

  async fn search_things(&self, text: &str) -> Result<Vec<ThingRecord>> {
    let Some(query) = fts_query(text) else {
      return Ok(Vec::new());
    };

    let things = self
      .conn
      .call(move |conn| {
        // bm25 weights follow the FTS column order: title, description,
        // tags, licenses. Lower scores rank higher.
        let mut stmt = conn.prepare(&format!(
          "SELECT {THING_COLUMNS}
           FROM things_fts
           JOIN things t ON t.id = things_fts.rowid
           WHERE things_fts MATCH ?1
           ORDER BY bm25(things_fts, 10.0, 1.0, 4.0, 2.0), t.title"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![query], thing_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(things)
  }

  async fn search_trackers(&self, text: &str) -> Result<Vec<TrackerRecord>> {
    let Some(query) = fts_query(text) else {
      return Ok(Vec::new());
    };

    let raws: Vec<RawTracker> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRACKER_COLUMNS}
           FROM trackers_fts
           JOIN trackers t ON t.id = trackers_fts.rowid
           WHERE trackers_fts MATCH ?1
           ORDER BY bm25(trackers_fts), t.url"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![query], RawTracker::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTracker::into_record).collect()
  }

  // ── Dumps ─────────────────────────────────────────────────────────────────

  async fn list_trackers(&self) -> Result<Vec<TrackerRecord>> {
    let raws: Vec<RawTracker> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {TRACKER_COLUMNS} FROM trackers t ORDER BY t.id"))?;
        let rows = stmt
          .query_map([], RawTracker::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTracker::into_record).collect()
  }

  async fn list_things(&self) -> Result<Vec<ThingRecord>> {
    let things = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {THING_COLUMNS} FROM things t ORDER BY t.id"))?;
        let rows = stmt
          .query_map([], thing_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(things)
  }
}
