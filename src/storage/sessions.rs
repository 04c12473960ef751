// Lap-session summaries are write-once records: the watch (or the user)
// creates them, the list view reads them back newest first, and the only
// other operation is deletion by id.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::errors::PitwallError;
use crate::storage::Database;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Assigned by the store on insert; `None` for a record not yet persisted.
    pub id: Option<i64>,
    /// Seconds since the Unix epoch at which the session was recorded.
    pub date_s: f64,
    /// Free-form summary blob produced by the watch app; not parsed here.
    pub stats: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lap_count: Option<u32>,
    pub best_lap_time_s: Option<f64>,
    pub total_time_s: Option<f64>,
}

impl Session {
    /// A session stamped with the current wall-clock time, with every
    /// optional field empty.
    pub fn recorded_now(stats: impl Into<String>) -> Self {
        Self {
            id: None,
            date_s: super::now_epoch_s(),
            stats: stats.into(),
            latitude: None,
            longitude: None,
            lap_count: None,
            best_lap_time_s: None,
            total_time_s: None,
        }
    }
}

impl Database {
    /// Append an immutable session record and return the assigned id.
    pub fn insert_session(&self, session: &Session) -> Result<i64, PitwallError> {
        self.conn
            .execute(
                r#"
                INSERT INTO sessions (date, stats, latitude, longitude,
                                      lap_count, best_lap_time, total_time)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    session.date_s,
                    &session.stats,
                    session.latitude,
                    session.longitude,
                    session.lap_count,
                    session.best_lap_time_s,
                    session.total_time_s,
                ],
            )
            .map_err(|e| PitwallError::SessionStore { source: e })?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All sessions, newest first. An empty store yields an empty vec.
    pub fn list_sessions(&self) -> Result<Vec<Session>, PitwallError> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, date, stats, latitude, longitude,
                       lap_count, best_lap_time, total_time
                FROM sessions
                ORDER BY date DESC
                "#,
            )
            .map_err(|e| PitwallError::SessionStore { source: e })?;

        let sessions = stmt
            .query_map([], |row| {
                Ok(Session {
                    id: row.get(0)?,
                    date_s: row.get(1)?,
                    stats: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                    lap_count: row.get(5)?,
                    best_lap_time_s: row.get(6)?,
                    total_time_s: row.get(7)?,
                })
            })
            .map_err(|e| PitwallError::SessionStore { source: e })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PitwallError::SessionStore { source: e })?;

        Ok(sessions)
    }

    /// Delete by id. Deleting an id that does not exist is a no-op.
    pub fn delete_session(&self, id: i64) -> Result<(), PitwallError> {
        self.conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(|e| PitwallError::SessionStore { source: e })?;
        Ok(())
    }
}
