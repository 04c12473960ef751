// Local persistence for lap sessions and known devices.
// A single SQLite file holds both tables; one `Database` value is the single
// writer and callers are expected to serialize access externally.

pub mod devices;
pub mod sessions;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use crate::errors::PitwallError;

pub use devices::DeviceRecord;
pub use sessions::Session;

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, PitwallError> {
        let conn = Connection::open(path).map_err(|e| PitwallError::StoreOpen {
            source: e,
            path: path.display().to_string(),
        })?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, PitwallError> {
        let conn = Connection::open_in_memory().map_err(|e| PitwallError::StoreOpen {
            source: e,
            path: ":memory:".to_string(),
        })?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), PitwallError> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date REAL NOT NULL,
                    stats TEXT NOT NULL,
                    latitude REAL,
                    longitude REAL,
                    lap_count INTEGER,
                    best_lap_time REAL,
                    total_time REAL
                );

                CREATE TABLE IF NOT EXISTS devices (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    friendly_name TEXT,
                    device_type TEXT,
                    last_updated REAL NOT NULL
                );
                "#,
            )
            .map_err(|e| PitwallError::SessionStore { source: e })?;
        Ok(())
    }
}

/// Wall-clock time as seconds since the Unix epoch, matching the REAL
/// columns used by the store.
pub fn now_epoch_s() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
