// Persisted set of known wearable devices, keyed by the stable uuid the
// vendor SDK assigns. Writes are upserts; a uuid is never duplicated.

use rusqlite::params;
use uuid::Uuid;

use crate::errors::PitwallError;
use crate::storage::Database;

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceRecord {
    pub uuid: Uuid,
    pub display_name: String,
    pub friendly_name: Option<String>,
    pub device_type: Option<String>,
    /// Seconds since the Unix epoch of the last write for this record.
    pub last_updated_s: f64,
}

impl Database {
    /// Insert or refresh a device record, keyed on uuid.
    pub fn upsert_device(&self, record: &DeviceRecord) -> Result<(), PitwallError> {
        self.conn
            .execute(
                r#"
                INSERT INTO devices (uuid, display_name, friendly_name, device_type, last_updated)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(uuid) DO UPDATE SET
                    display_name = ?2,
                    friendly_name = ?3,
                    device_type = ?4,
                    last_updated = ?5
                "#,
                params![
                    record.uuid.to_string(),
                    &record.display_name,
                    &record.friendly_name,
                    &record.device_type,
                    record.last_updated_s,
                ],
            )
            .map_err(|e| PitwallError::DeviceStore { source: e })?;
        Ok(())
    }

    /// All known devices in insertion order.
    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>, PitwallError> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT uuid, display_name, friendly_name, device_type, last_updated
                FROM devices
                ORDER BY id
                "#,
            )
            .map_err(|e| PitwallError::DeviceStore { source: e })?;

        let devices = stmt
            .query_map([], |row| {
                let raw: String = row.get(0)?;
                let uuid = Uuid::parse_str(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(DeviceRecord {
                    uuid,
                    display_name: row.get(1)?,
                    friendly_name: row.get(2)?,
                    device_type: row.get(3)?,
                    last_updated_s: row.get(4)?,
                })
            })
            .map_err(|e| PitwallError::DeviceStore { source: e })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PitwallError::DeviceStore { source: e })?;

        Ok(devices)
    }

    /// Remove a single device. Unknown uuids are a no-op.
    pub fn delete_device(&self, uuid: &Uuid) -> Result<(), PitwallError> {
        self.conn
            .execute(
                "DELETE FROM devices WHERE uuid = ?1",
                params![uuid.to_string()],
            )
            .map_err(|e| PitwallError::DeviceStore { source: e })?;
        Ok(())
    }

    /// Rewrite the table to exactly the given set. The destructive path:
    /// only used when the in-memory set itself shrank, never during merge.
    pub fn replace_all_devices(&self, records: &[DeviceRecord]) -> Result<(), PitwallError> {
        self.conn
            .execute("DELETE FROM devices", [])
            .map_err(|e| PitwallError::DeviceStore { source: e })?;
        for record in records {
            self.upsert_device(record)?;
        }
        Ok(())
    }
}
