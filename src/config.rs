use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::{Uuid, uuid};

use crate::errors::PitwallError;

const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "pitwall.sqlite";

/// UUID of the lap-timer app installed on the watch. An app instance must be
/// addressed per device; the uuid itself is the same everywhere.
pub const LAP_TIMER_APP_UUID: Uuid = uuid!("dc999a91-9c3d-4fb5-9ab7-1f13ff2ba94c");

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Private URL scheme the selection-response handoff must carry.
    pub url_scheme: String,
    /// Bundle identifier of the vendor companion app trusted as a handoff
    /// source. A handoff without a source identifier is also accepted.
    pub trusted_source_app: String,
    /// Override for the database location; defaults to the platform data dir.
    pub database_path: Option<PathBuf>,
    /// The watch app companion messages are addressed to.
    pub watch_app_uuid: Uuid,
    /// Send a greeting message to the watch app when a device connects.
    pub greet_on_connect: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url_scheme: "pitwall".to_string(),
            trusted_source_app: "com.garmin.connect.mobile".to_string(),
            database_path: None,
            watch_app_uuid: LAP_TIMER_APP_UUID,
            greet_on_connect: true,
        }
    }
}

impl AppConfig {
    pub fn from_local_file() -> Option<Self> {
        let config_path = dirs::config_dir()?.join("pitwall").join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let file = std::fs::File::open(config_path).expect("Could not open config file");
            Some(serde_json::from_reader(file).expect("Could not parse config file"))
        } else {
            None
        }
    }

    pub fn save(&self) -> Result<(), PitwallError> {
        let config_path = dirs::config_dir()
            .ok_or(PitwallError::NoDataDir)?
            .join("pitwall")
            .join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            std::fs::create_dir_all(config_path.parent().unwrap())
                .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::to_writer(file, self)
            .map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }

    /// Resolved location of the SQLite file, creating the data directory if
    /// needed.
    pub fn database_path(&self) -> Result<PathBuf, PitwallError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or(PitwallError::NoDataDir)?
            .join("pitwall");
        std::fs::create_dir_all(&data_dir).map_err(|e| PitwallError::ConfigIOError { source: e })?;
        Ok(data_dir.join(DB_FILE_NAME))
    }
}
