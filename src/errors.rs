// Error types for pitwall

use snafu::Snafu;
use std::io;
use uuid::Uuid;

#[derive(Debug, Snafu)]
pub enum PitwallError {
    // Errors for the local store
    #[snafu(display("Unable to open database at {path}"))]
    StoreOpen {
        source: rusqlite::Error,
        path: String,
    },
    #[snafu(display("Session store operation failed"))]
    SessionStore { source: rusqlite::Error },
    #[snafu(display("Device store operation failed"))]
    DeviceStore { source: rusqlite::Error },

    // Errors for the wearable transport
    #[snafu(display(
        "Companion mobile service is not available; install or enable the vendor companion app"
    ))]
    SdkUnavailable,
    #[snafu(display("Failed to send message to device {device}: {description}"))]
    TransportSend { device: Uuid, description: String },

    // Companion message errors
    #[snafu(display("Companion message payload could not be decoded"))]
    MessageParse { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory"))]
    NoDataDir,
    #[snafu(display("Error writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
}
