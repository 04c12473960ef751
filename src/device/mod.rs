// Known-device management: reconciliation of discovery responses, cached
// connection status, and the typed change-event stream the UI subscribes to.

pub mod registry;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use registry::DeviceRegistry;
pub use transport::{DeviceTransport, SimulatedTransport, TransportEvent};

/// Reference to a wearable as reported by a discovery response. The uuid is
/// the only stable key; names are whatever the vendor payload carried.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHandle {
    pub uuid: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
}

/// Connection state of a single device, mirroring the vendor SDK's status
/// values. Transitions come only from the transport's event stream; the
/// registry observes and caches, it never invents one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    NotConnected,
    NotFound,
    BluetoothUnready,
    Invalid,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connected => "connected",
            Self::NotConnected => "not connected",
            Self::NotFound => "not found",
            Self::BluetoothUnready => "bluetooth unready",
            Self::Invalid => "invalid",
        };
        write!(f, "{label}")
    }
}

/// Typed replacement for the stringly-named "devices changed" broadcast of
/// notification-center designs. Delivered on a plain mpsc channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    DevicesChanged,
}
