// Library interface for pitwall
// This allows integration tests to access internal modules

pub mod companion;
pub mod config;
pub mod device;
pub mod errors;
pub mod handoff;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use companion::CompanionMessage;
pub use config::AppConfig;
pub use device::{
    ConnectionStatus, DeviceHandle, DeviceRegistry, DeviceTransport, RegistryEvent,
    SimulatedTransport, TransportEvent,
};
pub use errors::PitwallError;
pub use service::CompanionService;
pub use storage::{Database, DeviceRecord, Session};
