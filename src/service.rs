// Wiring between the transport's asynchronous callbacks and the single
// logical owner of mutable state. The transport fires events from arbitrary
// threads into one mpsc channel; `CompanionService::run` drains that channel
// on one thread, so the registry and the store never see concurrent writers.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

use log::{error, info, warn};

use crate::companion::{self, CompanionMessage};
use crate::config::AppConfig;
use crate::device::{
    ConnectionStatus, DeviceRegistry, DeviceTransport, RegistryEvent, TransportEvent,
};
use crate::errors::PitwallError;
use crate::handoff;
use crate::storage::Database;

pub struct CompanionService {
    db: Database,
    registry: DeviceRegistry,
    transport: Arc<dyn DeviceTransport>,
    config: AppConfig,
}

impl CompanionService {
    /// Build the service and restore the known-device set from disk,
    /// re-subscribing every restored device for status events.
    pub fn new(
        db: Database,
        transport: Arc<dyn DeviceTransport>,
        config: AppConfig,
        registry_events: Sender<RegistryEvent>,
    ) -> Result<Self, PitwallError> {
        let mut registry = DeviceRegistry::new(transport.clone(), registry_events);
        registry.restore_from_disk(&db)?;
        Ok(Self {
            db,
            registry,
            transport,
            config,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn registry(&mut self) -> &mut DeviceRegistry {
        &mut self.registry
    }

    /// Ask the vendor app to run device selection. Fails with
    /// `SdkUnavailable` when the companion service is not reachable; the
    /// caller should tell the user to install it rather than retry.
    pub fn begin_discovery(&self) -> Result<(), PitwallError> {
        if !self.transport.sdk_ready() {
            return Err(PitwallError::SdkUnavailable);
        }
        self.transport.begin_discovery()
    }

    /// Inbound URL from the OS. Returns whether the URL was ours: `false`
    /// means "not handled, let someone else try", never an error.
    pub fn handle_open_url(
        &mut self,
        url: &str,
        source_app: Option<&str>,
    ) -> Result<bool, PitwallError> {
        let Some(handles) = handoff::selection_handles(url, source_app, &self.config) else {
            return Ok(false);
        };
        self.registry.merge_discovered(&self.db, &handles)?;
        Ok(true)
    }

    /// Apply one transport callback. All mutation happens here, on whichever
    /// single thread drives the event loop.
    pub fn process_event(&mut self, event: TransportEvent) -> Result<(), PitwallError> {
        match event {
            TransportEvent::DiscoveryResponse { handles } => {
                self.registry.merge_discovered(&self.db, &handles)?;
            }
            TransportEvent::StatusChanged { device, status } => {
                self.registry.handle_status_changed(device, status);
                if status == ConnectionStatus::Connected && self.config.greet_on_connect {
                    // One-shot greeting to the watch app; a failed send is
                    // logged by broadcast and otherwise tolerated.
                    companion::broadcast(
                        self.transport.as_ref(),
                        &[device],
                        &CompanionMessage::greeting(),
                    );
                }
            }
            TransportEvent::MessageReceived { device, payload } => {
                self.handle_message(device, &payload)?;
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, device: uuid::Uuid, payload: &[u8]) -> Result<(), PitwallError> {
        let message = match companion::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                // Undecodable payloads are dropped here, never surfaced.
                warn!("dropping message from {device}: {e}");
                return Ok(());
            }
        };
        if let Some(session) = companion::session_from_summary(&message) {
            let id = self.db.insert_session(&session)?;
            info!("stored session {id} from device {device}");
        } else if let CompanionMessage::Greeting { text } = &message {
            info!("greeting from {device}: {text}");
        }
        Ok(())
    }

    /// Forget a known device and drop its status subscription.
    pub fn forget_device(&mut self, uuid: &uuid::Uuid) -> Result<(), PitwallError> {
        self.registry.remove(&self.db, uuid)
    }

    /// Send a message to every currently connected device's watch app.
    pub fn broadcast(&self, message: &CompanionMessage) -> usize {
        companion::broadcast(
            self.transport.as_ref(),
            &self.registry.connected_devices(),
            message,
        )
    }

    /// Drain transport events until every sender is gone. Each event is
    /// terminal for itself only: a failed store write is logged and the loop
    /// keeps serving the next event.
    pub fn run(&mut self, events: Receiver<TransportEvent>) {
        for event in events {
            if let Err(e) = self.process_event(event) {
                error!("event handling failed: {e}");
            }
        }
        info!("transport closed, event loop finished");
    }
}
