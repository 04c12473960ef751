// The seam between pitwall and the vendor wearable SDK. Everything the SDK
// does for us (discovery, status queries, per-device event subscriptions,
// message delivery) goes through `DeviceTransport`, so the closed SDK can be
// swapped for a simulator in tests and in the `run` soak mode.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::mpsc::Sender;

use log::debug;
use uuid::Uuid;

use crate::device::{ConnectionStatus, DeviceHandle};
use crate::errors::PitwallError;

/// Asynchronous callbacks from the SDK. The transport may fire these from
/// any thread; they are marshaled through one mpsc channel so that a single
/// owner applies every mutation (see `CompanionService::run`).
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// The user picked devices in the vendor app and the selection response
    /// came back to us.
    DiscoveryResponse { handles: Vec<DeviceHandle> },
    StatusChanged {
        device: Uuid,
        status: ConnectionStatus,
    },
    MessageReceived { device: Uuid, payload: Vec<u8> },
}

pub trait DeviceTransport: Send + Sync {
    /// Whether the vendor companion service is reachable at all. When false,
    /// discovery and sends fail with `SdkUnavailable` and the caller should
    /// prompt the user rather than retry.
    fn sdk_ready(&self) -> bool;

    /// Ask the vendor app to run device selection. The resulting handles
    /// arrive later as a `DiscoveryResponse` event.
    fn begin_discovery(&self) -> Result<(), PitwallError>;

    /// Fresh status query for one device.
    fn device_status(&self, device: &Uuid) -> ConnectionStatus;

    fn register_for_events(&self, device: &Uuid);
    fn unregister_for_events(&self, device: &Uuid);

    fn send_message(&self, device: &Uuid, payload: &[u8]) -> Result<(), PitwallError>;
}

/// In-process stand-in for the vendor SDK. Statuses and selection responses
/// are scripted by the caller; register/unregister and outbound messages are
/// recorded so tests can assert on the side effects the contract requires.
pub struct SimulatedTransport {
    events: Sender<TransportEvent>,
    state: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    ready: bool,
    statuses: HashMap<Uuid, ConnectionStatus>,
    registered: HashSet<Uuid>,
    selection: Vec<DeviceHandle>,
    sent: Vec<(Uuid, Vec<u8>)>,
}

impl SimulatedTransport {
    pub fn new(events: Sender<TransportEvent>) -> Self {
        Self {
            events,
            state: Mutex::new(SimState {
                ready: true,
                ..SimState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("simulated transport poisoned")
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    /// Script what the next `begin_discovery` call will hand back.
    pub fn script_selection(&self, handles: Vec<DeviceHandle>) {
        self.lock().selection = handles;
    }

    /// Move a device to a new status and fire the status callback, as the
    /// SDK would for a registered device.
    pub fn set_status(&self, device: Uuid, status: ConnectionStatus) {
        self.lock().statuses.insert(device, status);
        let _ = self
            .events
            .send(TransportEvent::StatusChanged { device, status });
    }

    /// Change a status without firing the callback. Used to model the stale
    /// cache the lazy `Invalid` refresh exists for.
    pub fn set_status_silently(&self, device: Uuid, status: ConnectionStatus) {
        self.lock().statuses.insert(device, status);
    }

    /// Deliver an inbound companion message from a device.
    pub fn deliver_message(&self, device: Uuid, payload: Vec<u8>) {
        let _ = self
            .events
            .send(TransportEvent::MessageReceived { device, payload });
    }

    pub fn registered_devices(&self) -> HashSet<Uuid> {
        self.lock().registered.clone()
    }

    pub fn sent_messages(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.lock().sent.clone()
    }
}

impl DeviceTransport for SimulatedTransport {
    fn sdk_ready(&self) -> bool {
        self.lock().ready
    }

    fn begin_discovery(&self) -> Result<(), PitwallError> {
        let handles = {
            let state = self.lock();
            if !state.ready {
                return Err(PitwallError::SdkUnavailable);
            }
            state.selection.clone()
        };
        let _ = self.events.send(TransportEvent::DiscoveryResponse { handles });
        Ok(())
    }

    fn device_status(&self, device: &Uuid) -> ConnectionStatus {
        self.lock()
            .statuses
            .get(device)
            .copied()
            .unwrap_or(ConnectionStatus::NotFound)
    }

    fn register_for_events(&self, device: &Uuid) {
        debug!("registering for status events: {device}");
        self.lock().registered.insert(*device);
    }

    fn unregister_for_events(&self, device: &Uuid) {
        debug!("unregistering status events: {device}");
        self.lock().registered.remove(device);
    }

    fn send_message(&self, device: &Uuid, payload: &[u8]) -> Result<(), PitwallError> {
        let mut state = self.lock();
        if !state.ready {
            return Err(PitwallError::SdkUnavailable);
        }
        if state.statuses.get(device).copied() != Some(ConnectionStatus::Connected) {
            return Err(PitwallError::TransportSend {
                device: *device,
                description: "device is not connected".to_string(),
            });
        }
        state.sent.push((*device, payload.to_vec()));
        Ok(())
    }
}
