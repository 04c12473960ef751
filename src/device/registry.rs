// Reconciliation of the known-device set.
//
// The set is additive: a discovery response only ever adds devices, and a
// re-discovered uuid keeps the fields it was first stored with. The only
// destructive operation is an explicit `remove`, which rewrites the persisted
// set wholesale. Every mutation emits exactly one `DevicesChanged` event.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use log::{debug, info};
use uuid::Uuid;

use crate::device::{ConnectionStatus, DeviceHandle, DeviceTransport, RegistryEvent};
use crate::errors::PitwallError;
use crate::storage::{Database, DeviceRecord, now_epoch_s};

pub struct DeviceRegistry {
    transport: Arc<dyn DeviceTransport>,
    events: Sender<RegistryEvent>,
    /// Known devices in the order they were first discovered.
    devices: Vec<DeviceRecord>,
    statuses: HashMap<Uuid, ConnectionStatus>,
}

impl DeviceRegistry {
    pub fn new(transport: Arc<dyn DeviceTransport>, events: Sender<RegistryEvent>) -> Self {
        Self {
            transport,
            events,
            devices: Vec::new(),
            statuses: HashMap::new(),
        }
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.devices.iter().any(|d| &d.uuid == uuid)
    }

    pub fn connected_devices(&self) -> Vec<Uuid> {
        self.devices
            .iter()
            .map(|d| d.uuid)
            .filter(|uuid| self.statuses.get(uuid) == Some(&ConnectionStatus::Connected))
            .collect()
    }

    /// Merge newly selected devices into the known set. Unknown uuids are
    /// added, persisted, and subscribed for status events; already-known
    /// uuids are left untouched. Emits one `DevicesChanged` when anything
    /// was added, none otherwise. Returns the number of devices added.
    pub fn merge_discovered(
        &mut self,
        db: &Database,
        handles: &[DeviceHandle],
    ) -> Result<usize, PitwallError> {
        let mut added = 0;
        for handle in handles {
            if self.contains(&handle.uuid) {
                debug!("device {} already known, keeping stored entry", handle.uuid);
                continue;
            }
            let record = DeviceRecord {
                uuid: handle.uuid,
                display_name: handle.display_name.clone(),
                friendly_name: handle.friendly_name.clone(),
                device_type: handle.device_type.clone(),
                last_updated_s: now_epoch_s(),
            };
            db.upsert_device(&record)?;
            self.transport.register_for_events(&handle.uuid);
            self.statuses
                .insert(handle.uuid, self.transport.device_status(&handle.uuid));
            info!("added device {} ({})", handle.display_name, handle.uuid);
            self.devices.push(record);
            added += 1;
        }

        if added > 0 {
            self.emit_changed();
        }
        Ok(added)
    }

    /// Forget one device: unsubscribe its status events, drop it from the
    /// set, rewrite the persisted set, emit `DevicesChanged`. Unknown uuids
    /// are a no-op.
    pub fn remove(&mut self, db: &Database, uuid: &Uuid) -> Result<(), PitwallError> {
        let Some(index) = self.devices.iter().position(|d| &d.uuid == uuid) else {
            return Ok(());
        };
        self.transport.unregister_for_events(uuid);
        let removed = self.devices.remove(index);
        self.statuses.remove(uuid);
        db.replace_all_devices(&self.devices)?;
        info!("removed device {} ({})", removed.display_name, removed.uuid);
        self.emit_changed();
        Ok(())
    }

    /// Load the persisted set on startup and re-subscribe every restored
    /// device for status events. Restored entries are placeholders until the
    /// transport sees them again; their status is whatever a fresh query
    /// reports. Emits `DevicesChanged` once, even with zero devices, so that
    /// observers initialize.
    pub fn restore_from_disk(&mut self, db: &Database) -> Result<(), PitwallError> {
        self.devices = db.list_devices()?;
        self.statuses.clear();
        for device in &self.devices {
            self.transport.register_for_events(&device.uuid);
            self.statuses
                .insert(device.uuid, self.transport.device_status(&device.uuid));
        }
        info!("restored {} known device(s)", self.devices.len());
        self.emit_changed();
        Ok(())
    }

    /// Cached status for a device. A cached `Invalid` triggers a fresh
    /// transport query; anything fresher replaces the cache.
    pub fn status(&mut self, uuid: &Uuid) -> ConnectionStatus {
        let cached = self
            .statuses
            .get(uuid)
            .copied()
            .unwrap_or(ConnectionStatus::NotConnected);
        if cached == ConnectionStatus::Invalid {
            let fresh = self.transport.device_status(uuid);
            if fresh != cached {
                self.statuses.insert(*uuid, fresh);
                return fresh;
            }
        }
        cached
    }

    /// Apply a status callback from the transport. Status for devices we no
    /// longer know is dropped on the floor.
    pub fn handle_status_changed(&mut self, uuid: Uuid, status: ConnectionStatus) {
        if !self.contains(&uuid) {
            debug!("status event for unknown device {uuid}, ignoring");
            return;
        }
        debug!("device {uuid} is now {status}");
        self.statuses.insert(uuid, status);
        self.emit_changed();
    }

    fn emit_changed(&self) {
        if self.events.send(RegistryEvent::DevicesChanged).is_err() {
            debug!("no registry event subscriber");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedTransport;
    use std::sync::mpsc::{self, Receiver};

    fn handle(name: &str) -> DeviceHandle {
        DeviceHandle {
            uuid: Uuid::new_v4(),
            display_name: name.to_string(),
            friendly_name: None,
            device_type: Some("watch".to_string()),
        }
    }

    fn setup() -> (
        Database,
        Arc<SimulatedTransport>,
        DeviceRegistry,
        Receiver<RegistryEvent>,
    ) {
        let db = Database::open_in_memory().unwrap();
        // Transport callbacks are not consumed by these tests.
        let (transport_tx, _transport_rx) = mpsc::channel();
        let transport = Arc::new(SimulatedTransport::new(transport_tx));
        let (events_tx, events_rx) = mpsc::channel();
        let registry = DeviceRegistry::new(transport.clone(), events_tx);
        (db, transport, registry, events_rx)
    }

    fn drain(rx: &Receiver<RegistryEvent>) -> usize {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[test]
    fn merge_adds_registers_and_emits_once() {
        let (db, transport, mut registry, events) = setup();
        let first = handle("fenix 7");
        let second = handle("venu 3");

        let added = registry
            .merge_discovered(&db, &[first.clone(), second.clone()])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(registry.devices().len(), 2);
        assert!(transport.registered_devices().contains(&first.uuid));
        assert!(transport.registered_devices().contains(&second.uuid));
        // One changed event for the whole batch.
        assert_eq!(drain(&events), 1);
        // Persisted too.
        assert_eq!(db.list_devices().unwrap().len(), 2);
    }

    #[test]
    fn merge_is_idempotent_on_uuid() {
        let (db, _transport, mut registry, events) = setup();
        let known = handle("fenix 7");
        registry.merge_discovered(&db, &[known.clone()]).unwrap();
        drain(&events);

        let mut rediscovered = known.clone();
        rediscovered.display_name = "renamed".to_string();
        let added = registry.merge_discovered(&db, &[rediscovered]).unwrap();

        assert_eq!(added, 0);
        assert_eq!(registry.devices().len(), 1);
        // Stored fields are retained, not overwritten by the re-discovery.
        assert_eq!(registry.devices()[0].display_name, "fenix 7");
        assert_eq!(drain(&events), 0);
    }

    #[test]
    fn merge_scenario_known_ab_discovers_bc() {
        let (db, _transport, mut registry, events) = setup();
        let a = handle("a");
        let b = handle("b");
        let c = handle("c");
        registry
            .merge_discovered(&db, &[a.clone(), b.clone()])
            .unwrap();
        drain(&events);

        registry.merge_discovered(&db, &[b.clone(), c.clone()]).unwrap();

        let uuids: Vec<Uuid> = registry.devices().iter().map(|d| d.uuid).collect();
        assert_eq!(uuids, vec![a.uuid, b.uuid, c.uuid]);
        assert_eq!(drain(&events), 1);
    }

    #[test]
    fn remove_unregisters_persists_and_emits() {
        let (db, transport, mut registry, events) = setup();
        let keep = handle("keep");
        let gone = handle("gone");
        registry
            .merge_discovered(&db, &[keep.clone(), gone.clone()])
            .unwrap();
        drain(&events);

        registry.remove(&db, &gone.uuid).unwrap();

        assert_eq!(registry.devices().len(), 1);
        assert!(!transport.registered_devices().contains(&gone.uuid));
        assert_eq!(db.list_devices().unwrap().len(), 1);
        assert_eq!(drain(&events), 1);

        // Removing an unknown uuid changes nothing and stays silent.
        registry.remove(&db, &gone.uuid).unwrap();
        assert_eq!(drain(&events), 0);
    }

    #[test]
    fn restore_round_trips_uuids_and_resubscribes() {
        let (db, _transport, mut registry, events) = setup();
        let first = handle("fenix 7");
        let second = handle("venu 3");
        registry
            .merge_discovered(&db, &[first.clone(), second.clone()])
            .unwrap();
        drain(&events);

        // Fresh registry over the same database, as after a process restart.
        let (transport_tx, _rx) = mpsc::channel();
        let transport = Arc::new(SimulatedTransport::new(transport_tx));
        let (events_tx, events_rx) = mpsc::channel();
        let mut restored = DeviceRegistry::new(transport.clone(), events_tx);
        restored.restore_from_disk(&db).unwrap();

        let uuids: Vec<Uuid> = restored.devices().iter().map(|d| d.uuid).collect();
        assert_eq!(uuids, vec![first.uuid, second.uuid]);
        assert!(transport.registered_devices().contains(&first.uuid));
        assert_eq!(drain(&events_rx), 1);
        // The fresh transport has never seen these devices.
        assert_eq!(restored.status(&first.uuid), ConnectionStatus::NotFound);
    }

    #[test]
    fn restore_with_empty_store_still_emits_once() {
        let (db, _transport, mut registry, events) = setup();
        registry.restore_from_disk(&db).unwrap();
        assert!(registry.devices().is_empty());
        assert_eq!(drain(&events), 1);
    }

    #[test]
    fn status_defaults_and_lazily_refreshes_invalid() {
        let (db, transport, mut registry, _events) = setup();
        let device = handle("fenix 7");
        transport.set_status_silently(device.uuid, ConnectionStatus::Invalid);
        registry.merge_discovered(&db, &[device.clone()]).unwrap();
        assert_eq!(registry.status(&device.uuid), ConnectionStatus::Invalid);

        // The transport now reports something better; the stale Invalid is
        // replaced on the next read.
        transport.set_status_silently(device.uuid, ConnectionStatus::Connected);
        assert_eq!(registry.status(&device.uuid), ConnectionStatus::Connected);
        // And the refreshed value is what stays cached.
        transport.set_status_silently(device.uuid, ConnectionStatus::Invalid);
        assert_eq!(registry.status(&device.uuid), ConnectionStatus::Connected);

        // Unknown devices read as not connected.
        assert_eq!(
            registry.status(&Uuid::new_v4()),
            ConnectionStatus::NotConnected
        );
    }

    #[test]
    fn status_callback_updates_cache_and_emits() {
        let (db, _transport, mut registry, events) = setup();
        let device = handle("fenix 7");
        registry.merge_discovered(&db, &[device.clone()]).unwrap();
        drain(&events);

        registry.handle_status_changed(device.uuid, ConnectionStatus::Connected);
        assert_eq!(registry.status(&device.uuid), ConnectionStatus::Connected);
        assert_eq!(drain(&events), 1);
        assert_eq!(registry.connected_devices(), vec![device.uuid]);

        // Events for devices we never knew are ignored.
        registry.handle_status_changed(Uuid::new_v4(), ConnectionStatus::Connected);
        assert_eq!(drain(&events), 0);
    }

    #[test]
    fn events_without_subscriber_do_not_fail_mutations() {
        let (db, _transport, mut registry, events) = setup();
        drop(events);
        let added = registry.merge_discovered(&db, &[handle("fenix 7")]).unwrap();
        assert_eq!(added, 1);
    }
}
