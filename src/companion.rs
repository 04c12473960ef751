// Companion messages exchanged with the lap-timer watch app. The wire form
// is small JSON objects; anything that does not decode is logged and dropped
// without reaching the rest of the app.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceTransport;
use crate::errors::PitwallError;
use crate::storage::{Session, now_epoch_s};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompanionMessage {
    /// The watch finished a session and sent its summary for local history.
    #[serde(rename_all = "camelCase")]
    SessionSummary {
        stats: String,
        #[serde(default)]
        date: Option<f64>,
        #[serde(default)]
        latitude: Option<f64>,
        #[serde(default)]
        longitude: Option<f64>,
        #[serde(default)]
        lap_count: Option<u32>,
        #[serde(default)]
        best_lap_time: Option<f64>,
        #[serde(default)]
        total_time: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Greeting { text: String },
}

impl CompanionMessage {
    pub fn greeting() -> Self {
        Self::Greeting {
            text: "Hello there.".to_string(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        // The message enum always serializes; a failure here is a bug.
        serde_json::to_vec(self).expect("companion message serialization")
    }
}

pub fn decode(payload: &[u8]) -> Result<CompanionMessage, PitwallError> {
    serde_json::from_slice(payload).map_err(|e| PitwallError::MessageParse { source: e })
}

/// Build the session record for a received summary. The watch may stamp the
/// session itself; otherwise it is stamped on receipt.
pub fn session_from_summary(message: &CompanionMessage) -> Option<Session> {
    let CompanionMessage::SessionSummary {
        stats,
        date,
        latitude,
        longitude,
        lap_count,
        best_lap_time,
        total_time,
    } = message
    else {
        return None;
    };
    Some(Session {
        id: None,
        date_s: date.unwrap_or_else(now_epoch_s),
        stats: stats.clone(),
        latitude: *latitude,
        longitude: *longitude,
        lap_count: *lap_count,
        best_lap_time_s: *best_lap_time,
        total_time_s: *total_time,
    })
}

/// Send a message to every given device, one shot each. Failures are logged
/// per device and never retried. Returns how many sends succeeded.
pub fn broadcast(
    transport: &dyn DeviceTransport,
    devices: &[Uuid],
    message: &CompanionMessage,
) -> usize {
    let payload = message.encode();
    let mut delivered = 0;
    for device in devices {
        match transport.send_message(device, &payload) {
            Ok(()) => {
                info!("sent companion message to {device}");
                delivered += 1;
            }
            Err(e) => warn!("could not send companion message to {device}: {e}"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ConnectionStatus, SimulatedTransport};
    use std::sync::mpsc;

    #[test]
    fn decode_round_trips_a_session_summary() {
        let message = CompanionMessage::SessionSummary {
            stats: "10 laps at Laguna Seca".to_string(),
            date: Some(1_758_000_000.0),
            latitude: Some(36.584),
            longitude: Some(-121.753),
            lap_count: Some(10),
            best_lap_time: Some(61.2),
            total_time: Some(620.5),
        };
        assert_eq!(decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn decode_accepts_minimal_wire_payload() {
        let payload = br#"{"type":"sessionSummary","stats":"demo"}"#;
        let message = decode(payload).unwrap();
        let session = session_from_summary(&message).unwrap();
        assert_eq!(session.stats, "demo");
        assert_eq!(session.lap_count, None);
        assert!(session.date_s > 0.0);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(b"not json at all").is_err());
        assert!(decode(br#"{"type":"unknownKind"}"#).is_err());
    }

    #[test]
    fn greeting_is_not_a_session() {
        assert!(session_from_summary(&CompanionMessage::greeting()).is_none());
    }

    #[test]
    fn broadcast_skips_unreachable_devices() {
        let (tx, _rx) = mpsc::channel();
        let transport = SimulatedTransport::new(tx);
        let connected = Uuid::new_v4();
        let offline = Uuid::new_v4();
        transport.set_status_silently(connected, ConnectionStatus::Connected);
        transport.set_status_silently(offline, ConnectionStatus::NotConnected);

        let delivered = broadcast(
            &transport,
            &[connected, offline],
            &CompanionMessage::greeting(),
        );

        assert_eq!(delivered, 1);
        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, connected);
    }
}
