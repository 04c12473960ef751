// Inter-app handoff: the vendor companion app returns the user's device
// selection to us through a private-scheme URL. A URL that is not ours, or
// that arrives from an untrusted source application, is simply "not handled"
// so other handlers can try; it is never an error.

use log::{debug, warn};

use crate::config::AppConfig;
use crate::device::DeviceHandle;

const DEVICES_QUERY_KEY: &str = "devices";

/// Extract the device handles from a selection-response URL.
///
/// Returns `None` when the URL should be treated as unhandled: wrong scheme,
/// untrusted source application, missing or undecodable payload, or a payload
/// with zero devices. A missing `source_app` is accepted; when present it
/// must match the trusted companion-app identifier.
pub fn selection_handles(
    url: &str,
    source_app: Option<&str>,
    config: &AppConfig,
) -> Option<Vec<DeviceHandle>> {
    if let Some(source) = source_app {
        if source != config.trusted_source_app {
            debug!("handoff from untrusted source {source}, ignoring");
            return None;
        }
    }

    let (scheme, rest) = url.split_once("://")?;
    if scheme != config.url_scheme {
        debug!("handoff scheme {scheme} does not match, ignoring");
        return None;
    }

    let query = rest.split_once('?').map(|(_, q)| q)?;
    let payload = query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == DEVICES_QUERY_KEY).then_some(value)
    })?;

    let decoded = percent_decode(payload)?;
    let handles: Vec<DeviceHandle> = match serde_json::from_str(&decoded) {
        Ok(handles) => handles,
        Err(e) => {
            warn!("selection response payload is not decodable: {e}");
            return None;
        }
    };

    if handles.is_empty() {
        return None;
    }
    Some(handles)
}

/// Minimal percent-decoding for the selection payload. `+` is a space, and a
/// mangled escape makes the whole URL unhandled.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}
