//! Payloads exchanged with the tracking service.
//!
//! The service is loose about types: ids come back as numbers or strings and
//! coordinates are sometimes quoted, so decoding goes through `Value` and
//! falls back to "no data" instead of failing the whole response.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use shared::domain::{DeviceId, OnlineState, Telemetry};

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceGroup {
    #[serde(default)]
    items: Option<Vec<RawDevice>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDevice {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient_online")]
    online: OnlineState,
    #[serde(default, deserialize_with = "lenient_number")]
    speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    lng: Option<f64>,
}

impl RawDevice {
    fn device_id(&self) -> Option<DeviceId> {
        match &self.id {
            Value::String(id) if !id.is_empty() => Some(DeviceId::new(id.clone())),
            Value::Number(id) => Some(DeviceId::new(id.to_string())),
            _ => None,
        }
    }

    fn telemetry(&self) -> Telemetry {
        Telemetry {
            online: self.online,
            speed: self.speed.unwrap_or(0.0).max(0.0),
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SendCommandPayload<'a> {
    pub user_api_hash: &'a str,
    pub device_id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a str,
}

/// Flatten the grouped device listing into telemetry for the requested ids.
pub(crate) fn telemetry_for(
    groups: Vec<DeviceGroup>,
    wanted: &[DeviceId],
) -> HashMap<DeviceId, Telemetry> {
    let wanted: HashSet<&DeviceId> = wanted.iter().collect();
    let mut snapshot = HashMap::new();
    for device in groups.into_iter().flat_map(|group| group.items.unwrap_or_default()) {
        let Some(id) = device.device_id() else {
            continue;
        };
        if wanted.contains(&id) {
            snapshot.insert(id, device.telemetry());
        }
    }
    snapshot
}

/// Numbers or numeric strings; anything else, including `NaN` and infinities, is no data.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let number = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|number| number.is_finite()))
}

fn lenient_online<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OnlineState, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::String(_)) => serde_json::from_value(value).unwrap_or_default(),
        _ => OnlineState::Offline,
    })
}
