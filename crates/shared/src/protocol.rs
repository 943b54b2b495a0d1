use std::fmt;

use chrono::{DateTime, Utc};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::domain::{CommandType, DeviceId, DeviceView, LockState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub device_id: String,
    #[serde(rename = "type")]
    pub command_type: String,
}

/// Acknowledgement returned by the tracking service for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub status: i64,
    /// Empty when the service omits the message or sends `null`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl CommandAck {
    pub fn is_accepted(&self) -> bool {
        self.status == 1
    }
}

/// Device views keyed by device name. Serialises as a JSON object whose
/// entries keep configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusBoard {
    entries: Vec<(String, DeviceView)>,
}

impl StatusBoard {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, view: DeviceView) {
        self.entries.push((name.into(), view));
    }

    pub fn get(&self, name: &str) -> Option<&DeviceView> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, view)| view)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceView)> {
        self.entries.iter().map(|(name, view)| (name.as_str(), view))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StatusBoard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, view) in &self.entries {
            map.serialize_entry(name, view)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StatusBoard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BoardVisitor;

        impl<'de> Visitor<'de> for BoardVisitor {
            type Value = StatusBoard;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of device name to device status")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut board = StatusBoard::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, view)) = access.next_entry::<String, DeviceView>()? {
                    board.push(name, view);
                }
                Ok(board)
            }
        }

        deserializer.deserialize_map(BoardVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub name: String,
    pub id: DeviceId,
    pub imei: String,
    pub dialect: String,
    /// Command types the device's dialect can render.
    pub commands: Vec<CommandType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    Command,
    Motion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntryPayload {
    pub device_id: DeviceId,
    pub state: LockState,
    pub source: MemorySource,
    pub updated_at: DateTime<Utc>,
}
