use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Upstream identifier of a tracked device, kept as the decimal string the
/// tracking service hands out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A vehicle shown on the dashboard. Loaded from settings at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub id: DeviceId,
    pub imei: String,
    pub dialect: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineState {
    Online,
    Ack,
    #[default]
    #[serde(other)]
    Offline,
}

/// Live snapshot reported by the tracking service for one device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Telemetry {
    pub online: OnlineState,
    /// km/h, never negative.
    pub speed: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Telemetry {
    pub fn is_moving(&self) -> bool {
        self.speed > 0.0
    }
}

/// Last commanded lock state remembered for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockState {
    #[serde(rename = "bloqueado")]
    Locked,
    #[default]
    #[serde(rename = "desbloqueado")]
    Unlocked,
}

/// Engine state as displayed to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    #[serde(rename = "bloqueado")]
    Locked,
    #[serde(rename = "desbloqueado")]
    Unlocked,
    #[serde(rename = "en_uso")]
    InUse,
}

impl From<LockState> for EngineStatus {
    fn from(value: LockState) -> Self {
        match value {
            LockState::Locked => Self::Locked,
            LockState::Unlocked => Self::Unlocked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Stop,
    Resume,
    BlockFifthWheel,
    ReleaseFifthWheel,
}

impl CommandType {
    pub const ALL: [CommandType; 4] = [
        CommandType::Stop,
        CommandType::Resume,
        CommandType::BlockFifthWheel,
        CommandType::ReleaseFifthWheel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Resume => "resume",
            Self::BlockFifthWheel => "block_fifth_wheel",
            Self::ReleaseFifthWheel => "release_fifth_wheel",
        }
    }

    /// Lock state the command leaves the engine in, if it touches the engine at all.
    pub fn lock_effect(self) -> Option<LockState> {
        match self {
            Self::Stop => Some(LockState::Locked),
            Self::Resume => Some(LockState::Unlocked),
            Self::BlockFifthWheel | Self::ReleaseFifthWheel => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommandType(pub String);

impl FromStr for CommandType {
    type Err = UnknownCommandType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| UnknownCommandType(s.to_string()))
    }
}

/// Per-device view model returned to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceView {
    pub id: DeviceId,
    pub imei: String,
    pub online: OnlineState,
    pub speed: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub engine_status: EngineStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_status_uses_dashboard_wire_names() {
        let encoded = serde_json::to_string(&[
            EngineStatus::Locked,
            EngineStatus::Unlocked,
            EngineStatus::InUse,
        ])
        .expect("json");
        assert_eq!(encoded, r#"["bloqueado","desbloqueado","en_uso"]"#);
    }

    #[test]
    fn unknown_online_state_reads_as_offline() {
        let state: OnlineState = serde_json::from_str("\"engine_off\"").expect("json");
        assert_eq!(state, OnlineState::Offline);
        let state: OnlineState = serde_json::from_str("\"ack\"").expect("json");
        assert_eq!(state, OnlineState::Ack);
    }

    #[test]
    fn command_type_parses_only_known_names() {
        assert_eq!("stop".parse::<CommandType>(), Ok(CommandType::Stop));
        assert_eq!(
            "block_fifth_wheel".parse::<CommandType>(),
            Ok(CommandType::BlockFifthWheel)
        );
        assert_eq!(
            "STOP".parse::<CommandType>(),
            Err(UnknownCommandType("STOP".to_string()))
        );
    }

    #[test]
    fn only_engine_commands_carry_a_lock_effect() {
        assert_eq!(CommandType::Stop.lock_effect(), Some(LockState::Locked));
        assert_eq!(CommandType::Resume.lock_effect(), Some(LockState::Unlocked));
        assert_eq!(CommandType::BlockFifthWheel.lock_effect(), None);
    }
}
