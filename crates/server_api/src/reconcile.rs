//! Engine-state reconciliation.
//!
//! Telemetry says whether a vehicle is moving; only the command memory knows
//! whether a parked vehicle was last locked. A moving vehicle always wins and
//! resets the memory to unlocked, so a later stop never shows a stale lock.

use std::collections::HashMap;

use shared::{
    domain::{CommandType, DeviceId, DeviceView, EngineStatus, LockState, Telemetry},
    error::DashboardError,
    protocol::StatusBoard,
};
use storage::CommandMemory;
use tracing::{debug, info};

use crate::{dialect::DialectTable, fleet::Fleet};

/// Merge a telemetry snapshot with the command memory into one view per
/// configured device, in configuration order.
///
/// Devices missing from `snapshot` are shown offline, stopped and without a
/// fix. Moving devices are written back to `memory` as unlocked.
pub fn display_status(
    fleet: &Fleet,
    snapshot: &HashMap<DeviceId, Telemetry>,
    memory: &CommandMemory,
) -> StatusBoard {
    let mut board = StatusBoard::with_capacity(fleet.len());
    for device in fleet.devices() {
        let telemetry = snapshot.get(&device.id).copied().unwrap_or_default();

        let engine_status = if telemetry.is_moving() {
            if memory.record_motion(&device.id) == Some(LockState::Locked) {
                info!(
                    device_id = %device.id,
                    speed = telemetry.speed,
                    "moving vehicle cleared remembered lock"
                );
            }
            EngineStatus::InUse
        } else {
            memory.lock_state_or_default(&device.id).into()
        };

        board.push(
            device.name.clone(),
            DeviceView {
                id: device.id.clone(),
                imei: device.imei.clone(),
                online: telemetry.online,
                speed: telemetry.speed,
                lat: telemetry.lat,
                lng: telemetry.lng,
                engine_status,
            },
        );
    }
    board
}

/// A validated command, ready to hand to the tracking service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCommand {
    pub device_id: DeviceId,
    pub command_type: CommandType,
    pub payload: String,
    /// Lock state written to memory, for commands that touch the engine.
    pub lock_state: Option<LockState>,
}

/// Validate a command request and build its payload.
///
/// The lock state is written to `memory` before the command is delivered.
/// If delivery later fails the memory stays at the commanded value until the
/// operator retries or the vehicle is seen moving. Validation failures leave
/// `memory` untouched.
pub fn issue_command(
    fleet: &Fleet,
    dialects: &DialectTable,
    device_id: &DeviceId,
    command_type: &str,
    memory: &CommandMemory,
) -> Result<IssuedCommand, DashboardError> {
    let device = fleet
        .find(device_id)
        .ok_or_else(|| DashboardError::DeviceNotFound {
            device_id: device_id.clone(),
        })?;
    let invalid = || DashboardError::InvalidCommand {
        command: command_type.to_string(),
    };
    let command: CommandType = command_type.parse().map_err(|_| invalid())?;
    let payload = dialects.render(device, command).ok_or_else(invalid)?;

    let lock_state = command.lock_effect();
    if let Some(state) = lock_state {
        memory.record_command(&device.id, state);
    }
    debug!(%device_id, %command, dialect = %device.dialect, "built device command");

    Ok(IssuedCommand {
        device_id: device.id.clone(),
        command_type: command,
        payload,
        lock_state,
    })
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
