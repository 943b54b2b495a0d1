use std::sync::Arc;

use shared::{
    domain::DeviceId,
    error::{ApiError, DashboardError},
    protocol::{CommandAck, DeviceSummary, MemoryEntryPayload, StatusBoard},
};
use storage::CommandMemory;
use tracing::{error, info, warn};
use tracker_client::TrackerApi;

pub mod dialect;
pub mod fleet;
pub mod reconcile;

pub use dialect::{DialectTable, DEFAULT_DIALECT};
pub use fleet::{Fleet, FleetError};
pub use reconcile::{display_status, issue_command, IssuedCommand};

#[derive(Clone)]
pub struct ApiContext {
    pub fleet: Arc<Fleet>,
    pub dialects: Arc<DialectTable>,
    pub memory: CommandMemory,
    pub tracker: Arc<dyn TrackerApi>,
}

pub async fn device_statuses(ctx: &ApiContext) -> Result<StatusBoard, ApiError> {
    let snapshot = ctx
        .tracker
        .fetch_telemetry(&ctx.fleet.ids())
        .await
        .map_err(|err| {
            error!(error = %err, "failed to fetch telemetry");
            ApiError::from(DashboardError::from(err))
        })?;
    Ok(display_status(&ctx.fleet, &snapshot, &ctx.memory))
}

pub async fn send_command(
    ctx: &ApiContext,
    device_id: &str,
    command_type: &str,
) -> Result<CommandAck, ApiError> {
    let device_id = DeviceId::new(device_id.trim());
    // Checked before the optimistic write; nothing could be delivered.
    ctx.tracker.ensure_configured().map_err(|err| {
        error!(%device_id, command_type, error = %err, "cannot send command");
        ApiError::from(DashboardError::from(err))
    })?;

    let issued = issue_command(
        &ctx.fleet,
        &ctx.dialects,
        &device_id,
        command_type.trim(),
        &ctx.memory,
    )
    .map_err(|err| {
        warn!(%device_id, command_type, error = %err, "rejected command");
        ApiError::from(err)
    })?;

    let ack = ctx
        .tracker
        .send_command(&issued.device_id, &issued.payload)
        .await
        .map_err(|err| {
            // The optimistic lock write stays; only motion or a retry corrects it.
            error!(
                device_id = %issued.device_id,
                command = %issued.command_type,
                remembered = ?issued.lock_state,
                error = %err,
                "failed to deliver command"
            );
            ApiError::from(DashboardError::from(err))
        })?;

    if ack.is_accepted() {
        info!(
            device_id = %issued.device_id,
            command = %issued.command_type,
            "command accepted by tracking service"
        );
    } else {
        warn!(
            device_id = %issued.device_id,
            command = %issued.command_type,
            status = ack.status,
            message = %ack.message,
            "tracking service refused command"
        );
    }
    Ok(ack)
}

pub fn device_summaries(ctx: &ApiContext) -> Vec<DeviceSummary> {
    ctx.fleet
        .devices()
        .iter()
        .map(|device| DeviceSummary {
            name: device.name.clone(),
            id: device.id.clone(),
            imei: device.imei.clone(),
            dialect: device.dialect.clone(),
            commands: ctx.dialects.supported_commands(&device.dialect),
        })
        .collect()
}

pub fn memory_snapshot(ctx: &ApiContext) -> Vec<MemoryEntryPayload> {
    ctx.memory.snapshot()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
