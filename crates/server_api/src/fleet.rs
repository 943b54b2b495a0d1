use std::collections::{HashMap, HashSet};

use shared::domain::{Device, DeviceId};
use thiserror::Error;

use crate::dialect::DialectTable;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    #[error("device '{name}' has an empty {field}")]
    EmptyField { name: String, field: &'static str },
    #[error("duplicate device {field} '{value}'")]
    Duplicate { field: &'static str, value: String },
    #[error("device '{name}' uses unknown dialect '{dialect}'")]
    UnknownDialect { name: String, dialect: String },
}

/// The configured vehicles, in display order.
#[derive(Debug, Clone)]
pub struct Fleet {
    devices: Vec<Device>,
    by_id: HashMap<DeviceId, usize>,
}

impl Fleet {
    pub fn new(devices: Vec<Device>, dialects: &DialectTable) -> Result<Self, FleetError> {
        let mut names = HashSet::new();
        let mut imeis = HashSet::new();
        let mut by_id = HashMap::with_capacity(devices.len());

        for (index, device) in devices.iter().enumerate() {
            for (field, value) in [
                ("name", device.name.as_str()),
                ("id", device.id.as_str()),
                ("imei", device.imei.as_str()),
            ] {
                if value.trim().is_empty() {
                    return Err(FleetError::EmptyField {
                        name: device.name.clone(),
                        field,
                    });
                }
            }
            if !names.insert(device.name.as_str()) {
                return Err(FleetError::Duplicate {
                    field: "name",
                    value: device.name.clone(),
                });
            }
            if !imeis.insert(device.imei.as_str()) {
                return Err(FleetError::Duplicate {
                    field: "imei",
                    value: device.imei.clone(),
                });
            }
            if by_id.insert(device.id.clone(), index).is_some() {
                return Err(FleetError::Duplicate {
                    field: "id",
                    value: device.id.to_string(),
                });
            }
            if !dialects.contains(&device.dialect) {
                return Err(FleetError::UnknownDialect {
                    name: device.name.clone(),
                    dialect: device.dialect.clone(),
                });
            }
        }

        Ok(Self { devices, by_id })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|device| device.id.clone()).collect()
    }

    pub fn find(&self, id: &DeviceId) -> Option<&Device> {
        self.by_id.get(id).map(|&index| &self.devices[index])
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
