//! # Device Registry
//!
//! Staff devices are enrolled elsewhere; the guard only needs to look up a
//! device's tenant, public key and enabled flag. A device counts as enabled
//! only when a record exists and `enabled` is true.

use std::collections::HashMap;

use async_trait::async_trait;
use lt_core::{DeviceId, TenantId};
use lt_crypto::DevicePublicKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the registry knows about one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Device identifier (sent as `X-Device-Key`).
    pub device_id: DeviceId,
    /// Enrolled Ed25519 public key.
    pub public_key: DevicePublicKey,
    /// Whether the device may authenticate.
    pub enabled: bool,
}

/// Registry backend failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("device registry unavailable: {0}")]
pub struct RegistryError(pub String);

/// Lookup of enrolled devices.
#[async_trait]
pub trait DeviceRegistry: Send + Sync + std::fmt::Debug {
    /// The record for `device_id`, if enrolled.
    async fn find(&self, device_id: &DeviceId) -> Result<Option<DeviceRecord>, RegistryError>;
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct MemoryDeviceRegistry {
    devices: RwLock<HashMap<DeviceId, DeviceRecord>>,
}

impl MemoryDeviceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll or replace a device.
    pub fn register(&self, record: DeviceRecord) {
        self.devices.write().insert(record.device_id.clone(), record);
    }

    /// Set a device's enabled flag. Returns `false` if it is not enrolled.
    pub fn set_enabled(&self, device_id: &DeviceId, enabled: bool) -> bool {
        match self.devices.write().get_mut(device_id) {
            Some(record) => {
                record.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl DeviceRegistry for MemoryDeviceRegistry {
    async fn find(&self, device_id: &DeviceId) -> Result<Option<DeviceRecord>, RegistryError> {
        Ok(self.devices.read().get(device_id).cloned())
    }
}
