//! Trait abstraction for the host's device services to enable testing

use std::fmt;

use crate::error::Result;

/// Host-specific identity of an input device (e.g. `/dev/input/event5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the host knows about an attached device.
///
/// Vendor and product are 0 when the host cannot read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Device services provided by the host platform.
///
/// Permission answers are asynchronous: `request_permission` returns at once
/// and the host later queues a `PermissionGranted` or `PermissionDenied`
/// session event.
pub trait DeviceHost: Send {
    /// Open device, owned by the session while connected.
    type Handle: Send;

    /// Devices currently attached.
    fn list_devices(&mut self) -> Result<Vec<DeviceInfo>>;

    /// Whether the device may be opened without asking.
    fn has_permission(&self, device: &DeviceInfo) -> bool;

    /// Asks for access to the device.
    fn request_permission(&mut self, device: &DeviceInfo);

    /// Opens the device and starts delivering its input.
    fn open(&mut self, device: &DeviceInfo) -> Result<Self::Handle>;

    /// Stops input delivery and releases the device.
    fn close(&mut self, handle: Self::Handle);
}
