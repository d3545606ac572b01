//! # evdev Device Host
//!
//! Linux implementation of [`DeviceHost`] on top of `/dev/input/event*`.
//!
//! - Device list: every readable event node that has gamepad buttons, plus
//!   every node this process cannot read (it may be a gamepad). Unreadable
//!   nodes are summarized in one debug message per scan.
//! - Permission: the node can be opened for reading. A permission request
//!   retries the open and answers with a session event. Access itself comes
//!   from outside the process (udev rule, `input` group).
//! - Hot-plug: [`watch_hotplug`] rescans the directory periodically and queues
//!   `Attached` / `Detached` events for nodes that appear or vanish.
//! - Input: opening a device spawns a reader task that translates its events
//!   and forwards them to the input-dispatch task. A read error is reported
//!   as `Detached`. Closing the device queues [`ControlEvent::Reset`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evdev::{Device, Key as EvKey};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::host::{DeviceHost, DeviceId, DeviceInfo};
use super::{SessionEvent, SessionHandle};
use crate::controller::evdev_source::{AxisLayout, EvdevTranslator};
use crate::controller::mapper::ControlEvent;
use crate::error::{BridgeError, Result};

/// Default evdev device directory.
pub const DEFAULT_INPUT_DIR: &str = "/dev/input";

/// Lists `event*` nodes in a directory, sorted for deterministic selection.
///
/// # Errors
///
/// Returns `Io` if the directory cannot be read.
pub fn scan_event_nodes(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut nodes: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("event"))
        })
        .collect();
    nodes.sort();
    Ok(nodes)
}

/// Whether an opened device has the buttons of a gamepad.
fn is_gamepad(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| keys.contains(EvKey::BTN_SOUTH))
}

fn device_id(path: &Path) -> DeviceId {
    DeviceId(path.to_string_lossy().to_string())
}

/// Describes an event node, or `None` if it is not a gamepad.
///
/// # Errors
///
/// Returns the open error if the node cannot be read.
fn describe(path: &Path) -> std::io::Result<Option<DeviceInfo>> {
    let device = Device::open(path)?;
    if !is_gamepad(&device) {
        return Ok(None);
    }
    let input_id = device.input_id();
    Ok(Some(DeviceInfo {
        id: device_id(path),
        name: device.name().unwrap_or_default().to_string(),
        vendor_id: input_id.vendor(),
        product_id: input_id.product(),
    }))
}

/// Entry for a node this process cannot read yet.
fn unreadable(path: &Path) -> DeviceInfo {
    DeviceInfo {
        id: device_id(path),
        name: String::new(),
        vendor_id: 0,
        product_id: 0,
    }
}

/// Nodes added and removed between two scans.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Updates `known` to `current` and reports the difference.
pub fn diff_scan(known: &mut BTreeSet<PathBuf>, current: Vec<PathBuf>) -> ScanDiff {
    let current: BTreeSet<PathBuf> = current.into_iter().collect();
    let diff = ScanDiff {
        added: current.difference(known).cloned().collect(),
        removed: known.difference(&current).cloned().collect(),
    };
    *known = current;
    diff
}

/// Open evdev device: its reader task.
#[derive(Debug)]
pub struct EvdevConnection {
    reader: JoinHandle<()>,
}

/// evdev-backed [`DeviceHost`].
#[derive(Debug)]
pub struct EvdevHost {
    input_dir: PathBuf,
    layout: AxisLayout,
    fallback_deadzone: f32,
    session: SessionHandle,
    input_tx: mpsc::UnboundedSender<ControlEvent>,
}

impl EvdevHost {
    /// Creates a host.
    ///
    /// Permission answers and read failures are queued on `session`;
    /// translated input goes to `input_tx`.
    #[must_use]
    pub fn new(
        input_dir: PathBuf,
        layout: AxisLayout,
        fallback_deadzone: f32,
        session: SessionHandle,
        input_tx: mpsc::UnboundedSender<ControlEvent>,
    ) -> Self {
        Self {
            input_dir,
            layout,
            fallback_deadzone,
            session,
            input_tx,
        }
    }

    fn path(device: &DeviceInfo) -> PathBuf {
        PathBuf::from(&device.id.0)
    }
}

impl DeviceHost for EvdevHost {
    type Handle = EvdevConnection;

    fn list_devices(&mut self) -> Result<Vec<DeviceInfo>> {
        if !self.input_dir.exists() {
            return Err(BridgeError::DeviceNotFound(format!(
                "{} directory not found",
                self.input_dir.display()
            )));
        }

        let mut closed = Vec::new();
        let devices: Vec<DeviceInfo> = scan_event_nodes(&self.input_dir)?
            .iter()
            .filter_map(|path| match describe(path) {
                Ok(info) => info,
                Err(e) => {
                    closed.push(format!("{} ({})", path.display(), e));
                    Some(unreadable(path))
                }
            })
            .collect();

        if !closed.is_empty() {
            debug!("{} event nodes not readable: {}", closed.len(), closed.join(", "));
        }
        Ok(devices)
    }

    fn has_permission(&self, device: &DeviceInfo) -> bool {
        std::fs::File::open(Self::path(device)).is_ok()
    }

    fn request_permission(&mut self, device: &DeviceInfo) {
        // The only way to gain access on Linux is outside this process
        // (udev rule, group membership), so re-check once and answer.
        let event = if self.has_permission(device) {
            SessionEvent::PermissionGranted(device.id.clone())
        } else {
            debug!("No read access to {}", device.id);
            SessionEvent::PermissionDenied(device.id.clone())
        };

        if let Err(e) = self.session.notify(event) {
            debug!("Dropping permission answer: {}", e);
        }
    }

    fn open(&mut self, device: &DeviceInfo) -> Result<Self::Handle> {
        let path = Self::path(device);
        let evdev_device = Device::open(&path)
            .map_err(|e| BridgeError::Device(format!("Failed to open {}: {}", path.display(), e)))?;

        if !is_gamepad(&evdev_device) {
            return Err(BridgeError::Device(format!(
                "{} is not a gamepad",
                path.display()
            )));
        }

        let translator = EvdevTranslator::from_device(&evdev_device, self.layout, self.fallback_deadzone);
        let mut stream = evdev_device.into_event_stream().map_err(|e| {
            BridgeError::Device(format!("Failed to stream {}: {}", path.display(), e))
        })?;

        let id = device.id.clone();
        let session = self.session.clone();
        let input_tx = self.input_tx.clone();

        let reader = tokio::spawn(async move {
            loop {
                match stream.next_event().await {
                    Ok(event) => {
                        if let Some(control) = translator.translate(&event) {
                            if input_tx.send(control).is_err() {
                                debug!("Input dispatch gone, stopping reader for {}", id);
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Lost {}: {}", id, e);
                        let _ = session.notify(SessionEvent::Detached(id.clone()));
                        break;
                    }
                }
            }
        });

        Ok(EvdevConnection { reader })
    }

    fn close(&mut self, handle: Self::Handle) {
        handle.reader.abort();
        // Queued behind whatever the reader already forwarded
        if self.input_tx.send(ControlEvent::Reset).is_err() {
            debug!("Input dispatch gone, nothing to reset");
        }
    }
}

/// Rescans `input_dir` every `period` and queues attach/detach events.
///
/// Nodes present at the first scan are not reported; those are picked up by
/// the session's initialize scan.
pub async fn watch_hotplug(
    input_dir: PathBuf,
    period: Duration,
    session: SessionHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut known: BTreeSet<PathBuf> = scan_event_nodes(&input_dir)
        .unwrap_or_default()
        .into_iter()
        .collect();

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Watching {} for gamepads every {:?}", input_dir.display(), period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = match scan_event_nodes(&input_dir) {
                    Ok(current) => current,
                    Err(e) => {
                        debug!("Rescan of {} failed: {}", input_dir.display(), e);
                        continue;
                    }
                };

                let diff = diff_scan(&mut known, current);
                let mut events: Vec<SessionEvent> = diff
                    .removed
                    .iter()
                    .map(|path| SessionEvent::Detached(device_id(path)))
                    .collect();
                events.extend(
                    diff.added
                        .iter()
                        .filter_map(|path| describe(path).unwrap_or_else(|_| Some(unreadable(path))))
                        .map(SessionEvent::Attached),
                );

                for event in events {
                    if session.notify(event).is_err() {
                        return;
                    }
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
