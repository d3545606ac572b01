//! # Device Session Module
//!
//! Tracks the attach / permission / open / detach lifecycle of the one
//! gamepad this process reads.
//!
//! This module handles:
//! - Receiving host notifications through an explicit event queue
//! - Requesting access for newly attached devices
//! - Opening the device once access is granted
//! - Releasing it when that same device detaches
//!
//! ## States
//!
//! ```text
//!              attach + permission granted + open ok
//! Disconnected ----------------------------------------> Connected(id)
//!              <----------------------------------------
//!                          detach(id)
//! ```
//!
//! Attach events while connected, and detach events for any other device,
//! change nothing. A failed open leaves the session disconnected until the
//! next attach.

pub mod evdev_host;
pub mod host;

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

pub use host::{DeviceHost, DeviceId, DeviceInfo};

use crate::command::state::CommandStore;
use crate::error::{BridgeError, Result};

/// Host notification fed to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Attached(DeviceInfo),
    Detached(DeviceId),
    PermissionGranted(DeviceId),
    PermissionDenied(DeviceId),
}

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected(DeviceId),
}

/// Message on the session queue.
#[derive(Debug)]
pub enum SessionMessage {
    Event(SessionEvent),
    /// Scan attached devices; the reply carries the resulting state.
    Initialize(oneshot::Sender<SessionState>),
}

/// Sending side of the session queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    /// Creates the queue.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a host notification.
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` if the session task has stopped.
    pub fn notify(&self, event: SessionEvent) -> Result<()> {
        self.tx
            .send(SessionMessage::Event(event))
            .map_err(|_| BridgeError::ChannelClosed("device session".to_string()))
    }

    /// Asks the session to scan attached devices and waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` if the session task has stopped.
    pub async fn initialize(&self) -> Result<SessionState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionMessage::Initialize(reply_tx))
            .map_err(|_| BridgeError::ChannelClosed("device session".to_string()))?;
        reply_rx
            .await
            .map_err(|_| BridgeError::ChannelClosed("device session".to_string()))
    }
}

/// Restricts which devices the session accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// True if every configured id matches.
    #[must_use]
    pub fn matches(&self, device: &DeviceInfo) -> bool {
        self.vendor_id.map_or(true, |v| v == device.vendor_id)
            && self.product_id.map_or(true, |p| p == device.product_id)
    }
}

struct Connection<T> {
    device: DeviceInfo,
    handle: T,
}

/// Device session manager.
///
/// Owns the open device handle exclusively. Clears the command record when
/// the tracked device goes away so stale input is not republished.
pub struct DeviceSession<H: DeviceHost> {
    host: H,
    filter: DeviceFilter,
    store: CommandStore,
    connection: Option<Connection<H::Handle>>,
    /// Devices waiting for a permission answer.
    pending: HashMap<DeviceId, DeviceInfo>,
}

impl<H: DeviceHost> std::fmt::Debug for DeviceSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("state", &self.state())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<H: DeviceHost> DeviceSession<H> {
    /// Creates a disconnected session.
    pub fn new(host: H, filter: DeviceFilter, store: CommandStore) -> Self {
        Self {
            host,
            filter,
            store,
            connection: None,
            pending: HashMap::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match &self.connection {
            Some(connection) => SessionState::Connected(connection.device.id.clone()),
            None => SessionState::Disconnected,
        }
    }

    /// Applies one host notification.
    pub fn handle(&mut self, event: SessionEvent) -> SessionState {
        match event {
            SessionEvent::Attached(device) => self.on_attached(device),
            SessionEvent::PermissionGranted(id) => self.on_permission_granted(&id),
            SessionEvent::PermissionDenied(id) => {
                if self.pending.remove(&id).is_some() {
                    debug!("Permission denied for {}", id);
                }
            }
            SessionEvent::Detached(id) => self.on_detached(&id),
        }
        self.state()
    }

    /// Scans attached devices: opens the first already permitted one and asks
    /// for access to the others.
    pub fn initialize(&mut self) -> SessionState {
        let devices = match self.host.list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to list input devices: {}", e);
                return self.state();
            }
        };

        info!("Found {} candidate input device(s)", devices.len());
        for device in devices {
            self.on_attached(device);
        }

        if self.connection.is_none() && !self.pending.is_empty() {
            info!(
                "No joystick readable yet, {} device(s) need access (udev rule or input group)",
                self.pending.len()
            );
        }

        self.state()
    }

    /// Releases the open device, if any.
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            info!("Releasing {}", connection.device.id);
            self.host.close(connection.handle);
        }
    }

    fn on_attached(&mut self, device: DeviceInfo) {
        if !self.filter.matches(&device) {
            debug!("Ignoring {} ({:04x}:{:04x})", device.id, device.vendor_id, device.product_id);
            return;
        }

        if let Some(connection) = &self.connection {
            debug!(
                "Ignoring {} while connected to {}",
                device.id, connection.device.id
            );
            return;
        }

        if self.host.has_permission(&device) {
            self.open(device);
        } else {
            debug!("Requesting permission for {}", device.id);
            self.host.request_permission(&device);
            self.pending.insert(device.id.clone(), device);
        }
    }

    fn on_permission_granted(&mut self, id: &DeviceId) {
        let Some(device) = self.pending.remove(id) else {
            debug!("Ignoring unrequested permission for {}", id);
            return;
        };

        if self.connection.is_some() {
            debug!("Permission for {} arrived while connected", id);
            return;
        }

        self.open(device);
    }

    fn on_detached(&mut self, id: &DeviceId) {
        self.pending.remove(id);

        let tracked = self
            .connection
            .as_ref()
            .is_some_and(|connection| &connection.device.id == id);
        if !tracked {
            debug!("Ignoring detach of untracked {}", id);
            return;
        }

        self.close();
        self.store.reset();
        info!("Joystick {} detached", id);
    }

    fn open(&mut self, device: DeviceInfo) {
        match self.host.open(&device) {
            Ok(handle) => {
                info!("Opened joystick {} ({})", device.id, device.name);
                self.connection = Some(Connection { device, handle });
            }
            Err(e) => {
                warn!("Failed to open {}: {}", device.id, e);
            }
        }
    }

    /// Processes the session queue until shutdown or until every sender is
    /// gone, then releases the device.
    pub async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<SessionMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                message = rx.recv() => {
                    match message {
                        Some(SessionMessage::Event(event)) => {
                            debug!("Session event: {:?}", event);
                            self.handle(event);
                        }
                        Some(SessionMessage::Initialize(reply)) => {
                            let state = self.initialize();
                            let _ = reply.send(state);
                        }
                        None => break,
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.close();
        debug!("Device session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::host::mocks::{device, MockDeviceHost};
    use super::*;
    use crate::command::state::Drive;

    fn new_session() -> (MockDeviceHost, CommandStore, DeviceSession<MockDeviceHost>) {
        let host = MockDeviceHost::new();
        let store = CommandStore::new();
        let session = DeviceSession::new(host.clone(), DeviceFilter::default(), store.clone());
        (host, store, session)
    }

    fn id(path: &str) -> DeviceId {
        DeviceId(path.to_string())
    }

    #[test]
    fn test_starts_disconnected() {
        let (_host, _store, session) = new_session();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_attach_then_grant_connects() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");

        let state = session.handle(SessionEvent::Attached(x.clone()));
        assert_eq!(state, SessionState::Disconnected);
        assert_eq!(host.permission_requests(), vec![x.id.clone()]);

        let state = session.handle(SessionEvent::PermissionGranted(x.id.clone()));
        assert_eq!(state, SessionState::Connected(x.id.clone()));
        assert_eq!(host.opened(), vec![x.id]);
    }

    #[test]
    fn test_attach_with_existing_permission_connects_immediately() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");
        host.grant(&x.id);

        let state = session.handle(SessionEvent::Attached(x.clone()));
        assert_eq!(state, SessionState::Connected(x.id));
        assert!(host.permission_requests().is_empty());
    }

    #[test]
    fn test_detach_tracked_device_disconnects_and_releases() {
        let (host, store, mut session) = new_session();
        let x = device("/dev/input/event3");
        host.grant(&x.id);
        session.handle(SessionEvent::Attached(x.clone()));
        store.update(|state| state.drive = Some(Drive::Forward));

        let state = session.handle(SessionEvent::Detached(x.id.clone()));
        assert_eq!(state, SessionState::Disconnected);
        assert_eq!(host.closed(), vec![x.id]);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_detach_other_device_is_noop() {
        let (host, store, mut session) = new_session();
        let x = device("/dev/input/event3");
        host.grant(&x.id);
        session.handle(SessionEvent::Attached(x.clone()));
        store.update(|state| state.drive = Some(Drive::Forward));

        let state = session.handle(SessionEvent::Detached(id("/dev/input/event9")));
        assert_eq!(state, SessionState::Connected(x.id));
        assert!(host.closed().is_empty());
        assert_eq!(store.snapshot().drive, Some(Drive::Forward));
    }

    #[test]
    fn test_attach_other_device_while_connected_is_noop() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");
        let y = device("/dev/input/event4");
        host.grant(&x.id);
        host.grant(&y.id);

        session.handle(SessionEvent::Attached(x.clone()));
        let state = session.handle(SessionEvent::Attached(y));
        assert_eq!(state, SessionState::Connected(x.id.clone()));
        assert_eq!(host.opened(), vec![x.id]);
    }

    #[test]
    fn test_open_failure_stays_disconnected_until_next_attach() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");
        host.grant(&x.id);
        host.fail_open(&x.id);

        let state = session.handle(SessionEvent::Attached(x.clone()));
        assert_eq!(state, SessionState::Disconnected);
        assert!(host.opened().is_empty());

        // No automatic retry; a new attach is needed
        host.failing.lock().unwrap().clear();
        assert_eq!(session.state(), SessionState::Disconnected);
        let state = session.handle(SessionEvent::Attached(x.clone()));
        assert_eq!(state, SessionState::Connected(x.id));
    }

    #[test]
    fn test_permission_denied_leaves_device_unusable() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");

        session.handle(SessionEvent::Attached(x.clone()));
        session.handle(SessionEvent::PermissionDenied(x.id.clone()));

        // A late grant for the denied request is ignored
        let state = session.handle(SessionEvent::PermissionGranted(x.id));
        assert_eq!(state, SessionState::Disconnected);
        assert!(host.opened().is_empty());
    }

    #[test]
    fn test_unrequested_permission_ignored() {
        let (host, _store, mut session) = new_session();

        let state = session.handle(SessionEvent::PermissionGranted(id("/dev/input/event7")));
        assert_eq!(state, SessionState::Disconnected);
        assert!(host.opened().is_empty());
    }

    #[test]
    fn test_detach_while_pending_drops_request() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");

        session.handle(SessionEvent::Attached(x.clone()));
        session.handle(SessionEvent::Detached(x.id.clone()));
        let state = session.handle(SessionEvent::PermissionGranted(x.id));
        assert_eq!(state, SessionState::Disconnected);
        assert!(host.opened().is_empty());
    }

    #[test]
    fn test_filter_rejects_other_devices() {
        let host = MockDeviceHost::new();
        let filter = DeviceFilter {
            vendor_id: Some(0x045e),
            product_id: None,
        };
        let mut session = DeviceSession::new(host.clone(), filter, CommandStore::new());
        let x = device("/dev/input/event3");
        host.grant(&x.id);

        let state = session.handle(SessionEvent::Attached(x));
        assert_eq!(state, SessionState::Disconnected);
        assert!(host.permission_requests().is_empty());
    }

    #[test]
    fn test_filter_matches() {
        let pad = device("/dev/input/event3");
        assert!(DeviceFilter::default().matches(&pad));
        assert!(DeviceFilter {
            vendor_id: Some(0x054c),
            product_id: Some(0x0ce6)
        }
        .matches(&pad));
        assert!(!DeviceFilter {
            vendor_id: Some(0x054c),
            product_id: Some(0x0001)
        }
        .matches(&pad));
    }

    #[test]
    fn test_initialize_opens_permitted_and_requests_others() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");
        let y = device("/dev/input/event4");
        host.add_device(x.clone());
        host.add_device(y.clone());
        host.grant(&y.id);

        let state = session.initialize();
        assert_eq!(state, SessionState::Connected(y.id.clone()));
        assert_eq!(host.permission_requests(), vec![x.id]);
        assert_eq!(host.opened(), vec![y.id]);
    }

    #[test]
    fn test_initialize_without_devices() {
        let (_host, _store, mut session) = new_session();
        assert_eq!(session.initialize(), SessionState::Disconnected);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (host, _store, mut session) = new_session();
        let x = device("/dev/input/event3");
        host.grant(&x.id);
        session.handle(SessionEvent::Attached(x.clone()));

        session.close();
        session.close();
        assert_eq!(host.closed(), vec![x.id]);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_run_processes_queue_and_releases_on_shutdown() {
        let (host, _store, session) = new_session();
        let x = device("/dev/input/event3");
        host.add_device(x.clone());
        host.grant(&x.id);

        let (handle, rx) = SessionHandle::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(session.run(rx, shutdown_rx));

        let state = handle.initialize().await.unwrap();
        assert_eq!(state, SessionState::Connected(x.id.clone()));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(host.closed(), vec![x.id]);
        assert!(handle.notify(SessionEvent::Detached(id("/dev/input/event3"))).is_err());
    }

    #[tokio::test]
    async fn test_run_applies_queued_events_in_order() {
        let (host, _store, session) = new_session();
        let x = device("/dev/input/event3");

        let (handle, rx) = SessionHandle::channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        handle.notify(SessionEvent::Attached(x.clone())).unwrap();
        handle.notify(SessionEvent::PermissionGranted(x.id.clone())).unwrap();
        handle.notify(SessionEvent::Detached(x.id.clone())).unwrap();
        drop(handle);

        session.run(rx, shutdown_rx).await;
        assert_eq!(host.opened(), vec![x.id.clone()]);
        assert_eq!(host.closed(), vec![x.id]);
    }
}
