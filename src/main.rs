//! # Joystick Bridge
//!
//! Drive your RC car from a USB gamepad.
//!
//! This application reads a gamepad through Linux evdev, turns its input into
//! compact command records and publishes them to the vehicle UI over a
//! newline-delimited JSON method-call bridge on stdin/stdout.

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tracing::{info, warn};

use joystick_bridge::bridge::stdio::{run_reader, run_writer};
use joystick_bridge::bridge::MethodDispatcher;
use joystick_bridge::command::state::CommandStore;
use joystick_bridge::config::Config;
use joystick_bridge::controller::mapper::EventMapper;
use joystick_bridge::publish::sink::ChannelSink;
use joystick_bridge::publish::PublishLoop;
use joystick_bridge::session::evdev_host::{watch_hotplug, EvdevHost};
use joystick_bridge::session::{DeviceSession, SessionHandle};

/// Time allowed for background work after shutdown before the runtime is
/// torn down
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Main entry point for Joystick Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging on stderr (stdout carries the bridge protocol)
///    - Load configuration from the path given as the first argument, or use
///      defaults
///
/// 2. **Tasks**
///    - Device session: attach / permission / open / detach lifecycle
///    - Hot-plug watcher: rescans the input directory
///    - Input dispatch: applies gamepad events to the command record
///    - Publish loop: pushes `onJoystickData` every interval once the UI has
///      called `initializeUsbJoystick`
///    - Bridge writer: sole owner of stdout
///    - Bridge reader: answers method calls from stdin
///
/// 3. **Graceful Shutdown**
///    - Triggered by Ctrl+C or by the UI closing stdin
///    - Every task observes the shutdown signal and stops
///    - The device is released
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or the runtime cannot
/// be started.
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected stderr:
/// ```text
/// INFO joystick_bridge: Joystick Bridge v0.1.0 starting...
/// INFO joystick_bridge: Bridge channel: com.rccardt.rccar/usb_joystick
/// INFO joystick_bridge::session: Opened joystick /dev/input/event5 (Wireless Controller)
/// ```
fn main() -> Result<()> {
    let (log_writer, _log_guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .with_writer(log_writer)
        .init();

    info!("Joystick Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(run(config));

    // The stdin reader may still be parked in a blocking read
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(config: Config) -> Result<()> {
    info!("Bridge channel: {}", config.bridge.channel);

    let store = CommandStore::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (publishing_tx, publishing_rx) = watch::channel(false);
    let (outbound_tx, outbound_rx) = mpsc::channel(config.publish.queue_capacity);
    let (session_handle, session_rx) = SessionHandle::channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();

    // Device session
    let host = EvdevHost::new(
        config.session.input_dir.clone(),
        config.controller.layout,
        config.controller.fallback_deadzone,
        session_handle.clone(),
        input_tx,
    );
    let session = DeviceSession::new(host, config.session.filter(), store.clone());
    let session_task = tokio::spawn(session.run(session_rx, shutdown_rx.clone()));

    let hotplug_task = tokio::spawn(watch_hotplug(
        config.session.input_dir.clone(),
        config.session.scan_interval(),
        session_handle.clone(),
        shutdown_rx.clone(),
    ));

    // Input dispatch
    let mapper = EventMapper::with_encoder(store.clone(), config.controller.encoder());
    let input_task = tokio::spawn(mapper.run(input_rx, shutdown_rx.clone()));

    // Publish loop
    let publisher = PublishLoop::new(
        store.clone(),
        ChannelSink::new(outbound_tx.clone(), config.publish.method.clone()),
        config.publish.interval(),
        publishing_rx,
    )
    .with_log_interval(config.publish.log_interval);
    let publish_task = tokio::spawn(publisher.run(shutdown_rx.clone()));

    // Bridge
    let writer_task = tokio::spawn(run_writer(outbound_rx, tokio::io::stdout()));
    let dispatcher = MethodDispatcher::new(session_handle, publishing_tx);

    info!("Waiting for {} on stdin", joystick_bridge::bridge::METHOD_INITIALIZE);
    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = run_reader(BufReader::new(tokio::io::stdin()), dispatcher, outbound_tx) => {
            match result {
                Ok(()) => info!("Bridge input closed, shutting down..."),
                Err(e) => warn!("Bridge input failed: {}, shutting down...", e),
            }
        }

        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    let _ = shutdown_tx.send(true);

    let stats = publish_task.await.context("Publish task panicked")?;
    info!(
        "Total records published: {} ({} suppressed, {} failed)",
        stats.published, stats.suppressed, stats.failed
    );

    input_task.await.context("Input dispatch task panicked")?;
    hotplug_task.await.context("Hot-plug task panicked")?;
    session_task.await.context("Session task panicked")?;

    // Every outbound sender is gone now, so the writer drains and exits
    if let Err(e) = writer_task.await.context("Bridge writer task panicked")? {
        warn!("Bridge output failed: {}", e);
    }

    Ok(())
}
