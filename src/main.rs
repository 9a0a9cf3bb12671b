//! winhot-daemon: global hotkey macro daemon
//!
//! Provides:
//! - System-wide keystroke interception via a low-level keyboard hook
//! - Macro playback with held-modifier release and restore
//! - A loopback IPC server for macro editors
//!
//! F12 exits the daemon; Ctrl+F12 switches hotkeys on and off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use winhot::config::Config;
use winhot::events::EngineEvent;
use winhot::executor::ActionExecutor;
use winhot::hotkey::{hook, HotkeyListener};
use winhot::input::platform_keyboard;
use winhot::ipc::{Server, ServerContext};
use winhot::lifecycle::ShutdownSignal;
use winhot::macros::MacroRegistry;
use winhot::state::EngineSwitch;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "winhot-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(?config, "configuration loaded");

    let (event_tx, _) = broadcast::channel::<EngineEvent>(64);

    // Log every engine event
    let mut log_rx = event_tx.subscribe();
    tokio::spawn(async move {
        loop {
            match log_rx.recv().await {
                Ok(event) => info!(%event, "engine event"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Load macros; a broken file must not keep the engine from starting
    let registry = Arc::new(MacroRegistry::new());
    match registry.load_from_file(&config.macro_file) {
        Ok(summary) => {
            let _ = event_tx.send(EngineEvent::RegistryLoaded {
                count: summary.loaded,
                skipped: summary.skipped.len(),
            });
        }
        Err(e) => {
            error!(?e, "failed to load macro file, starting empty");
        }
    }

    let switch = Arc::new(EngineSwitch::new(event_tx.clone()));
    let shutdown = ShutdownSignal::new();

    let (oracle, sender) = platform_keyboard();
    let executor = ActionExecutor::new(
        Handle::current(),
        Arc::clone(&oracle),
        sender,
        config.playback,
        config.overlap,
        event_tx.clone(),
    );

    let listener = Arc::new(HotkeyListener::new(
        Arc::clone(&registry),
        Arc::clone(&switch),
        executor,
        oracle,
        shutdown.handle(),
        event_tx.clone(),
    ));

    // Install the keyboard hook (runs on a dedicated thread)
    let hook_installed = Arc::new(AtomicBool::new(false));
    let hook_handle = match hook::install(listener) {
        Ok(handle) => {
            hook_installed.store(true, Ordering::Release);
            let _ = event_tx.send(EngineEvent::ListenerInstalled);
            Some(handle)
        }
        Err(e) => {
            error!(?e, "failed to install keyboard hook");
            warn!("continuing without keystroke interception");
            hook::report_failure(&e);
            let _ = event_tx.send(EngineEvent::ListenerFailed {
                reason: e.to_string(),
            });
            None
        }
    };

    // The engine keeps working without the control surface
    let ctx = ServerContext {
        registry,
        switch,
        macro_file: config.macro_file.clone(),
        event_tx: event_tx.clone(),
        hook_installed,
    };
    let server = match Server::bind(config.ipc_addr, ctx).await {
        Ok(server) => Some(server),
        Err(e) => {
            error!(?e, "failed to start IPC server");
            None
        }
    };

    info!("daemon initialized, entering main loop");

    tokio::select! {
        result = async {
            match &server {
                Some(server) => server.run().await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    drop(hook_handle);
    if let Some(server) = &server {
        server.shutdown().await;
    }

    info!("winhot-daemon stopped");

    Ok(())
}
