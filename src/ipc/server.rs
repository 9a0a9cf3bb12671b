//! Loopback TCP server for IPC
//!
//! Provides request-response access to the macro registry and push
//! notifications of engine events to subscribed clients.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::EngineEvent;
use crate::macros::MacroRegistry;
use crate::state::EngineSwitch;

use super::protocol::{DaemonStatus, Notification, Request, Response};

const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Engine handles the server operates on
#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<MacroRegistry>,
    pub switch: Arc<EngineSwitch>,
    /// Used by load/save requests that name no path
    pub macro_file: PathBuf,
    pub event_tx: broadcast::Sender<EngineEvent>,
    pub hook_installed: Arc<AtomicBool>,
}

/// IPC Server handling client connections
pub struct Server {
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

struct Shared {
    ctx: ServerContext,
    start_time: Instant,
}

impl Server {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, ctx: ServerContext) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind IPC socket on {}", addr))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(addr = %listener.local_addr()?, "IPC server listening");

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                ctx,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("IPC socket has no local address")
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Disconnect every client
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
async fn handle_client(stream: TcpStream, shared: Arc<Shared>) -> Result<()> {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));
    let mut push_task = None;

    let result = serve_requests(&mut reader, &writer, &shared, &mut push_task).await;

    if let Some(task) = push_task {
        task.abort();
    }
    result
}

async fn serve_requests(
    reader: &mut OwnedReadHalf,
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    shared: &Shared,
    push_task: &mut Option<JoinHandle<()>>,
) -> Result<()> {
    loop {
        let Some(frame) = read_frame(reader).await? else {
            debug!("client disconnected");
            return Ok(());
        };

        let mut subscription = None;
        let response = match serde_json::from_slice::<Request>(&frame) {
            Ok(request) => {
                debug!(?request, "received request");
                if request == Request::Subscribe && push_task.is_none() {
                    // Subscribe now so nothing fired before the confirmation is missed
                    subscription = Some(shared.ctx.event_tx.subscribe());
                }
                shared.process_request(request).await
            }
            Err(e) => {
                warn!(?e, "malformed request");
                Response::error("bad_request", e.to_string())
            }
        };

        write_frame(&mut *writer.lock().await, &response).await?;

        // Pushing starts only after `subscribed` is on the wire
        if let Some(events) = subscription {
            *push_task = Some(tokio::spawn(push_events(events, Arc::clone(writer))));
            debug!("client subscribed to notifications");
        }
    }
}

async fn push_events(mut events: broadcast::Receiver<EngineEvent>, writer: Arc<Mutex<OwnedWriteHalf>>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let note = Notification::Event { event };
                if let Err(e) = write_frame(&mut *writer.lock().await, &note).await {
                    debug!(?e, "subscriber gone");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "subscriber lagged behind engine events");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

impl Shared {
    async fn process_request(&self, request: Request) -> Response {
        let ctx = &self.ctx;
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => Response::Status(DaemonStatus {
                engine_state: ctx.switch.current(),
                hook_installed: ctx.hook_installed.load(Ordering::Acquire),
                macro_count: ctx.registry.len(),
                uptime_secs: self.start_time.elapsed().as_secs(),
                ..DaemonStatus::default()
            }),

            Request::ListMacros => Response::Macros {
                macros: ctx.registry.list(),
            },

            Request::AddMacro { hotkeys, actions } => match ctx.registry.add(hotkeys, actions) {
                Ok(index) => {
                    info!(index, "macro added via IPC");
                    Response::Added { index }
                }
                Err(e) => e.into(),
            },

            Request::UpdateMacro {
                index,
                hotkeys,
                actions,
            } => match ctx.registry.update(index, hotkeys, actions) {
                Ok(()) => {
                    info!(index, "macro updated via IPC");
                    Response::Ok
                }
                Err(e) => e.into(),
            },

            Request::RemoveMacro { index } => match ctx.registry.remove(index) {
                Ok(_) => {
                    info!(index, "macro removed via IPC");
                    Response::Ok
                }
                Err(e) => e.into(),
            },

            Request::Load { path } => {
                let path = path.unwrap_or_else(|| ctx.macro_file.clone());
                let registry = Arc::clone(&ctx.registry);
                let loaded = tokio::task::spawn_blocking(move || registry.load_from_file(&path)).await;

                match loaded {
                    Ok(Ok(summary)) => {
                        let (count, skipped) = (summary.loaded, summary.skipped.len());
                        let _ = ctx.event_tx.send(EngineEvent::RegistryLoaded { count, skipped });
                        Response::Loaded { count, skipped }
                    }
                    Ok(Err(e)) => Response::error("io", e.to_string()),
                    Err(e) => Response::error("internal", e.to_string()),
                }
            }

            Request::Save { path } => {
                let path = path.unwrap_or_else(|| ctx.macro_file.clone());
                let registry = Arc::clone(&ctx.registry);
                let saved = tokio::task::spawn_blocking(move || {
                    let count = registry.len();
                    registry.save_to_file(&path).map(|()| count)
                })
                .await;

                match saved {
                    Ok(Ok(count)) => {
                        let _ = ctx.event_tx.send(EngineEvent::RegistrySaved { count });
                        Response::Saved { count }
                    }
                    Ok(Err(e)) => Response::error("io", e.to_string()),
                    Err(e) => Response::error("internal", e.to_string()),
                }
            }

            Request::Subscribe => Response::Subscribed,
        }
    }
}

/// Read one length-prefixed frame; `None` on a clean disconnect
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {} bytes exceeds limit", len);
    }

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await.context("truncated frame")?;
    Ok(Some(frame))
}

/// Send a length-prefixed JSON message
async fn write_frame<W: AsyncWrite + Unpin, T: Serialize>(writer: &mut W, msg: &T) -> Result<()> {
    let bytes = serde_json::to_vec(msg)?;
    let len = (bytes.len() as u32).to_le_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&bytes).await?;

    Ok(())
}

/// Decode a frame read with [`read_frame`]
#[cfg(test)]
fn decode<T: serde::de::DeserializeOwned>(frame: &[u8]) -> Result<T> {
    serde_json::from_slice(frame).context("failed to parse message")
}
