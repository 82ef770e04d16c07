//! Palaver production server.
//!
//! Production runtime wrapping [`palaver_core`]'s action-based coordination
//! engine with real I/O: a tokio TCP listener speaking newline-delimited
//! JSON, per-connection reader and writer tasks, and a periodic janitor that
//! trims room history.
//!
//! # Architecture
//!
//! The [`ChatDriver`] is pure logic behind a single async mutex; every event
//! is serialized through it. Fan-out targets are resolved against the driver
//! while its lock is still held, so a broadcast reaches exactly the room
//! membership at the moment of dispatch. Credential resolution is the one
//! potentially slow step and runs *before* the lock is taken, through the
//! [`IdentityResolver`] seam.
//!
//! # Components
//!
//! - [`Server`]: accept loop and action executor
//! - [`ClientFrame`]: inbound wire frames
//! - [`IdentityResolver`]: async credential-to-identity seam
//! - [`SystemEnv`]: production environment (real time, crypto RNG)

mod error;
mod resolver;
mod system_env;
mod wire;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

pub use error::ServerError;
use palaver_core::{
    ChatAction, ChatDriver, ChatEvent, ConnectionId, EngineConfig, ErrorCode, ServerNotice,
};
pub use resolver::{AuthError, AuthPayload, IdentityResolver, SelfAssertedResolver};
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::{RwLock, mpsc},
};
pub use wire::ClientFrame;

/// Shared state for all connections.
///
/// Holds the outbound sender for every live connection. All notices to a
/// client go through its single writer task, ensuring ordering.
struct SharedState {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

type SharedDriver = Arc<tokio::sync::Mutex<ChatDriver<SystemEnv>>>;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:7429").
    pub bind_address: String,
    /// Engine configuration (retention limit, admission cap).
    pub engine: EngineConfig,
    /// Interval between janitor sweeps.
    pub janitor_period: Duration,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7429".to_string(),
            engine: EngineConfig::default(),
            janitor_period: Duration::from_secs(60),
        }
    }
}

/// Production chat coordination server.
///
/// Wraps [`ChatDriver`] with a tokio TCP transport and system environment.
pub struct Server {
    driver: ChatDriver<SystemEnv>,
    listener: TcpListener,
    resolver: Arc<dyn IdentityResolver>,
    janitor_period: Duration,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(
        config: ServerRuntimeConfig,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Result<Self, ServerError> {
        if config.janitor_period.is_zero() {
            return Err(ServerError::Config("janitor period must be non-zero".to_string()));
        }

        let driver = ChatDriver::new(SystemEnv::new(), config.engine);
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { driver, listener, resolver, janitor_period: config.janitor_period })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// Runs until the process is shut down or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("server listening on {}", self.listener.local_addr()?);

        let driver = Arc::new(tokio::sync::Mutex::new(self.driver));
        let shared = Arc::new(SharedState { senders: RwLock::new(HashMap::new()) });

        spawn_janitor(Arc::clone(&driver), Arc::clone(&shared), self.janitor_period);

        let next_connection = AtomicU64::new(1);
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let connection = ConnectionId(next_connection.fetch_add(1, Ordering::Relaxed));
                    tracing::debug!(%connection, %peer, "accepted connection");

                    let driver = Arc::clone(&driver);
                    let shared = Arc::clone(&shared);
                    let resolver = Arc::clone(&self.resolver);

                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, connection, driver, shared, resolver).await
                        {
                            tracing::debug!(%connection, "connection error: {e}");
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {e}");
                },
            }
        }
    }
}

/// Spawn the periodic history sweep.
///
/// Runs on a fixed interval independent of traffic; each sweep takes the
/// driver lock once.
fn spawn_janitor(driver: SharedDriver, shared: Arc<SharedState>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; skip it so sweeps start one
        // period after boot.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let mut driver = driver.lock().await;
            let actions = driver.process_event(ChatEvent::JanitorSweep);
            if let Err(e) = execute_actions(&mut driver, actions, &shared).await {
                tracing::error!("janitor action error: {e}");
            }
        }
    });
}

/// Handle a single TCP connection.
///
/// Spawns a writer task draining the connection's outbound channel, then
/// reads frames line by line until EOF or a read error. Transport closure
/// dispatches the same disconnect event as an explicit close.
async fn handle_connection(
    stream: TcpStream,
    connection: ConnectionId,
    driver: SharedDriver,
    shared: Arc<SharedState>,
    resolver: Arc<dyn IdentityResolver>,
) -> Result<(), ServerError> {
    let (read_half, mut write_half) = stream.into_split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(line) = outbound.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    {
        let mut senders = shared.senders.write().await;
        senders.insert(connection, sender.clone());
    }

    let admitted = {
        let mut driver = driver.lock().await;
        let actions = driver.process_event(ChatEvent::ConnectionOpened { connection });
        let admitted = !actions
            .iter()
            .any(|action| matches!(action, ChatAction::CloseConnection { .. }));
        execute_actions(&mut driver, actions, &shared).await?;
        admitted
    };

    if admitted {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let frame = match ClientFrame::parse(line) {
                        Ok(frame) => frame,
                        Err(e) => {
                            send_direct(&sender, &ServerNotice::Error {
                                code: ErrorCode::InvalidArgument,
                                message: format!("malformed frame: {e}"),
                            })?;
                            continue;
                        },
                    };

                    // Resolve credentials before taking the driver lock.
                    let identity = match frame.auth() {
                        Some(payload) => match resolver.resolve(payload).await {
                            Ok(identity) => Some(identity),
                            Err(e) => {
                                send_direct(&sender, &ServerNotice::Error {
                                    code: ErrorCode::Unauthenticated,
                                    message: e.to_string(),
                                })?;
                                continue;
                            },
                        },
                        None => None,
                    };

                    let mut driver = driver.lock().await;
                    let actions = driver.process_event(frame.into_event(connection, identity));
                    execute_actions(&mut driver, actions, &shared).await?;
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(%connection, "read error: {e}");
                    break;
                },
            }
        }
    }

    {
        let mut senders = shared.senders.write().await;
        senders.remove(&connection);
    }
    drop(sender);

    {
        let mut driver = driver.lock().await;
        let actions = driver.process_event(ChatEvent::ConnectionClosed { connection });
        execute_actions(&mut driver, actions, &shared).await?;
    }

    let _ = writer.await;

    Ok(())
}

fn encode(notice: &ServerNotice) -> Result<String, ServerError> {
    serde_json::to_string(notice).map_err(|e| ServerError::Protocol(e.to_string()))
}

/// Deliver a notice straight to one connection's writer task.
///
/// A closed channel means the peer is already gone; the notice is dropped.
fn send_direct(
    sender: &mpsc::UnboundedSender<String>,
    notice: &ServerNotice,
) -> Result<(), ServerError> {
    if sender.send(encode(notice)?).is_err() {
        tracing::debug!("notice dropped: writer task gone");
    }
    Ok(())
}

/// Execute engine actions.
///
/// Called with the driver lock held: broadcast targets are resolved against
/// room membership at this exact moment, so a connection that closed before
/// dispatch is never a target.
async fn execute_actions(
    driver: &mut ChatDriver<SystemEnv>,
    actions: Vec<ChatAction>,
    shared: &SharedState,
) -> Result<(), ServerError> {
    for action in actions {
        match action {
            ChatAction::SendTo { connection, notice } => {
                let line = encode(&notice)?;
                let senders = shared.senders.read().await;
                match senders.get(&connection) {
                    Some(sender) => {
                        if sender.send(line).is_err() {
                            tracing::debug!(%connection, "send dropped: writer task gone");
                        }
                    },
                    None => {
                        tracing::debug!(%connection, "send dropped: connection gone");
                    },
                }
            },

            ChatAction::BroadcastRoom { room_id, notice, exclude } => {
                let targets: Vec<ConnectionId> = driver.connections_in_room(room_id).collect();
                let line = encode(&notice)?;

                let senders = shared.senders.read().await;
                for target in targets {
                    if Some(target) == exclude {
                        continue;
                    }
                    if let Some(sender) = senders.get(&target) {
                        if sender.send(line.clone()).is_err() {
                            tracing::debug!(connection = %target, "broadcast dropped");
                        }
                    }
                }
            },

            ChatAction::BroadcastAll { notice } => {
                let line = encode(&notice)?;
                let senders = shared.senders.read().await;
                for sender in senders.values() {
                    if sender.send(line.clone()).is_err() {
                        tracing::debug!("broadcast dropped: writer task gone");
                    }
                }
            },

            ChatAction::CloseConnection { connection, reason } => {
                tracing::info!(%connection, %reason, "closing connection");
                let mut senders = shared.senders.write().await;
                // Dropping the sender ends the writer task, which shuts the
                // socket down.
                senders.remove(&connection);
            },
        }
    }

    Ok(())
}
