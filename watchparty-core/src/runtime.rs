//! The sync event loop and the handle transports use to reach it.
//!
//! [`SyncServer`] owns the [`EventDispatcher`] and is the only task that
//! mutates room state. Transports talk to it through a cloneable
//! [`SyncHandle`]. Password hashing and verification run on the caller's
//! task before an event is queued, so the loop never blocks on them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::dispatch::{Credential, EventDispatcher, Stats};
use crate::hub::{ConnectionHub, MessageReceiver};
use crate::models::{ConnectionId, RoomCode, RoomId, RoomSummary};
use crate::protocol::ClientEvent;
use crate::service::{hash_password, validate_room_password, verify_password};
use crate::{Error, Result};

const COMMAND_BUFFER: usize = 1024;
const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum Command {
    Connect {
        connection_id: ConnectionId,
    },
    Event {
        connection_id: ConnectionId,
        event: ClientEvent,
        credential: Credential,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    LookupRoomSecret {
        code: RoomCode,
        reply: oneshot::Sender<Option<(RoomId, String)>>,
    },
    ListPublic {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
    Stats {
        reply: oneshot::Sender<Stats>,
    },
}

pub struct SyncServer {
    dispatcher: EventDispatcher,
    hub: ConnectionHub,
    rx: mpsc::Receiver<Command>,
}

impl SyncServer {
    /// Build the server and a handle to it. `outbound_buffer` bounds each
    /// connection's outgoing queue.
    #[must_use]
    pub fn new(dispatcher: EventDispatcher, outbound_buffer: usize) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let hub = ConnectionHub::new();
        let handle = SyncHandle {
            tx,
            hub: hub.clone(),
            outbound_buffer,
        };
        (
            Self {
                dispatcher,
                hub,
                rx,
            },
            handle,
        )
    }

    /// Run until cancelled or until every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut reap = interval(REAP_INTERVAL);
        reap.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Sync server started");

        loop {
            let next_deadline = self.dispatcher.next_deadline();
            let wait = self.time_until(next_deadline);

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Sync server shutting down");
                    break;
                }
                command = self.rx.recv() => {
                    let Some(command) = command else {
                        tracing::info!("All sync handles dropped, stopping");
                        break;
                    };
                    self.apply(command);
                }
                () = sleep(wait.unwrap_or(REAP_INTERVAL)), if wait.is_some() => {
                    let out = self.dispatcher.fire_due();
                    self.hub.deliver(out);
                }
                _ = reap.tick() => {
                    let out = self.dispatcher.reap_idle();
                    self.hub.deliver(out);
                }
            }
        }
    }

    fn time_until(&self, deadline: Option<DateTime<Utc>>) -> Option<Duration> {
        let deadline = deadline?;
        Some((deadline - self.dispatcher.now()).to_std().unwrap_or(Duration::ZERO))
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Connect { connection_id } => self.dispatcher.connect(connection_id),
            Command::Event {
                connection_id,
                event,
                credential,
            } => {
                let out = self.dispatcher.handle(&connection_id, event, credential);
                self.hub.deliver(out);
            }
            Command::Disconnect { connection_id } => {
                let out = self.dispatcher.disconnect(&connection_id);
                self.hub.deliver(out);
            }
            Command::LookupRoomSecret { code, reply } => {
                let _ = reply.send(self.dispatcher.room_secret(&code));
            }
            Command::ListPublic { reply } => {
                let _ = reply.send(self.dispatcher.list_public());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.dispatcher.stats());
            }
        }
    }
}

/// Cloneable entry point into a running [`SyncServer`].
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<Command>,
    hub: ConnectionHub,
    outbound_buffer: usize,
}

impl SyncHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::Internal("sync server is not running".to_string()))
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await
            .map_err(|_| Error::Internal("sync server dropped the request".to_string()))
    }

    /// Register a new connection. Events for it arrive on the returned queue.
    pub async fn connect(&self, connection_id: ConnectionId) -> Result<MessageReceiver> {
        let rx = self.hub.register(connection_id.clone(), self.outbound_buffer);
        if let Err(err) = self.send(Command::Connect { connection_id: connection_id.clone() }).await {
            self.hub.unregister(&connection_id);
            return Err(err);
        }
        Ok(rx)
    }

    /// Submit one decoded client event.
    ///
    /// Room passwords are hashed or checked here. A bad password is answered
    /// directly and the event never reaches the loop.
    pub async fn submit(&self, connection_id: ConnectionId, event: ClientEvent) -> Result<()> {
        let credential = match self.prepare_credential(&event).await {
            Ok(credential) => credential,
            Err(err) => {
                tracing::debug!(connection_id = %connection_id, event = event.name(), error = %err, "Credential rejected");
                self.hub.send(&connection_id, err.into_server_event());
                return Ok(());
            }
        };
        self.send(Command::Event {
            connection_id,
            event,
            credential,
        })
        .await
    }

    async fn prepare_credential(&self, event: &ClientEvent) -> Result<Credential> {
        match event {
            ClientEvent::RoomCreate(payload) if !payload.is_public => {
                let Some(password) = payload.password.as_deref() else {
                    return Ok(Credential::None);
                };
                validate_room_password(password)?;
                Ok(Credential::PasswordHash(hash_password(password).await?))
            }
            ClientEvent::RoomJoin(payload) => {
                let Some(password) = payload.password.clone() else {
                    return Ok(Credential::None);
                };
                let code = RoomCode::parse(&payload.room_code);
                let secret = self
                    .request(|reply| Command::LookupRoomSecret { code, reply })
                    .await?;
                let Some((room_id, hash)) = secret else {
                    // Public or unknown room. The loop decides which.
                    return Ok(Credential::None);
                };
                if verify_password(&password, &hash).await? {
                    Ok(Credential::VerifiedFor(room_id))
                } else {
                    Ok(Credential::Rejected)
                }
            }
            _ => Ok(Credential::None),
        }
    }

    /// The transport closed. Safe to call more than once.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        self.hub.unregister(&connection_id);
        self.send(Command::Disconnect { connection_id }).await
    }

    pub async fn list_public(&self) -> Result<Vec<RoomSummary>> {
        self.request(|reply| Command::ListPublic { reply }).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.hub.connection_count()
    }
}
