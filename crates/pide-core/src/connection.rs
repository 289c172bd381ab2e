//! Connection to the PIDE server
//!
//! Owns the outbound queue and the reader/writer tasks that move frames
//! between the transport and the session event bus. The connection is
//! `Connecting` until the `initialize` handshake has been answered; the
//! session marks it `Ready` when the reader reports that. Sends are
//! fire-and-forget: anything sent while the connection is not ready is
//! dropped without an error.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::event_bus::{Event, EventSender};
use crate::lsp::{self, DocumentSync, INITIALIZE_REQUEST_ID};
use crate::protocol::{
    ClientNotification, Incoming, NotificationKind, ProtocolError, ServerNotification,
};
use crate::transport::{FrameReader, FrameWriter, TransportError};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection already started (state: {0:?})")]
    AlreadyStarted(ConnectionState),
    #[error("no async runtime available to drive the connection")]
    NoRuntime,
    #[error("failed to build handshake: {0}")]
    Handshake(#[from] ProtocolError),
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Closed,
}

/// Message queued for the writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Notification(ClientNotification),
    Document(DocumentSync),
    /// Handshake traffic and replies produced by the connection itself
    Frame(String),
}

impl Outbound {
    fn into_text(self) -> Result<String, ProtocolError> {
        match self {
            Self::Notification(notification) => notification.encode(),
            Self::Document(sync) => sync.encode(),
            Self::Frame(text) => Ok(text),
        }
    }
}

pub struct Connection {
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    cancel: CancellationToken,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            outbound: None,
            cancel: CancellationToken::new(),
        }
    }

    /// In-process connection: ready immediately, outbound messages are
    /// delivered to the returned receiver instead of a transport.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Self {
            state: ConnectionState::Ready,
            outbound: Some(tx),
            cancel: CancellationToken::new(),
        };
        (connection, rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Start the reader and writer tasks over a framed transport and send
    /// `initialize`.
    ///
    /// Inbound notifications are queued on `events`. `ConnectionReady`
    /// follows once the server has answered `initialize`, and
    /// `ConnectionClosed` when the server side goes away.
    pub fn connect<R, W>(
        &mut self,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        events: EventSender,
    ) -> Result<(), ConnectionError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::AlreadyStarted(self.state));
        }
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| ConnectionError::NoRuntime)?;
        let initialize = lsp::initialize_request()?;

        let (tx, rx) = mpsc::unbounded_channel();
        // Queued before the writer starts so it is always the first frame
        let _ = tx.send(Outbound::Frame(initialize));
        handle.spawn(write_loop(writer, rx, self.cancel.child_token()));
        handle.spawn(read_loop(reader, events, tx.clone(), self.cancel.child_token()));

        self.outbound = Some(tx);
        self.state = ConnectionState::Connecting;
        debug!("PIDE connection started, waiting for initialize");
        Ok(())
    }

    /// Handshake finished; only a connecting connection becomes ready
    pub fn mark_ready(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            debug!(state = ?self.state, "Ignoring ready signal");
            return false;
        }
        self.state = ConnectionState::Ready;
        info!("PIDE connection ready");
        true
    }

    /// Send a notification; a no-op unless the connection is ready
    pub fn send(&self, notification: ClientNotification) {
        if self.state != ConnectionState::Ready {
            trace!(kind = %notification.kind(), state = ?self.state, "Dropping send on inactive connection");
            return;
        }
        debug!(kind = %notification.kind(), "Sending notification");
        self.enqueue(Outbound::Notification(notification));
    }

    /// Send a document synchronization notification; a no-op unless ready
    pub fn sync(&self, sync: DocumentSync) {
        if self.state != ConnectionState::Ready {
            trace!(method = sync.method(), state = ?self.state, "Dropping sync on inactive connection");
            return;
        }
        debug!(method = sync.method(), "Sending document sync");
        self.enqueue(Outbound::Document(sync));
    }

    fn enqueue(&self, message: Outbound) {
        let Some(outbound) = &self.outbound else {
            return;
        };
        if outbound.send(message).is_err() {
            trace!("Writer gone, message dropped");
        }
    }

    /// Close the connection; queued and future sends are dropped
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.cancel.cancel();
        self.outbound = None;
        self.state = ConnectionState::Closed;
        info!("PIDE connection closed");
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };
        let text = match message.into_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = writer.send(&text).await {
            // Channel closed while sending: drop silently from the caller's view
            debug!(error = %e, "Write failed, stopping writer");
            break;
        }
    }
    trace!("Writer task finished");
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    events: EventSender,
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = reader.receive() => frame,
        };
        let text = match frame {
            Ok(text) => text,
            Err(TransportError::Closed) => {
                info!("PIDE server closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "PIDE transport failed");
                break;
            }
        };
        let incoming = match Incoming::decode(&text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable server message");
                continue;
            }
        };
        match incoming {
            Incoming::Notification(notification) => {
                if !events.emit(Event::Server(notification)) {
                    return;
                }
            }
            Incoming::Request { id, method, params } => {
                match lsp::reply_to(&id, &method, params.as_ref()) {
                    Ok(reply) => {
                        let _ = outbound.send(Outbound::Frame(reply));
                    }
                    Err(e) => warn!(error = %e, method = %method, "Failed to answer server request"),
                }
            }
            Incoming::Response { id, error } if id.as_i64() == Some(INITIALIZE_REQUEST_ID) => {
                if let Some(error) = error {
                    warn!(%error, "PIDE server rejected initialize");
                    break;
                }
                match lsp::initialized_notification() {
                    Ok(initialized) => {
                        let _ = outbound.send(Outbound::Frame(initialized));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to encode initialized");
                        break;
                    }
                }
                if !events.emit(Event::ConnectionReady) {
                    return;
                }
            }
            Incoming::Response { id, .. } => trace!(%id, "Ignoring response"),
            Incoming::Ignored => {}
        }
    }
    events.emit(Event::ConnectionClosed);
}

/// Handler for one notification kind
pub type Handler<C> = Box<dyn FnMut(&mut C, ServerNotification) + Send>;

/// Per-tag dispatch table for inbound notifications.
///
/// Exactly one handler per kind; registering again replaces the earlier one.
pub struct Router<C> {
    handlers: HashMap<NotificationKind, Handler<C>>,
}

impl<C> Router<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn on_notification<F>(&mut self, kind: NotificationKind, handler: F)
    where
        F: FnMut(&mut C, ServerNotification) + Send + 'static,
    {
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            debug!(%kind, "Replaced notification handler");
        }
    }

    pub fn has_handler(&self, kind: NotificationKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler for this notification's kind. Returns false if none is registered.
    pub fn dispatch(&mut self, ctx: &mut C, notification: ServerNotification) -> bool {
        let kind = notification.kind();
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                handler(ctx, notification);
                true
            }
            None => {
                debug!(%kind, "No handler registered");
                false
            }
        }
    }
}

impl<C> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
