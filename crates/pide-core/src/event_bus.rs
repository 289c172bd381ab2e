//! Session event bus
//!
//! Single ordered queue for everything the session reacts to. Server
//! notifications and local editor events share it, so handlers always run
//! one at a time in arrival order.

use tokio::sync::mpsc;
use url::Url;

use crate::caret::EditorCaret;
use crate::documents::TextDocument;
use crate::protocol::ServerNotification;
use crate::state_panel::PanelAction;

/// Local editor events
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Selection moved or the active editor changed; `None` when no editor has focus
    CaretMoved(Option<EditorCaret>),
    /// Active editor switched to this document
    ActiveDocument(Option<Url>),
    DocumentOpened(TextDocument),
    /// Full new text of an open document
    DocumentChanged { uri: Url, version: i32, text: String },
    DocumentClosed(Url),
    /// User asked for the state panel
    ShowState,
    PreviewRequested { uri: Url, column: i32 },
    RequestSymbols,
    ConfigurationChanged,
}

/// Everything that flows through the session queue
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Editor(EditorEvent),
    Server(ServerNotification),
    /// Command posted back by the state panel surface
    Panel(PanelAction),
    /// The state panel view was closed by the user
    PanelDisposed,
    /// The server answered `initialize`
    ConnectionReady,
    ConnectionClosed,
}

/// Producer handle; cheap to clone into reader tasks and front ends
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Queue an event. Returns false once the session has stopped.
    pub fn emit(&self, event: Event) -> bool {
        tracing::trace!(?event, "Session event queued");
        self.tx.send(event).is_ok()
    }

    pub fn editor(&self, event: EditorEvent) -> bool {
        self.emit(Event::Editor(event))
    }
}

/// Event bus for the session; the session is the only consumer
pub struct EventBus {
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Wait for the next event
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    pub fn is_idle(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
