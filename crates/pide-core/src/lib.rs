//! Client-side synchronization with a PIDE prover server
//!
//! Keeps editor-visible state consistent with notifications pushed by the
//! server:
//! - The LSP handshake and full-text document sync
//! - Decorations per document and overlay class
//! - Caret reports with deduplication
//! - The dynamic output view
//! - The id-gated state panel
//! - Previews and the symbol table
//!
//! Everything runs through one ordered event queue (see [`session`]).

pub mod caret;
pub mod config;
pub mod connection;
pub mod decorations;
pub mod documents;
pub mod event_bus;
pub mod lsp;
pub mod output;
pub mod preview;
pub mod protocol;
pub mod session;
pub mod state_panel;
pub mod surface;
pub mod symbols;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use caret::{CaretPosition, CaretTracker, DocumentSelector, EditorCaret};
pub use config::{ConfigError, PideConfig, ServerCommand};
pub use connection::{Connection, ConnectionError, ConnectionState, Outbound, Router};
pub use documents::{DocumentTracker, TextDocument};
pub use event_bus::{EditorEvent, Event, EventBus, EventSender};
pub use protocol::{ClientNotification, NotificationKind, ServerNotification, StateId};
pub use session::{Flow, Session, Workspace};
pub use state_panel::{PanelAction, PanelPhase, StatePanelRegistry};
pub use surface::{DecorationSurface, OutputSurface, PanelSurface, PreviewSurface, Surfaces};
pub use url::Url;
