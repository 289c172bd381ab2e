//! State panel registry
//!
//! Tracks the primary state panel and its server-assigned id. The server
//! may deliver output for an id long after we disposed of it, so every
//! inbound message is gated on the id currently bound to the panel, and
//! every outbound message reads that id when it is sent.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::protocol::{
    ClientNotification, StateAutoUpdateParams, StateId, StateIdParams, StateOutputParams,
};
use crate::surface::PanelSurface;

/// Commands posted by the panel surface.
///
/// `Unknown` covers any command string this client does not handle; it is
/// accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PanelAction {
    AutoUpdate { enabled: bool },
    Update,
    Locate,
    #[serde(other)]
    Unknown,
}

/// A live panel bound to a server state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePanel {
    id: StateId,
    content: String,
    auto_update: bool,
}

impl StatePanel {
    fn new(id: StateId) -> Self {
        Self {
            id,
            content: String::new(),
            auto_update: true,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }
}

/// Observable lifecycle of the primary panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    Absent,
    /// `state_init` sent, no id assigned yet
    Requesting,
    Active(StateId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    /// Existing panel brought to front
    Revealed,
    /// A request is already in flight
    Pending,
    /// `state_init` sent
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOutcome {
    Created,
    Updated,
    /// Output for an id we no longer hold
    Stale,
}

#[derive(Debug, Default)]
enum PanelSlot {
    #[default]
    Absent,
    Requesting,
    Active(StatePanel),
}

/// Owns zero or one primary panel
#[derive(Debug, Default)]
pub struct StatePanelRegistry {
    slot: PanelSlot,
}

impl StatePanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PanelPhase {
        match &self.slot {
            PanelSlot::Absent => PanelPhase::Absent,
            PanelSlot::Requesting => PanelPhase::Requesting,
            PanelSlot::Active(panel) => PanelPhase::Active(panel.id),
        }
    }

    pub fn panel(&self) -> Option<&StatePanel> {
        match &self.slot {
            PanelSlot::Active(panel) => Some(panel),
            PanelSlot::Absent | PanelSlot::Requesting => None,
        }
    }

    pub fn current_id(&self) -> Option<StateId> {
        self.panel().map(StatePanel::id)
    }

    /// Show the state panel, asking the server for one if none exists
    pub fn request_show(
        &mut self,
        connection: &Connection,
        surface: &mut dyn PanelSurface,
    ) -> ShowOutcome {
        match &self.slot {
            PanelSlot::Active(panel) => {
                trace!(id = %panel.id, "Revealing state panel");
                surface.reveal();
                ShowOutcome::Revealed
            }
            PanelSlot::Requesting => {
                trace!("State panel already requested");
                ShowOutcome::Pending
            }
            PanelSlot::Absent => {
                debug!("Requesting state panel");
                connection.send(ClientNotification::StateInit);
                self.slot = PanelSlot::Requesting;
                ShowOutcome::Requested
            }
        }
    }

    /// Handle `state_output` from the server
    pub fn on_output(
        &mut self,
        params: StateOutputParams,
        surface: &mut dyn PanelSurface,
    ) -> OutputOutcome {
        let StateOutputParams { id, content } = params;
        match &mut self.slot {
            PanelSlot::Active(panel) if panel.id == id => {
                surface.set_content(&content);
                panel.content = content;
                OutputOutcome::Updated
            }
            PanelSlot::Active(panel) => {
                trace!(id = %id, current = %panel.id, "Stale state output dropped");
                OutputOutcome::Stale
            }
            PanelSlot::Requesting => {
                debug!(id = %id, "State panel bound");
                let mut panel = StatePanel::new(id);
                surface.open();
                surface.set_content(&content);
                panel.content = content;
                self.slot = PanelSlot::Active(panel);
                OutputOutcome::Created
            }
            PanelSlot::Absent => {
                trace!(id = %id, "State output without panel dropped");
                OutputOutcome::Stale
            }
        }
    }

    /// Translate a panel command into a notification for the current id
    pub fn handle_action(&mut self, action: PanelAction, connection: &Connection) {
        let PanelSlot::Active(panel) = &mut self.slot else {
            trace!(?action, "Panel action without active panel ignored");
            return;
        };
        let id = panel.id;
        let notification = match action {
            PanelAction::AutoUpdate { enabled } => {
                panel.auto_update = enabled;
                ClientNotification::StateAutoUpdate(StateAutoUpdateParams { id, enabled })
            }
            PanelAction::Update => ClientNotification::StateUpdate(StateIdParams { id }),
            PanelAction::Locate => ClientNotification::StateLocate(StateIdParams { id }),
            PanelAction::Unknown => {
                trace!(%id, "Unknown panel command ignored");
                return;
            }
        };
        connection.send(notification);
    }

    /// The panel view was closed.
    ///
    /// Sends `state_exit` and clears the slot before any further event is
    /// handled, so output still in flight for this id is recognised as stale.
    pub fn dispose(&mut self, connection: &Connection) {
        match std::mem::take(&mut self.slot) {
            PanelSlot::Active(panel) => {
                debug!(id = %panel.id, "Disposing state panel");
                connection.send(ClientNotification::StateExit(StateIdParams { id: panel.id }));
            }
            PanelSlot::Requesting => debug!("State panel request abandoned"),
            PanelSlot::Absent => {}
        }
    }
}
