//! Caret tracking
//!
//! Reports the active document and cursor to the server, skipping updates
//! that would repeat the last one sent.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::connection::Connection;
use crate::protocol::{CaretUpdateParams, ClientNotification};

/// Languages the prover server manages by default
pub const DEFAULT_LANGUAGES: [&str; 3] = ["isabelle", "isabelle-ml", "bibtex"];

/// Cursor of the focused editor as reported by the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorCaret {
    pub uri: Url,
    #[serde(default)]
    pub language_id: Option<String>,
    pub line: u32,
    pub character: u32,
}

/// Which documents the server cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSelector {
    languages: Vec<String>,
}

impl DocumentSelector {
    /// An empty language list accepts every file document
    pub fn new(languages: Vec<String>) -> Self {
        Self { languages }
    }

    pub fn matches(&self, uri: &Url, language_id: Option<&str>) -> bool {
        if uri.scheme() != "file" {
            return false;
        }
        if self.languages.is_empty() {
            return true;
        }
        language_id.is_some_and(|id| self.languages.iter().any(|l| l == id))
    }
}

impl Default for DocumentSelector {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect())
    }
}

/// Caret as last reported; the default value means "no active caret"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaretPosition {
    pub uri: Option<Url>,
    pub line: Option<u32>,
    pub character: Option<u32>,
}

impl CaretPosition {
    pub fn is_absent(&self) -> bool {
        self.uri.is_none()
    }

    fn to_params(&self) -> CaretUpdateParams {
        CaretUpdateParams {
            uri: self.uri.clone(),
            line: self.line,
            character: self.character,
        }
    }
}

#[derive(Debug, Default)]
pub struct CaretTracker {
    selector: DocumentSelector,
    last_sent: CaretPosition,
}

impl CaretTracker {
    pub fn new(selector: DocumentSelector) -> Self {
        Self {
            selector,
            last_sent: CaretPosition::default(),
        }
    }

    /// Position for the current editor state
    pub fn position_for(&self, editor: Option<&EditorCaret>) -> CaretPosition {
        match editor {
            Some(caret) if self.selector.matches(&caret.uri, caret.language_id.as_deref()) => {
                CaretPosition {
                    uri: Some(caret.uri.clone()),
                    line: Some(caret.line),
                    character: Some(caret.character),
                }
            }
            _ => CaretPosition::default(),
        }
    }

    /// Recompute the caret and notify the server if it changed.
    ///
    /// The absent caret is remembered but never transmitted. Returns whether
    /// a notification was sent.
    pub fn update(&mut self, editor: Option<&EditorCaret>, connection: &Connection) -> bool {
        let position = self.position_for(editor);
        if position == self.last_sent {
            return false;
        }

        let sent = !position.is_absent();
        if sent {
            tracing::debug!(uri = ?position.uri, line = ?position.line, "Caret update");
            connection.send(ClientNotification::CaretUpdate(position.to_params()));
        }
        self.last_sent = position;
        sent
    }

    /// Forget what was sent, so the next non-absent caret is reported
    pub fn reset(&mut self) {
        self.last_sent = CaretPosition::default();
    }

    pub fn last_sent(&self) -> &CaretPosition {
        &self.last_sent
    }
}
