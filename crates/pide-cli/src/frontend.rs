//! Editor front end protocol
//!
//! The front end writes one JSON object per line on our stdin describing
//! what happened in the editor, e.g.
//! `{"event":"caret","caret":{"uri":"file:///A.thy","language_id":"isabelle","line":3,"character":0}}`.

use pide_core::{EditorCaret, EditorEvent, Event, PanelAction, TextDocument, Url};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FrontendMessage {
    /// Cursor moved or focus changed; without `caret` no editor has focus
    Caret {
        #[serde(default)]
        caret: Option<EditorCaret>,
    },
    Active {
        #[serde(default)]
        uri: Option<Url>,
    },
    Opened(TextDocument),
    Changed {
        uri: Url,
        version: i32,
        text: String,
    },
    Closed {
        uri: Url,
    },
    ShowState,
    /// Message posted by the state panel view
    Panel {
        message: PanelAction,
    },
    PanelClosed,
    Preview {
        uri: Url,
        #[serde(default)]
        column: i32,
    },
    Symbols,
    ConfigChanged,
}

impl FrontendMessage {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn into_event(self) -> Event {
        match self {
            Self::Caret { caret } => Event::Editor(EditorEvent::CaretMoved(caret)),
            Self::Active { uri } => Event::Editor(EditorEvent::ActiveDocument(uri)),
            Self::Opened(document) => Event::Editor(EditorEvent::DocumentOpened(document)),
            Self::Changed { uri, version, text } => {
                Event::Editor(EditorEvent::DocumentChanged { uri, version, text })
            }
            Self::Closed { uri } => Event::Editor(EditorEvent::DocumentClosed(uri)),
            Self::ShowState => Event::Editor(EditorEvent::ShowState),
            Self::Panel { message } => Event::Panel(message),
            Self::PanelClosed => Event::PanelDisposed,
            Self::Preview { uri, column } => {
                Event::Editor(EditorEvent::PreviewRequested { uri, column })
            }
            Self::Symbols => Event::Editor(EditorEvent::RequestSymbols),
            Self::ConfigChanged => Event::Editor(EditorEvent::ConfigurationChanged),
        }
    }
}
