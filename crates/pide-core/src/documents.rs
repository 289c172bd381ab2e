//! Open document tracking
//!
//! Mirrors the managed documents open in the editor so the server sees
//! them with their latest text, including documents opened before the
//! handshake finished.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::caret::DocumentSelector;
use crate::connection::Connection;
use crate::lsp::DocumentSync;

/// Document as opened in the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDocument {
    pub uri: Url,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct DocumentTracker {
    selector: DocumentSelector,
    open: HashMap<Url, TextDocument>,
}

impl DocumentTracker {
    pub fn new(selector: DocumentSelector) -> Self {
        Self {
            selector,
            open: HashMap::new(),
        }
    }

    /// Track a newly opened document. Returns false for documents the
    /// server does not manage.
    pub fn open(&mut self, document: TextDocument, connection: &Connection) -> bool {
        if !self
            .selector
            .matches(&document.uri, Some(&document.language_id))
        {
            debug!(uri = %document.uri, "Not a managed document");
            return false;
        }
        if self.open.contains_key(&document.uri) {
            // Already known to the server; treat as new content
            let TextDocument {
                uri, version, text, ..
            } = document;
            return self.change(&uri, version, text, connection);
        }
        send(connection, open_sync(&document), &document.uri);
        self.open.insert(document.uri.clone(), document);
        true
    }

    pub fn change(&mut self, uri: &Url, version: i32, text: String, connection: &Connection) -> bool {
        let Some(document) = self.open.get_mut(uri) else {
            return false;
        };
        send(connection, DocumentSync::change(uri, version, &text), uri);
        document.version = version;
        document.text = text;
        true
    }

    pub fn close(&mut self, uri: &Url, connection: &Connection) -> bool {
        if self.open.remove(uri).is_none() {
            return false;
        }
        send(connection, DocumentSync::close(uri), uri);
        true
    }

    /// Announce every tracked document again; used once the server is ready
    pub fn reopen_all(&self, connection: &Connection) {
        for document in self.open.values() {
            send(connection, open_sync(document), &document.uri);
        }
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.open.contains_key(uri)
    }

    pub fn get(&self, uri: &Url) -> Option<&TextDocument> {
        self.open.get(uri)
    }
}

fn open_sync(document: &TextDocument) -> Option<DocumentSync> {
    DocumentSync::open(
        &document.uri,
        &document.language_id,
        document.version,
        &document.text,
    )
}

fn send(connection: &Connection, sync: Option<DocumentSync>, uri: &Url) {
    match sync {
        Some(sync) => connection.sync(sync),
        None => warn!(uri = %uri, "Document uri not representable in LSP"),
    }
}
