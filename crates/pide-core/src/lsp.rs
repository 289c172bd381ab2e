//! Standard LSP traffic around the PIDE catalog
//!
//! The prover server is a language server first: it expects the
//! `initialize` handshake, full-text document sync and answers to the
//! requests it sends us.

use std::str::FromStr;

use lsp_types::notification::{
    DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, Initialized, Notification,
};
use lsp_types::request::Initialize;
use lsp_types::{
    ClientInfo, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, InitializeParams, InitializedParams, TextDocumentContentChangeEvent,
    TextDocumentIdentifier, TextDocumentItem, Uri, VersionedTextDocumentIdentifier,
};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::protocol::{
    encode_error_response, encode_notification, encode_request, encode_response, ProtocolError,
};

/// Request id of the `initialize` handshake
pub const INITIALIZE_REQUEST_ID: i64 = 1;

/// JSON-RPC error code for requests we do not serve
pub const METHOD_NOT_FOUND: i64 = -32601;

pub fn initialize_request() -> Result<String, ProtocolError> {
    let params = InitializeParams {
        process_id: Some(std::process::id()),
        client_info: Some(ClientInfo {
            name: String::from("pide"),
            version: Some(String::from(env!("CARGO_PKG_VERSION"))),
        }),
        ..Default::default()
    };
    encode_request::<Initialize>(INITIALIZE_REQUEST_ID, &params)
}

pub fn initialized_notification() -> Result<String, ProtocolError> {
    encode_notification::<Initialized>(&InitializedParams {})
}

/// Answer a server-initiated request.
///
/// Capability registration and progress tokens are acknowledged with a null
/// result, configuration lookups get one null per item, and everything else
/// is refused with `MethodNotFound`.
pub fn reply_to(id: &Value, method: &str, params: Option<&Value>) -> Result<String, ProtocolError> {
    match method {
        "client/registerCapability"
        | "client/unregisterCapability"
        | "window/workDoneProgress/create"
        | "window/showMessageRequest" => encode_response(id, Value::Null),
        "workspace/configuration" => {
            let items = params
                .and_then(|p| p.get("items"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            encode_response(id, Value::Array(vec![Value::Null; items]))
        }
        _ => {
            debug!(method = %method, "Refusing server request");
            encode_error_response(id, METHOD_NOT_FOUND, &format!("Unhandled method {}", method))
        }
    }
}

/// Convert to the LSP uri type; `None` if the two disagree on syntax
pub fn to_lsp_uri(url: &Url) -> Option<Uri> {
    Uri::from_str(url.as_str()).ok()
}

/// Full-text document synchronization notification
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSync {
    Open(DidOpenTextDocumentParams),
    Change(DidChangeTextDocumentParams),
    Close(DidCloseTextDocumentParams),
}

impl DocumentSync {
    pub fn open(uri: &Url, language_id: &str, version: i32, text: &str) -> Option<Self> {
        Some(Self::Open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: to_lsp_uri(uri)?,
                language_id: language_id.to_string(),
                version,
                text: text.to_string(),
            },
        }))
    }

    pub fn change(uri: &Url, version: i32, text: &str) -> Option<Self> {
        Some(Self::Change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: to_lsp_uri(uri)?,
                version,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: text.to_string(),
            }],
        }))
    }

    pub fn close(uri: &Url) -> Option<Self> {
        Some(Self::Close(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier {
                uri: to_lsp_uri(uri)?,
            },
        }))
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Open(_) => DidOpenTextDocument::METHOD,
            Self::Change(_) => DidChangeTextDocument::METHOD,
            Self::Close(_) => DidCloseTextDocument::METHOD,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        match self {
            Self::Open(p) => encode_notification::<DidOpenTextDocument>(p),
            Self::Change(p) => encode_notification::<DidChangeTextDocument>(p),
            Self::Close(p) => encode_notification::<DidCloseTextDocument>(p),
        }
    }
}
