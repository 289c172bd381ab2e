//! PIDE notification catalog
//!
//! Every message exchanged with the prover server is a JSON-RPC notification
//! with a `PIDE/` method name. Each one is declared as an
//! `lsp_types::notification::Notification` so the method and payload type
//! travel together, the same way standard LSP notifications are declared.

use lsp_types::notification::Notification;
use lsp_types::request::Request;
use lsp_types::MarkedString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// JSON-RPC version tag carried by every message
const JSONRPC_VERSION: &str = "2.0";

/// Errors raised while encoding or decoding catalog messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON-RPC message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("invalid params for {method}: {source}")]
    InvalidParams {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {method}: {source}")]
    Encode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Server-assigned identity of a state panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u64);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/* decorations */

/// One decorated range with optional stacked hover text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecorationEntry {
    /// Flat position numbers, passed to the editor surface untouched
    pub range: Vec<u32>,
    #[serde(
        rename = "hover_message",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub hover_text: Vec<MarkedString>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecorationParams {
    pub uri: Url,
    #[serde(rename = "type")]
    pub overlay_class: String,
    #[serde(rename = "content", default)]
    pub entries: Vec<DecorationEntry>,
}

/* caret handling */

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretUpdateParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<u32>,
}

/* dynamic output */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicOutputParams {
    #[serde(alias = "content")]
    pub body: String,
}

/* state */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOutputParams {
    pub id: StateId,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateIdParams {
    pub id: StateId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAutoUpdateParams {
    pub id: StateId,
    pub enabled: bool,
}

/* preview */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequestParams {
    pub uri: Url,
    pub column: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResponseParams {
    pub uri: Url,
    pub column: i32,
    pub label: String,
    pub content: String,
}

/* symbols */

/// One entry of the prover's symbol table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default)]
    pub abbrevs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolsParams {
    pub entries: Vec<SymbolEntry>,
}

macro_rules! pide_notification {
    ($(#[$doc:meta])* $name:ident, $params:ty, $method:literal) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub enum $name {}

        impl Notification for $name {
            type Params = $params;
            const METHOD: &'static str = $method;
        }
    };
}

pide_notification!(
    /// server → client: replace one overlay class of a document
    Decoration, DecorationParams, "PIDE/decoration"
);
pide_notification!(
    /// client → server: active document and cursor
    CaretUpdate, CaretUpdateParams, "PIDE/caret_update"
);
pide_notification!(
    /// server → client: new content for the output surface
    DynamicOutput, DynamicOutputParams, "PIDE/dynamic_output"
);
pide_notification!(StateInit, (), "PIDE/state_init");
pide_notification!(StateOutput, StateOutputParams, "PIDE/state_output");
pide_notification!(StateExit, StateIdParams, "PIDE/state_exit");
pide_notification!(StateLocate, StateIdParams, "PIDE/state_locate");
pide_notification!(StateUpdate, StateIdParams, "PIDE/state_update");
pide_notification!(StateAutoUpdate, StateAutoUpdateParams, "PIDE/state_auto_update");
pide_notification!(PreviewRequest, PreviewRequestParams, "PIDE/preview_request");
pide_notification!(PreviewResponse, PreviewResponseParams, "PIDE/preview_response");
pide_notification!(Symbols, SymbolsParams, "PIDE/symbols");
pide_notification!(SymbolsRequest, (), "PIDE/symbols_request");

/// Which side sends a given notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// Tag of every notification in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Decoration,
    CaretUpdate,
    DynamicOutput,
    StateInit,
    StateOutput,
    StateExit,
    StateLocate,
    StateUpdate,
    StateAutoUpdate,
    PreviewRequest,
    PreviewResponse,
    Symbols,
    SymbolsRequest,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 13] = [
        Self::Decoration,
        Self::CaretUpdate,
        Self::DynamicOutput,
        Self::StateInit,
        Self::StateOutput,
        Self::StateExit,
        Self::StateLocate,
        Self::StateUpdate,
        Self::StateAutoUpdate,
        Self::PreviewRequest,
        Self::PreviewResponse,
        Self::Symbols,
        Self::SymbolsRequest,
    ];

    /// JSON-RPC method name on the wire
    pub fn method(self) -> &'static str {
        match self {
            Self::Decoration => Decoration::METHOD,
            Self::CaretUpdate => CaretUpdate::METHOD,
            Self::DynamicOutput => DynamicOutput::METHOD,
            Self::StateInit => StateInit::METHOD,
            Self::StateOutput => StateOutput::METHOD,
            Self::StateExit => StateExit::METHOD,
            Self::StateLocate => StateLocate::METHOD,
            Self::StateUpdate => StateUpdate::METHOD,
            Self::StateAutoUpdate => StateAutoUpdate::METHOD,
            Self::PreviewRequest => PreviewRequest::METHOD,
            Self::PreviewResponse => PreviewResponse::METHOD,
            Self::Symbols => Symbols::METHOD,
            Self::SymbolsRequest => SymbolsRequest::METHOD,
        }
    }

    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.method() == method)
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::Decoration
            | Self::DynamicOutput
            | Self::StateOutput
            | Self::PreviewResponse
            | Self::Symbols => Direction::ServerToClient,
            Self::CaretUpdate
            | Self::StateInit
            | Self::StateExit
            | Self::StateLocate
            | Self::StateUpdate
            | Self::StateAutoUpdate
            | Self::PreviewRequest
            | Self::SymbolsRequest => Direction::ClientToServer,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Notifications the server pushes to us
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNotification {
    Decoration(DecorationParams),
    DynamicOutput(DynamicOutputParams),
    StateOutput(StateOutputParams),
    PreviewResponse(PreviewResponseParams),
    Symbols(SymbolsParams),
}

/// Notifications we send to the server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotification {
    CaretUpdate(CaretUpdateParams),
    StateInit,
    StateExit(StateIdParams),
    StateLocate(StateIdParams),
    StateUpdate(StateIdParams),
    StateAutoUpdate(StateAutoUpdateParams),
    PreviewRequest(PreviewRequestParams),
    SymbolsRequest,
}

/// Incoming JSON-RPC envelope; requests and responses carry an `id`
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Inbound JSON-RPC message, classified
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Notification(ServerNotification),
    /// Server-initiated request; must be answered
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Response {
        id: Value,
        error: Option<Value>,
    },
    /// Notification outside the catalog or travelling the wrong way
    Ignored,
}

impl Incoming {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawMessage = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Ok(Self::Request {
                id,
                method,
                params: raw.params,
            }),
            (Some(id), None) => Ok(Self::Response {
                id,
                error: raw.error,
            }),
            (None, Some(method)) => Ok(ServerNotification::from_parts(&method, raw.params)?
                .map_or(Self::Ignored, Self::Notification)),
            (None, None) => {
                debug!("Ignoring message without id or method");
                Ok(Self::Ignored)
            }
        }
    }
}

fn parse_params<N: Notification>(params: Option<Value>) -> Result<N::Params, ProtocolError> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|source| {
        ProtocolError::InvalidParams {
            method: N::METHOD,
            source,
        }
    })
}

/// Serialize a notification envelope; unit payloads omit `params`
pub fn encode_notification<N: Notification>(params: &N::Params) -> Result<String, ProtocolError> {
    let encode_err = |source| ProtocolError::Encode {
        method: N::METHOD,
        source,
    };
    let params = serde_json::to_value(params).map_err(encode_err)?;
    let mut message = serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": N::METHOD,
    });
    if !params.is_null() {
        message["params"] = params;
    }
    serde_json::to_string(&message).map_err(encode_err)
}

pub fn encode_request<R: Request>(id: i64, params: &R::Params) -> Result<String, ProtocolError> {
    let encode_err = |source| ProtocolError::Encode {
        method: R::METHOD,
        source,
    };
    let params = serde_json::to_value(params).map_err(encode_err)?;
    let message = serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": R::METHOD,
        "params": params,
    });
    serde_json::to_string(&message).map_err(encode_err)
}

/// Successful reply to a server request
pub fn encode_response(id: &Value, result: Value) -> Result<String, ProtocolError> {
    let message = serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    });
    serde_json::to_string(&message).map_err(|source| ProtocolError::Encode {
        method: "response",
        source,
    })
}

pub fn encode_error_response(id: &Value, code: i64, message: &str) -> Result<String, ProtocolError> {
    let reply = serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": code, "message": message },
    });
    serde_json::to_string(&reply).map_err(|source| ProtocolError::Encode {
        method: "response",
        source,
    })
}

impl ServerNotification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Decoration(_) => NotificationKind::Decoration,
            Self::DynamicOutput(_) => NotificationKind::DynamicOutput,
            Self::StateOutput(_) => NotificationKind::StateOutput,
            Self::PreviewResponse(_) => NotificationKind::PreviewResponse,
            Self::Symbols(_) => NotificationKind::Symbols,
        }
    }

    /// Decode one inbound JSON-RPC message.
    ///
    /// Returns `Ok(None)` for anything that is not a server → client
    /// notification from the catalog: requests, responses, unknown methods
    /// and messages travelling in the wrong direction.
    pub fn decode(text: &str) -> Result<Option<Self>, ProtocolError> {
        match Incoming::decode(text)? {
            Incoming::Notification(notification) => Ok(Some(notification)),
            other => {
                debug!(message = ?other, "Not a PIDE notification");
                Ok(None)
            }
        }
    }

    fn from_parts(method: &str, params: Option<Value>) -> Result<Option<Self>, ProtocolError> {
        let Some(kind) = NotificationKind::from_method(method) else {
            debug!(method = %method, "Ignoring notification outside the PIDE catalog");
            return Ok(None);
        };

        let notification = match kind {
            NotificationKind::Decoration => Self::Decoration(parse_params::<Decoration>(params)?),
            NotificationKind::DynamicOutput => {
                Self::DynamicOutput(parse_params::<DynamicOutput>(params)?)
            }
            NotificationKind::StateOutput => {
                Self::StateOutput(parse_params::<StateOutput>(params)?)
            }
            NotificationKind::PreviewResponse => {
                Self::PreviewResponse(parse_params::<PreviewResponse>(params)?)
            }
            NotificationKind::Symbols => Self::Symbols(parse_params::<Symbols>(params)?),
            NotificationKind::CaretUpdate
            | NotificationKind::StateInit
            | NotificationKind::StateExit
            | NotificationKind::StateLocate
            | NotificationKind::StateUpdate
            | NotificationKind::StateAutoUpdate
            | NotificationKind::PreviewRequest
            | NotificationKind::SymbolsRequest => {
                debug!(method = %method, "Ignoring client-bound notification sent by server");
                return Ok(None);
            }
        };
        Ok(Some(notification))
    }

    /// Encode as the server would; used by loopback servers and tests
    pub fn encode(&self) -> Result<String, ProtocolError> {
        match self {
            Self::Decoration(p) => encode_notification::<Decoration>(p),
            Self::DynamicOutput(p) => encode_notification::<DynamicOutput>(p),
            Self::StateOutput(p) => encode_notification::<StateOutput>(p),
            Self::PreviewResponse(p) => encode_notification::<PreviewResponse>(p),
            Self::Symbols(p) => encode_notification::<Symbols>(p),
        }
    }
}

impl ClientNotification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::CaretUpdate(_) => NotificationKind::CaretUpdate,
            Self::StateInit => NotificationKind::StateInit,
            Self::StateExit(_) => NotificationKind::StateExit,
            Self::StateLocate(_) => NotificationKind::StateLocate,
            Self::StateUpdate(_) => NotificationKind::StateUpdate,
            Self::StateAutoUpdate(_) => NotificationKind::StateAutoUpdate,
            Self::PreviewRequest(_) => NotificationKind::PreviewRequest,
            Self::SymbolsRequest => NotificationKind::SymbolsRequest,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        match self {
            Self::CaretUpdate(p) => encode_notification::<CaretUpdate>(p),
            Self::StateInit => encode_notification::<StateInit>(&()),
            Self::StateExit(p) => encode_notification::<StateExit>(p),
            Self::StateLocate(p) => encode_notification::<StateLocate>(p),
            Self::StateUpdate(p) => encode_notification::<StateUpdate>(p),
            Self::StateAutoUpdate(p) => encode_notification::<StateAutoUpdate>(p),
            Self::PreviewRequest(p) => encode_notification::<PreviewRequest>(p),
            Self::SymbolsRequest => encode_notification::<SymbolsRequest>(&()),
        }
    }
}

/// Accept either a single value or a list of values
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_names_round_trip_through_kind() {
        for kind in NotificationKind::ALL {
            assert!(kind.method().starts_with("PIDE/"));
            assert_eq!(NotificationKind::from_method(kind.method()), Some(kind));
        }
        assert_eq!(NotificationKind::from_method("textDocument/hover"), None);
    }

    #[test]
    fn test_decode_decoration_with_wire_field_names() {
        let text = json!({
            "jsonrpc": "2.0",
            "method": "PIDE/decoration",
            "params": {
                "uri": "file:///thys/Foo.thy",
                "type": "text_overview_error",
                "content": [
                    { "range": [3, 0, 3, 12], "hover_message": "first" },
                    { "range": [5, 2, 5, 4], "hover_message": ["a", "b"] },
                    { "range": [7, 0, 7, 1] }
                ]
            }
        })
        .to_string();

        let Some(ServerNotification::Decoration(params)) =
            ServerNotification::decode(&text).unwrap()
        else {
            panic!("expected decoration");
        };
        assert_eq!(params.uri.as_str(), "file:///thys/Foo.thy");
        assert_eq!(params.overlay_class, "text_overview_error");
        assert_eq!(params.entries.len(), 3);
        assert_eq!(params.entries[0].range, vec![3, 0, 3, 12]);
        assert_eq!(
            params.entries[0].hover_text,
            vec![MarkedString::String("first".to_string())]
        );
        assert_eq!(params.entries[1].hover_text.len(), 2);
        assert!(params.entries[2].hover_text.is_empty());
    }

    #[test]
    fn test_dynamic_output_accepts_content_alias() {
        let body = r#"{"jsonrpc":"2.0","method":"PIDE/dynamic_output","params":{"body":"x"}}"#;
        let content = r#"{"jsonrpc":"2.0","method":"PIDE/dynamic_output","params":{"content":"x"}}"#;
        let expected = ServerNotification::DynamicOutput(DynamicOutputParams {
            body: "x".to_string(),
        });
        assert_eq!(ServerNotification::decode(body).unwrap(), Some(expected.clone()));
        assert_eq!(ServerNotification::decode(content).unwrap(), Some(expected));
    }

    #[test]
    fn test_decode_ignores_requests_and_unknown_methods() {
        let request = r#"{"jsonrpc":"2.0","id":1,"method":"workspace/configuration","params":{}}"#;
        let response = r#"{"jsonrpc":"2.0","id":4,"result":null}"#;
        let unknown = r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":3,"message":"hi"}}"#;
        let wrong_way = r#"{"jsonrpc":"2.0","method":"PIDE/state_exit","params":{"id":3}}"#;
        for text in [request, response, unknown, wrong_way] {
            assert_eq!(ServerNotification::decode(text).unwrap(), None, "{}", text);
        }
    }

    #[test]
    fn test_incoming_classifies_requests_and_responses() {
        let request = r#"{"jsonrpc":"2.0","id":"a","method":"client/registerCapability","params":{"registrations":[]}}"#;
        let Incoming::Request { id, method, params } = Incoming::decode(request).unwrap() else {
            panic!("expected request");
        };
        assert_eq!(id, json!("a"));
        assert_eq!(method, "client/registerCapability");
        assert_eq!(params, Some(json!({"registrations": []})));

        let failed = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"bad"}}"#;
        assert!(matches!(
            Incoming::decode(failed).unwrap(),
            Incoming::Response { error: Some(_), .. }
        ));
        assert_eq!(
            Incoming::decode(r#"{"jsonrpc":"2.0","method":"window/logMessage"}"#).unwrap(),
            Incoming::Ignored
        );
    }

    #[test]
    fn test_encode_replies() {
        let ok: Value = serde_json::from_str(&encode_response(&json!(4), Value::Null).unwrap()).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 4, "result": null}));

        let err: Value =
            serde_json::from_str(&encode_error_response(&json!("x"), -32601, "nope").unwrap())
                .unwrap();
        assert_eq!(err["id"], "x");
        assert_eq!(err["error"]["code"], -32601);
    }

    #[test]
    fn test_decode_rejects_bad_params() {
        let text = r#"{"jsonrpc":"2.0","method":"PIDE/state_output","params":{"id":"seven"}}"#;
        let err = ServerNotification::decode(text).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidParams {
                method: "PIDE/state_output",
                ..
            }
        ));
        assert!(matches!(
            ServerNotification::decode("not json").unwrap_err(),
            ProtocolError::Malformed(_)
        ));
    }

    #[test]
    fn test_encode_unit_payload_omits_params() {
        let value: Value =
            serde_json::from_str(&ClientNotification::StateInit.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "PIDE/state_init"}));
    }

    #[test]
    fn test_encode_caret_update_skips_absent_fields() {
        let update = ClientNotification::CaretUpdate(CaretUpdateParams {
            uri: Some(Url::parse("file:///a.thy").unwrap()),
            line: Some(3),
            character: None,
        });
        let value: Value = serde_json::from_str(&update.encode().unwrap()).unwrap();
        assert_eq!(
            value["params"],
            json!({"uri": "file:///a.thy", "line": 3})
        );
    }

    #[test]
    fn test_encode_auto_update() {
        let msg = ClientNotification::StateAutoUpdate(StateAutoUpdateParams {
            id: StateId(9),
            enabled: true,
        });
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["method"], "PIDE/state_auto_update");
        assert_eq!(value["params"], json!({"id": 9, "enabled": true}));
        assert_eq!(msg.kind().direction(), Direction::ClientToServer);
    }
}
