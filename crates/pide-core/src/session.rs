//! PIDE client session
//!
//! Single consumer of the event bus. Each event is handled to completion
//! before the next one is taken, so a panel disposal is always observed by
//! the state-output handler that follows it.

use tracing::{debug, info};

use crate::caret::{CaretTracker, DocumentSelector, EditorCaret};
use crate::connection::{Connection, Router};
use crate::decorations::DecorationManager;
use crate::documents::DocumentTracker;
use crate::event_bus::{EditorEvent, Event, EventBus, EventSender};
use crate::output::OutputSink;
use crate::preview::PreviewTracker;
use crate::protocol::{NotificationKind, ServerNotification};
use crate::state_panel::StatePanelRegistry;
use crate::surface::Surfaces;
use crate::symbols::SymbolCache;

/// State touched by inbound notification handlers
pub struct Workspace {
    pub documents: DocumentTracker,
    pub decorations: DecorationManager,
    pub output: OutputSink,
    pub panels: StatePanelRegistry,
    pub previews: PreviewTracker,
    pub symbols: SymbolCache,
    pub surfaces: Surfaces,
}

/// Whether the session keeps running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Session {
    bus: EventBus,
    connection: Connection,
    router: Router<Workspace>,
    workspace: Workspace,
    caret: CaretTracker,
    active_caret: Option<EditorCaret>,
}

impl Session {
    pub fn new(connection: Connection, surfaces: Surfaces, selector: DocumentSelector) -> Self {
        let mut session = Self {
            bus: EventBus::new(),
            connection,
            router: Router::new(),
            workspace: Workspace {
                documents: DocumentTracker::new(selector.clone()),
                decorations: DecorationManager::new(),
                output: OutputSink::new(),
                panels: StatePanelRegistry::new(),
                previews: PreviewTracker::new(),
                symbols: SymbolCache::new(),
                surfaces,
            },
            caret: CaretTracker::new(selector),
            active_caret: None,
        };
        session.register_handlers();
        session
    }

    fn register_handlers(&mut self) {
        let router = &mut self.router;
        router.on_notification(NotificationKind::Decoration, |ws, n| {
            if let ServerNotification::Decoration(params) = n {
                ws.decorations.apply(params, ws.surfaces.decorations.as_mut());
            }
        });
        router.on_notification(NotificationKind::DynamicOutput, |ws, n| {
            if let ServerNotification::DynamicOutput(params) = n {
                ws.output.write(params, ws.surfaces.output.as_mut());
            }
        });
        router.on_notification(NotificationKind::StateOutput, |ws, n| {
            if let ServerNotification::StateOutput(params) = n {
                ws.panels.on_output(params, ws.surfaces.panel.as_mut());
            }
        });
        router.on_notification(NotificationKind::PreviewResponse, |ws, n| {
            if let ServerNotification::PreviewResponse(params) = n {
                ws.previews.on_response(params, ws.surfaces.preview.as_mut());
            }
        });
        router.on_notification(NotificationKind::Symbols, |ws, n| {
            if let ServerNotification::Symbols(params) = n {
                ws.symbols.on_symbols(params);
            }
        });
    }

    /// Producer handle for front ends and the connection reader
    pub fn sender(&self) -> EventSender {
        self.bus.sender()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Mutable access for wiring a transport before `start`
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn router_mut(&mut self) -> &mut Router<Workspace> {
        &mut self.router
    }

    pub fn caret(&self) -> &CaretTracker {
        &self.caret
    }

    /// Initial caret report and symbol table request once connected.
    ///
    /// Runs on `ConnectionReady`; call it directly for connections that
    /// are ready from the start.
    pub fn start(&mut self) {
        // A fresh server has no caret; report it even if unchanged locally
        self.caret.reset();
        self.caret.update(self.active_caret.as_ref(), &self.connection);
        self.workspace.symbols.request(&self.connection);
    }

    /// Handle one event to completion
    pub fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Server(notification) => {
                self.router.dispatch(&mut self.workspace, notification);
            }
            Event::Editor(editor) => self.handle_editor(editor),
            Event::Panel(action) => self.workspace.panels.handle_action(action, &self.connection),
            Event::PanelDisposed => self.workspace.panels.dispose(&self.connection),
            Event::ConnectionReady => {
                if self.connection.mark_ready() {
                    self.workspace.documents.reopen_all(&self.connection);
                    self.start();
                }
            }
            Event::ConnectionClosed => {
                info!("Server connection lost, stopping session");
                self.connection.close();
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn handle_editor(&mut self, event: EditorEvent) {
        let ws = &mut self.workspace;
        match event {
            EditorEvent::CaretMoved(caret) => {
                self.caret.update(caret.as_ref(), &self.connection);
                self.active_caret = caret;
            }
            EditorEvent::ActiveDocument(Some(uri)) => {
                if self.active_caret.as_ref().is_some_and(|c| c.uri != uri) {
                    // Its own caret event follows
                    self.active_caret = None;
                }
                ws.decorations
                    .update_editor(&uri, ws.surfaces.decorations.as_mut());
            }
            EditorEvent::ActiveDocument(None) => {
                self.active_caret = None;
                self.caret.update(None, &self.connection);
            }
            EditorEvent::DocumentOpened(document) => {
                ws.decorations.open(document.uri.clone());
                ws.documents.open(document, &self.connection);
            }
            EditorEvent::DocumentChanged { uri, version, text } => {
                ws.documents.change(&uri, version, text, &self.connection);
                ws.decorations.touch(&uri);
                ws.previews.touch(&uri, &self.connection);
            }
            EditorEvent::DocumentClosed(uri) => {
                ws.documents.close(&uri, &self.connection);
                ws.decorations.close(&uri);
                ws.previews.close(&uri);
            }
            EditorEvent::ShowState => {
                ws.panels
                    .request_show(&self.connection, ws.surfaces.panel.as_mut());
            }
            EditorEvent::PreviewRequested { uri, column } => {
                ws.previews.request(uri, column, &self.connection);
            }
            EditorEvent::RequestSymbols => ws.symbols.request(&self.connection),
            EditorEvent::ConfigurationChanged => {
                ws.decorations
                    .refresh_all(ws.surfaces.decorations.as_mut());
            }
        }
    }

    /// Re-render anything left dirty by local edits
    fn on_idle(&mut self) {
        let ws = &mut self.workspace;
        ws.decorations.flush(ws.surfaces.decorations.as_mut());
    }

    /// Handle every event already queued, then flush. Returns the last flow.
    pub fn drain(&mut self) -> Flow {
        while let Some(event) = self.bus.try_next() {
            if self.handle(event) == Flow::Stop {
                return Flow::Stop;
            }
        }
        self.on_idle();
        Flow::Continue
    }

    /// Run until the connection closes or every producer is gone
    pub async fn run(mut self) {
        debug!("Session loop started");
        while let Some(event) = self.bus.next().await {
            if self.handle(event) == Flow::Stop {
                break;
            }
            if self.bus.is_idle() {
                self.on_idle();
            }
        }
        self.connection.close();
        debug!("Session loop finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        ClientNotification, DecorationParams, DynamicOutputParams, StateAutoUpdateParams,
        StateId, StateIdParams, StateOutputParams,
    };
    use crate::connection::Outbound;
    use crate::documents::TextDocument;
    use crate::state_panel::{PanelAction, PanelPhase};
    use crate::test_support::{outbound, sent, uri, Recorder, SurfaceCall};
    use crate::transport::{FrameReader, FrameWriter};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session() -> (Session, UnboundedReceiver<Outbound>, Recorder) {
        let (connection, rx) = Connection::channel();
        let recorder = Recorder::new();
        let session = Session::new(connection, recorder.surfaces(), DocumentSelector::default());
        (session, rx, recorder)
    }

    fn state_output(id: u64, content: &str) -> Event {
        Event::Server(ServerNotification::StateOutput(StateOutputParams {
            id: StateId(id),
            content: content.to_string(),
        }))
    }

    fn caret(line: u32) -> Event {
        Event::Editor(EditorEvent::CaretMoved(Some(EditorCaret {
            uri: uri("file:///A.thy"),
            language_id: Some("isabelle".to_string()),
            line,
            character: 0,
        })))
    }

    #[test]
    fn test_panel_round_trip_through_queue() {
        let (mut session, mut rx, recorder) = session();
        let events = session.sender();

        events.editor(EditorEvent::ShowState);
        events.emit(state_output(7, "goal 1"));
        events.editor(EditorEvent::ShowState);
        session.drain();

        assert_eq!(session.workspace().panels.phase(), PanelPhase::Active(StateId(7)));
        assert_eq!(sent(&mut rx), vec![ClientNotification::StateInit]);
        assert_eq!(recorder.count(|c| *c == SurfaceCall::PanelReveal), 1);
    }

    #[test]
    fn test_disposal_neutralizes_in_flight_output() {
        let (mut session, mut rx, recorder) = session();
        let events = session.sender();
        events.editor(EditorEvent::ShowState);
        events.emit(state_output(7, "goal"));
        session.drain();
        sent(&mut rx);
        recorder.take();

        // User closes the view while the server is still sending for id 7
        events.emit(Event::PanelDisposed);
        events.emit(state_output(7, "late"));
        events.emit(state_output(5, "older"));
        session.drain();

        assert_eq!(session.workspace().panels.phase(), PanelPhase::Absent);
        assert_eq!(
            sent(&mut rx),
            vec![ClientNotification::StateExit(StateIdParams { id: StateId(7) })]
        );
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_toggle_uses_id_current_when_processed() {
        let (mut session, mut rx, _recorder) = session();
        let events = session.sender();
        events.editor(EditorEvent::ShowState);
        events.emit(state_output(9, "goal"));
        session.drain();
        sent(&mut rx);

        // Click queued first, then output for another id: the click is
        // handled against id 9 and the foreign output is stale.
        events.emit(Event::Panel(PanelAction::AutoUpdate { enabled: true }));
        events.emit(state_output(10, "other"));
        session.drain();

        assert_eq!(
            sent(&mut rx),
            vec![ClientNotification::StateAutoUpdate(StateAutoUpdateParams {
                id: StateId(9),
                enabled: true,
            })]
        );
        assert_eq!(session.workspace().panels.current_id(), Some(StateId(9)));
    }

    #[test]
    fn test_caret_dedup_through_queue() {
        let (mut session, mut rx, _recorder) = session();
        let events = session.sender();
        events.emit(caret(3));
        events.emit(caret(3));
        events.emit(Event::Editor(EditorEvent::CaretMoved(None)));
        events.emit(caret(3));
        session.drain();

        assert_eq!(sent(&mut rx).len(), 2);
    }

    fn opened(path: &str, text: &str) -> EditorEvent {
        EditorEvent::DocumentOpened(TextDocument {
            uri: uri(path),
            language_id: "isabelle".to_string(),
            version: 1,
            text: text.to_string(),
        })
    }

    fn changed(path: &str, version: i32) -> EditorEvent {
        EditorEvent::DocumentChanged {
            uri: uri(path),
            version,
            text: format!("v{}", version),
        }
    }

    #[test]
    fn test_caret_cleared_when_no_editor_is_active() {
        let (mut session, mut rx, _recorder) = session();
        let events = session.sender();
        events.emit(caret(3));
        events.editor(EditorEvent::ActiveDocument(None));
        events.emit(caret(3));
        session.drain();

        let updates = sent(&mut rx);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], updates[1]);
    }

    #[test]
    fn test_switching_document_forgets_old_caret() {
        let (mut session, mut rx, _recorder) = session();
        let events = session.sender();
        events.emit(caret(3));
        events.editor(EditorEvent::ActiveDocument(Some(uri("file:///B.thy"))));
        session.drain();
        sent(&mut rx);

        // The report made on connect must not point back at A
        session.start();
        assert_eq!(sent(&mut rx), vec![ClientNotification::SymbolsRequest]);
    }

    #[test]
    fn test_documents_forwarded_to_server() {
        let (mut session, mut rx, _recorder) = session();
        let events = session.sender();
        events.editor(opened("file:///A.thy", "theory A"));
        events.editor(changed("file:///A.thy", 2));
        events.editor(EditorEvent::DocumentClosed(uri("file:///A.thy")));
        session.drain();

        let methods: Vec<_> = outbound(&mut rx)
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Document(sync) => Some(sync.method()),
                _ => None,
            })
            .collect();
        assert_eq!(
            methods,
            vec!["textDocument/didOpen", "textDocument/didChange", "textDocument/didClose"]
        );
    }

    async fn receive<R: tokio::io::AsyncRead + Unpin>(reader: &mut FrameReader<R>) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(5), reader.receive())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_ready_announces_documents_opened_during_handshake() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);
        let mut server_reader = FrameReader::new(server_read);
        let mut server_writer = FrameWriter::new(server_write);

        let recorder = Recorder::new();
        let mut session = Session::new(
            Connection::new(),
            recorder.surfaces(),
            DocumentSelector::default(),
        );
        let events = session.sender();
        session
            .connection_mut()
            .connect(
                FrameReader::new(client_read),
                FrameWriter::new(client_write),
                events.clone(),
            )
            .unwrap();
        events.editor(opened("file:///A.thy", "theory A"));
        events.emit(caret(1));
        session.drain();
        assert!(!session.connection().is_ready());

        assert_eq!(receive(&mut server_reader).await["method"], "initialize");
        server_writer
            .send(&json!({"jsonrpc": "2.0", "id": 1, "result": {"capabilities": {}}}).to_string())
            .await
            .unwrap();
        assert_eq!(receive(&mut server_reader).await["method"], "initialized");

        for _ in 0..100 {
            session.drain();
            if session.connection().is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(session.connection().is_ready());

        let open = receive(&mut server_reader).await;
        assert_eq!(open["method"], "textDocument/didOpen");
        assert_eq!(open["params"]["textDocument"]["text"], "theory A");
        let caret = receive(&mut server_reader).await;
        assert_eq!(caret["method"], "PIDE/caret_update");
        assert_eq!(caret["params"]["line"], 1);
        assert_eq!(receive(&mut server_reader).await["method"], "PIDE/symbols_request");
    }

    #[test]
    fn test_decorations_flush_on_idle() {
        let (mut session, _rx, recorder) = session();
        let events = session.sender();
        let doc = uri("file:///A.thy");
        events.editor(opened("file:///A.thy", ""));
        events.emit(Event::Server(ServerNotification::Decoration(DecorationParams {
            uri: doc.clone(),
            overlay_class: "running".to_string(),
            entries: Vec::new(),
        })));
        session.drain();
        recorder.take();

        events.editor(changed("file:///A.thy", 2));
        events.editor(changed("file:///A.thy", 3));
        session.drain();
        assert_eq!(recorder.take().len(), 1);

        events.editor(EditorEvent::DocumentClosed(doc.clone()));
        events.emit(Event::Server(ServerNotification::Decoration(DecorationParams {
            uri: doc,
            overlay_class: "running".to_string(),
            entries: Vec::new(),
        })));
        session.drain();
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_output_and_close() {
        let (mut session, mut rx, recorder) = session();
        let events = session.sender();
        events.emit(Event::Server(ServerNotification::DynamicOutput(
            DynamicOutputParams {
                body: "theorem foo".to_string(),
            },
        )));
        events.emit(Event::ConnectionClosed);
        events.editor(EditorEvent::ShowState);

        assert_eq!(session.drain(), Flow::Stop);
        assert_eq!(session.workspace().output.current(), Some("theorem foo"));
        assert_eq!(recorder.calls(), vec![SurfaceCall::Output("theorem foo".to_string())]);

        // Still accepted after close, but nothing reaches the server
        assert_eq!(session.drain(), Flow::Continue);
        assert!(sent(&mut rx).is_empty());
    }

    #[test]
    fn test_start_requests_symbols() {
        let (mut session, mut rx, _recorder) = session();
        session.start();
        assert_eq!(sent(&mut rx), vec![ClientNotification::SymbolsRequest]);
    }

    #[test]
    fn test_replacing_a_handler() {
        let (mut session, _rx, recorder) = session();
        session
            .router_mut()
            .on_notification(NotificationKind::DynamicOutput, |_, _| {});
        session.handle(Event::Server(ServerNotification::DynamicOutput(
            DynamicOutputParams {
                body: "ignored".to_string(),
            },
        )));
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_connection_closed() {
        let (session, _rx, recorder) = session();
        let events = session.sender();
        events.emit(Event::Server(ServerNotification::DynamicOutput(
            DynamicOutputParams {
                body: "done".to_string(),
            },
        )));
        events.emit(Event::ConnectionClosed);

        tokio::time::timeout(std::time::Duration::from_secs(5), session.run())
            .await
            .unwrap();
        assert_eq!(recorder.calls(), vec![SurfaceCall::Output("done".to_string())]);
    }
}
