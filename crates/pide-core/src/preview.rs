//! Document preview tracking
//!
//! A preview stays live while its document is open: local edits re-request
//! it, and responses for documents we stopped tracking are dropped.

use std::collections::HashMap;

use url::Url;

use crate::connection::Connection;
use crate::protocol::{ClientNotification, PreviewRequestParams, PreviewResponseParams};
use crate::surface::PreviewSurface;

#[derive(Debug, Default)]
pub struct PreviewTracker {
    /// Tracked documents and the view column their preview lives in
    tracked: HashMap<Url, i32>,
}

impl PreviewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, uri: Url, column: i32, connection: &Connection) {
        tracing::debug!(%uri, column, "Requesting preview");
        self.tracked.insert(uri.clone(), column);
        connection.send(ClientNotification::PreviewRequest(PreviewRequestParams {
            uri,
            column,
        }));
    }

    /// Returns whether the response was shown
    pub fn on_response(
        &mut self,
        params: PreviewResponseParams,
        surface: &mut dyn PreviewSurface,
    ) -> bool {
        if !self.tracked.contains_key(&params.uri) {
            tracing::trace!(uri = %params.uri, "Preview for untracked document dropped");
            return false;
        }
        surface.show(&params);
        true
    }

    /// Refresh the preview of an edited document
    pub fn touch(&self, uri: &Url, connection: &Connection) {
        if let Some(&column) = self.tracked.get(uri) {
            connection.send(ClientNotification::PreviewRequest(PreviewRequestParams {
                uri: uri.clone(),
                column,
            }));
        }
    }

    pub fn close(&mut self, uri: &Url) {
        self.tracked.remove(uri);
    }

    pub fn is_tracked(&self, uri: &Url) -> bool {
        self.tracked.contains_key(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sent, uri, Recorder, SurfaceCall};

    fn response(doc: &str) -> PreviewResponseParams {
        PreviewResponseParams {
            uri: uri(doc),
            column: 2,
            label: "Preview Main.thy".to_string(),
            content: "<html/>".to_string(),
        }
    }

    #[test]
    fn test_request_then_response() {
        let (connection, mut rx) = Connection::channel();
        let mut surface = Recorder::new();
        let mut previews = PreviewTracker::new();

        previews.request(uri("file:///Main.thy"), 2, &connection);
        assert_eq!(
            sent(&mut rx),
            vec![ClientNotification::PreviewRequest(PreviewRequestParams {
                uri: uri("file:///Main.thy"),
                column: 2,
            })]
        );

        assert!(previews.on_response(response("file:///Main.thy"), &mut surface));
        assert_eq!(
            surface.calls(),
            vec![SurfaceCall::Preview {
                uri: "file:///Main.thy".to_string(),
                label: "Preview Main.thy".to_string(),
                content: "<html/>".to_string(),
            }]
        );
    }

    #[test]
    fn test_touch_rerequests_only_tracked() {
        let (connection, mut rx) = Connection::channel();
        let mut previews = PreviewTracker::new();
        previews.request(uri("file:///Main.thy"), -2, &connection);
        sent(&mut rx);

        previews.touch(&uri("file:///Other.thy"), &connection);
        assert!(sent(&mut rx).is_empty());

        previews.touch(&uri("file:///Main.thy"), &connection);
        assert_eq!(sent(&mut rx).len(), 1);
    }

    #[test]
    fn test_closed_document_drops_response() {
        let (connection, _rx) = Connection::channel();
        let mut surface = Recorder::new();
        let mut previews = PreviewTracker::new();
        previews.request(uri("file:///Main.thy"), 1, &connection);
        previews.close(&uri("file:///Main.thy"));

        assert!(!previews.is_tracked(&uri("file:///Main.thy")));
        assert!(!previews.on_response(response("file:///Main.thy"), &mut surface));
        assert!(surface.calls().is_empty());
    }
}
