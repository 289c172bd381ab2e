//! Surfaces that report UI effects to the front end as JSON lines

use std::io::Write;
use std::sync::{Arc, Mutex};

use pide_core::protocol::{DecorationEntry, PreviewResponseParams};
use pide_core::{DecorationSurface, OutputSurface, PanelSurface, PreviewSurface, Surfaces, Url};
use serde_json::{json, Value};

/// Shared line writer; one JSON object per line
#[derive(Clone)]
pub struct JsonLines {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLines {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn emit(&self, value: Value) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{}", value).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "Failed to write to front end");
        }
    }

    pub fn surfaces(&self) -> Surfaces {
        Surfaces {
            decorations: Box::new(self.clone()),
            output: Box::new(self.clone()),
            panel: Box::new(self.clone()),
            preview: Box::new(self.clone()),
        }
    }
}

impl DecorationSurface for JsonLines {
    fn set_decorations(&mut self, uri: &Url, overlay_class: &str, entries: &[DecorationEntry]) {
        self.emit(json!({
            "kind": "decorations",
            "uri": uri,
            "type": overlay_class,
            "content": entries,
        }));
    }
}

impl OutputSurface for JsonLines {
    fn replace(&mut self, content: &str) {
        self.emit(json!({ "kind": "output", "content": content }));
    }
}

impl PanelSurface for JsonLines {
    fn open(&mut self) {
        self.emit(json!({ "kind": "panel_open" }));
    }

    fn reveal(&mut self) {
        self.emit(json!({ "kind": "panel_reveal" }));
    }

    fn set_content(&mut self, content: &str) {
        self.emit(json!({ "kind": "panel_content", "content": content }));
    }
}

impl PreviewSurface for JsonLines {
    fn show(&mut self, preview: &PreviewResponseParams) {
        self.emit(json!({
            "kind": "preview",
            "uri": preview.uri,
            "column": preview.column,
            "label": preview.label,
            "content": preview.content,
        }));
    }
}
