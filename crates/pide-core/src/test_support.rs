//! Recording surfaces for unit tests

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

use crate::connection::Outbound;
use crate::protocol::{ClientNotification, DecorationEntry, PreviewResponseParams};
use crate::surface::{DecorationSurface, OutputSurface, PanelSurface, PreviewSurface, Surfaces};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Decorations {
        uri: String,
        overlay_class: String,
        entries: Vec<DecorationEntry>,
    },
    Output(String),
    PanelOpen,
    PanelReveal,
    PanelContent(String),
    Preview {
        uri: String,
        label: String,
        content: String,
    },
}

/// Records every surface call in order
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<SurfaceCall>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: SurfaceCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<SurfaceCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
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

impl DecorationSurface for Recorder {
    fn set_decorations(&mut self, uri: &Url, overlay_class: &str, entries: &[DecorationEntry]) {
        self.push(SurfaceCall::Decorations {
            uri: uri.to_string(),
            overlay_class: overlay_class.to_string(),
            entries: entries.to_vec(),
        });
    }
}

impl OutputSurface for Recorder {
    fn replace(&mut self, content: &str) {
        self.push(SurfaceCall::Output(content.to_string()));
    }
}

impl PanelSurface for Recorder {
    fn open(&mut self) {
        self.push(SurfaceCall::PanelOpen);
    }

    fn reveal(&mut self) {
        self.push(SurfaceCall::PanelReveal);
    }

    fn set_content(&mut self, content: &str) {
        self.push(SurfaceCall::PanelContent(content.to_string()));
    }
}

impl PreviewSurface for Recorder {
    fn show(&mut self, preview: &PreviewResponseParams) {
        self.push(SurfaceCall::Preview {
            uri: preview.uri.to_string(),
            label: preview.label.clone(),
            content: preview.content.clone(),
        });
    }
}

pub fn uri(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Everything the connection has queued so far
pub fn outbound(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

/// PIDE notifications queued so far; document sync is drained and dropped
pub fn sent(rx: &mut UnboundedReceiver<Outbound>) -> Vec<ClientNotification> {
    outbound(rx)
        .into_iter()
        .filter_map(|message| match message {
            Outbound::Notification(notification) => Some(notification),
            _ => None,
        })
        .collect()
}
