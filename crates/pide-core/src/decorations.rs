//! Decoration cache - stores server decorations by document and overlay class
//!
//! Every update replaces the whole overlay for its (document, class) key.
//! Only open documents keep decorations; anything arriving for a closed
//! document is a late message and is dropped.

use std::collections::{BTreeMap, HashMap, HashSet};

use url::Url;

use crate::protocol::{DecorationEntry, DecorationParams};
use crate::surface::DecorationSurface;

/// Overlay sets of one open document, ordered by class name
#[derive(Debug, Default)]
struct DocumentDecorations {
    overlays: BTreeMap<String, Vec<DecorationEntry>>,
}

#[derive(Debug, Default)]
pub struct DecorationManager {
    documents: HashMap<Url, DocumentDecorations>,
    dirty: HashSet<Url>,
}

impl DecorationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a document opened in the editor
    pub fn open(&mut self, uri: Url) {
        self.documents.entry(uri).or_default();
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    /// Replace the overlay for `(uri, overlay_class)` and render it.
    ///
    /// Returns false when the document is not open and the update was dropped.
    pub fn apply(&mut self, params: DecorationParams, surface: &mut dyn DecorationSurface) -> bool {
        let DecorationParams {
            uri,
            overlay_class,
            entries,
        } = params;

        let Some(document) = self.documents.get_mut(&uri) else {
            tracing::trace!(%uri, %overlay_class, "Decoration for closed document dropped");
            return false;
        };

        if self.dirty.remove(&uri) {
            document.overlays.insert(overlay_class, entries);
            Self::render(&uri, document, surface);
        } else {
            surface.set_decorations(&uri, &overlay_class, &entries);
            document.overlays.insert(overlay_class, entries);
        }
        true
    }

    /// Mark a locally edited document for re-render. No server round trip.
    pub fn touch(&mut self, uri: &Url) {
        if self.documents.contains_key(uri) {
            self.dirty.insert(uri.clone());
        }
    }

    pub fn is_dirty(&self, uri: &Url) -> bool {
        self.dirty.contains(uri)
    }

    /// Re-render every dirty document and clear the dirty set
    pub fn flush(&mut self, surface: &mut dyn DecorationSurface) {
        for uri in std::mem::take(&mut self.dirty) {
            if let Some(document) = self.documents.get(&uri) {
                Self::render(&uri, document, surface);
            }
        }
    }

    /// Re-render all classes of a document that just became visible
    pub fn update_editor(&self, uri: &Url, surface: &mut dyn DecorationSurface) {
        if let Some(document) = self.documents.get(uri) {
            Self::render(uri, document, surface);
        }
    }

    /// Re-render everything, e.g. after overlay styles changed
    pub fn refresh_all(&mut self, surface: &mut dyn DecorationSurface) {
        self.dirty.clear();
        for (uri, document) in &self.documents {
            Self::render(uri, document, surface);
        }
    }

    /// Forget every decoration of a closed document
    pub fn close(&mut self, uri: &Url) {
        self.documents.remove(uri);
        self.dirty.remove(uri);
    }

    pub fn get(&self, uri: &Url, overlay_class: &str) -> Option<&[DecorationEntry]> {
        self.documents
            .get(uri)?
            .overlays
            .get(overlay_class)
            .map(Vec::as_slice)
    }

    pub fn overlay_count(&self, uri: &Url) -> usize {
        self.documents.get(uri).map_or(0, |d| d.overlays.len())
    }

    fn render(uri: &Url, document: &DocumentDecorations, surface: &mut dyn DecorationSurface) {
        for (overlay_class, entries) in &document.overlays {
            surface.set_decorations(uri, overlay_class, entries);
        }
    }
}
