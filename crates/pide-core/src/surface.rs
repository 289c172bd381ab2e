//! Editor-side surfaces the core renders into
//!
//! The core decides *what* is visible; implementations of these traits
//! decide how it is drawn.

use url::Url;

use crate::protocol::{DecorationEntry, PreviewResponseParams};

/// Native text decorations of the editor
pub trait DecorationSurface: Send {
    /// Replace every range of `overlay_class` in the document's editors
    fn set_decorations(&mut self, uri: &Url, overlay_class: &str, entries: &[DecorationEntry]);
}

/// The single always-visible output view
pub trait OutputSurface: Send {
    fn replace(&mut self, content: &str);
}

/// View hosting the state panel
pub trait PanelSurface: Send {
    fn open(&mut self);
    fn reveal(&mut self);
    fn set_content(&mut self, content: &str);
}

pub trait PreviewSurface: Send {
    fn show(&mut self, preview: &PreviewResponseParams);
}

/// All surfaces owned by one session
pub struct Surfaces {
    pub decorations: Box<dyn DecorationSurface>,
    pub output: Box<dyn OutputSurface>,
    pub panel: Box<dyn PanelSurface>,
    pub preview: Box<dyn PreviewSurface>,
}
