//! Dynamic output sink
//!
//! One slot, overwritten by every notification. Nothing is buffered: if
//! the surface is slow the latest write wins.

use crate::protocol::DynamicOutputParams;
use crate::surface::OutputSurface;

#[derive(Debug, Default)]
pub struct OutputSink {
    current: Option<String>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, params: DynamicOutputParams, surface: &mut dyn OutputSurface) {
        surface.replace(&params.body);
        self.current = Some(params.body);
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}
