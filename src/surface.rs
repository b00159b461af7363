use anyhow::Result;

use crate::schema::Resolution;

/// One still-image snapshot of a render surface, tightly packed RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSample {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl FrameSample {
    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }
}

/// Anything capable of producing a still image of its current visual
/// content on demand. The capture pipeline is a pure observer: it samples
/// whatever the surface shows at each instant and constrains nothing about
/// how that content came to be.
pub trait RenderSurface: Send + Sync {
    fn resolution(&self) -> Resolution;

    /// Synchronously renders the current content into a frame sample.
    fn sample(&self) -> Result<FrameSample>;
}
