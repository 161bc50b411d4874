//! Responsive marker sizing.

use serde::Serialize;

/// Marker diameter and label font size for a viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerSize {
    /// Marker diameter in pixels.
    pub diameter: u32,
    /// Label font size in pixels.
    pub font_size: u32,
}

impl MarkerSize {
    /// Size hint for a viewport `width` pixels wide.
    pub fn for_width(width: f64) -> Self {
        let (diameter, font_size) = if width < 768.0 {
            (60, 10)
        } else if width < 1200.0 {
            (80, 12)
        } else {
            (100, 14)
        };
        Self {
            diameter,
            font_size,
        }
    }

    /// Radius handed to the layout engine.
    pub fn radius(&self) -> f64 {
        f64::from(self.diameter) / 2.0
    }
}
