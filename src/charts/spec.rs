//! Chart Specification Module
//! Declarative description of a chart: kind, captions, axis labels, output
//! file and canvas size. Rendering happens in the renderer module.

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

/// Color palette cycled over series and bars.
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(231, 76, 60),  // Red
    RGBColor(46, 204, 113), // Green
    RGBColor(155, 89, 182), // Purple
    RGBColor(243, 156, 18), // Orange
    RGBColor(26, 188, 156), // Teal
    RGBColor(233, 30, 99),  // Pink
    RGBColor(0, 188, 212),  // Cyan
    RGBColor(255, 87, 34),  // Deep Orange
    RGBColor(121, 85, 72),  // Brown
    RGBColor(96, 125, 139), // Blue Grey
];

/// Palette color for a series index, wrapping around.
pub fn palette_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// Supported chart shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    Bar,
    Histogram,
    Pareto,
    Line,
    StackedArea,
}

/// Everything the renderer needs to know besides the data itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, title: &str, x_label: &str, y_label: &str, file_name: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            file_name: file_name.to_string(),
            width: 1000,
            height: 700,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}
