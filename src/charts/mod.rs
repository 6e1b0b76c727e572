//! Charts module - chart specification and static rendering

mod renderer;
mod spec;

pub use renderer::{ChartError, ChartInput, ChartRenderer};
pub use spec::{palette_color, ChartKind, ChartSpec, PALETTE};
