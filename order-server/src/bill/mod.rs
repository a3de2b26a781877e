//! Bill projection and rendering

pub mod projection;
pub mod render;

pub use projection::{DEFAULT_TAX_RATE_PERCENT, UNKNOWN_ITEM, project};
pub use render::{BillHeader, BillRenderer, PlainPdfRenderer, RenderError, render_with_timeout};
