//! Line layout, compositing, and draw-command IR for `text2image`.
//!
//! The crate is backend-agnostic: fonts and emoji bitmaps come in through the
//! [`MetricsProvider`] and [`GlyphProvider`] traits, and the result is a
//! [`RenderPlan`] of [`DrawCommand`]s that a raster backend executes.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod compositor;
mod metrics;
mod render_engine;
mod render_ir;
mod render_layout;

pub use compositor::{palette, Composition, Compositor, CompositorConfig, BOLD_OFFSETS};
pub use metrics::{
    FontCache, FontHandle, FontRequest, GlyphProvider, MetricsProvider, NoGlyphs, VerticalMetrics,
    BOLD_EXTRA_PX,
};
pub use render_engine::{RenderEngine, RenderError, RenderOptions};
pub use render_ir::{
    BitmapCommand, DrawCommand, GlyphBitmap, LineCommand, RectCommand, RenderPlan, Rgb,
    RoundedRectCommand, TextCommand,
};
pub use render_layout::{
    emoji_size_for, is_no_line_start, LaidOutLine, LayoutConfig, LayoutEngine, LineGeometry,
    PhysicalLine, PlacedSegment, NO_LINE_START, SAFETY_MARGIN_PX,
};
