//! Font metrics and emoji glyph capabilities supplied by a backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::render_ir::GlyphBitmap;

/// Backend-defined font identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FontHandle(pub u32);

/// Font selection request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontRequest {
    pub size_px: u32,
    pub bold: bool,
    pub monospace: bool,
}

impl FontRequest {
    pub fn regular(size_px: u32) -> Self {
        Self {
            size_px,
            bold: false,
            monospace: false,
        }
    }

    pub fn bold(size_px: u32) -> Self {
        Self {
            bold: true,
            ..Self::regular(size_px)
        }
    }

    pub fn monospace(size_px: u32) -> Self {
        Self {
            monospace: true,
            ..Self::regular(size_px)
        }
    }
}

/// Ascent and descent in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerticalMetrics {
    pub ascent: i32,
    pub descent: i32,
}

impl VerticalMetrics {
    pub fn height(&self) -> i32 {
        self.ascent + self.descent
    }
}

/// Text measurement capability.
pub trait MetricsProvider: Send + Sync {
    /// Best font for `request`, or `None` when nothing suitable is loaded.
    fn select_font(&self, request: FontRequest) -> Option<FontHandle>;

    /// Always-available fallback font for `size_px`.
    fn default_font(&self, size_px: u32) -> FontHandle;

    /// Advance width of `text`.
    fn measure(&self, font: FontHandle, text: &str) -> i32;

    /// Drawn (ink) width of one character.
    ///
    /// Default delegates to `measure`.
    fn render_width(&self, font: FontHandle, ch: char) -> i32 {
        let mut buf = [0u8; 4];
        self.measure(font, ch.encode_utf8(&mut buf))
    }

    fn vertical_metrics(&self, font: FontHandle) -> VerticalMetrics;
}

/// Emoji bitmap capability. `None` means the glyph is unavailable.
pub trait GlyphProvider: Send + Sync {
    fn fetch(&self, emoji: &str, size_px: u32, timeout: Duration) -> Option<Arc<GlyphBitmap>>;
}

/// Glyph provider with no bitmaps; every emoji falls back to text.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGlyphs;

impl GlyphProvider for NoGlyphs {
    fn fetch(&self, _emoji: &str, _size_px: u32, _timeout: Duration) -> Option<Arc<GlyphBitmap>> {
        None
    }
}

/// Extra width allowed for bold runs, which are painted with offset overdraws.
pub const BOLD_EXTRA_PX: i32 = 2;

/// Per-render memo over a [`MetricsProvider`].
pub struct FontCache<'a> {
    provider: &'a dyn MetricsProvider,
    selections: HashMap<FontRequest, Option<FontHandle>>,
    char_widths: HashMap<(FontHandle, char), i32>,
    vertical: HashMap<FontHandle, VerticalMetrics>,
}

impl<'a> FontCache<'a> {
    pub fn new(provider: &'a dyn MetricsProvider) -> Self {
        Self {
            provider,
            selections: HashMap::new(),
            char_widths: HashMap::new(),
            vertical: HashMap::new(),
        }
    }

    pub fn provider(&self) -> &'a dyn MetricsProvider {
        self.provider
    }

    fn select(&mut self, request: FontRequest) -> Option<FontHandle> {
        let provider = self.provider;
        *self
            .selections
            .entry(request)
            .or_insert_with(|| provider.select_font(request))
    }

    /// Font for `request`, falling back to the provider default.
    pub fn font(&mut self, request: FontRequest) -> FontHandle {
        match self.select(request) {
            Some(font) => font,
            None => {
                log::debug!("no font for {:?}; using default", request);
                self.provider.default_font(request.size_px)
            }
        }
    }

    /// Monospace font at `size_px` if the provider has one.
    pub fn monospace(&mut self, size_px: u32) -> Option<FontHandle> {
        self.select(FontRequest::monospace(size_px))
    }

    /// Render width of `ch`, plus the bold allowance when `bold`.
    pub fn char_width(&mut self, font: FontHandle, ch: char, bold: bool) -> i32 {
        let provider = self.provider;
        let width = *self
            .char_widths
            .entry((font, ch))
            .or_insert_with(|| provider.render_width(font, ch));
        if bold {
            width + BOLD_EXTRA_PX
        } else {
            width
        }
    }

    /// Sum of per-character render widths.
    pub fn text_width(&mut self, font: FontHandle, text: &str, bold: bool) -> i32 {
        text.chars().map(|ch| self.char_width(font, ch, bold)).sum()
    }

    pub fn measure(&self, font: FontHandle, text: &str) -> i32 {
        self.provider.measure(font, text)
    }

    /// Ascent plus descent, or `fallback` when the provider reports nothing.
    pub fn font_height(&mut self, font: FontHandle, fallback: i32) -> i32 {
        let provider = self.provider;
        let metrics = *self
            .vertical
            .entry(font)
            .or_insert_with(|| provider.vertical_metrics(font));
        if metrics.height() > 0 {
            metrics.height()
        } else {
            fallback
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fixed-cell metrics: every char is `char_px` wide (double for CJK),
    /// fonts are encoded as `size | bold << 16 | mono << 17`.
    #[derive(Clone, Copy, Debug)]
    pub struct FixedMetrics {
        pub char_px: i32,
        pub with_monospace: bool,
    }

    impl FixedMetrics {
        pub fn new(char_px: i32) -> Self {
            Self {
                char_px,
                with_monospace: true,
            }
        }

        pub fn size_of(font: FontHandle) -> u32 {
            font.0 & 0xFFFF
        }

        pub fn is_bold(font: FontHandle) -> bool {
            font.0 & (1 << 16) != 0
        }

        pub fn is_mono(font: FontHandle) -> bool {
            font.0 & (1 << 17) != 0
        }
    }

    impl MetricsProvider for FixedMetrics {
        fn select_font(&self, request: FontRequest) -> Option<FontHandle> {
            if request.monospace && !self.with_monospace {
                return None;
            }
            let mut id = request.size_px & 0xFFFF;
            if request.bold {
                id |= 1 << 16;
            }
            if request.monospace {
                id |= 1 << 17;
            }
            Some(FontHandle(id))
        }

        fn default_font(&self, size_px: u32) -> FontHandle {
            FontHandle(size_px & 0xFFFF)
        }

        fn measure(&self, _font: FontHandle, text: &str) -> i32 {
            text.chars()
                .map(|ch| if (ch as u32) >= 0x2E80 { self.char_px * 2 } else { self.char_px })
                .sum()
        }

        fn vertical_metrics(&self, font: FontHandle) -> VerticalMetrics {
            let size = Self::size_of(font) as i32;
            VerticalMetrics {
                ascent: size * 4 / 5,
                descent: size / 5,
            }
        }
    }
}
