use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use text2image::{Block, PrepOptions, RenderPrep, TableStyle};

use crate::compositor::{Compositor, CompositorConfig};
use crate::metrics::{GlyphProvider, MetricsProvider};
use crate::render_ir::{RenderPlan, Rgb};

const DEFAULT_BG: Rgb = Rgb::WHITE;
const DEFAULT_TEXT: Rgb = Rgb::new(0x33, 0x33, 0x33);

/// User-facing render options. Sizes are logical pixels, multiplied by
/// `image_scale` before layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub image_width: u32,
    pub image_scale: u32,
    pub padding: u32,
    pub font_size: u32,
    pub line_height: f32,
    /// Background color as `#rrggbb` or `#rgb`.
    pub bg_color: String,
    pub text_color: String,
    /// Per-emoji glyph lookup timeout.
    pub emoji_timeout_secs: u64,
    /// Paint tables as cards instead of flattening them into list items.
    pub table_cards: bool,
    pub unescape_literal_newlines: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_width: 375,
            image_scale: 2,
            padding: 24,
            font_size: 24,
            line_height: 1.6,
            bg_color: DEFAULT_BG.to_hex(),
            text_color: DEFAULT_TEXT.to_hex(),
            emoji_timeout_secs: 10,
            table_cards: false,
            unescape_literal_newlines: true,
        }
    }
}

impl RenderOptions {
    /// Parses options from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_image_width(mut self, image_width: u32) -> Self {
        self.image_width = image_width;
        self
    }

    pub fn with_image_scale(mut self, image_scale: u32) -> Self {
        self.image_scale = image_scale;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.line_height = line_height;
        self
    }

    pub fn with_bg_color(mut self, bg_color: impl Into<String>) -> Self {
        self.bg_color = bg_color.into();
        self
    }

    pub fn with_text_color(mut self, text_color: impl Into<String>) -> Self {
        self.text_color = text_color.into();
        self
    }

    pub fn with_emoji_timeout_secs(mut self, secs: u64) -> Self {
        self.emoji_timeout_secs = secs;
        self
    }

    pub fn with_table_cards(mut self, table_cards: bool) -> Self {
        self.table_cards = table_cards;
        self
    }

    pub fn with_unescape_literal_newlines(mut self, enabled: bool) -> Self {
        self.unescape_literal_newlines = enabled;
        self
    }

    /// Background color, or white when `bg_color` does not parse.
    pub fn background(&self) -> Rgb {
        parse_color("bg_color", &self.bg_color, DEFAULT_BG)
    }

    /// Text color, or `#333333` when `text_color` does not parse.
    pub fn foreground(&self) -> Rgb {
        parse_color("text_color", &self.text_color, DEFAULT_TEXT)
    }

    pub fn prep_options(&self) -> PrepOptions {
        let table_style = if self.table_cards {
            TableStyle::Cards
        } else {
            TableStyle::List
        };
        PrepOptions::default()
            .with_table_style(table_style)
            .with_unescape_literal_newlines(self.unescape_literal_newlines)
    }
}

fn parse_color(field: &str, value: &str, fallback: Rgb) -> Rgb {
    match Rgb::from_hex(value) {
        Some(color) => color,
        None => {
            log::warn!(
                "invalid {} {:?}; using {}",
                field,
                value,
                fallback.to_hex()
            );
            fallback
        }
    }
}

fn scaled_px(value: u32, scale: u32) -> Option<i32> {
    i32::try_from(value.checked_mul(scale)?).ok()
}

/// Text-to-plan renderer.
#[derive(Clone, Debug, Default)]
pub struct RenderEngine {
    opts: RenderOptions,
}

impl RenderEngine {
    pub fn new(opts: RenderOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.opts
    }

    /// Compositor settings in output pixels.
    pub fn compositor_config(&self) -> Result<CompositorConfig, RenderError> {
        let scale = self.opts.image_scale;
        let invalid = || RenderError::InvalidCanvas {
            width: i64::from(self.opts.image_width) * i64::from(scale),
            height: 0,
        };
        let canvas_width = scaled_px(self.opts.image_width, scale).ok_or_else(invalid)?;
        if canvas_width <= 0 {
            return Err(invalid());
        }
        let padding = scaled_px(self.opts.padding, scale).ok_or_else(invalid)?;
        let font_size_px = self
            .opts
            .font_size
            .checked_mul(scale)
            .ok_or_else(|| RenderError::Config(format!("font_size {} too large", self.opts.font_size)))?;
        Ok(CompositorConfig {
            canvas_width,
            padding,
            scale: scale as i32,
            font_size_px,
            line_height: self.opts.line_height,
            text_color: self.opts.foreground(),
            emoji_timeout: Duration::from_secs(self.opts.emoji_timeout_secs),
        })
    }

    /// Parses `text` into layout blocks.
    pub fn prepare(&self, text: &str) -> Vec<Block> {
        RenderPrep::prepare(text, self.opts.prep_options())
    }

    /// Renders `text` into a plan sized to its content.
    pub fn render(
        &self,
        text: &str,
        metrics: &dyn MetricsProvider,
        glyphs: &dyn GlyphProvider,
    ) -> Result<RenderPlan, RenderError> {
        let blocks = self.prepare(text);
        self.render_blocks(&blocks, metrics, glyphs)
    }

    pub fn render_blocks(
        &self,
        blocks: &[Block],
        metrics: &dyn MetricsProvider,
        glyphs: &dyn GlyphProvider,
    ) -> Result<RenderPlan, RenderError> {
        let cfg = self.compositor_config()?;
        let composition = Compositor::new(cfg, metrics, glyphs).compose(blocks);
        let height = i64::from(composition.content_height) + 2 * i64::from(cfg.padding);
        let invalid = RenderError::InvalidCanvas {
            width: i64::from(cfg.canvas_width),
            height,
        };
        let height = u32::try_from(height).map_err(|_| invalid.clone())?;
        if height == 0 {
            return Err(invalid);
        }
        log::debug!(
            "rendered {} blocks into {}x{} with {} commands",
            blocks.len(),
            cfg.canvas_width,
            height,
            composition.commands.len()
        );
        Ok(RenderPlan {
            width: cfg.canvas_width as u32,
            height,
            background: self.opts.background(),
            commands: composition.commands,
        })
    }
}

/// Render engine error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderError {
    /// Canvas would have a non-positive or unrepresentable dimension.
    InvalidCanvas { width: i64, height: i64 },
    /// Options could not be parsed or are out of range.
    Config(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCanvas { width, height } => {
                write!(f, "invalid canvas size {}x{}", width, height)
            }
            Self::Config(msg) => write!(f, "invalid render options: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<serde_json::Error> for RenderError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}
