//! Turns prepared blocks into positioned draw commands and a content height.

use std::time::Duration;

use text2image::render_prep::refine_segments;
use text2image::table::{column_labels, data_rows, label_for, LABEL_SUFFIX};
use text2image::{Block, Segment, TableRow};

use crate::metrics::{FontCache, FontHandle, GlyphProvider, MetricsProvider};
use crate::render_ir::{
    BitmapCommand, DrawCommand, LineCommand, RectCommand, Rgb, RoundedRectCommand, TextCommand,
};
use crate::render_layout::{LaidOutLine, LayoutConfig, LayoutEngine, PhysicalLine, PlacedSegment};

/// Fixed colors used for decorations.
pub mod palette {
    use crate::render_ir::Rgb;

    pub const RULE: Rgb = Rgb::new(200, 200, 200);
    pub const CODE_BLOCK_BG: Rgb = Rgb::new(245, 245, 245);
    pub const INLINE_CODE_BG: Rgb = Rgb::new(235, 235, 235);
    pub const INLINE_CODE_TEXT: Rgb = Rgb::new(60, 60, 60);
    pub const QUOTE_BAR: Rgb = Rgb::new(100, 149, 237);
    pub const QUOTE_TEXT: Rgb = Rgb::new(80, 80, 80);
    pub const STRIKE_TEXT: Rgb = Rgb::new(160, 160, 160);
    pub const CARD_BG: Rgb = Rgb::new(245, 245, 245);
}

const ITALIC_DARKEN: u8 = 20;
const RULE_THICKNESS: u32 = 2;

/// Offsets of the extra passes that fake a bold weight.
pub const BOLD_OFFSETS: [(i32, i32); 5] = [(1, 0), (0, 1), (1, 1), (-1, 0), (0, -1)];

/// Compositor settings in output pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorConfig {
    pub canvas_width: i32,
    /// Outer padding on every side.
    pub padding: i32,
    pub scale: i32,
    pub font_size_px: u32,
    /// Line height multiplier.
    pub line_height: f32,
    pub text_color: Rgb,
    /// Passed to the glyph provider for every emoji lookup.
    pub emoji_timeout: Duration,
}

impl CompositorConfig {
    pub fn text_area_width(&self) -> i32 {
        self.canvas_width - self.padding * 2
    }

    /// Base line height in pixels.
    pub fn line_px(&self) -> i32 {
        fraction(self.font_size_px as i32, f64::from(self.line_height))
    }

    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig::new(
            self.font_size_px,
            self.scale.max(1) as u32,
            self.text_area_width(),
        )
    }
}

fn fraction(value: i32, factor: f64) -> i32 {
    (f64::from(value) * factor) as i32
}

fn to_u32(value: i32) -> u32 {
    value.max(0) as u32
}

fn is_inline_code(segment: &Segment) -> bool {
    segment.code && !segment.is_code_block
}

/// Paint operations for the content area plus its height.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    pub content_height: i32,
    pub commands: Vec<DrawCommand>,
}

/// Stateful painter for one render.
pub struct Compositor<'a> {
    cfg: CompositorConfig,
    layout: LayoutEngine,
    fonts: FontCache<'a>,
    glyphs: &'a dyn GlyphProvider,
    commands: Vec<DrawCommand>,
    y: i32,
}

impl<'a> Compositor<'a> {
    pub fn new(
        cfg: CompositorConfig,
        metrics: &'a dyn MetricsProvider,
        glyphs: &'a dyn GlyphProvider,
    ) -> Self {
        Self {
            cfg,
            layout: LayoutEngine::new(cfg.layout_config()),
            fonts: FontCache::new(metrics),
            glyphs,
            commands: Vec::new(),
            y: cfg.padding,
        }
    }

    pub fn compose(mut self, blocks: &[Block]) -> Composition {
        for block in blocks {
            match block {
                Block::Blank => self.y += fraction(self.cfg.line_px(), 0.5),
                Block::Rule => self.paint_rule(),
                Block::Text(segments) => self.paint_lines(segments, false),
                Block::CodeLine(segments) => self.paint_lines(segments, true),
                Block::Table(rows) => self.paint_cards(rows),
            }
        }
        Composition {
            content_height: self.y - self.cfg.padding,
            commands: self.commands,
        }
    }

    fn scaled(&self, value: i32) -> i32 {
        value * self.cfg.scale.max(1)
    }

    fn base_font(&mut self) -> FontHandle {
        self.layout.base_font(&mut self.fonts)
    }

    fn base_font_height(&mut self) -> i32 {
        let base = self.base_font();
        self.fonts.font_height(base, self.cfg.font_size_px as i32)
    }

    fn run_font_height(&mut self, segment: &Segment, font: FontHandle) -> i32 {
        let fallback = if segment.heading_level > 0 {
            self.layout.config().heading_size(segment.heading_level)
        } else {
            self.cfg.font_size_px
        };
        self.fonts.font_height(font, fallback as i32)
    }

    /// Base line height, enlarged to fit headings and emoji but never shrunk.
    fn text_line_height(&mut self, line: &PhysicalLine) -> i32 {
        let line_px = self.cfg.line_px();
        let base_height = self.base_font_height();
        let mut tallest = base_height;
        for run in &line.runs {
            if run.segment.heading_level > 0 {
                let font = self.layout.segment_font(&run.segment, &mut self.fonts);
                tallest = tallest.max(self.run_font_height(&run.segment, font));
            }
        }
        if line.has_emoji() {
            tallest = tallest.max(self.layout.config().emoji_size_px);
        }
        if tallest > base_height {
            fraction(tallest, f64::from(self.cfg.line_height)).max(line_px)
        } else {
            line_px
        }
    }

    fn push_text(&mut self, x: i32, y: i32, text: &str, font: FontHandle, color: Rgb) {
        self.commands.push(DrawCommand::Text(TextCommand {
            x,
            y,
            text: text.to_string(),
            font,
            color,
        }));
    }

    fn paint_rule(&mut self) {
        let line_px = self.cfg.line_px();
        let y = self.y + fraction(line_px, 0.4);
        self.commands.push(DrawCommand::Line(LineCommand {
            x0: self.cfg.padding,
            y0: y,
            x1: self.cfg.canvas_width - self.cfg.padding,
            y1: y,
            thickness: RULE_THICKNESS,
            color: palette::RULE,
        }));
        self.y += fraction(line_px, 0.8);
    }

    fn paint_lines(&mut self, segments: &[Segment], code_line: bool) {
        let LaidOutLine { geometry, lines } = self.layout.layout(segments, &mut self.fonts);
        let lines = if lines.is_empty() {
            vec![PhysicalLine::default()]
        } else {
            lines
        };

        for line in &lines {
            let height = if code_line {
                fraction(self.cfg.line_px(), 0.8)
            } else {
                self.text_line_height(line)
            };

            if code_line {
                let inset = self.scaled(2);
                self.commands.push(DrawCommand::RoundedRect(RoundedRectCommand {
                    x: self.cfg.padding,
                    y: self.y - inset,
                    width: to_u32(self.cfg.text_area_width()),
                    height: to_u32(height + inset * 2),
                    radius: to_u32(self.scaled(4)),
                    color: palette::CODE_BLOCK_BG,
                }));
            }

            if geometry.is_quote() {
                self.commands.push(DrawCommand::Rect(RectCommand {
                    x: self.cfg.padding,
                    y: self.y,
                    width: to_u32(geometry.quote_bar_width),
                    height: to_u32(height),
                    color: palette::QUOTE_BAR,
                }));
            }

            let mut x = self.cfg.padding + geometry.quote_offset;
            if let Some(bullet) = &geometry.bullet {
                x += geometry.indent;
                if !line.is_continuation() {
                    let base = self.base_font();
                    let bullet_y = self.y + (height - self.base_font_height()) / 2;
                    self.push_text(x, bullet_y, bullet, base, self.cfg.text_color);
                }
                x += geometry.bullet_width;
            }

            self.paint_runs(&line.runs, x, self.y, height);
            self.y += height;
        }
    }

    /// Paints runs left to right starting at `x`, centered in a line box of
    /// `height` at `y`.
    fn paint_runs(&mut self, runs: &[PlacedSegment], x: i32, y: i32, height: i32) {
        let mut x = x;
        for (idx, run) in runs.iter().enumerate() {
            let segment = &run.segment;
            if segment.is_emoji {
                x += self.paint_emoji(run, x, y, height);
                continue;
            }

            let font = self.layout.segment_font(segment, &mut self.fonts);
            let font_height = self.run_font_height(segment, font);
            let text_y = y + (height - font_height) / 2;
            let mut color = self.cfg.text_color;

            if is_inline_code(segment) {
                let starts_group = idx == 0 || !is_inline_code(&runs[idx - 1].segment);
                if starts_group {
                    let group_width: i32 = runs[idx..]
                        .iter()
                        .take_while(|r| is_inline_code(&r.segment))
                        .map(|r| r.width)
                        .sum();
                    let pad = self.scaled(2).max(1);
                    let inset = self.scaled(2);
                    self.commands.push(DrawCommand::RoundedRect(RoundedRectCommand {
                        x: x - pad,
                        y: text_y - inset,
                        width: to_u32(group_width + pad * 2),
                        height: to_u32(font_height + inset * 2),
                        radius: to_u32(self.scaled(2)),
                        color: palette::INLINE_CODE_BG,
                    }));
                }
                color = palette::INLINE_CODE_TEXT;
            }
            if segment.strike {
                color = palette::STRIKE_TEXT;
            }
            if segment.italic && !segment.code && !segment.is_code_block {
                color = color.darken(ITALIC_DARKEN);
            }
            if segment.is_quote {
                color = palette::QUOTE_TEXT;
            }

            self.push_text(x, text_y, &segment.text, font, color);

            if segment.strike {
                let strike_y = text_y + font_height / 2 - 1;
                self.commands.push(DrawCommand::Line(LineCommand {
                    x0: x,
                    y0: strike_y,
                    x1: x + run.width,
                    y1: strike_y,
                    thickness: to_u32(self.cfg.scale.max(1)),
                    color,
                }));
            }

            if segment.bold && !segment.code && !segment.is_code_block {
                for (dx, dy) in BOLD_OFFSETS {
                    self.push_text(x + dx, text_y + dy, &segment.text, font, color);
                }
            }

            x += run.width;
        }
    }

    /// Paints one emoji and returns the advance.
    fn paint_emoji(&mut self, run: &PlacedSegment, x: i32, y: i32, height: i32) -> i32 {
        let size = self.layout.config().emoji_size_px;
        let text = &run.segment.text;
        match self
            .glyphs
            .fetch(text, to_u32(size), self.cfg.emoji_timeout)
        {
            Some(bitmap) => {
                self.commands.push(DrawCommand::Bitmap(BitmapCommand {
                    x,
                    y: y + (height - size) / 2,
                    bitmap,
                }));
                run.width
            }
            None => {
                log::warn!("emoji glyph unavailable for {:?}; drawing as text", text);
                let base = self.base_font();
                let text_y = y + (height - self.base_font_height()) / 2;
                self.push_text(x, text_y, text, base, self.cfg.text_color);
                self.fonts.measure(base, text)
            }
        }
    }

    /// Paints a table as one card per data row.
    fn paint_cards(&mut self, rows: &[TableRow]) {
        let line_px = self.cfg.line_px();
        let available = self.cfg.text_area_width();
        let bar = self.scaled(4).max(1);
        let card_padding = self.scaled(10);
        let content_width = (available - card_padding * 2 - bar).max(1);
        let labels = column_labels(rows);

        for row in data_rows(rows) {
            let mut lines: Vec<PhysicalLine> = Vec::new();
            for (column, cell) in row.cells.iter().enumerate() {
                let label = format!("{}{}", label_for(&labels, column), LABEL_SUFFIX);
                let mut segments = vec![Segment::plain(label)];
                if !cell.visible_text().trim().is_empty() {
                    segments.extend(refine_segments(&cell.segments));
                }
                lines.extend(self.layout.wrap(&segments, content_width, &mut self.fonts));
            }
            if lines.is_empty() {
                lines.push(PhysicalLine::default());
            }

            let card_height = lines.len() as i32 * line_px + card_padding * 2;
            self.commands.push(DrawCommand::RoundedRect(RoundedRectCommand {
                x: self.cfg.padding,
                y: self.y,
                width: to_u32(available),
                height: to_u32(card_height),
                radius: to_u32(self.scaled(6)),
                color: palette::CARD_BG,
            }));
            self.commands.push(DrawCommand::Rect(RectCommand {
                x: self.cfg.padding,
                y: self.y,
                width: to_u32(bar),
                height: to_u32(card_height),
                color: palette::QUOTE_BAR,
            }));

            let text_x = self.cfg.padding + bar + card_padding;
            let mut line_y = self.y + card_padding;
            for line in &lines {
                self.paint_runs(&line.runs, text_x, line_y, line_px);
                line_y += line_px;
            }
            self.y += card_height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::FixedMetrics;
    use crate::metrics::NoGlyphs;
    use crate::render_ir::GlyphBitmap;
    use std::sync::Arc;
    use text2image::{tokenize, PrepOptions, RenderPrep, TableStyle};

    struct SolidGlyphs;

    impl GlyphProvider for SolidGlyphs {
        fn fetch(&self, _emoji: &str, size_px: u32, _timeout: Duration) -> Option<Arc<GlyphBitmap>> {
            let pixels = (size_px * size_px * 4) as usize;
            GlyphBitmap::new(size_px, size_px, vec![255; pixels]).map(Arc::new)
        }
    }

    fn config() -> CompositorConfig {
        CompositorConfig {
            canvas_width: 220,
            padding: 10,
            scale: 1,
            font_size_px: 20,
            line_height: 1.6,
            text_color: Rgb::new(0x33, 0x33, 0x33),
            emoji_timeout: Duration::from_secs(1),
        }
    }

    fn compose(text: &str, glyphs: &dyn GlyphProvider) -> Composition {
        compose_with(text, PrepOptions::default(), glyphs)
    }

    fn compose_with(text: &str, options: PrepOptions, glyphs: &dyn GlyphProvider) -> Composition {
        let metrics = FixedMetrics::new(10);
        let blocks = RenderPrep::prepare(text, options);
        Compositor::new(config(), &metrics, glyphs).compose(&blocks)
    }

    fn texts(composition: &Composition) -> Vec<&TextCommand> {
        composition
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plain_line_uses_base_line_height() {
        let out = compose("hello", &NoGlyphs);
        assert_eq!(out.content_height, 32);
        let text = texts(&out);
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].x, 10);
        // (32 - 20) / 2 below the line top.
        assert_eq!(text[0].y, 16);
    }

    #[test]
    fn blank_and_rule_heights() {
        let out = compose("\n---", &NoGlyphs);
        assert_eq!(out.content_height, 16 + 25);
        assert!(out.commands.iter().any(|cmd| matches!(
            cmd,
            DrawCommand::Line(line) if line.y0 == 10 + 16 + 12 && line.color == palette::RULE
        )));
    }

    #[test]
    fn heading_and_emoji_enlarge_line_height() {
        let out = compose("# Big 😀", &SolidGlyphs);
        // Heading font 33px: ascent 26 + descent 6 = 32, emoji 22.
        let expected = (f64::from(32) * 1.6) as i32;
        assert_eq!(out.content_height, expected);
        assert!(out.content_height >= (32.0f64.max(22.0) * 1.6) as i32);
        let bitmap = out.commands.iter().find_map(|cmd| match cmd {
            DrawCommand::Bitmap(bmp) => Some(bmp),
            _ => None,
        });
        let bitmap = bitmap.unwrap();
        assert_eq!(bitmap.y, 10 + (expected - 22) / 2);
    }

    #[test]
    fn list_bullet_is_painted_once_per_item() {
        let text = format!("- {}", "word ".repeat(10));
        let out = compose(&text, &NoGlyphs);
        let bullets = texts(&out).iter().filter(|t| t.text == "•").count();
        assert_eq!(bullets, 1);
        let body_lines = texts(&out).iter().filter(|t| t.text != "•").count();
        assert!(body_lines >= 3);
        // Continuation lines align with the first line's text start.
        let starts: Vec<i32> = texts(&out)
            .iter()
            .filter(|t| t.text != "•")
            .map(|t| t.x)
            .collect();
        assert!(starts.iter().all(|x| *x == 10 + 20));
    }

    #[test]
    fn unavailable_emoji_falls_back_to_text_and_measured_advance() {
        let out = compose("😀a", &NoGlyphs);
        let text = texts(&out);
        assert_eq!(text[0].text, "😀");
        // Fallback advance is the measured width (double cell), not the emoji size.
        assert_eq!(text[1].x, text[0].x + 20);
    }

    #[test]
    fn available_emoji_is_pasted_and_advances_by_emoji_size() {
        let out = compose("😀a", &SolidGlyphs);
        assert!(out
            .commands
            .iter()
            .any(|cmd| matches!(cmd, DrawCommand::Bitmap(b) if b.x == 10)));
        assert_eq!(texts(&out)[0].x, 10 + 22);
    }

    #[test]
    fn bold_is_overdrawn_five_times() {
        let out = compose("**b**", &NoGlyphs);
        assert_eq!(texts(&out).len(), 1 + BOLD_OFFSETS.len());
    }

    #[test]
    fn adjacent_inline_code_runs_share_one_background() {
        let out = compose("`a**b**` x `c`", &NoGlyphs);
        let backgrounds: Vec<&RoundedRectCommand> = out
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::RoundedRect(rect) if rect.color == palette::INLINE_CODE_BG => {
                    Some(rect)
                }
                _ => None,
            })
            .collect();
        assert_eq!(backgrounds.len(), 2);
        // "a" + bold "b" (10 + 12) plus 2px padding on both sides.
        assert_eq!(backgrounds[0].width, 22 + 4);
    }

    #[test]
    fn strike_draws_line_in_strike_color() {
        let out = compose("~~gone~~", &NoGlyphs);
        assert!(out.commands.iter().any(|cmd| matches!(
            cmd,
            DrawCommand::Line(line) if line.color == palette::STRIKE_TEXT && line.x1 - line.x0 == 40
        )));
    }

    #[test]
    fn quote_lines_get_bar_and_quote_color() {
        let out = compose("> said", &NoGlyphs);
        assert!(out.commands.iter().any(|cmd| matches!(
            cmd,
            DrawCommand::Rect(rect) if rect.color == palette::QUOTE_BAR && rect.width == 3
        )));
        let text = texts(&out);
        assert_eq!(text[0].color, palette::QUOTE_TEXT);
        assert_eq!(text[0].x, 10 + 7);
    }

    #[test]
    fn code_lines_are_shorter_and_have_background() {
        let out = compose("```\nx\n\n```", &NoGlyphs);
        assert_eq!(out.content_height, 25 * 2);
        let backgrounds = out
            .commands
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::RoundedRect(r) if r.color == palette::CODE_BLOCK_BG))
            .count();
        assert_eq!(backgrounds, 2);
        assert!(FixedMetrics::is_mono(texts(&out)[0].font));
    }

    #[test]
    fn table_cards_size_by_wrapped_lines() {
        let options = PrepOptions::default().with_table_style(TableStyle::Cards);
        let out = compose_with("| K | V |\n|---|---|\n| a | b |\n| c | d |", options, &NoGlyphs);
        let cards = out
            .commands
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::RoundedRect(r) if r.color == palette::CARD_BG))
            .count();
        assert_eq!(cards, 2);
        // Two label/value lines per card plus 10px padding top and bottom.
        assert_eq!(out.content_height, 2 * (2 * 32 + 20));
        let labels: Vec<&str> = texts(&out).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(labels[..4], ["K：", "a", "V：", "b"]);
    }

    #[test]
    fn italic_darkens_text_color() {
        let out = compose("*it*", &NoGlyphs);
        assert_eq!(texts(&out)[0].color, Rgb::new(0x33 - 20, 0x33 - 20, 0x33 - 20));
    }

    #[test]
    fn tokenized_segments_paint_in_order() {
        let metrics = FixedMetrics::new(10);
        let blocks = vec![Block::Text(tokenize("a `b` c"))];
        let out = Compositor::new(config(), &metrics, &NoGlyphs).compose(&blocks);
        let xs: Vec<i32> = texts(&out).iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![10, 30, 40]);
    }
}
