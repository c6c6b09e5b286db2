//! Greedy line wrapping for one logical line of segments.

use text2image::Segment;

use crate::metrics::{FontCache, FontHandle, FontRequest};

/// Pixels kept free at the end of every physical line.
pub const SAFETY_MARGIN_PX: i32 = 2;

/// Characters that must not begin a physical line.
pub const NO_LINE_START: &[char] = &[
    '，', '。', '、', '；', '：', '？', '！', '）', '】', '》', '」', '』', '"', '\'', ',', '.',
    ';', ':', '?', '!', ')', '>', ']', '}', '·', '…', '—', '～', '”', '’',
];

pub fn is_no_line_start(ch: char) -> bool {
    NO_LINE_START.contains(&ch)
}

/// Layout configuration in output pixels (already multiplied by the scale).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Integer upscale factor.
    pub scale: i32,
    /// Base font size.
    pub font_size_px: u32,
    /// Square emoji bitmap size.
    pub emoji_size_px: i32,
    /// Width of the text area between the outer paddings.
    pub available_width: i32,
    /// List indent per nesting level.
    pub list_indent_px: i32,
    /// Quote bar width.
    pub quote_bar_px: i32,
    /// Gap between quote bar and text.
    pub quote_gap_px: i32,
}

impl LayoutConfig {
    pub fn new(font_size_px: u32, scale: u32, available_width: i32) -> Self {
        let scale = scale.max(1) as i32;
        Self {
            scale,
            font_size_px,
            emoji_size_px: emoji_size_for(font_size_px),
            available_width,
            list_indent_px: 20 * scale,
            quote_bar_px: 3 * scale,
            quote_gap_px: 4 * scale,
        }
    }

    /// `base × (1.8 − level × 0.15)`.
    pub fn heading_size(&self, level: u8) -> u32 {
        let factor = 1.8 - f64::from(level) * 0.15;
        (f64::from(self.font_size_px) * factor) as u32
    }

    /// Narrowest content column a list indent may leave.
    pub fn min_content_width(&self) -> i32 {
        self.emoji_size_px.max(20)
    }
}

/// Emoji bitmaps are 1.1× the font size.
pub fn emoji_size_for(font_size_px: u32) -> i32 {
    (f64::from(font_size_px) * 1.1) as i32
}

/// Horizontal geometry shared by every physical line of a logical line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineGeometry {
    pub quote_bar_width: i32,
    /// Bar plus gap, `0` when the line is not a quote.
    pub quote_offset: i32,
    /// `"3."` or `"•"` for list items.
    pub bullet: Option<String>,
    pub bullet_width: i32,
    pub indent: i32,
    /// Width available for wrapping.
    pub usable_width: i32,
}

impl LineGeometry {
    pub fn is_quote(&self) -> bool {
        self.quote_offset > 0
    }

    /// Offset from the left text edge to where content starts.
    pub fn content_offset(&self) -> i32 {
        self.quote_offset + self.indent + self.bullet_width
    }
}

/// A run of one source segment placed on a physical line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedSegment {
    pub segment: Segment,
    pub width: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhysicalLine {
    pub runs: Vec<PlacedSegment>,
}

impl PhysicalLine {
    pub fn width(&self) -> i32 {
        self.runs.iter().map(|run| run.width).sum()
    }

    pub fn is_continuation(&self) -> bool {
        self.runs.iter().any(|run| run.segment.is_continuation)
    }

    pub fn has_emoji(&self) -> bool {
        self.runs.iter().any(|run| run.segment.is_emoji)
    }
}

/// Wrapped form of one logical line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaidOutLine {
    pub geometry: LineGeometry,
    pub lines: Vec<PhysicalLine>,
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<PhysicalLine>,
    current: Vec<PlacedSegment>,
    x: i32,
    last_source: Option<usize>,
}

impl LineBuilder {
    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(PhysicalLine {
                runs: core::mem::take(&mut self.current),
            });
        }
        self.x = 0;
        self.last_source = None;
    }

    fn place_unit(&mut self, segment: Segment, width: i32) {
        self.current.push(PlacedSegment { segment, width });
        self.x += width;
        self.last_source = None;
    }

    fn place_char(&mut self, source: usize, segment: &Segment, ch: char, width: i32) {
        match self.current.last_mut() {
            Some(run) if self.last_source == Some(source) => {
                run.segment.text.push(ch);
                run.width += width;
            }
            _ => self.current.push(PlacedSegment {
                segment: segment.with_text(ch),
                width,
            }),
        }
        self.x += width;
        self.last_source = Some(source);
    }

    fn finish(mut self) -> Vec<PhysicalLine> {
        self.flush();
        self.lines
    }
}

/// Wraps logical lines into physical lines.
#[derive(Clone, Copy, Debug)]
pub struct LayoutEngine {
    cfg: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(cfg: LayoutConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    pub fn base_font(&self, fonts: &mut FontCache<'_>) -> FontHandle {
        fonts.font(FontRequest::regular(self.cfg.font_size_px))
    }

    /// Font used to measure and paint `segment`.
    pub fn segment_font(&self, segment: &Segment, fonts: &mut FontCache<'_>) -> FontHandle {
        if segment.heading_level > 0 {
            return fonts.font(FontRequest::bold(self.cfg.heading_size(segment.heading_level)));
        }
        if segment.code || segment.is_code_block {
            if let Some(mono) = fonts.monospace(self.cfg.font_size_px) {
                return mono;
            }
        }
        self.base_font(fonts)
    }

    /// Quote, bullet, and indent geometry for a logical line.
    pub fn geometry(&self, segments: &[Segment], fonts: &mut FontCache<'_>) -> LineGeometry {
        let cfg = &self.cfg;
        let quote_offset = if segments.iter().any(|s| s.is_quote) {
            cfg.quote_bar_px + cfg.quote_gap_px
        } else {
            0
        };

        let mut geometry = LineGeometry {
            quote_bar_width: cfg.quote_bar_px,
            quote_offset,
            ..LineGeometry::default()
        };

        if let Some(item) = segments.iter().find(|s| s.is_list_item) {
            let bullet = if item.is_ordered {
                format!("{}.", item.ordinal)
            } else {
                "•".to_string()
            };
            let base = self.base_font(fonts);
            geometry.bullet_width =
                fonts.text_width(base, &bullet, false) + fonts.measure(base, " ");
            geometry.bullet = Some(bullet);

            let level = i32::try_from(item.indent_level).unwrap_or(i32::MAX);
            let raw_indent = level.saturating_mul(cfg.list_indent_px);
            let room = (cfg.available_width
                - quote_offset
                - geometry.bullet_width
                - cfg.min_content_width())
            .max(0);
            geometry.indent = raw_indent.min(room);
        }

        geometry.usable_width = (cfg.available_width
            - quote_offset
            - geometry.indent
            - geometry.bullet_width)
            .max(1);
        geometry
    }

    /// Lays out one logical line.
    pub fn layout(&self, segments: &[Segment], fonts: &mut FontCache<'_>) -> LaidOutLine {
        let geometry = self.geometry(segments, fonts);
        let mut lines = self.wrap(segments, geometry.usable_width, fonts);
        if geometry.bullet.is_some() {
            for line in lines.iter_mut().skip(1) {
                for run in &mut line.runs {
                    run.segment.is_continuation = true;
                }
            }
        }
        LaidOutLine { geometry, lines }
    }

    /// Greedy wrap of `segments` into lines no wider than `usable_width`
    /// (minus the safety margin), except for oversized atomic units.
    pub fn wrap(
        &self,
        segments: &[Segment],
        usable_width: i32,
        fonts: &mut FontCache<'_>,
    ) -> Vec<PhysicalLine> {
        let limit = usable_width - SAFETY_MARGIN_PX;
        let mut builder = LineBuilder::default();

        for (source, segment) in segments.iter().enumerate() {
            if segment.text.is_empty() {
                continue;
            }
            let font = self.segment_font(segment, fonts);

            if segment.is_atomic() {
                let width = if segment.is_emoji {
                    self.cfg.emoji_size_px
                } else {
                    fonts.text_width(font, &segment.text, segment.bold)
                };
                if builder.x + width > limit && builder.x > 0 {
                    builder.flush();
                }
                builder.place_unit(segment.clone(), width);
                continue;
            }

            let chars: Vec<char> = segment.text.chars().collect();
            for (idx, &ch) in chars.iter().enumerate() {
                let width = fonts.char_width(font, ch, segment.bold);
                let overflow = builder.x + width > limit && builder.x > 0;
                let need_wrap = overflow && !is_no_line_start(ch);

                // Keep the last two characters of a run together.
                if !need_wrap
                    && idx + 2 == chars.len()
                    && !builder.current.is_empty()
                    && !is_no_line_start(ch)
                {
                    let next = fonts.char_width(font, chars[idx + 1], segment.bold);
                    if builder.x + width + next > limit {
                        builder.flush();
                    }
                }
                if need_wrap {
                    builder.flush();
                }
                builder.place_char(source, segment, ch, width);
            }
        }

        builder.finish()
    }
}
