//! embedded-graphics raster backend for `text2image-render` plans.
//!
//! [`MonoFontBackend`] supplies font metrics from the embedded-graphics ASCII
//! mono fonts (integer-magnified to the requested size), [`EmojiRegistry`]
//! supplies emoji bitmaps, and [`EgRenderer`] executes a [`RenderPlan`] onto
//! any [`BlendTarget`], usually an RGB [`Canvas`].

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

use embedded_graphics::{
    mono_font::{
        ascii::{
            FONT_10X20, FONT_6X13_BOLD, FONT_6X9, FONT_7X14, FONT_7X14_BOLD, FONT_8X13,
            FONT_8X13_BOLD, FONT_9X18, FONT_9X18_BOLD,
        },
        MonoFont, MonoTextStyle,
    },
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle, RoundedRectangle},
    text::{Baseline, Text},
};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, RgbImage, RgbaImage};
use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use text2image::codepoint_keys;
use text2image_render::{
    DrawCommand, FontHandle, FontRequest, GlyphBitmap, GlyphProvider, MetricsProvider,
    RenderEngine, RenderError, RenderPlan, Rgb, VerticalMetrics,
};
use unicode_width::UnicodeWidthChar;

/// JPEG quality used for `.jpg` / `.jpeg` output.
pub const JPEG_QUALITY: u8 = 80;

/// Backend error.
#[derive(Debug)]
pub enum BackendError {
    /// Layout or configuration failed.
    Render(RenderError),
    /// Image decoding or encoding failed.
    Image(image::ImageError),
    Io(std::io::Error),
    /// Emoji registration was rejected.
    Registry(EmojiRegistryError),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(err) => write!(f, "render failed: {}", err),
            Self::Image(err) => write!(f, "image codec failed: {}", err),
            Self::Io(err) => write!(f, "io failed: {}", err),
            Self::Registry(err) => write!(f, "emoji registry rejected glyph: {:?}", err),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(err) => Some(err),
            Self::Image(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Registry(_) => None,
        }
    }
}

impl From<RenderError> for BackendError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

impl From<image::ImageError> for BackendError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<std::io::Error> for BackendError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EmojiRegistryError> for BackendError {
    fn from(value: EmojiRegistryError) -> Self {
        Self::Registry(value)
    }
}

fn to_rgb888(color: Rgb) -> Rgb888 {
    Rgb888::new(color.r, color.g, color.b)
}

/// Draw target that can alpha-blend single pixels.
pub trait BlendTarget: DrawTarget<Color = Rgb888> {
    /// Blends `color` over the existing pixel with straight `alpha`.
    ///
    /// Targets that cannot read back pixels keep the default, which draws
    /// pixels that are at least half opaque.
    fn blend_pixel(&mut self, point: Point, color: Rgb888, alpha: u8) -> Result<(), Self::Error> {
        if alpha >= 128 {
            self.draw_iter(core::iter::once(Pixel(point, color)))
        } else {
            Ok(())
        }
    }
}

/// RGB raster canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb) -> Self {
        Self {
            image: RgbImage::from_pixel(
                width,
                height,
                image::Rgb([background.r, background.g, background.b]),
            ),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        self.image
            .get_pixel_checked(x, y)
            .map(|px| Rgb::new(px[0], px[1], px[2]))
    }

    fn slot(&mut self, point: Point) -> Option<&mut image::Rgb<u8>> {
        let x = u32::try_from(point.x).ok()?;
        let y = u32::try_from(point.y).ok()?;
        self.image.get_pixel_mut_checked(x, y)
    }

    /// Encodes the canvas.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, BackendError> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        match format {
            OutputFormat::Png => self.image.write_to(&mut cursor, ImageFormat::Png)?,
            OutputFormat::Jpeg { quality } => {
                let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
                self.image.write_with_encoder(encoder)?;
            }
        }
        Ok(buffer)
    }

    /// Encodes and writes the canvas to `path`.
    pub fn save(&self, path: impl AsRef<Path>, format: OutputFormat) -> Result<(), BackendError> {
        let bytes = self.encode(format)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Some(slot) = self.slot(point) {
                *slot = image::Rgb([color.r(), color.g(), color.b()]);
            }
        }
        Ok(())
    }
}

fn blend_channel(src: u8, dst: u8, alpha: u8) -> u8 {
    let a = u16::from(alpha);
    ((u16::from(src) * a + u16::from(dst) * (255 - a) + 127) / 255) as u8
}

impl BlendTarget for Canvas {
    fn blend_pixel(&mut self, point: Point, color: Rgb888, alpha: u8) -> Result<(), Self::Error> {
        if let Some(slot) = self.slot(point) {
            let [r, g, b] = slot.0;
            *slot = image::Rgb([
                blend_channel(color.r(), r, alpha),
                blend_channel(color.g(), g, alpha),
                blend_channel(color.b(), b, alpha),
            ]);
        }
        Ok(())
    }
}

/// Encoded output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg {
        quality: u8,
    },
}

impl OutputFormat {
    pub fn jpeg() -> Self {
        Self::Jpeg {
            quality: JPEG_QUALITY,
        }
    }

    /// JPEG for `.jpg` / `.jpeg` paths, PNG otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg") => Self::jpeg(),
            _ => Self::Png,
        }
    }
}

/// Text rendering side of a font backend.
pub trait FontBackend: MetricsProvider {
    /// Draws `text` with its font box top-left at `origin` and returns the
    /// advance in pixels.
    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font: FontHandle,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>;
}

/// Scales every pixel drawn through it into a `magnification`-sized block.
struct ScaledTarget<'a, D> {
    inner: &'a mut D,
    origin: Point,
    magnification: u32,
}

impl<D: DrawTarget> OriginDimensions for ScaledTarget<'_, D> {
    fn size(&self) -> Size {
        let size = self.inner.bounding_box().size;
        let mag = self.magnification.max(1);
        Size::new(size.width / mag, size.height / mag)
    }
}

impl<D: DrawTarget> DrawTarget for ScaledTarget<'_, D> {
    type Color = D::Color;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let mag = self.magnification.max(1);
        for Pixel(point, color) in pixels {
            let top_left = self.origin + point * mag as i32;
            self.inner
                .fill_solid(&Rectangle::new(top_left, Size::new(mag, mag)), color)?;
        }
        Ok(())
    }
}

/// Font metrics and text drawing with the embedded-graphics ASCII mono fonts.
///
/// Sizes are matched by integer magnification of the closest bitmap face,
/// so every request resolves to some font. Characters wider than one terminal
/// cell occupy two cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoFontBackend;

impl MonoFontBackend {
    const REGULAR_FACES: [&'static MonoFont<'static>; 5] =
        [&FONT_6X9, &FONT_7X14, &FONT_8X13, &FONT_9X18, &FONT_10X20];
    const BOLD_FACES: [&'static MonoFont<'static>; 4] =
        [&FONT_6X13_BOLD, &FONT_7X14_BOLD, &FONT_8X13_BOLD, &FONT_9X18_BOLD];

    const MAX_MAGNIFICATION: u32 = 32;
    const FACE_MASK: u32 = 0x7F;
    const BOLD_BIT: u32 = 1 << 7;
    const MAGNIFICATION_SHIFT: u32 = 8;

    fn faces(bold: bool) -> &'static [&'static MonoFont<'static>] {
        if bold {
            &Self::BOLD_FACES
        } else {
            &Self::REGULAR_FACES
        }
    }

    fn encode_font_id(face: usize, bold: bool, magnification: u32) -> FontHandle {
        let mut id = (face as u32) & Self::FACE_MASK;
        if bold {
            id |= Self::BOLD_BIT;
        }
        FontHandle(id | (magnification << Self::MAGNIFICATION_SHIFT))
    }

    /// Face and magnification for `font`; unknown ids map to the smallest
    /// regular face.
    pub fn font_for(font: FontHandle) -> (&'static MonoFont<'static>, u32) {
        let faces = Self::faces(font.0 & Self::BOLD_BIT != 0);
        let face = (font.0 & Self::FACE_MASK) as usize;
        let magnification = (font.0 >> Self::MAGNIFICATION_SHIFT).clamp(1, Self::MAX_MAGNIFICATION);
        match faces.get(face) {
            Some(mono) => (*mono, magnification),
            None => (Self::REGULAR_FACES[0], magnification),
        }
    }

    /// Picks the face whose magnified height lands within an eighth of
    /// `size_px` with the smallest magnification, else the closest one.
    fn best_fit(faces: &[&'static MonoFont<'static>], size_px: u32) -> (usize, u32) {
        let size = size_px.max(1);
        let tolerance = (size / 8).max(1);
        let mut best: Option<(usize, u32, u32)> = None;
        for (idx, mono) in faces.iter().enumerate() {
            let height = mono.character_size.height.max(1);
            let floor = (size / height).clamp(1, Self::MAX_MAGNIFICATION);
            for magnification in [floor, (floor + 1).min(Self::MAX_MAGNIFICATION)] {
                let diff = (height * magnification).abs_diff(size);
                let better = match best {
                    None => true,
                    Some((_, best_mag, best_diff)) => {
                        match (diff <= tolerance, best_diff <= tolerance) {
                            (true, false) => true,
                            (false, true) => false,
                            (true, true) => {
                                magnification < best_mag
                                    || (magnification == best_mag && diff < best_diff)
                            }
                            (false, false) => diff < best_diff,
                        }
                    }
                };
                if better {
                    best = Some((idx, magnification, diff));
                }
            }
        }
        best.map_or((0, 1), |(idx, magnification, _)| (idx, magnification))
    }

    fn select(size_px: u32, bold: bool) -> FontHandle {
        let (face, magnification) = Self::best_fit(Self::faces(bold), size_px);
        Self::encode_font_id(face, bold, magnification)
    }

    fn cell_width(mono: &MonoFont<'_>, magnification: u32) -> i32 {
        ((mono.character_size.width + mono.character_spacing) * magnification) as i32
    }
}

fn char_cells(ch: char) -> i32 {
    ch.width().unwrap_or(0) as i32
}

impl MetricsProvider for MonoFontBackend {
    fn select_font(&self, request: FontRequest) -> Option<FontHandle> {
        // Every face is monospace, so monospace requests never fail.
        Some(Self::select(request.size_px, request.bold))
    }

    fn default_font(&self, size_px: u32) -> FontHandle {
        Self::select(size_px, false)
    }

    fn measure(&self, font: FontHandle, text: &str) -> i32 {
        let (mono, magnification) = Self::font_for(font);
        let cell = Self::cell_width(mono, magnification);
        normalize_text_for_mono(text)
            .chars()
            .map(|ch| char_cells(ch) * cell)
            .sum()
    }

    fn vertical_metrics(&self, font: FontHandle) -> VerticalMetrics {
        let (mono, magnification) = Self::font_for(font);
        let height = mono.character_size.height;
        let ascent = (mono.baseline + 1).min(height);
        VerticalMetrics {
            ascent: (ascent * magnification) as i32,
            descent: ((height - ascent) * magnification) as i32,
        }
    }
}

impl FontBackend for MonoFontBackend {
    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font: FontHandle,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let (mono, magnification) = Self::font_for(font);
        let style = MonoTextStyle::new(mono, color);
        let cell = Self::cell_width(mono, magnification);
        let normalized = normalize_text_for_mono(text);
        let mut buf = [0u8; 4];
        let mut x = origin.x;
        for ch in normalized.chars() {
            let cells = char_cells(ch);
            if cells > 0 && !ch.is_whitespace() {
                let mut target = ScaledTarget {
                    inner: &mut *display,
                    origin: Point::new(x, origin.y),
                    magnification,
                };
                Text::with_baseline(ch.encode_utf8(&mut buf), Point::zero(), style, Baseline::Top)
                    .draw(&mut target)?;
            }
            x += cells * cell;
        }
        Ok(x - origin.x)
    }
}

fn mono_replacement(ch: char) -> Option<char> {
    match ch {
        '\u{00A0}' | '\u{3000}' => Some(' '),
        '\u{2013}' | '\u{2014}' => Some('-'),
        '\u{2018}' | '\u{2019}' => Some('\''),
        '\u{201C}' | '\u{201D}' => Some('"'),
        '\u{3001}' => Some(','),
        '\u{3002}' => Some('.'),
        // Fullwidth ASCII forms.
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFEE0),
        _ => None,
    }
}

/// Maps typographic punctuation and fullwidth forms onto ASCII the mono
/// fonts can draw.
pub fn normalize_text_for_mono(text: &str) -> Cow<'_, str> {
    if !text
        .chars()
        .any(|ch| ch == '\u{2026}' || mono_replacement(ch).is_some())
    {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2026}' => out.push_str("..."),
            other => out.push(mono_replacement(other).unwrap_or(other)),
        }
    }
    Cow::Owned(out)
}

/// Limits for the in-memory emoji registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmojiRegistryLimits {
    /// Maximum number of registered source images.
    pub max_glyphs: usize,
    /// Maximum aggregate source pixel count.
    pub max_total_pixels: usize,
}

impl Default for EmojiRegistryLimits {
    fn default() -> Self {
        Self {
            max_glyphs: 4096,
            max_total_pixels: 64 * 1024 * 1024,
        }
    }
}

/// Error returned when emoji registration fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmojiRegistryError {
    RegistryDisabled,
    EmptyKey,
    InvalidDimensions,
    MaxGlyphsExceeded,
    MaxTotalPixelsExceeded,
}

/// Normalizes a glyph file name or key: `emoji_u1F600_200D.png` and
/// `1f600-200d` both become `1f600-200d`.
pub fn normalize_emoji_key(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    let name = name.strip_suffix(".png").unwrap_or(&name);
    let name = name.strip_prefix("emoji_u").unwrap_or(name);
    name.replace('_', "-")
}

type GlyphCache = HashMap<(String, u32), Option<Arc<GlyphBitmap>>>;

/// Emoji bitmaps keyed by lowercase hex codepoint sequences.
///
/// Lookups try every key from [`codepoint_keys`] and resize the source image
/// to the requested square size. Results, including misses, are cached per
/// `(emoji, size)`.
#[derive(Debug, Default)]
pub struct EmojiRegistry {
    limits: EmojiRegistryLimits,
    total_pixels: usize,
    sources: HashMap<String, RgbaImage>,
    cache: Mutex<GlyphCache>,
}

impl EmojiRegistry {
    pub fn new() -> Self {
        Self::with_limits(EmojiRegistryLimits::default())
    }

    pub fn with_limits(limits: EmojiRegistryLimits) -> Self {
        Self {
            limits,
            total_pixels: 0,
            sources: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> EmojiRegistryLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn total_pixels(&self) -> usize {
        self.total_pixels
    }

    fn clear_cache(&mut self) {
        match self.cache.get_mut() {
            Ok(cache) => cache.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Registers or replaces the source image for `key`.
    pub fn register(
        &mut self,
        key: impl AsRef<str>,
        image: RgbaImage,
    ) -> Result<(), EmojiRegistryError> {
        let key = normalize_emoji_key(key.as_ref());
        if key.is_empty() {
            return Err(EmojiRegistryError::EmptyKey);
        }
        if self.limits.max_glyphs == 0 || self.limits.max_total_pixels == 0 {
            return Err(EmojiRegistryError::RegistryDisabled);
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(EmojiRegistryError::InvalidDimensions);
        }

        let new_pixels = (image.width() as usize).saturating_mul(image.height() as usize);
        let previous_pixels = match self.sources.get(&key) {
            Some(existing) => (existing.width() as usize) * (existing.height() as usize),
            None => {
                if self.sources.len() >= self.limits.max_glyphs {
                    return Err(EmojiRegistryError::MaxGlyphsExceeded);
                }
                0
            }
        };
        let updated_total = self
            .total_pixels
            .saturating_sub(previous_pixels)
            .saturating_add(new_pixels);
        if updated_total > self.limits.max_total_pixels {
            return Err(EmojiRegistryError::MaxTotalPixelsExceeded);
        }

        self.sources.insert(key, image);
        self.total_pixels = updated_total;
        self.clear_cache();
        Ok(())
    }

    /// Decodes a PNG and registers it under `key`.
    pub fn register_png(&mut self, key: impl AsRef<str>, bytes: &[u8]) -> Result<(), BackendError> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
        self.register(key, image)?;
        Ok(())
    }

    /// Registers every `*.png` in `dir`, named by codepoints. Unreadable files
    /// are skipped with a warning. Returns the number registered.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, BackendError> {
        let mut loaded = 0usize;
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if !is_png || !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("skipping emoji {}: {}", path.display(), err);
                    continue;
                }
            };
            match self.register_png(stem, &bytes) {
                Ok(()) => loaded += 1,
                Err(BackendError::Registry(
                    err @ (EmojiRegistryError::MaxGlyphsExceeded
                    | EmojiRegistryError::MaxTotalPixelsExceeded
                    | EmojiRegistryError::RegistryDisabled),
                )) => {
                    log::warn!("emoji registry full after {} glyphs: {:?}", loaded, err);
                    break;
                }
                Err(err) => log::warn!("skipping emoji {}: {}", path.display(), err),
            }
        }
        log::debug!("loaded {} emoji glyphs from {}", loaded, dir.as_ref().display());
        Ok(loaded)
    }

    /// Source image for `emoji`, trying each codepoint key in order.
    pub fn source(&self, emoji: &str) -> Option<&RgbaImage> {
        codepoint_keys(emoji)
            .iter()
            .find_map(|key| self.sources.get(key))
    }

    fn rasterize(&self, emoji: &str, size_px: u32) -> Option<Arc<GlyphBitmap>> {
        let source = self.source(emoji)?;
        let resized = image::imageops::resize(source, size_px, size_px, FilterType::Lanczos3);
        GlyphBitmap::new(size_px, size_px, resized.into_raw()).map(Arc::new)
    }
}

impl GlyphProvider for EmojiRegistry {
    // Lookups are in-memory and never wait, so the timeout is unused.
    fn fetch(&self, emoji: &str, size_px: u32, _timeout: Duration) -> Option<Arc<GlyphBitmap>> {
        if size_px == 0 {
            return None;
        }
        let mut cache = match self.cache.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache
            .entry((emoji.to_string(), size_px))
            .or_insert_with(|| self.rasterize(emoji, size_px))
            .clone()
    }
}

/// Renderer configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EgRenderConfig {
    /// Fill the target with the plan background before drawing.
    pub clear_first: bool,
}

impl Default for EgRenderConfig {
    fn default() -> Self {
        Self { clear_first: true }
    }
}

/// Draw-command executor for embedded-graphics targets.
#[derive(Clone, Debug)]
pub struct EgRenderer<B = MonoFontBackend> {
    cfg: EgRenderConfig,
    backend: B,
}

impl Default for EgRenderer<MonoFontBackend> {
    fn default() -> Self {
        Self {
            cfg: EgRenderConfig::default(),
            backend: MonoFontBackend,
        }
    }
}

impl<B> EgRenderer<B>
where
    B: FontBackend,
{
    pub fn with_backend(cfg: EgRenderConfig, backend: B) -> Self {
        Self { cfg, backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Draws every command of `plan` in order.
    pub fn render_plan<D>(&self, plan: &RenderPlan, display: &mut D) -> Result<(), D::Error>
    where
        D: BlendTarget,
    {
        if self.cfg.clear_first {
            display.clear(to_rgb888(plan.background))?;
        }
        for cmd in &plan.commands {
            self.draw_command(display, cmd)?;
        }
        Ok(())
    }

    /// Rasterizes `plan` onto a new canvas of the plan's size.
    pub fn render_to_canvas(&self, plan: &RenderPlan) -> Canvas {
        let mut canvas = Canvas::new(plan.width, plan.height, plan.background);
        self.render_plan(plan, &mut canvas)
            .unwrap_or_else(|never| match never {});
        canvas
    }

    fn draw_command<D>(&self, display: &mut D, cmd: &DrawCommand) -> Result<(), D::Error>
    where
        D: BlendTarget,
    {
        match cmd {
            DrawCommand::Rect(rect) => Rectangle::new(
                Point::new(rect.x, rect.y),
                Size::new(rect.width, rect.height),
            )
            .into_styled(PrimitiveStyle::with_fill(to_rgb888(rect.color)))
            .draw(display),
            DrawCommand::RoundedRect(rect) => RoundedRectangle::with_equal_corners(
                Rectangle::new(Point::new(rect.x, rect.y), Size::new(rect.width, rect.height)),
                Size::new(rect.radius, rect.radius),
            )
            .into_styled(PrimitiveStyle::with_fill(to_rgb888(rect.color)))
            .draw(display),
            DrawCommand::Line(line) => Line::new(
                Point::new(line.x0, line.y0),
                Point::new(line.x1, line.y1),
            )
            .into_styled(PrimitiveStyle::with_stroke(
                to_rgb888(line.color),
                line.thickness.max(1),
            ))
            .draw(display),
            DrawCommand::Text(text) => self
                .backend
                .draw_text_run(
                    display,
                    text.font,
                    &text.text,
                    Point::new(text.x, text.y),
                    to_rgb888(text.color),
                )
                .map(|_| ()),
            DrawCommand::Bitmap(bmp) => {
                for y in 0..bmp.bitmap.height() {
                    for x in 0..bmp.bitmap.width() {
                        let [r, g, b, a] = bmp.bitmap.pixel(x, y);
                        if a == 0 {
                            continue;
                        }
                        display.blend_pixel(
                            Point::new(bmp.x + x as i32, bmp.y + y as i32),
                            Rgb888::new(r, g, b),
                            a,
                        )?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Renders `text` with the mono font backend onto a canvas sized to the
/// content.
pub fn render_text(
    engine: &RenderEngine,
    text: &str,
    glyphs: &dyn GlyphProvider,
) -> Result<Canvas, BackendError> {
    let renderer: EgRenderer = EgRenderer::default();
    let plan = engine.render(text, renderer.backend(), glyphs)?;
    Ok(renderer.render_to_canvas(&plan))
}
