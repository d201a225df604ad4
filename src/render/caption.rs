use std::sync::Arc;

use crate::{
    assets::{
        font::{FontAsset, FontSource, TextBrushRgba8, TextExtent, TextLayoutEngine, layout_extent},
        image::BackgroundImage,
    },
    config::ReelConfig,
    foundation::{
        core::{Canvas, Rgb8},
        error::{ReelError, ReelResult},
        math::{flatten_premul_over_bg_to_opaque_rgba8, premul_over_in_place},
    },
    timeline::Word,
};

/// A rendered frame as RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Straight-alpha opaque RGBA8, with any transparency flattened over `bg_rgba`.
    pub fn to_opaque_rgba8(&self, bg_rgba: [u8; 4]) -> ReelResult<Vec<u8>> {
        if !self.premultiplied {
            return Ok(self.data.clone());
        }
        let mut out = vec![0u8; self.data.len()];
        flatten_premul_over_bg_to_opaque_rgba8(&mut out, &self.data, bg_rgba)?;
        Ok(out)
    }
}

/// One word drawn over its background, paired with how long it stays on screen.
#[derive(Clone, Debug)]
pub struct CaptionFrame {
    /// Index of the word this frame shows.
    pub word_index: usize,
    /// Index of the background it was drawn over.
    pub background_index: usize,
    /// Display duration in seconds.
    pub duration_secs: f64,
    /// Rendered pixels. Shared when an identical caption is reused.
    pub image: Arc<FrameRGBA>,
}

/// Fixed caption styling taken from [`ReelConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptionStyle {
    /// Output frame size.
    pub canvas: Canvas,
    /// Font size in pixels.
    pub font_size_px: f32,
    /// Text color.
    pub color: Rgb8,
}

impl From<&ReelConfig> for CaptionStyle {
    fn from(cfg: &ReelConfig) -> Self {
        Self {
            canvas: cfg.canvas,
            font_size_px: cfg.font_size_px,
            color: cfg.text_color,
        }
    }
}

/// Draws single words centered over a background.
///
/// The font is loaded and shaped once at construction so a bad font fails before any frame is
/// produced.
pub struct CaptionRenderer {
    font: FontAsset,
    style: CaptionStyle,
    engine: TextLayoutEngine,
    ctx: Option<vello_cpu::RenderContext>,
}

impl CaptionRenderer {
    /// Load `source` and prepare a renderer for `style`.
    pub fn new(source: &FontSource, style: CaptionStyle) -> ReelResult<Self> {
        let font = FontAsset::load(source)?;
        Self::from_font(font, style)
    }

    /// Prepare a renderer around an already loaded font.
    pub fn from_font(font: FontAsset, style: CaptionStyle) -> ReelResult<Self> {
        let w = canvas_dim(style.canvas.width)?;
        let h = canvas_dim(style.canvas.height)?;
        if w == 0 || h == 0 {
            return Err(ReelError::invalid_input(
                "caption canvas width/height must be non-zero",
            ));
        }
        if !style.font_size_px.is_finite() || style.font_size_px <= 0.0 {
            return Err(ReelError::font_load(format!(
                "font size {} is not usable",
                style.font_size_px
            )));
        }

        let mut engine = TextLayoutEngine::new(&font)?;
        // Shape a probe string so a face that registers but cannot lay out fails here.
        let probe = engine
            .layout_line("Ag", style.font_size_px, TextBrushRgba8::from(style.color))
            .map_err(|e| ReelError::font_load(format!("font cannot be laid out: {e}")))?;
        if probe.lines().next().is_none() {
            return Err(ReelError::font_load("font produced no lines for probe text"));
        }

        tracing::debug!(
            family = font.family_name(),
            size_px = style.font_size_px,
            "caption font ready"
        );

        Ok(Self {
            font,
            style,
            engine,
            ctx: None,
        })
    }

    /// Loaded caption font.
    pub fn font(&self) -> &FontAsset {
        &self.font
    }

    /// Style this renderer draws with.
    pub fn style(&self) -> CaptionStyle {
        self.style
    }

    /// Top-left position that centers text of `extent` on the canvas.
    ///
    /// Text wider or taller than the canvas gets a negative offset and is clipped evenly.
    pub fn centered_origin(&self, extent: TextExtent) -> (f64, f64) {
        let fw = f64::from(self.style.canvas.width);
        let fh = f64::from(self.style.canvas.height);
        (
            (fw - f64::from(extent.width)) / 2.0,
            (fh - f64::from(extent.height)) / 2.0,
        )
    }

    /// Render `word` over a fresh copy of `background`.
    pub fn render(&mut self, word: &Word, background: &BackgroundImage) -> ReelResult<FrameRGBA> {
        let canvas = self.style.canvas;
        if !background.fits(canvas) {
            return Err(ReelError::invalid_input(format!(
                "background {} is {}x{}, expected {}x{}",
                background.index, background.width, background.height, canvas.width, canvas.height
            )));
        }

        let layout = self.engine.layout_line(
            &word.text,
            self.style.font_size_px,
            TextBrushRgba8::from(self.style.color),
        )?;
        let (x, y) = self.centered_origin(layout_extent(&layout));

        let w = canvas_dim(canvas.width)?;
        let h = canvas_dim(canvas.height)?;
        let mut text_layer = vello_cpu::Pixmap::new(w, h);

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(self.font.data())
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut text_layer);
        self.ctx = Some(ctx);

        let mut data = background.rgba8_premul.as_ref().clone();
        premul_over_in_place(&mut data, text_layer.data_as_u8_slice())?;

        Ok(FrameRGBA {
            width: canvas.width,
            height: canvas.height,
            data,
            premultiplied: true,
        })
    }
}

fn canvas_dim(v: u32) -> ReelResult<u16> {
    v.try_into()
        .map_err(|_| ReelError::invalid_input("canvas dimension exceeds u16"))
}
