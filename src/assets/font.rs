use std::{
    path::PathBuf,
    sync::Arc,
};

use crate::foundation::{
    core::Rgb8,
    error::{ReelError, ReelResult},
};

/// Where the caption font comes from.
#[derive(Clone, Debug)]
pub enum FontSource {
    /// A TrueType/OpenType file on disk.
    Path(PathBuf),
    /// Font file contents already in memory.
    Bytes(Vec<u8>),
}

/// A font that has been read and proven to register at least one family.
#[derive(Clone)]
pub struct FontAsset {
    bytes: Arc<Vec<u8>>,
    family_name: String,
    data: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for FontAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontAsset")
            .field("family_name", &self.family_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl FontAsset {
    /// Read and parse the font. Any failure is a [`ReelError::FontLoad`].
    pub fn load(source: &FontSource) -> ReelResult<Self> {
        let bytes = match source {
            FontSource::Path(p) => std::fs::read(p).map_err(|e| {
                ReelError::font_load(format!("failed to read font '{}': {e}", p.display()))
            })?,
            FontSource::Bytes(b) => b.clone(),
        };
        Self::from_bytes(bytes)
    }

    /// Parse font bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> ReelResult<Self> {
        if bytes.is_empty() {
            return Err(ReelError::font_load("font data is empty"));
        }

        let mut font_ctx = parley::FontContext::default();
        let family_name = register_family(&mut font_ctx, &bytes)?;
        let data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(bytes.clone()),
            0,
        );

        Ok(Self {
            bytes: Arc::new(bytes),
            family_name,
            data,
        })
    }

    /// Family name of the first face in the font file.
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub(crate) fn data(&self) -> &vello_cpu::peniko::FontData {
        &self.data
    }
}

fn register_family(font_ctx: &mut parley::FontContext, bytes: &[u8]) -> ReelResult<String> {
    let families = font_ctx
        .collection
        .register_fonts(parley::fontique::Blob::from(bytes.to_vec()), None);
    let family_id = families
        .first()
        .map(|(id, _)| *id)
        .ok_or_else(|| ReelError::font_load("no font families registered from font bytes"))?;

    Ok(font_ctx
        .collection
        .family_name(family_id)
        .ok_or_else(|| ReelError::font_load("registered font family has no name"))?
        .to_string())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl From<Rgb8> for TextBrushRgba8 {
    fn from(c: Rgb8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: 255,
        }
    }
}

/// Size of a laid-out line of text in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextExtent {
    /// Widest line advance.
    pub width: f32,
    /// Sum of line heights (ascent + descent + leading).
    pub height: f32,
}

/// Parley contexts bound to a single caption font.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
}

impl TextLayoutEngine {
    pub(crate) fn new(font: &FontAsset) -> ReelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let family_name = register_family(&mut font_ctx, &font.bytes)?;
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
        })
    }

    /// Shape and lay out a single unwrapped line.
    pub(crate) fn layout_line(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> ReelResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ReelError::invalid_input(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

/// Bounding size of a layout from its line metrics.
pub(crate) fn layout_extent(layout: &parley::Layout<TextBrushRgba8>) -> TextExtent {
    let mut width = 0.0f32;
    let mut height = 0.0f32;
    for line in layout.lines() {
        let m = line.metrics();
        width = width.max(m.advance);
        height += m.ascent + m.descent + m.leading;
    }
    TextExtent { width, height }
}
