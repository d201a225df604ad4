use std::{path::Path, sync::Arc};

use crate::foundation::{
    core::Canvas,
    error::{ReelError, ReelResult},
    math::premultiply_rgba8_in_place,
};

/// A decoded background resized to the output frame size.
///
/// Shared read-only by every caption drawn over it; renderers copy the pixels before drawing.
#[derive(Clone, Debug)]
pub struct BackgroundImage {
    /// Position in the caller-supplied background sequence.
    pub index: usize,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl BackgroundImage {
    /// Wrap straight-alpha RGBA8 pixels that already match the frame size.
    pub fn from_rgba8(index: usize, canvas: Canvas, mut rgba: Vec<u8>) -> ReelResult<Self> {
        if rgba.len() != canvas.rgba_len() {
            return Err(ReelError::image_load(format!(
                "background {index}: expected {} bytes for {}x{}, got {}",
                canvas.rgba_len(),
                canvas.width,
                canvas.height,
                rgba.len()
            )));
        }
        premultiply_rgba8_in_place(&mut rgba);
        Ok(Self {
            index,
            width: canvas.width,
            height: canvas.height,
            rgba8_premul: Arc::new(rgba),
        })
    }

    /// A single-color background.
    pub fn solid(index: usize, canvas: Canvas, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(canvas.rgba_len());
        for _ in 0..(canvas.width as usize * canvas.height as usize) {
            data.extend_from_slice(&rgba);
        }
        premultiply_rgba8_in_place(&mut data);
        Self {
            index,
            width: canvas.width,
            height: canvas.height,
            rgba8_premul: Arc::new(data),
        }
    }

    /// `true` when the pixel buffer matches `canvas`.
    pub fn fits(&self, canvas: Canvas) -> bool {
        self.width == canvas.width
            && self.height == canvas.height
            && self.rgba8_premul.len() == canvas.rgba_len()
    }
}

/// Decode an encoded image and stretch it to exactly `canvas`.
///
/// Aspect ratio is not preserved.
pub fn decode_background(bytes: &[u8], index: usize, canvas: Canvas) -> ReelResult<BackgroundImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| ReelError::image_load(format!("background {index}: decode failed: {e}")))?;
    let resized = if dyn_img.width() == canvas.width && dyn_img.height() == canvas.height {
        dyn_img
    } else {
        dyn_img.resize_exact(
            canvas.width,
            canvas.height,
            image::imageops::FilterType::CatmullRom,
        )
    };
    let rgba = resized.to_rgba8();
    BackgroundImage::from_rgba8(index, canvas, rgba.into_raw())
}

/// Read and decode one background file.
pub fn load_background(path: &Path, index: usize, canvas: Canvas) -> ReelResult<BackgroundImage> {
    let bytes = std::fs::read(path).map_err(|e| {
        ReelError::image_load(format!(
            "failed to read background '{}': {e}",
            path.display()
        ))
    })?;
    decode_background(&bytes, index, canvas)
}

/// Load the ordered background sequence. The sequence must be non-empty.
#[tracing::instrument(skip(paths), fields(count = paths.len()))]
pub fn load_backgrounds<P: AsRef<Path>>(
    paths: &[P],
    canvas: Canvas,
) -> ReelResult<Vec<BackgroundImage>> {
    if paths.is_empty() {
        return Err(ReelError::invalid_input(
            "at least one background image is required",
        ));
    }
    paths
        .iter()
        .enumerate()
        .map(|(i, p)| load_background(p.as_ref(), i, canvas))
        .collect()
}
