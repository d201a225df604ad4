use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;

use crate::foundation::{
    core::{Canvas, Fps, Rgb8},
    error::{ReelError, ReelResult},
};

/// Tunables for one reel generation.
///
/// The value is immutable once built and is handed to each component at construction, so
/// concurrent pipelines never share mutable settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    /// Output video frame rate.
    pub fps: Fps,
    /// Output frame dimensions (backgrounds are resized to this).
    pub canvas: Canvas,
    /// Caption text color.
    pub text_color: Rgb8,
    /// Caption font size in pixels.
    pub font_size_px: f32,
    /// Background cycling thresholds in seconds, consumed in order.
    pub background_intervals_secs: Vec<f64>,
    /// Language tag handed to the speech synthesizer.
    pub language: String,
    /// Color used to flatten any remaining alpha before encoding.
    pub bg_rgba: [u8; 4],
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            fps: Fps { num: 24, den: 1 },
            canvas: Canvas {
                width: 1080,
                height: 1920,
            },
            text_color: Rgb8::black(),
            font_size_px: 180.0,
            background_intervals_secs: vec![10.0, 22.0, 35.0],
            language: "en".to_string(),
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

impl ReelConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| ReelError::invalid_input(format!("parse config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the renderer or encoder cannot honor.
    pub fn validate(&self) -> ReelResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ReelError::invalid_input(
                "canvas width/height must be non-zero",
            ));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            // yuv420p subsamples chroma 2x2.
            return Err(ReelError::invalid_input(
                "canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.canvas.width > u32::from(u16::MAX) || self.canvas.height > u32::from(u16::MAX) {
            return Err(ReelError::invalid_input(
                "canvas width/height must fit in 16 bits",
            ));
        }
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(ReelError::invalid_input(
                "font_size_px must be finite and > 0",
            ));
        }
        if self.background_intervals_secs.is_empty() {
            return Err(ReelError::invalid_input(
                "background_intervals_secs must contain at least one threshold",
            ));
        }
        if self
            .background_intervals_secs
            .iter()
            .any(|t| !t.is_finite() || *t <= 0.0)
        {
            return Err(ReelError::invalid_input(
                "background_intervals_secs must be finite and > 0",
            ));
        }
        if self.language.trim().is_empty() {
            return Err(ReelError::invalid_input("language must be non-empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_match_vertical_video() {
        let cfg = ReelConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.fps, Fps { num: 24, den: 1 });
        assert_eq!((cfg.canvas.width, cfg.canvas.height), (1080, 1920));
        assert_eq!(cfg.background_intervals_secs, vec![10.0, 22.0, 35.0]);
        assert_eq!(cfg.font_size_px, 180.0);
    }

    #[test]
    fn validation_catches_bad_values() {
        let odd = ReelConfig {
            canvas: Canvas {
                width: 11,
                height: 10,
            },
            ..Default::default()
        };
        assert!(matches!(odd.validate(), Err(ReelError::InvalidInput(_))));

        let no_fps = ReelConfig {
            fps: Fps { num: 0, den: 1 },
            ..Default::default()
        };
        assert!(no_fps.validate().is_err());

        let no_intervals = ReelConfig {
            background_intervals_secs: vec![],
            ..Default::default()
        };
        assert!(no_intervals.validate().is_err());

        let negative_interval = ReelConfig {
            background_intervals_secs: vec![10.0, -1.0],
            ..Default::default()
        };
        assert!(negative_interval.validate().is_err());

        let nan_font = ReelConfig {
            font_size_px: f32::NAN,
            ..Default::default()
        };
        assert!(nan_font.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel.json");
        std::fs::write(
            &path,
            r#"{ "font_size_px": 96.0, "text_color": { "r": 255, "g": 255, "b": 255 } }"#,
        )
        .unwrap();

        let cfg = ReelConfig::from_path(&path).unwrap();
        assert_eq!(cfg.font_size_px, 96.0);
        assert_eq!(cfg.text_color, Rgb8::new(255, 255, 255));
        assert_eq!(cfg.fps, ReelConfig::default().fps);
    }

    #[test]
    fn malformed_json_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ReelConfig::from_path(&path),
            Err(ReelError::InvalidInput(_))
        ));
    }
}
