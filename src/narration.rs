//! Narration audio and the speech-synthesis boundary.
//!
//! Synthesis itself is delegated to an external program; this module only owns the resulting
//! audio file and measures how long it plays.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::foundation::error::{ReelError, ReelResult};

pub mod synth;

pub use synth::{CommandSynthesizer, PrerecordedNarration};

/// Synthesized speech for the whole input text.
///
/// Immutable once created. When the audio lives in a temp file this value owns it and the
/// file is deleted on drop, on success and failure alike.
#[derive(Debug)]
pub struct NarrationAudio {
    path: PathBuf,
    duration_secs: f64,
    _temp: Option<tempfile::TempPath>,
}

impl NarrationAudio {
    /// Measure an existing audio file the caller keeps ownership of.
    pub fn from_file(path: impl Into<PathBuf>) -> ReelResult<Self> {
        let path = path.into();
        let duration_secs = probe_duration_secs(&path)?;
        Self::from_parts(path, duration_secs)
    }

    /// Take ownership of a temp audio file and measure it.
    pub fn from_temp(temp: tempfile::TempPath) -> ReelResult<Self> {
        let duration_secs = probe_duration_secs(&temp)?;
        let mut audio = Self::from_parts(temp.to_path_buf(), duration_secs)?;
        audio._temp = Some(temp);
        Ok(audio)
    }

    /// Narration whose duration is already known. The file is not touched.
    pub fn from_parts(path: impl Into<PathBuf>, duration_secs: f64) -> ReelResult<Self> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(ReelError::narration(format!(
                "narration duration must be finite and > 0, got {duration_secs}"
            )));
        }
        Ok(Self {
            path: path.into(),
            duration_secs,
            _temp: None,
        })
    }

    /// Location of the encoded audio.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total playable length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}

/// Produces narration audio for a text.
pub trait SpeechSynthesizer {
    /// Synthesize `text` spoken in `language` (a BCP-47-ish tag such as `en`).
    fn synthesize(&self, text: &str, language: &str) -> ReelResult<NarrationAudio>;
}

/// Playable duration of an audio file.
///
/// WAV is measured from its header; anything else is asked of `ffprobe`.
pub fn probe_duration_secs(path: &Path) -> ReelResult<f64> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    let secs = if is_wav {
        wav_duration_secs(path)?
    } else {
        ffprobe_duration_secs(path)?
    };

    if !secs.is_finite() || secs <= 0.0 {
        return Err(ReelError::narration(format!(
            "narration '{}' has no playable audio (duration {secs})",
            path.display()
        )));
    }
    tracing::debug!(path = %path.display(), secs, "measured narration");
    Ok(secs)
}

fn wav_duration_secs(path: &Path) -> ReelResult<f64> {
    let reader = hound::WavReader::open(path).map_err(|e| {
        ReelError::narration(format!("failed to read wav '{}': {e}", path.display()))
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(ReelError::narration(format!(
            "wav '{}' declares a zero sample rate",
            path.display()
        )));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

fn ffprobe_duration_secs(path: &Path) -> ReelResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    if !path.exists() {
        return Err(ReelError::narration(format!(
            "narration file '{}' does not exist",
            path.display()
        )));
    }

    let out = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| ReelError::narration(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ReelError::narration(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ReelError::narration(format!("ffprobe json parse failed: {e}")))?;
    parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| {
            ReelError::narration(format!(
                "ffprobe reported no duration for '{}'",
                path.display()
            ))
        })
}

#[cfg(test)]
pub(crate) fn write_test_wav(path: &Path, sample_rate: u32, samples: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..samples {
        let t = i as f32 / sample_rate as f32;
        let v = (t * 440.0 * std::f32::consts::TAU).sin() * 0.25;
        w.write_sample((v * f32::from(i16::MAX)) as i16).unwrap();
    }
    w.finalize().unwrap();
}
