//! Variable-duration frame sequencing.
//!
//! Captions carry wall-clock durations while the output has a fixed frame rate. Caption `i`
//! covers `[t_i, t_(i+1))` where `t_i` is the sum of the preceding durations, and video frame
//! `k` (at `k / fps` seconds) shows the caption whose interval contains it. Boundaries are
//! computed from cumulative time, never from per-caption rounding, so the sequence never drifts
//! from the narration.

use crate::{
    encode::sink::{AudioInputConfig, FrameSink, SinkConfig},
    foundation::{
        core::{Canvas, Fps, FrameIndex},
        error::{ReelError, ReelResult},
    },
    narration::NarrationAudio,
    render::caption::CaptionFrame,
};

/// How one caption was laid onto the video timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SegmentStats {
    /// Word shown by the caption.
    pub word_index: usize,
    /// Background it was drawn over.
    pub background_index: usize,
    /// Caption start in seconds.
    pub start_secs: f64,
    /// Requested display duration in seconds.
    pub duration_secs: f64,
    /// First video frame showing the caption.
    pub first_frame: u64,
    /// Number of video frames the caption is held for.
    pub video_frames: u64,
}

/// Result of a completed assembly.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct AssemblyStats {
    /// Per-caption placement in input order.
    pub segments: Vec<SegmentStats>,
    /// Total video frames emitted.
    pub video_frames: u64,
    /// Sum of caption durations in seconds.
    pub duration_secs: f64,
}

/// Muxes an ordered caption sequence with the narration into a [`FrameSink`].
#[derive(Clone, Copy, Debug)]
pub struct VideoAssembler {
    fps: Fps,
    canvas: Canvas,
}

impl VideoAssembler {
    /// Assembler for frames of `canvas` size at `fps`.
    pub fn new(fps: Fps, canvas: Canvas) -> ReelResult<Self> {
        Fps::new(fps.num, fps.den)?;
        Ok(Self { fps, canvas })
    }

    /// Video frame counts for a duration sequence, using cumulative boundaries.
    pub fn hold_counts(&self, durations: &[f64]) -> Vec<u64> {
        let mut t = 0.0f64;
        let mut start = self.fps.frame_at_or_after(t);
        durations
            .iter()
            .map(|d| {
                t += d;
                let end = self.fps.frame_at_or_after(t);
                let n = end.saturating_sub(start);
                start = end;
                n
            })
            .collect()
    }

    /// Stream `frames` in order into `sink`, holding each for its duration, with `narration`
    /// as the audio track.
    ///
    /// The sink only ever sees `end` after every frame was produced and written. Any failure,
    /// including one from the frame producer, aborts the sink and is returned.
    #[tracing::instrument(skip_all, fields(fps = self.fps.as_f64()))]
    pub fn assemble<I>(
        &self,
        frames: I,
        narration: &NarrationAudio,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<AssemblyStats>
    where
        I: IntoIterator<Item = ReelResult<CaptionFrame>>,
    {
        let mut frames = frames.into_iter().peekable();
        if frames.peek().is_none() {
            return Err(ReelError::invalid_input(
                "cannot assemble a video from zero caption frames",
            ));
        }

        sink.begin(SinkConfig {
            width: self.canvas.width,
            height: self.canvas.height,
            fps: self.fps,
            audio: Some(AudioInputConfig {
                path: narration.path().to_path_buf(),
                duration_secs: narration.duration_secs(),
            }),
        })?;

        match self.stream(frames, sink) {
            Ok(stats) => {
                if let Err(e) = sink.end() {
                    sink.abort();
                    return Err(e);
                }
                let drift = (stats.duration_secs - narration.duration_secs()).abs();
                if drift > 1e-6 {
                    tracing::warn!(
                        captions_secs = stats.duration_secs,
                        narration_secs = narration.duration_secs(),
                        "caption durations do not add up to the narration length"
                    );
                }
                tracing::info!(
                    captions = stats.segments.len(),
                    video_frames = stats.video_frames,
                    "assembled video"
                );
                Ok(stats)
            }
            Err(e) => {
                sink.abort();
                Err(e)
            }
        }
    }

    fn stream(
        &self,
        frames: impl Iterator<Item = ReelResult<CaptionFrame>>,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<AssemblyStats> {
        let mut stats = AssemblyStats::default();
        let mut t = 0.0f64;
        let mut next_frame = self.fps.frame_at_or_after(0.0);

        for frame in frames {
            let caption = frame?;
            if !caption.duration_secs.is_finite() || caption.duration_secs < 0.0 {
                return Err(ReelError::invalid_input(format!(
                    "caption {} has invalid duration {}",
                    caption.word_index, caption.duration_secs
                )));
            }
            let image = caption.image.as_ref();
            if image.width != self.canvas.width || image.height != self.canvas.height {
                return Err(ReelError::encoding(format!(
                    "caption {} is {}x{}, expected {}x{}",
                    caption.word_index,
                    image.width,
                    image.height,
                    self.canvas.width,
                    self.canvas.height
                )));
            }

            let start_secs = t;
            t += caption.duration_secs;
            let end_frame = self.fps.frame_at_or_after(t);
            let count = end_frame.saturating_sub(next_frame);
            if count == 0 {
                tracing::warn!(
                    word = caption.word_index,
                    duration_secs = caption.duration_secs,
                    "caption shorter than one video frame is not shown"
                );
            } else {
                tracing::debug!(word = caption.word_index, first = next_frame, count, "hold caption");
                sink.push_held(FrameIndex(next_frame), image, count)?;
            }

            stats.segments.push(SegmentStats {
                word_index: caption.word_index,
                background_index: caption.background_index,
                start_secs,
                duration_secs: caption.duration_secs,
                first_frame: next_frame,
                video_frames: count,
            });
            stats.video_frames += count;
            next_frame = end_frame;
        }

        stats.duration_secs = t;
        Ok(stats)
    }
}
