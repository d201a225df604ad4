//! wordreel turns a block of text into a narrated vertical video.
//!
//! The text is narrated by a speech synthesizer, split into words, and every word is shown
//! full-screen over a cycling set of background images for an equal share of the narration.
//!
//! - Build a [`ReelPipeline`] from a [`ReelConfig`]
//! - [`ReelPipeline::generate`] narrates, renders and muxes straight to an MP4
//! - [`ReelPipeline::render_into`] streams the same frames into any [`FrameSink`]
#![forbid(unsafe_code)]

mod foundation;

/// Background cycling state machine.
pub mod schedule;
/// Word segmentation and per-word timing.
pub mod timeline;

/// Background image and font loading.
pub mod assets;
/// Tunables.
pub mod config;
/// Encoding sinks.
pub mod encode;
/// Narration audio and speech synthesis.
pub mod narration;
/// Caption rendering.
pub mod render;

/// Variable-duration frame sequencing.
pub mod assemble;
/// End-to-end generation.
pub mod pipeline;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgb8};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::assemble::{AssemblyStats, SegmentStats, VideoAssembler};
pub use crate::assets::font::{FontAsset, FontSource, TextExtent};
pub use crate::assets::image::{BackgroundImage, decode_background, load_backgrounds};
pub use crate::config::ReelConfig;
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use crate::encode::sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use crate::narration::{
    CommandSynthesizer, NarrationAudio, PrerecordedNarration, SpeechSynthesizer,
};
pub use crate::pipeline::{
    CaptionSummary, ReelOutput, ReelPipeline, ReelSummary, RenderThreading,
};
pub use crate::render::caption::{CaptionFrame, CaptionRenderer, CaptionStyle, FrameRGBA};
pub use crate::schedule::{BackgroundScheduler, ScheduleState};
pub use crate::timeline::{Word, WordTimeline, segment_words};
