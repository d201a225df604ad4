//! Frame sinks: the in-memory sink and the ffmpeg muxer.

pub mod ffmpeg;
pub mod sink;
