//! End-to-end reel generation: text and narration in, muxed video out.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;

use crate::{
    assemble::VideoAssembler,
    assets::{
        font::{FontAsset, FontSource},
        image::BackgroundImage,
    },
    config::ReelConfig,
    encode::{
        ffmpeg::{FfmpegSink, FfmpegSinkOpts},
        sink::FrameSink,
    },
    foundation::error::{ReelError, ReelResult},
    narration::{NarrationAudio, SpeechSynthesizer},
    render::caption::{CaptionFrame, CaptionRenderer, CaptionStyle, FrameRGBA},
    schedule::BackgroundScheduler,
    timeline::{Word, WordTimeline, segment_words},
};

/// How caption frames are rendered.
///
/// Sequential rendering is the default. Parallel rendering first simulates the background
/// schedule for every word, then renders `chunk_size` words at a time on a rayon pool; frames
/// still reach the sink in word order.
#[derive(Clone, Debug)]
pub struct RenderThreading {
    pub parallel: bool,
    pub chunk_size: usize,
    pub threads: Option<usize>,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// One word as it ended up in the video.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CaptionSummary {
    pub word_index: usize,
    pub text: String,
    pub background_index: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
    /// Video frames the caption is held for.
    pub video_frames: u64,
}

/// What a completed run produced.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ReelSummary {
    /// One entry per word, in narration order.
    pub captions: Vec<CaptionSummary>,
    /// Total video frames written.
    pub video_frames: u64,
    /// Sum of caption durations; equals the narration length.
    pub duration_secs: f64,
    /// Caption frames actually drawn.
    pub frames_rendered: u64,
    /// Caption frames taken from the previous identical caption.
    pub frames_reused: u64,
}

/// Successful [`ReelPipeline::generate`] result.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ReelOutput {
    /// The finished video. Owned by the caller from here on.
    pub path: PathBuf,
    pub summary: ReelSummary,
}

/// Reel generator bound to one immutable configuration.
#[derive(Clone, Debug)]
pub struct ReelPipeline {
    cfg: ReelConfig,
    threading: RenderThreading,
    overwrite: bool,
}

impl ReelPipeline {
    /// Validate `cfg` and build a sequential pipeline.
    pub fn new(cfg: ReelConfig) -> ReelResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            threading: RenderThreading::default(),
            overwrite: true,
        })
    }

    pub fn with_threading(mut self, threading: RenderThreading) -> Self {
        self.threading = threading;
        self
    }

    /// Whether [`generate`](Self::generate) may replace an existing output file.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn config(&self) -> &ReelConfig {
        &self.cfg
    }

    /// Narrate `text`, render one caption per word and write the muxed video to `out_path`.
    ///
    /// Nothing exists at `out_path` unless this returns `Ok`. The narration audio is released
    /// on every exit path.
    #[tracing::instrument(skip_all, fields(out = %out_path.as_ref().display()))]
    pub fn generate(
        &self,
        text: &str,
        font: &FontSource,
        backgrounds: &[BackgroundImage],
        synth: &dyn SpeechSynthesizer,
        out_path: impl AsRef<Path>,
    ) -> ReelResult<ReelOutput> {
        if segment_words(text).is_empty() {
            return Err(ReelError::invalid_input(
                "text contains no words (empty or whitespace-only)",
            ));
        }
        let renderer = CaptionRenderer::new(font, CaptionStyle::from(&self.cfg))?;
        check_backgrounds(backgrounds, &self.cfg)?;

        let narration = synth.synthesize(text, &self.cfg.language)?;
        tracing::info!(
            narration_secs = narration.duration_secs(),
            "narration ready"
        );

        let mut sink = FfmpegSink::new(FfmpegSinkOpts {
            out_path: out_path.as_ref().to_path_buf(),
            overwrite: self.overwrite,
            bg_rgba: self.cfg.bg_rgba,
        });
        let summary = self.render_with(renderer, text, backgrounds, &narration, &mut sink)?;

        let path = sink.out_path().to_path_buf();
        tracing::info!(path = %path.display(), video_frames = summary.video_frames, "reel written");
        Ok(ReelOutput { path, summary })
    }

    /// Render and assemble into an arbitrary sink using already measured narration.
    ///
    /// The font is loaded before anything else, so a bad font fails before any frame is
    /// rendered and before the sink is started.
    #[tracing::instrument(skip_all, fields(narration_secs = narration.duration_secs()))]
    pub fn render_into(
        &self,
        text: &str,
        font: &FontSource,
        backgrounds: &[BackgroundImage],
        narration: &NarrationAudio,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<ReelSummary> {
        let renderer = CaptionRenderer::new(font, CaptionStyle::from(&self.cfg))?;
        self.render_with(renderer, text, backgrounds, narration, sink)
    }

    fn render_with(
        &self,
        mut renderer: CaptionRenderer,
        text: &str,
        backgrounds: &[BackgroundImage],
        narration: &NarrationAudio,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<ReelSummary> {
        let timeline = WordTimeline::new(text, narration.duration_secs())?;
        check_backgrounds(backgrounds, &self.cfg)?;
        let mut scheduler = BackgroundScheduler::new(
            self.cfg.background_intervals_secs.clone(),
            backgrounds.len(),
        )?;
        let assembler = VideoAssembler::new(self.cfg.fps, self.cfg.canvas)?;
        let word_secs = timeline.word_duration_secs();

        tracing::info!(
            words = timeline.len(),
            word_secs,
            backgrounds = backgrounds.len(),
            parallel = self.threading.parallel,
            "rendering captions"
        );

        let mut counters = FrameCounters::default();
        let mut cache = LastFrame::default();

        let stats = if !self.threading.parallel {
            let frames = timeline.words().iter().map(|word| -> ReelResult<CaptionFrame> {
                let bg_index = scheduler.active_index();
                let key = caption_key(&word.text, bg_index);
                let image = match cache.get(key) {
                    Some(image) => {
                        counters.reused += 1;
                        image
                    }
                    None => {
                        let image = Arc::new(renderer.render(word, &backgrounds[bg_index])?);
                        counters.rendered += 1;
                        cache.put(key, Arc::clone(&image));
                        image
                    }
                };
                scheduler.advance(word_secs);
                Ok(CaptionFrame {
                    word_index: word.index,
                    background_index: bg_index,
                    duration_secs: word_secs,
                    image,
                })
            });
            assembler.assemble(frames, narration, sink)?
        } else {
            let plan = scheduler.plan(timeline.durations());
            let pool = build_thread_pool(self.threading.threads)?;
            let chunk_size = normalized_chunk_size(self.threading.chunk_size);
            let font = renderer.font().clone();
            let style = renderer.style();
            let words = timeline.words();

            let frames = words
                .chunks(chunk_size)
                .zip(plan.chunks(chunk_size))
                .flat_map(|(chunk, chunk_plan)| {
                    // Words whose caption differs from the previous word's need drawing.
                    let keys: Vec<u64> = chunk
                        .iter()
                        .zip(chunk_plan)
                        .map(|(w, &bg)| caption_key(&w.text, bg))
                        .collect();
                    let mut prev = cache.key();
                    let mut todo = Vec::new();
                    for (i, &key) in keys.iter().enumerate() {
                        if prev != Some(key) {
                            todo.push(i);
                        }
                        prev = Some(key);
                    }

                    let rendered = render_chunk_parallel(
                        &pool, &font, style, chunk, chunk_plan, backgrounds, &todo,
                    );

                    let mut rendered = rendered.into_iter();
                    let mut out = Vec::with_capacity(chunk.len());
                    for (i, word) in chunk.iter().enumerate() {
                        let key = keys[i];
                        let image = match cache.get(key) {
                            Some(image) => {
                                counters.reused += 1;
                                image
                            }
                            None => match rendered.next() {
                                Some(Ok(image)) => {
                                    counters.rendered += 1;
                                    cache.put(key, Arc::clone(&image));
                                    image
                                }
                                Some(Err(e)) => {
                                    out.push(Err(e));
                                    break;
                                }
                                None => {
                                    out.push(Err(ReelError::encoding(
                                        "internal error: parallel caption missing",
                                    )));
                                    break;
                                }
                            },
                        };
                        out.push(Ok(CaptionFrame {
                            word_index: word.index,
                            background_index: chunk_plan[i],
                            duration_secs: word_secs,
                            image,
                        }));
                    }
                    out
                });
            assembler.assemble(frames, narration, sink)?
        };

        let captions = timeline
            .words()
            .iter()
            .zip(&stats.segments)
            .map(|(word, seg)| CaptionSummary {
                word_index: word.index,
                text: word.text.clone(),
                background_index: seg.background_index,
                start_secs: seg.start_secs,
                duration_secs: seg.duration_secs,
                video_frames: seg.video_frames,
            })
            .collect();

        tracing::info!(
            rendered = counters.rendered,
            reused = counters.reused,
            video_frames = stats.video_frames,
            "captions assembled"
        );

        Ok(ReelSummary {
            captions,
            video_frames: stats.video_frames,
            duration_secs: stats.duration_secs,
            frames_rendered: counters.rendered,
            frames_reused: counters.reused,
        })
    }
}

#[derive(Default)]
struct FrameCounters {
    rendered: u64,
    reused: u64,
}

/// Most recent caption, keyed by word text and background.
#[derive(Default)]
struct LastFrame(Option<(u64, Arc<FrameRGBA>)>);

impl LastFrame {
    fn key(&self) -> Option<u64> {
        self.0.as_ref().map(|(k, _)| *k)
    }

    fn get(&self, key: u64) -> Option<Arc<FrameRGBA>> {
        match &self.0 {
            Some((k, image)) if *k == key => Some(Arc::clone(image)),
            _ => None,
        }
    }

    fn put(&mut self, key: u64, image: Arc<FrameRGBA>) {
        self.0 = Some((key, image));
    }
}

fn caption_key(text: &str, background_index: usize) -> u64 {
    let mut buf = Vec::with_capacity(8 + text.len());
    buf.extend_from_slice(&(background_index as u64).to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
    xxhash_rust::xxh3::xxh3_64(&buf)
}

fn render_chunk_parallel(
    pool: &rayon::ThreadPool,
    font: &FontAsset,
    style: CaptionStyle,
    words: &[Word],
    plan: &[usize],
    backgrounds: &[BackgroundImage],
    todo: &[usize],
) -> Vec<ReelResult<Arc<FrameRGBA>>> {
    pool.install(|| {
        todo.par_iter()
            .map_init(
                || CaptionRenderer::from_font(font.clone(), style),
                |worker, &i| -> ReelResult<Arc<FrameRGBA>> {
                    let renderer = worker
                        .as_mut()
                        .map_err(|e| ReelError::font_load(format!("worker renderer: {e}")))?;
                    Ok(Arc::new(renderer.render(&words[i], &backgrounds[plan[i]])?))
                },
            )
            .collect()
    })
}

fn check_backgrounds(backgrounds: &[BackgroundImage], cfg: &ReelConfig) -> ReelResult<()> {
    if backgrounds.is_empty() {
        return Err(ReelError::invalid_input(
            "at least one background image is required",
        ));
    }
    if let Some(bad) = backgrounds.iter().find(|b| !b.fits(cfg.canvas)) {
        return Err(ReelError::invalid_input(format!(
            "background {} is {}x{}, expected {}x{}",
            bad.index, bad.width, bad.height, cfg.canvas.width, cfg.canvas.height
        )));
    }
    Ok(())
}

fn build_thread_pool(threads: Option<usize>) -> ReelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ReelError::invalid_input(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ReelError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

fn normalized_chunk_size(chunk_size: usize) -> usize {
    chunk_size.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encode::sink::InMemorySink,
        foundation::core::{Canvas, Fps},
        test_support::find_test_font,
    };

    fn small_cfg() -> ReelConfig {
        ReelConfig {
            fps: Fps::new(10, 1).unwrap(),
            canvas: Canvas {
                width: 64,
                height: 48,
            },
            font_size_px: 16.0,
            background_intervals_secs: vec![1.0, 1.0, 1.0],
            ..ReelConfig::default()
        }
    }

    fn backgrounds(cfg: &ReelConfig, n: usize) -> Vec<BackgroundImage> {
        (0..n)
            .map(|i| BackgroundImage::solid(i, cfg.canvas, [40 * i as u8, 200, 255, 255]))
            .collect()
    }

    #[test]
    fn caption_key_separates_text_and_background() {
        assert_eq!(caption_key("go", 1), caption_key("go", 1));
        assert_ne!(caption_key("go", 1), caption_key("go", 2));
        assert_ne!(caption_key("go", 1), caption_key("og", 1));
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(matches!(
            build_thread_pool(Some(0)),
            Err(ReelError::InvalidInput(_))
        ));
        assert_eq!(normalized_chunk_size(0), 1);
    }

    #[test]
    fn repeated_words_are_reused_not_rerendered() {
        let Some(font) = find_test_font() else {
            return;
        };
        let cfg = small_cfg();
        let pipeline = ReelPipeline::new(cfg.clone()).unwrap();
        let narration = NarrationAudio::from_parts("n.wav", 2.0).unwrap();
        let mut sink = InMemorySink::new();

        // Four words at 0.5 s each on one background.
        let summary = pipeline
            .render_into(
                "la la la hey",
                &FontSource::Path(font),
                &backgrounds(&cfg, 1),
                &narration,
                &mut sink,
            )
            .unwrap();
        assert_eq!(summary.frames_rendered, 2);
        assert_eq!(summary.frames_reused, 2);
        assert_eq!(summary.video_frames, 20);
    }

    #[test]
    fn backgrounds_follow_the_schedule() {
        let Some(font) = find_test_font() else {
            return;
        };
        let cfg = small_cfg();
        let pipeline = ReelPipeline::new(cfg.clone()).unwrap();
        let narration = NarrationAudio::from_parts("n.wav", 3.0).unwrap();
        let mut sink = InMemorySink::new();

        let summary = pipeline
            .render_into(
                "a b c d e f",
                &FontSource::Path(font),
                &backgrounds(&cfg, 2),
                &narration,
                &mut sink,
            )
            .unwrap();
        let bgs: Vec<usize> = summary.captions.iter().map(|c| c.background_index).collect();
        assert_eq!(bgs, vec![0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn missing_backgrounds_is_invalid_input() {
        let Some(font) = find_test_font() else {
            return;
        };
        let pipeline = ReelPipeline::new(small_cfg()).unwrap();
        let narration = NarrationAudio::from_parts("n.wav", 1.0).unwrap();
        let mut sink = InMemorySink::new();
        let err = pipeline
            .render_into("hi", &FontSource::Path(font), &[], &narration, &mut sink)
            .unwrap_err();
        assert!(matches!(err, ReelError::InvalidInput(_)));
        assert!(sink.config().is_none());
    }
}
