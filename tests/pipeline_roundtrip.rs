mod common;

mod pipeline_roundtrip {
    use wordreel::{
        BackgroundImage, Canvas, FontSource, Fps, InMemorySink, NarrationAudio, ReelConfig,
        ReelError, ReelPipeline, ReelResult, RenderThreading, SpeechSynthesizer,
    };

    use crate::common::find_font;

    fn cfg() -> ReelConfig {
        ReelConfig {
            fps: Fps::new(24, 1).unwrap(),
            canvas: Canvas {
                width: 96,
                height: 160,
            },
            font_size_px: 24.0,
            ..ReelConfig::default()
        }
    }

    fn backgrounds(cfg: &ReelConfig, n: usize) -> Vec<BackgroundImage> {
        (0..n)
            .map(|i| BackgroundImage::solid(i, cfg.canvas, [255, 255 - 50 * i as u8, 120, 255]))
            .collect()
    }

    struct NeverCalled;

    impl SpeechSynthesizer for NeverCalled {
        fn synthesize(&self, _text: &str, _language: &str) -> ReelResult<NarrationAudio> {
            panic!("synthesizer must not run");
        }
    }

    #[test]
    fn three_words_over_six_seconds() {
        let Some(font) = find_font() else {
            return;
        };
        let cfg = cfg();
        let pipeline = ReelPipeline::new(cfg.clone()).unwrap();
        let narration = NarrationAudio::from_parts("narration.wav", 6.0).unwrap();
        let mut sink = InMemorySink::new();

        let summary = pipeline
            .render_into(
                "one two three",
                &FontSource::Path(font),
                &backgrounds(&cfg, 1),
                &narration,
                &mut sink,
            )
            .unwrap();

        assert_eq!(summary.captions.len(), 3);
        for (i, c) in summary.captions.iter().enumerate() {
            assert_eq!(c.word_index, i);
            assert_eq!(c.duration_secs, 2.0);
            assert_eq!(c.background_index, 0);
            assert_eq!(c.video_frames, 48);
        }
        assert_eq!(summary.video_frames, 144);
        assert!((summary.duration_secs - 6.0).abs() < 1e-6);

        assert!(sink.is_finished());
        assert_eq!(sink.frames().len(), 144);
        assert!(
            sink.frames()
                .iter()
                .enumerate()
                .all(|(i, (idx, _))| idx.0 == i as u64)
        );
        // Different words, different pixels at the segment boundary.
        assert_ne!(sink.frames()[47].1, sink.frames()[48].1);
        assert_eq!(sink.frames()[0].1, sink.frames()[47].1);
    }

    #[test]
    fn durations_sum_to_narration_for_uneven_counts() {
        let Some(font) = find_font() else {
            return;
        };
        let cfg = cfg();
        let pipeline = ReelPipeline::new(cfg.clone()).unwrap();
        let narration = NarrationAudio::from_parts("narration.wav", 5.3).unwrap();
        let mut sink = InMemorySink::new();

        let text = "the quick brown fox jumps over the lazy dog";
        let summary = pipeline
            .render_into(
                text,
                &FontSource::Path(font),
                &backgrounds(&cfg, 3),
                &narration,
                &mut sink,
            )
            .unwrap();

        assert_eq!(summary.captions.len(), 9);
        let sum: f64 = summary.captions.iter().map(|c| c.duration_secs).sum();
        assert!((sum - 5.3).abs() < 1e-6);
        let frames: u64 = summary.captions.iter().map(|c| c.video_frames).sum();
        assert_eq!(frames, summary.video_frames);
        assert_eq!(summary.video_frames, (5.3f64 * 24.0).ceil() as u64);
        assert_eq!(sink.frames().len() as u64, summary.video_frames);
    }

    #[test]
    fn single_word_spans_whole_narration() {
        let Some(font) = find_font() else {
            return;
        };
        let cfg = cfg();
        let pipeline = ReelPipeline::new(cfg.clone()).unwrap();
        let narration = NarrationAudio::from_parts("narration.wav", 3.25).unwrap();
        let mut sink = InMemorySink::new();

        let summary = pipeline
            .render_into(
                "  hello\n",
                &FontSource::Path(font),
                &backgrounds(&cfg, 2),
                &narration,
                &mut sink,
            )
            .unwrap();
        assert_eq!(summary.captions.len(), 1);
        assert_eq!(summary.captions[0].text, "hello");
        assert_eq!(summary.captions[0].duration_secs, 3.25);
        assert_eq!(summary.frames_rendered, 1);
    }

    #[test]
    fn empty_text_is_invalid_input_before_synthesis() {
        let pipeline = ReelPipeline::new(cfg()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        for text in ["", "   \n\t "] {
            let err = pipeline
                .generate(
                    text,
                    &FontSource::Path("unused.ttf".into()),
                    &backgrounds(&cfg(), 1),
                    &NeverCalled,
                    &out,
                )
                .unwrap_err();
            assert!(matches!(err, ReelError::InvalidInput(_)), "{err}");
        }
        assert!(!out.exists());
    }

    #[test]
    fn missing_font_fails_before_any_frame() {
        let cfg = cfg();
        let pipeline = ReelPipeline::new(cfg.clone()).unwrap();
        let narration = NarrationAudio::from_parts("narration.wav", 2.0).unwrap();
        let mut sink = InMemorySink::new();

        let err = pipeline
            .render_into(
                "some words here",
                &FontSource::Path("definitely/not/here.ttf".into()),
                &backgrounds(&cfg, 1),
                &narration,
                &mut sink,
            )
            .unwrap_err();
        assert!(matches!(err, ReelError::FontLoad(_)), "{err}");
        assert!(sink.config().is_none());
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn garbage_font_bytes_fail_with_font_load() {
        let pipeline = ReelPipeline::new(cfg()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = pipeline
            .generate(
                "hello",
                &FontSource::Bytes(b"not a font at all".to_vec()),
                &backgrounds(&cfg(), 1),
                &NeverCalled,
                dir.path().join("out.mp4"),
            )
            .unwrap_err();
        assert!(matches!(err, ReelError::FontLoad(_)), "{err}");
    }

    #[test]
    fn parallel_matches_sequential() {
        let Some(font) = find_font() else {
            return;
        };
        let mut cfg = cfg();
        cfg.background_intervals_secs = vec![0.5, 0.75, 1.0];
        let text = "a a b c c c d e f g h h i";
        let narration = NarrationAudio::from_parts("narration.wav", 4.0).unwrap();
        let bgs = backgrounds(&cfg, 3);
        let font = FontSource::Path(font);

        let mut seq_sink = InMemorySink::new();
        let seq = ReelPipeline::new(cfg.clone())
            .unwrap()
            .render_into(text, &font, &bgs, &narration, &mut seq_sink)
            .unwrap();

        let mut par_sink = InMemorySink::new();
        let par = ReelPipeline::new(cfg)
            .unwrap()
            .with_threading(RenderThreading {
                parallel: true,
                chunk_size: 4,
                threads: Some(2),
            })
            .render_into(text, &font, &bgs, &narration, &mut par_sink)
            .unwrap();

        assert_eq!(seq, par);
        assert_eq!(seq_sink.frames(), par_sink.frames());
        assert!(seq.frames_reused > 0);
    }
}
