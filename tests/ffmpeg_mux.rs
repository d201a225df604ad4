mod common;

mod ffmpeg_mux {
    use std::path::Path;

    use wordreel::{
        BackgroundImage, Canvas, CommandSynthesizer, FfmpegSink, FfmpegSinkOpts, FontSource, Fps,
        NarrationAudio, PrerecordedNarration, ReelConfig, ReelError, ReelPipeline,
    };

    use crate::common::{ffmpeg_tools_available, ffprobe_json, find_font, write_tone_wav};

    fn cfg() -> ReelConfig {
        ReelConfig {
            fps: Fps::new(24, 1).unwrap(),
            canvas: Canvas {
                width: 96,
                height: 160,
            },
            font_size_px: 24.0,
            background_intervals_secs: vec![1.0],
            ..ReelConfig::default()
        }
    }

    fn backgrounds(cfg: &ReelConfig) -> Vec<BackgroundImage> {
        vec![
            BackgroundImage::solid(0, cfg.canvas, [250, 250, 250, 255]),
            BackgroundImage::solid(1, cfg.canvas, [250, 200, 80, 255]),
        ]
    }

    fn leftover_staging(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".wordreel-"))
            .collect()
    }

    #[test]
    fn generate_muxes_captions_with_narration() {
        let Some(font) = find_font() else {
            return;
        };
        if !ffmpeg_tools_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("voice.wav");
        write_tone_wav(&wav, 2.0);
        let out = dir.path().join("reels").join("out.mp4");

        let cfg = cfg();
        let output = ReelPipeline::new(cfg.clone())
            .unwrap()
            .generate(
                "four words right here",
                &FontSource::Path(font),
                &backgrounds(&cfg),
                &PrerecordedNarration::new(&wav),
                &out,
            )
            .unwrap();

        assert_eq!(output.path, out);
        assert!(out.is_file());
        assert_eq!(output.summary.captions.len(), 4);
        assert_eq!(output.summary.video_frames, 48);
        let bgs: Vec<usize> = output
            .summary
            .captions
            .iter()
            .map(|c| c.background_index)
            .collect();
        assert_eq!(bgs, vec![0, 0, 1, 1]);

        let probe = ffprobe_json(&out, "stream=codec_type,codec_name,nb_frames");
        let streams = probe["streams"].as_array().unwrap();
        assert_eq!(streams.len(), 2);
        let video = streams
            .iter()
            .find(|s| s["codec_type"] == "video")
            .unwrap();
        assert_eq!(video["codec_name"], "h264");
        assert_eq!(video["nb_frames"], "48");
        let audio = streams
            .iter()
            .find(|s| s["codec_type"] == "audio")
            .unwrap();
        assert_eq!(audio["codec_name"], "aac");

        assert!(leftover_staging(out.parent().unwrap()).is_empty());
        assert!(wav.exists());
    }

    #[test]
    fn failed_synthesis_leaves_no_output() {
        let Some(font) = find_font() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let synth = CommandSynthesizer {
            program: "wordreel-missing-tts-binary".to_string(),
            args: vec!["{out}".to_string()],
            stdin_text: false,
            extension: "wav".to_string(),
        };

        let cfg = cfg();
        let err = ReelPipeline::new(cfg.clone())
            .unwrap()
            .generate("hello there", &FontSource::Path(font), &backgrounds(&cfg), &synth, &out)
            .unwrap_err();
        assert!(matches!(err, ReelError::Narration(_)), "{err}");
        assert!(!out.exists());
    }

    #[test]
    fn muxing_failure_removes_partial_output() {
        let Some(font) = find_font() else {
            return;
        };
        if !ffmpeg_tools_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let bogus_audio = dir.path().join("voice.m4a");
        std::fs::write(&bogus_audio, b"this is not audio").unwrap();
        let narration = NarrationAudio::from_parts(&bogus_audio, 1.0).unwrap();
        let out = dir.path().join("out.mp4");

        let cfg = cfg();
        let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
        let err = ReelPipeline::new(cfg.clone())
            .unwrap()
            .render_into(
                "doomed words",
                &FontSource::Path(font),
                &backgrounds(&cfg),
                &narration,
                &mut sink,
            )
            .unwrap_err();
        assert!(matches!(err, ReelError::Encoding(_)), "{err}");
        drop(sink);

        assert!(!out.exists());
        assert!(leftover_staging(dir.path()).is_empty());
    }
}
