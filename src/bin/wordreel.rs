use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wordreel::{
    BackgroundScheduler, CaptionRenderer, CaptionStyle, CommandSynthesizer, FontSource, Fps,
    PrerecordedNarration, ReelConfig, ReelPipeline, RenderThreading, SpeechSynthesizer, Word,
    WordTimeline, load_backgrounds,
};

#[derive(Parser, Debug)]
#[command(name = "wordreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Narrate a text and render it as a word-by-word MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single caption frame as a PNG.
    Frame(FrameArgs),
    /// Print the per-word timeline and background plan as JSON.
    Plan(PlanArgs),
}

#[derive(clap::Args, Debug, Default)]
struct ConfigArgs {
    /// JSON config file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Caption font size in pixels.
    #[arg(long)]
    font_size: Option<f32>,

    /// Background switch thresholds in seconds, comma separated.
    #[arg(long, value_delimiter = ',')]
    intervals: Option<Vec<f64>>,

    /// Narration language tag.
    #[arg(long)]
    lang: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> anyhow::Result<ReelConfig> {
        let mut cfg = match &self.config {
            Some(p) => ReelConfig::from_path(p)?,
            None => ReelConfig::default(),
        };
        if let Some(fps) = self.fps {
            cfg.fps = Fps::new(fps, 1)?;
        }
        if let Some(size) = self.font_size {
            cfg.font_size_px = size;
        }
        if let Some(intervals) = &self.intervals {
            cfg.background_intervals_secs = intervals.clone();
        }
        if let Some(lang) = &self.lang {
            cfg.language = lang.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Text file to narrate.
    #[arg(long)]
    text: PathBuf,

    /// TrueType/OpenType font for the captions.
    #[arg(long)]
    font: PathBuf,

    /// Background images, cycled in the given order.
    #[arg(long = "bg", required = true, num_args = 1..)]
    backgrounds: Vec<PathBuf>,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Refuse to replace an existing output file.
    #[arg(long, default_value_t = false)]
    no_clobber: bool,

    /// Use an existing narration recording instead of synthesizing one.
    #[arg(long, conflicts_with = "tts")]
    audio: Option<PathBuf>,

    /// Speech synthesis program (default: espeak-ng).
    #[arg(long)]
    tts: Option<String>,

    /// Argument for the synthesis program; `{text}`, `{lang}` and `{out}` are substituted.
    #[arg(long = "tts-arg", allow_hyphen_values = true, requires = "tts")]
    tts_args: Vec<String>,

    /// Pipe the text to the synthesis program's stdin.
    #[arg(long, default_value_t = false, requires = "tts")]
    tts_stdin: bool,

    /// Enable parallel caption rendering.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// Render chunk size (parallel mode only).
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    #[command(flatten)]
    cfg: ConfigArgs,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Word to draw.
    #[arg(long)]
    word: String,

    /// TrueType/OpenType font.
    #[arg(long)]
    font: PathBuf,

    /// Background image.
    #[arg(long)]
    bg: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    cfg: ConfigArgs,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Text file to plan.
    #[arg(long)]
    text: PathBuf,

    /// Narration length in seconds.
    #[arg(long, required_unless_present = "audio")]
    duration: Option<f64>,

    /// Measure the narration length from this audio file instead.
    #[arg(long, conflicts_with = "duration")]
    audio: Option<PathBuf>,

    /// Number of background images.
    #[arg(long, default_value_t = 1)]
    images: usize,

    #[command(flatten)]
    cfg: ConfigArgs,
}

#[derive(serde::Serialize)]
struct PlanEntry<'a> {
    word_index: usize,
    text: &'a str,
    start_secs: f64,
    duration_secs: f64,
    background_index: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read text '{}'", path.display()))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = args.cfg.load()?;
    let text = read_text(&args.text)?;
    let backgrounds = load_backgrounds(&args.backgrounds, cfg.canvas)?;

    let synth: Box<dyn SpeechSynthesizer> = match (&args.audio, &args.tts) {
        (Some(audio), _) => Box::new(PrerecordedNarration::new(audio)),
        (None, Some(program)) => Box::new(CommandSynthesizer {
            program: program.clone(),
            args: args.tts_args.clone(),
            stdin_text: args.tts_stdin,
            extension: "wav".to_string(),
        }),
        (None, None) => Box::new(CommandSynthesizer::espeak()),
    };

    let pipeline = ReelPipeline::new(cfg)?
        .with_threading(RenderThreading {
            parallel: args.parallel,
            chunk_size: args.chunk_size,
            threads: args.threads,
        })
        .with_overwrite(!args.no_clobber);

    let output = pipeline.generate(
        &text,
        &FontSource::Path(args.font.clone()),
        &backgrounds,
        synth.as_ref(),
        &args.out,
    )?;

    eprintln!(
        "wrote {} ({} words, {:.2}s, {} frames)",
        output.path.display(),
        output.summary.captions.len(),
        output.summary.duration_secs,
        output.summary.video_frames
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = args.cfg.load()?;
    let backgrounds = load_backgrounds(std::slice::from_ref(&args.bg), cfg.canvas)?;
    let background = backgrounds
        .first()
        .context("background image did not load")?;

    let mut renderer =
        CaptionRenderer::new(&FontSource::Path(args.font.clone()), CaptionStyle::from(&cfg))?;
    let frame = renderer.render(
        &Word {
            index: 0,
            text: args.word.clone(),
        },
        background,
    )?;
    let rgba = frame.to_opaque_rgba8(cfg.bg_rgba)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &rgba,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let cfg = args.cfg.load()?;
    let text = read_text(&args.text)?;
    let duration = match (&args.audio, args.duration) {
        (Some(audio), _) => wordreel::narration::probe_duration_secs(audio)?,
        (None, Some(d)) => d,
        (None, None) => anyhow::bail!("either --duration or --audio is required"),
    };

    let timeline = WordTimeline::new(&text, duration)?;
    let scheduler = BackgroundScheduler::new(cfg.background_intervals_secs.clone(), args.images)?;
    let plan = scheduler.plan(timeline.durations());

    let entries: Vec<PlanEntry<'_>> = timeline
        .words()
        .iter()
        .zip(plan)
        .map(|(w, bg)| PlanEntry {
            word_index: w.index,
            text: &w.text,
            start_secs: timeline.start_secs(w.index),
            duration_secs: timeline.word_duration_secs(),
            background_index: bg,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
