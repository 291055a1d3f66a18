use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use slidecast::{
    ffmpeg::{FfmpegCompositor, FfmpegSlideAssembler, FfprobeDurationProber},
    pdf::{PngFrameExporter, PopplerRasterizer, TempWorkspace},
    ports::{DurationProber as _, PageRasterizer as _},
    Collaborators, Orchestrator, OverlayPosition, OverlaySource, QualityProfile, RenderSettings,
    Schedule,
};

#[derive(Parser, Debug)]
#[command(name = "slidecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page count of a PDF slide deck.
    Pages(PagesArgs),
    /// Print the duration of a media file in seconds (requires `ffprobe`).
    Probe(ProbeArgs),
    /// Print a uniform per-slide schedule as JSON.
    Schedule(ScheduleArgs),
    /// Composite a slide deck and a narration video into one output file.
    Compose(ComposeArgs),
    /// Show or persist the ffmpeg binary path used for encoding.
    FfmpegPath(FfmpegPathArgs),
}

#[derive(Parser, Debug)]
struct PagesArgs {
    /// Slide deck PDF.
    pdf: PathBuf,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Video or audio file.
    media: PathBuf,
}

#[derive(Parser, Debug)]
struct ScheduleArgs {
    /// Slide count; read from --pdf when omitted.
    #[arg(long, conflicts_with = "pdf")]
    pages: Option<u32>,

    /// Slide deck PDF to count pages from.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Total duration in seconds; probed from --video when omitted.
    #[arg(long, conflicts_with = "video")]
    duration: Option<f64>,

    /// Narration video to probe the duration from.
    #[arg(long)]
    video: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Slide deck PDF.
    #[arg(long)]
    pdf: PathBuf,

    /// Narration video.
    #[arg(long)]
    video: PathBuf,

    /// Output directory; joined with --name and --ext.
    #[arg(long)]
    out_dir: Option<String>,

    /// Output base name (without extension).
    #[arg(long, default_value = "composite")]
    name: String,

    /// Output container extension.
    #[arg(long, default_value = "mp4")]
    ext: String,

    /// Full output path, used when --out-dir is not given.
    #[arg(long)]
    out: Option<String>,

    /// JSON file with operator-edited slide timings
    /// (`[{"slide_index":0,"time_seconds":0.0}, ...]`). Defaults to a uniform
    /// split of the narration duration.
    #[arg(long)]
    timings: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OverlayPosition::BottomRight)]
    position: OverlayPosition,

    /// Overlay width as a fraction of the output width (0.05-0.50).
    #[arg(long, default_value_t = 0.25)]
    overlay_width: f64,

    /// Which track shrinks into the overlay (primary = narration video).
    #[arg(long, value_enum, default_value_t = OverlaySource::Primary)]
    overlay: OverlaySource,

    #[arg(long, value_enum, default_value_t = QualityProfile::Standard)]
    quality: QualityProfile,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    #[arg(long, default_value_t = 1920)]
    width: u32,

    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Tail duration for the final slide when the narration length is
    /// unknown.
    #[arg(long, default_value_t = slidecast::DEFAULT_TAIL_SECONDS)]
    tail: f64,
}

#[derive(Parser, Debug)]
struct FfmpegPathArgs {
    #[command(subcommand)]
    action: FfmpegPathAction,
}

#[derive(Subcommand, Debug)]
enum FfmpegPathAction {
    /// Print the configured path, if any.
    Get,
    /// Persist a path.
    Set { path: String },
    /// Remove the persisted path.
    Clear,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("slidecast=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Pages(args) => cmd_pages(args),
        Command::Probe(args) => cmd_probe(args),
        Command::Schedule(args) => cmd_schedule(args),
        Command::Compose(args) => cmd_compose(args),
        Command::FfmpegPath(args) => cmd_ffmpeg_path(args),
    }
}

fn cmd_pages(args: PagesArgs) -> anyhow::Result<()> {
    let pages = PopplerRasterizer::default()
        .page_count(&args.pdf)
        .with_context(|| format!("reading '{}'", args.pdf.display()))?;
    println!("{pages}");
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let seconds = FfprobeDurationProber
        .probe_duration(&args.media)
        .with_context(|| format!("probing '{}'", args.media.display()))?;
    println!("{seconds}");
    Ok(())
}

fn cmd_schedule(args: ScheduleArgs) -> anyhow::Result<()> {
    let pages = match (args.pages, &args.pdf) {
        (Some(n), _) => n,
        (None, Some(pdf)) => PopplerRasterizer::default()
            .page_count(pdf)
            .with_context(|| format!("reading '{}'", pdf.display()))?,
        (None, None) => anyhow::bail!("pass --pages or --pdf"),
    };
    let duration = match (args.duration, &args.video) {
        (Some(d), _) => d,
        (None, Some(video)) => FfprobeDurationProber
            .probe_duration(video)
            .with_context(|| format!("probing '{}'", video.display()))?,
        (None, None) => anyhow::bail!("pass --duration or --video"),
    };

    let schedule = slidecast::uniform_schedule(pages, duration);
    if schedule.is_empty() {
        anyhow::bail!("schedule not computable: pages={pages}, duration={duration}");
    }
    println!("{}", serde_json::to_string_pretty(&schedule)?);
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let collabs = Collaborators {
        rasterizer: Box::new(PopplerRasterizer::default()),
        exporter: Box::new(PngFrameExporter),
        prober: Box::new(FfprobeDurationProber),
        workspace: Box::new(TempWorkspace),
        assembler: Box::new(FfmpegSlideAssembler {
            fps: args.fps,
            width: args.width,
            height: args.height,
        }),
        compositor: Box::new(FfmpegCompositor),
    };

    let mut orchestrator = Orchestrator::new(collabs);
    orchestrator
        .select_document(&args.pdf)
        .with_context(|| format!("reading '{}'", args.pdf.display()))?;
    orchestrator.select_narration(&args.video);
    orchestrator
        .begin_editing()
        .context("sources incomplete")?;

    if let Some(timings_path) = &args.timings {
        let bytes = std::fs::read(timings_path)
            .with_context(|| format!("reading '{}'", timings_path.display()))?;
        let schedule: Schedule = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing '{}'", timings_path.display()))?;
        orchestrator
            .replace_schedule(schedule)
            .context("operator timings rejected")?;
    }

    let settings = RenderSettings {
        overlay_position: args.position,
        overlay_relative_width: args.overlay_width,
        overlay_source: args.overlay,
        quality: args.quality,
        fps: args.fps,
        output_width: args.width,
        output_height: args.height,
        output_dir: args.out_dir,
        output_base_name: args.name,
        output_extension: args.ext,
        raw_output_path: args.out,
        fallback_tail_seconds: args.tail,
        ..RenderSettings::default()
    };

    let bar = ProgressBar::hidden();
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .expect("static progress template"),
    );
    let mut observe = |p: slidecast::Progress| {
        if bar.is_hidden() && p.total_units > 0 {
            bar.set_length(u64::from(p.total_units));
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        bar.set_position(u64::from(p.completed_units));
    };

    match orchestrator.render(&settings, &mut observe) {
        Ok(output) => {
            bar.finish_and_clear();
            println!("{output}");
            Ok(())
        }
        Err(err) => {
            bar.abandon_with_message("failed");
            let progress = orchestrator.progress();
            anyhow::bail!(
                "{err} (completed {}/{} units)",
                progress.completed_units,
                progress.total_units
            );
        }
    }
}

fn cmd_ffmpeg_path(args: FfmpegPathArgs) -> anyhow::Result<()> {
    match args.action {
        FfmpegPathAction::Get => {
            match slidecast::config::get_ffmpeg_path_configured() {
                Some(path) => println!("{path}"),
                None => println!("(not configured; using '{}')", slidecast::ffmpeg::ffmpeg_path()),
            }
            Ok(())
        }
        FfmpegPathAction::Set { path } => {
            slidecast::config::set_ffmpeg_path_configured(Some(path))?;
            Ok(())
        }
        FfmpegPathAction::Clear => {
            slidecast::config::set_ffmpeg_path_configured(None)?;
            Ok(())
        }
    }
}
