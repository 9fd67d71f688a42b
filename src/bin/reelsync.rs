use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reelsync", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a job into one MP4 (requires `ffmpeg` and `ffprobe` on PATH).
    Compose(ComposeArgs),
    /// Print probed media properties as JSON.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Job JSON with `scenes`, `visuals` and `audios`.
    #[arg(long)]
    job: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Composition config JSON; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the scene timing manifest here.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Per-scene failure policy: `abort` or `degrade`.
    #[arg(long)]
    policy: Option<reelsync::FailurePolicy>,

    /// Output frame rate (integer).
    #[arg(long)]
    fps: Option<u32>,

    /// Output canvas as WxH.
    #[arg(long)]
    size: Option<reelsync::Canvas>,

    /// Scenes composed concurrently.
    #[arg(long)]
    jobs: Option<usize>,

    /// Per-scene time limit in seconds.
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Disable captions and the citation footer.
    #[arg(long)]
    no_overlay: bool,

    /// Opening visual.
    #[arg(long)]
    intro: Option<PathBuf>,

    /// Closing visual.
    #[arg(long)]
    outro: Option<PathBuf>,

    /// Directory for intermediates.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Keep intermediates after success.
    #[arg(long)]
    keep_work: bool,

    /// Refuse to replace an existing output file.
    #[arg(long)]
    no_overwrite: bool,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Media file to probe.
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "reelsync=info,warn",
        1 => "reelsync=debug,info",
        _ => "reelsync=trace,debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &ComposeArgs) -> anyhow::Result<reelsync::ComposeConfig> {
    let mut cfg = match &args.config {
        Some(path) => reelsync::ComposeConfig::from_json_file(path)?,
        None => reelsync::ComposeConfig::default(),
    };
    if let Some(policy) = args.policy {
        cfg.failure_policy = policy;
    }
    if let Some(fps) = args.fps {
        cfg.fps = reelsync::Fps::new(fps, 1)?;
    }
    if let Some(size) = args.size {
        cfg.canvas = size;
    }
    if let Some(jobs) = args.jobs {
        cfg.concurrency = Some(jobs);
    }
    if let Some(secs) = args.timeout_secs {
        cfg.scene_timeout_secs = Some(secs);
    }
    if args.no_overlay {
        cfg.overlay.enabled = false;
    }
    if args.intro.is_some() {
        cfg.intro = args.intro.clone();
    }
    if args.outro.is_some() {
        cfg.outro = args.outro.clone();
    }
    if args.work_dir.is_some() {
        cfg.work_dir = args.work_dir.clone();
    }
    cfg.keep_intermediates |= args.keep_work;
    if args.no_overwrite {
        cfg.overwrite = false;
    }
    Ok(cfg)
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args)?;
    let job = reelsync::ComposeJob::from_json_file(&args.job)?;

    let pipeline = reelsync::CompositionPipeline::with_ffmpeg(cfg)?;
    let output = pipeline
        .compose_job(&job, &args.out)
        .with_context(|| format!("compose '{}'", args.job.display()))?;

    if let Some(path) = &args.manifest {
        output.manifest.write_json(path)?;
        eprintln!("wrote {}", path.display());
    }
    for r in output.reports.iter().filter(|r| r.degraded.is_some()) {
        eprintln!(
            "degraded {}: {}",
            r.segment,
            r.degraded.as_deref().unwrap_or_default()
        );
    }
    if let Some(dir) = &output.work_dir {
        eprintln!("kept intermediates in {}", dir.display());
    }
    eprintln!(
        "wrote {} ({:.3} s)",
        output.path.display(),
        output.duration_secs
    );
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = probe(&args.path)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn probe(path: &Path) -> anyhow::Result<reelsync::MediaInfo> {
    reelsync::probe_media(path, reelsync::Deadline::none())
        .with_context(|| format!("probe '{}'", path.display()))
}
