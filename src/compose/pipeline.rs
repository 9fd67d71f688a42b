use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::assets::media::MIX_CHANNELS;
use crate::assets::process::Deadline;
use crate::audio::align::{AlignAction, AlignedAudio, DurationAligner};
use crate::compose::backend::{Caption, MediaBackend};
use crate::compose::cancel::CancelToken;
use crate::compose::concat::SequenceConcatenator;
use crate::compose::config::{ComposeConfig, FailurePolicy};
use crate::compose::mux::{ComposedScene, SceneMuxer};
use crate::compose::overlay::{OverlayLayer, citation_text};
use crate::encode::ffmpeg::{FfmpegBackend, ensure_parent_dir};
use crate::foundation::error::{ComposeError, ComposeResult, MediaError};
use crate::scene::job::{ComposeJob, pair_assets};
use crate::scene::manifest::Manifest;
use crate::scene::model::{
    AssetPair, AssetRef, AudioAsset, Scene, SegmentKind, VisualAsset, VisualKind,
};

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Lifecycle of one segment through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneState {
    /// Not started.
    Pending,
    /// Audio aligned to the visual length.
    Aligned,
    /// Muxed into a scene clip.
    Muxed,
    /// Replaced by a blank, silent placeholder.
    Degraded,
    /// Part of the concatenated timeline.
    Concatenated,
    /// Published in the final video.
    Finalized,
}

/// Outcome of one segment.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneReport {
    /// Segment identity.
    pub segment: SegmentKind,
    /// Last state reached.
    pub state: SceneState,
    /// What the aligner did, when alignment ran.
    pub align_action: Option<AlignAction>,
    /// Why the segment was degraded, if it was.
    pub degraded: Option<String>,
}

/// Result of a successful composition.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositionOutput {
    /// Published video.
    pub path: PathBuf,
    /// Total duration in seconds.
    pub duration_secs: f64,
    /// Per-scene timing.
    pub manifest: Manifest,
    /// Per-segment reports in timeline order.
    pub reports: Vec<SceneReport>,
    /// Kept working directory, when intermediates were kept.
    pub work_dir: Option<PathBuf>,
}

enum SceneOutcome {
    Done(ComposedScene, SceneReport),
    Failed(ComposeError),
    Skipped,
}

/// Orchestrates alignment, muxing, concatenation, overlay and publishing.
pub struct CompositionPipeline {
    cfg: ComposeConfig,
    backend: Box<dyn MediaBackend>,
    cancel: CancelToken,
}

impl std::fmt::Debug for CompositionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionPipeline")
            .field("cfg", &self.cfg)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl CompositionPipeline {
    /// Create a pipeline over `backend`. The configuration is validated here and frozen.
    pub fn new(cfg: ComposeConfig, backend: impl MediaBackend + 'static) -> ComposeResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            backend: Box::new(backend),
            cancel: CancelToken::new(),
        })
    }

    /// Create a pipeline driving the system `ffmpeg`.
    pub fn with_ffmpeg(cfg: ComposeConfig) -> ComposeResult<Self> {
        let backend = FfmpegBackend::new(cfg.encode.clone());
        Self::new(cfg, backend)
    }

    /// Use `token` for cancellation instead of the pipeline's own.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this pipeline's compositions.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Frozen configuration.
    pub fn config(&self) -> &ComposeConfig {
        &self.cfg
    }

    /// Compose a loaded job into `out`.
    pub fn compose_job(&self, job: &ComposeJob, out: &Path) -> ComposeResult<CompositionOutput> {
        self.compose(&job.scenes, &job.visuals, &job.audios, out)
    }

    /// Compose three parallel collections into one video at `out`.
    ///
    /// Either a complete, duration-consistent video is published at `out`, or an error is returned
    /// and `out` is left untouched. Intermediates are kept after a failure.
    #[tracing::instrument(level = "info", skip_all, fields(out = %out.display(), scenes = scenes.len()))]
    pub fn compose(
        &self,
        scenes: &[Scene],
        visuals: &[AssetRef],
        audios: &[Option<AssetRef>],
        out: &Path,
    ) -> ComposeResult<CompositionOutput> {
        if !self.cfg.overwrite && out.exists() {
            return Err(ComposeError::validation(format!(
                "output file '{}' already exists",
                out.display()
            )));
        }
        let pairs = pair_assets(scenes, visuals, audios)?;
        self.cancel.checkpoint()?;

        let work = WorkDir::prepare(self.cfg.work_dir.as_deref())?;
        tracing::info!(work_dir = %work.path.display(), "composition started");

        match self.run(&pairs, scenes, &work.path, out) {
            Ok(mut output) => {
                if self.cfg.keep_intermediates {
                    output.work_dir = Some(work.path.clone());
                } else {
                    work.cleanup();
                }
                Ok(output)
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    work_dir = %work.path.display(),
                    "composition failed; intermediates kept"
                );
                Err(err)
            }
        }
    }

    fn run(
        &self,
        pairs: &[AssetPair],
        scenes: &[Scene],
        work: &Path,
        out: &Path,
    ) -> ComposeResult<CompositionOutput> {
        let cfg = &self.cfg;
        let backend = self.backend.as_ref();
        let aligner = DurationAligner::new(cfg.sample_rate, MIX_CHANNELS)?;
        let muxer = SceneMuxer::new(backend, cfg.fps, cfg.canvas, cfg.tolerance_secs());
        let overlay = OverlayLayer::new(cfg.overlay.clone(), cfg.canvas);
        let citation = citation_text(scenes);
        let footer = overlay.footer(&citation);

        let pool = build_thread_pool(cfg.concurrency)?;
        let stop = AtomicBool::new(false);
        let ctx = SceneCtx {
            aligner: &aligner,
            muxer: &muxer,
            work,
        };
        let outcomes: Vec<SceneOutcome> = pool.install(|| {
            pairs
                .par_iter()
                .map(|pair| {
                    let caption = overlay.scene_caption(&pair.scene, footer.as_ref());
                    self.compose_scene(&ctx, pair, caption.as_ref(), &stop)
                })
                .collect()
        });

        self.cancel.checkpoint()?;
        let mut composed = Vec::with_capacity(outcomes.len());
        let mut reports = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                SceneOutcome::Done(scene, report) => {
                    composed.push(scene);
                    reports.push(report);
                }
                SceneOutcome::Failed(err) => failures.push(err),
                SceneOutcome::Skipped => {}
            }
        }
        if let Some(err) = first_failure(failures) {
            return Err(err);
        }

        for (kind, path) in [(SegmentKind::Intro, &cfg.intro), (SegmentKind::Outro, &cfg.outro)] {
            let Some(path) = path else { continue };
            self.cancel.checkpoint()?;
            match self.compose_bookend(&ctx, kind, path) {
                Ok((scene, report)) => {
                    composed.push(scene);
                    reports.push(report);
                }
                Err(err) if cfg.failure_policy == FailurePolicy::Degrade && err.is_recoverable() => {
                    tracing::warn!(segment = %kind, error = %err, "dropping bookend");
                }
                Err(err) => return Err(err),
            }
        }

        composed.sort_by_key(|s| s.segment);
        reports.sort_by_key(|r| r.segment);

        self.cancel.checkpoint()?;
        let finalize = Deadline::from_limit(cfg.finalize_timeout(composed.len()));
        let concatenator = SequenceConcatenator::new(backend, cfg.tolerance_secs());
        let mut timeline = concatenator
            .concatenate(&composed, work, finalize)
            .map_err(|e| finalize_error(e, finalize))?;
        for r in &mut reports {
            transition(r, SceneState::Concatenated);
        }

        if footer.is_some() {
            timeline = overlay
                .apply_overlay(
                    backend,
                    &timeline,
                    &citation,
                    &work.join("timeline_captioned.mp4"),
                    finalize,
                )
                .map_err(|e| finalize_error(e, finalize))?;
        }

        let manifest = Manifest::from_plan(&timeline.plan);
        self.cancel.checkpoint()?;
        publish(&timeline.path, out, cfg.overwrite)?;
        for r in &mut reports {
            transition(r, SceneState::Finalized);
        }

        let degraded = reports.iter().filter(|r| r.degraded.is_some()).count();
        tracing::info!(
            secs = timeline.duration_secs(),
            segments = reports.len(),
            degraded,
            path = %out.display(),
            "composition published"
        );
        Ok(CompositionOutput {
            path: out.to_path_buf(),
            duration_secs: timeline.duration_secs(),
            manifest,
            reports,
            work_dir: None,
        })
    }

    #[tracing::instrument(level = "info", skip_all, fields(scene = %pair.segment()))]
    fn compose_scene(
        &self,
        ctx: &SceneCtx<'_>,
        pair: &AssetPair,
        caption: Option<&Caption>,
        stop: &AtomicBool,
    ) -> SceneOutcome {
        if self.cancel.is_cancelled() || stop.load(Ordering::SeqCst) {
            return SceneOutcome::Skipped;
        }
        let segment = pair.segment();
        let mut report = SceneReport {
            segment,
            state: SceneState::Pending,
            align_action: None,
            degraded: None,
        };

        let deadline = Deadline::from_limit(self.cfg.scene_timeout());
        let result = self.compose_asset(ctx, pair, caption, &mut report, deadline);
        let outcome = match result {
            Ok(scene) => SceneOutcome::Done(scene, report),
            Err(err) if self.cfg.failure_policy == FailurePolicy::Degrade && err.is_recoverable() => {
                tracing::warn!(scene = %segment, error = %err, "scene degraded to placeholder");
                match self.placeholder(ctx, &pair.scene) {
                    Ok(scene) => {
                        report.align_action = Some(AlignAction::Silent);
                        report.degraded = Some(err.to_string());
                        transition(&mut report, SceneState::Degraded);
                        SceneOutcome::Done(scene, report)
                    }
                    Err(placeholder_err) => {
                        stop.store(true, Ordering::SeqCst);
                        SceneOutcome::Failed(placeholder_err)
                    }
                }
            }
            Err(err) => {
                tracing::error!(scene = %segment, error = %err, "scene failed");
                stop.store(true, Ordering::SeqCst);
                SceneOutcome::Failed(err)
            }
        };

        if self.cancel.is_cancelled() {
            tracing::debug!(scene = %segment, "cancelled after scene");
            stop.store(true, Ordering::SeqCst);
        }
        outcome
    }

    fn compose_asset(
        &self,
        ctx: &SceneCtx<'_>,
        pair: &AssetPair,
        caption: Option<&Caption>,
        report: &mut SceneReport,
        deadline: Deadline,
    ) -> ComposeResult<ComposedScene> {
        let scene = &pair.scene;
        let segment = pair.segment();
        let visual = self.resolve_visual(segment, &pair.visual, scene.target_duration, deadline)?;

        let stem = segment.file_stem();
        let target = ctx.aligner.target_for_frames(visual.frames, self.cfg.fps);
        let aligned = ctx.aligner.align_to(
            self.backend.as_ref(),
            &pair.audio,
            &scene.narration_text,
            target,
            &ctx.work.join(format!("{stem}.f32le")),
            deadline,
        )?;
        report.align_action = Some(aligned.action);
        transition(report, SceneState::Aligned);

        let mut composed = ctx.muxer.mux(
            &visual,
            &aligned,
            caption,
            &ctx.work.join(format!("{stem}.mp4")),
            deadline,
        )?;
        composed.source_reference = scene.source_label().map(str::to_string);
        transition(report, SceneState::Muxed);
        Ok(composed)
    }

    fn placeholder(&self, ctx: &SceneCtx<'_>, scene: &Scene) -> ComposeResult<ComposedScene> {
        let segment = scene.segment();
        let frames = self.cfg.fps.quantize_secs(scene.target_duration);
        let stem = segment.file_stem();
        let deadline = Deadline::from_limit(self.cfg.scene_timeout());
        let silent = self.silent_audio(ctx, segment, frames, &stem)?;
        let mut composed = ctx.muxer.mux_placeholder(
            segment,
            frames,
            &silent,
            &ctx.work.join(format!("{stem}.placeholder.mp4")),
            deadline,
        )?;
        composed.source_reference = scene.source_label().map(str::to_string);
        Ok(composed)
    }

    fn silent_audio(
        &self,
        ctx: &SceneCtx<'_>,
        segment: SegmentKind,
        frames: u64,
        stem: &str,
    ) -> ComposeResult<AlignedAudio> {
        ctx.aligner.align_to(
            self.backend.as_ref(),
            &AudioAsset {
                segment,
                path: None,
            },
            "",
            ctx.aligner.target_for_frames(frames, self.cfg.fps),
            &ctx.work.join(format!("{stem}.silence.f32le")),
            Deadline::none(),
        )
    }

    #[tracing::instrument(level = "info", skip_all, fields(segment = %kind))]
    fn compose_bookend(
        &self,
        ctx: &SceneCtx<'_>,
        kind: SegmentKind,
        path: &Path,
    ) -> ComposeResult<(ComposedScene, SceneReport)> {
        let deadline = Deadline::from_limit(self.cfg.scene_timeout());
        let visual = self.resolve_visual(kind, path, self.cfg.bookend_secs, deadline)?;
        let stem = kind.file_stem();
        let target = ctx.aligner.target_for_frames(visual.frames, self.cfg.fps);
        // Clips bring their own sound; stills and silent clips get silence.
        let audio = AudioAsset {
            segment: kind,
            path: (visual.kind == VisualKind::Clip).then(|| path.to_path_buf()),
        };
        let aligned = ctx.aligner.align_to(
            self.backend.as_ref(),
            &audio,
            "",
            target,
            &ctx.work.join(format!("{stem}.f32le")),
            deadline,
        )?;
        let composed = ctx.muxer.mux(
            &visual,
            &aligned,
            None,
            &ctx.work.join(format!("{stem}.mp4")),
            deadline,
        )?;
        let report = SceneReport {
            segment: kind,
            state: SceneState::Muxed,
            align_action: Some(aligned.action),
            degraded: None,
        };
        Ok((composed, report))
    }

    /// Classify a visual and quantize its duration onto the output frame grid.
    fn resolve_visual(
        &self,
        segment: SegmentKind,
        path: &Path,
        still_secs: f64,
        deadline: Deadline,
    ) -> ComposeResult<VisualAsset> {
        let fps = self.cfg.fps;
        let for_segment =
            |e| ComposeError::for_segment(segment, Some(path.to_path_buf()), deadline.limit(), e);
        let kind = self.backend.classify(path).map_err(for_segment)?;
        let frames = match kind {
            VisualKind::Still => fps.quantize_secs(still_secs),
            VisualKind::Clip => {
                let info = self.backend.probe(path, deadline).map_err(for_segment)?;
                // Source clips may run at any rate; only their duration carries over.
                info.video_secs().map(|secs| fps.quantize_secs(secs)).ok_or_else(|| {
                    ComposeError::asset_decode(
                        segment,
                        Some(path.to_path_buf()),
                        "no video stream with a positive duration",
                    )
                })?
            }
        };
        tracing::debug!(scene = %segment, ?kind, frames, "visual resolved");
        Ok(VisualAsset {
            segment,
            path: path.to_path_buf(),
            kind,
            frames,
        })
    }
}

struct SceneCtx<'a> {
    aligner: &'a DurationAligner,
    muxer: &'a SceneMuxer<'a>,
    work: &'a Path,
}

fn transition(report: &mut SceneReport, next: SceneState) {
    tracing::debug!(segment = %report.segment, from = ?report.state, to = ?next, "state");
    report.state = next;
}

/// Timeouts while finalizing are fatal and name the finalize limit.
fn finalize_error(err: ComposeError, deadline: Deadline) -> ComposeError {
    match err {
        ComposeError::Media(MediaError::TimedOut { elapsed, .. }) => {
            ComposeError::FinalizeTimeout {
                limit: deadline.limit().unwrap_or(elapsed),
            }
        }
        other => other,
    }
}

/// Deterministic pick among concurrent failures: the error naming the earliest segment wins,
/// structural errors before per-segment ones.
fn first_failure(failures: Vec<ComposeError>) -> Option<ComposeError> {
    failures.into_iter().min_by_key(|e| match e.segment() {
        None => (0, SegmentKind::Intro),
        Some(s) => (1, s),
    })
}

fn build_thread_pool(threads: Option<usize>) -> ComposeResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ComposeError::validation(
            "concurrency must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("reelsync-scene-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .context("failed to build rayon thread pool")
        .map_err(ComposeError::from)
}

/// Copy `src` next to `out` under a hidden name, then rename it into place.
fn publish(src: &Path, out: &Path, overwrite: bool) -> ComposeResult<()> {
    if !overwrite && out.exists() {
        return Err(ComposeError::validation(format!(
            "output file '{}' already exists",
            out.display()
        )));
    }
    ensure_parent_dir(out)?;
    let name = out
        .file_name()
        .ok_or_else(|| ComposeError::validation(format!("invalid output path '{}'", out.display())))?;
    let partial = out.with_file_name(format!(".{}.partial", name.to_string_lossy()));

    let staged = std::fs::copy(src, &partial)
        .with_context(|| format!("stage output '{}'", partial.display()))
        .and_then(|_| {
            std::fs::rename(&partial, out)
                .with_context(|| format!("move output into place '{}'", out.display()))
        });
    if let Err(err) = staged {
        let _ = std::fs::remove_file(&partial);
        return Err(err.into());
    }
    Ok(())
}

struct WorkDir {
    path: PathBuf,
    owned: bool,
}

impl WorkDir {
    fn prepare(configured: Option<&Path>) -> ComposeResult<Self> {
        let (path, owned) = match configured {
            Some(dir) => {
                let fresh = match std::fs::read_dir(dir) {
                    Ok(mut entries) => entries.next().is_none(),
                    Err(_) => true,
                };
                (dir.to_path_buf(), fresh)
            }
            None => {
                let path = std::env::temp_dir().join(format!(
                    "reelsync_{}_{}_{}",
                    std::process::id(),
                    RUN_COUNTER.fetch_add(1, Ordering::Relaxed),
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_nanos())
                        .unwrap_or(0)
                ));
                (path, true)
            }
        };
        std::fs::create_dir_all(&path)
            .with_context(|| format!("create work dir '{}'", path.display()))?;
        Ok(Self { path, owned })
    }

    fn cleanup(self) {
        if !self.owned {
            tracing::debug!(work_dir = %self.path.display(), "work dir was not empty; leaving it");
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(work_dir = %self.path.display(), error = %err, "failed to remove work dir");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/pipeline.rs"]
mod tests;
