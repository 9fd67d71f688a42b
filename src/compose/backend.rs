use std::path::{Path, PathBuf};

use crate::assets::media::{AudioPcm, MediaInfo, classify_visual};
use crate::assets::process::Deadline;
use crate::audio::pcm::PcmFile;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::MediaResult;
use crate::scene::model::{SegmentKind, VisualKind};

/// Where a segment's pictures come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisualSource {
    /// Playable clip; frames beyond its end repeat the last frame.
    Clip(PathBuf),
    /// Still image held for the whole segment.
    Still(PathBuf),
    /// Solid black placeholder.
    Blank,
}

impl VisualSource {
    /// Build a source from a classified path.
    pub fn from_kind(kind: VisualKind, path: PathBuf) -> Self {
        match kind {
            VisualKind::Clip => Self::Clip(path),
            VisualKind::Still => Self::Still(path),
        }
    }

    /// Input file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Clip(p) | Self::Still(p) => Some(p),
            Self::Blank => None,
        }
    }
}

/// Burned-in caption text and styling.
#[derive(Clone, Debug, PartialEq)]
pub struct Caption {
    /// Text, already wrapped into lines.
    pub text: String,
    /// Font size in pixels.
    pub font_size: u32,
    /// Distance from the bottom edge in pixels.
    pub margin_px: u32,
    /// Opacity of the backing box, 0..=1.
    pub box_opacity: f32,
    /// Font file; `None` uses the tool's default font.
    pub font_file: Option<PathBuf>,
}

/// Everything needed to produce one normalized segment clip.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentRender {
    /// Segment being rendered.
    pub segment: SegmentKind,
    /// Picture source.
    pub visual: VisualSource,
    /// Exact number of output frames.
    pub frames: u64,
    /// Output frame rate.
    pub fps: Fps,
    /// Output canvas.
    pub canvas: Canvas,
    /// Aligned audio, exactly as long as the frames.
    pub audio: PcmFile,
    /// Optional burned-in caption.
    pub caption: Option<Caption>,
    /// Output clip path.
    pub out_path: PathBuf,
}

/// Media operations used by composition. Every call is bounded by a [`Deadline`].
///
/// [`FfmpegBackend`](crate::FfmpegBackend) drives the system `ffmpeg`/`ffprobe`; tests can supply
/// an in-process implementation.
pub trait MediaBackend: Send + Sync {
    /// Probe container and stream properties.
    fn probe(&self, path: &Path, deadline: Deadline) -> MediaResult<MediaInfo>;

    /// Decide whether a visual input is a still or a clip.
    fn classify(&self, path: &Path) -> MediaResult<VisualKind> {
        classify_visual(path)
    }

    /// Decode the first audio stream to interleaved stereo f32 at `sample_rate`.
    fn decode_audio(&self, path: &Path, sample_rate: u32, deadline: Deadline)
    -> MediaResult<AudioPcm>;

    /// Normalize one visual to the canvas and frame grid, attach its audio, and emit exactly
    /// `job.frames` frames.
    fn render_segment(&self, job: &SegmentRender, deadline: Deadline) -> MediaResult<()>;

    /// Join homogeneous video tracks without re-encoding. The output carries no audio.
    fn concat_video(&self, inputs: &[PathBuf], out: &Path, deadline: Deadline) -> MediaResult<()>;

    /// Replace the audio of `video` with raw PCM.
    fn attach_audio(
        &self,
        video: &Path,
        audio: &PcmFile,
        out: &Path,
        deadline: Deadline,
    ) -> MediaResult<()>;

    /// Re-encode `input` with a caption burned in, copying its audio.
    fn burn_caption(
        &self,
        input: &Path,
        caption: &Caption,
        out: &Path,
        deadline: Deadline,
    ) -> MediaResult<()>;
}

impl<T: MediaBackend + ?Sized> MediaBackend for std::sync::Arc<T> {
    fn probe(&self, path: &Path, deadline: Deadline) -> MediaResult<MediaInfo> {
        (**self).probe(path, deadline)
    }

    fn classify(&self, path: &Path) -> MediaResult<VisualKind> {
        (**self).classify(path)
    }

    fn decode_audio(
        &self,
        path: &Path,
        sample_rate: u32,
        deadline: Deadline,
    ) -> MediaResult<AudioPcm> {
        (**self).decode_audio(path, sample_rate, deadline)
    }

    fn render_segment(&self, job: &SegmentRender, deadline: Deadline) -> MediaResult<()> {
        (**self).render_segment(job, deadline)
    }

    fn concat_video(&self, inputs: &[PathBuf], out: &Path, deadline: Deadline) -> MediaResult<()> {
        (**self).concat_video(inputs, out, deadline)
    }

    fn attach_audio(
        &self,
        video: &Path,
        audio: &PcmFile,
        out: &Path,
        deadline: Deadline,
    ) -> MediaResult<()> {
        (**self).attach_audio(video, audio, out, deadline)
    }

    fn burn_caption(
        &self,
        input: &Path,
        caption: &Caption,
        out: &Path,
        deadline: Deadline,
    ) -> MediaResult<()> {
        (**self).burn_caption(input, caption, out, deadline)
    }
}
