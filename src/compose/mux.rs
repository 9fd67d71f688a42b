use std::path::{Path, PathBuf};

use crate::assets::process::Deadline;
use crate::audio::align::AlignedAudio;
use crate::compose::backend::{Caption, MediaBackend, SegmentRender, VisualSource};
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ComposeError, ComposeResult};
use crate::scene::model::{SegmentKind, VisualAsset};

/// One segment's visual muxed with its aligned audio.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedScene {
    /// Segment identity.
    pub segment: SegmentKind,
    /// Muxed clip.
    pub path: PathBuf,
    /// Exact length in output frames.
    pub frames: u64,
    /// Output frame rate.
    pub fps: Fps,
    /// Aligned audio carried by the clip.
    pub audio: AlignedAudio,
    /// Source reference for the manifest.
    pub source_reference: Option<String>,
    /// `true` when the segment is a blank placeholder.
    pub degraded: bool,
}

impl ComposedScene {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.frames)
    }
}

/// Muxes a visual with its aligned audio into a normalized scene clip.
pub struct SceneMuxer<'a> {
    backend: &'a dyn MediaBackend,
    fps: Fps,
    canvas: Canvas,
    tolerance_secs: f64,
}

impl<'a> SceneMuxer<'a> {
    /// Create a muxer emitting clips on the `fps` grid at `canvas` size.
    pub fn new(backend: &'a dyn MediaBackend, fps: Fps, canvas: Canvas, tolerance_secs: f64) -> Self {
        Self {
            backend,
            fps,
            canvas,
            tolerance_secs,
        }
    }

    /// Mux `visual` with `audio`, optionally burning `caption` in.
    ///
    /// The clip keeps exactly `visual.frames` frames; audio never stretches video.
    pub fn mux(
        &self,
        visual: &VisualAsset,
        audio: &AlignedAudio,
        caption: Option<&Caption>,
        out_path: &Path,
        deadline: Deadline,
    ) -> ComposeResult<ComposedScene> {
        let source = VisualSource::from_kind(visual.kind, visual.path.clone());
        self.mux_source(visual.segment, source, visual.frames, audio, caption, out_path, deadline)
    }

    /// Blank placeholder of `frames` frames carrying `audio`.
    pub fn mux_placeholder(
        &self,
        segment: SegmentKind,
        frames: u64,
        audio: &AlignedAudio,
        out_path: &Path,
        deadline: Deadline,
    ) -> ComposeResult<ComposedScene> {
        let mut scene = self.mux_source(
            segment,
            VisualSource::Blank,
            frames,
            audio,
            None,
            out_path,
            deadline,
        )?;
        scene.degraded = true;
        Ok(scene)
    }

    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(level = "debug", skip_all, fields(scene = %segment, frames))]
    fn mux_source(
        &self,
        segment: SegmentKind,
        visual: VisualSource,
        frames: u64,
        audio: &AlignedAudio,
        caption: Option<&Caption>,
        out_path: &Path,
        deadline: Deadline,
    ) -> ComposeResult<ComposedScene> {
        if frames == 0 {
            return Err(ComposeError::InvalidDuration {
                segment,
                duration: 0.0,
            });
        }
        let visual_secs = self.fps.frames_to_secs(frames);
        let drift = (audio.duration_secs() - visual_secs).abs();
        if drift > self.tolerance_secs {
            return Err(ComposeError::validation(format!(
                "{segment}: aligned audio is {:.4} s but the visual is {visual_secs:.4} s",
                audio.duration_secs()
            )));
        }

        let input = visual.path().map(Path::to_path_buf);
        let caption = caption.filter(|c| !c.text.trim().is_empty()).cloned();
        let job = SegmentRender {
            segment,
            visual,
            frames,
            fps: self.fps,
            canvas: self.canvas,
            audio: audio.pcm.clone(),
            caption,
            out_path: out_path.to_path_buf(),
        };
        self.backend
            .render_segment(&job, deadline)
            .map_err(|e| ComposeError::for_segment(segment, input.clone(), deadline.limit(), e))?;

        let info = self
            .backend
            .probe(out_path, deadline)
            .map_err(|e| ComposeError::for_segment(segment, input.clone(), deadline.limit(), e))?;
        let rendered = info.video_frames(self.fps).unwrap_or(0);
        if rendered != frames {
            return Err(ComposeError::asset_decode(
                segment,
                input,
                format!("muxed clip has {rendered} frames, expected {frames}"),
            ));
        }
        if info.audio.is_none() {
            return Err(ComposeError::asset_decode(
                segment,
                input,
                "muxed clip has no audio track",
            ));
        }

        tracing::debug!(scene = %segment, frames, path = %out_path.display(), "muxed");
        Ok(ComposedScene {
            segment,
            path: out_path.to_path_buf(),
            frames,
            fps: self.fps,
            audio: audio.clone(),
            source_reference: None,
            degraded: false,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/mux.rs"]
mod tests;
