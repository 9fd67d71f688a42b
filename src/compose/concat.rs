use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::assets::process::Deadline;
use crate::audio::pcm::{PcmFile, concat_pcm, fit_to_sample_frames, frame_to_sample};
use crate::compose::backend::MediaBackend;
use crate::compose::mux::ComposedScene;
use crate::foundation::core::{Fps, FrameIndex, FrameRange};
use crate::foundation::error::{ComposeError, ComposeResult};
use crate::scene::model::SegmentKind;

/// One segment's place in the timeline.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimelineSegment {
    /// Segment identity.
    pub segment: SegmentKind,
    /// Frames covered by the segment.
    pub range: FrameRange,
    /// Source reference for the manifest.
    pub source_reference: Option<String>,
    /// `true` for placeholder segments.
    pub degraded: bool,
}

/// Back-to-back layout of segments on the frame grid.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimelinePlan {
    /// Frame rate of every range.
    pub fps: Fps,
    /// Segments in playback order.
    pub segments: Vec<TimelineSegment>,
}

impl TimelinePlan {
    /// An empty plan.
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            segments: Vec::new(),
        }
    }

    /// Plan `scenes` in the given order. Duplicate segments are rejected.
    pub fn from_scenes(fps: Fps, scenes: &[ComposedScene]) -> ComposeResult<Self> {
        let mut plan = Self::new(fps);
        for s in scenes {
            if s.fps != fps {
                return Err(ComposeError::validation(format!(
                    "{} is at {} fps, timeline is at {}",
                    s.segment,
                    s.fps.to_ffmpeg_rate(),
                    fps.to_ffmpeg_rate()
                )));
            }
            plan.push(s.segment, s.frames, s.source_reference.clone(), s.degraded);
        }
        plan.check_unique()?;
        Ok(plan)
    }

    /// Append a segment of `frames` frames.
    pub fn push(
        &mut self,
        segment: SegmentKind,
        frames: u64,
        source_reference: Option<String>,
        degraded: bool,
    ) {
        let start = self.total_frames();
        self.segments.push(TimelineSegment {
            segment,
            range: FrameRange {
                start: FrameIndex(start),
                end: FrameIndex(start + frames),
            },
            source_reference,
            degraded,
        });
    }

    /// Append `suffix` after this plan, shifting its ranges.
    pub fn then(mut self, suffix: TimelinePlan) -> ComposeResult<Self> {
        if suffix.fps != self.fps {
            return Err(ComposeError::validation(
                "cannot join timeline plans with different frame rates",
            ));
        }
        let offset = self.total_frames();
        self.segments
            .extend(suffix.segments.into_iter().map(|mut s| {
                s.range = s.range.shift(offset);
                s
            }));
        self.check_unique()?;
        Ok(self)
    }

    /// Total length in frames.
    pub fn total_frames(&self) -> u64 {
        self.segments.last().map_or(0, |s| s.range.end.0)
    }

    /// Total length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.total_frames())
    }

    /// Segment identities in playback order.
    pub fn order(&self) -> Vec<SegmentKind> {
        self.segments.iter().map(|s| s.segment).collect()
    }

    fn check_unique(&self) -> ComposeResult<()> {
        let mut seen = BTreeSet::new();
        for s in &self.segments {
            if !seen.insert(s.segment) {
                return Err(ComposeError::validation(format!(
                    "{} appears more than once in the timeline",
                    s.segment
                )));
            }
        }
        Ok(())
    }
}

/// Concatenated video with its rebuilt audio track.
#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    /// Timeline video with audio.
    pub path: PathBuf,
    /// Segment layout.
    pub plan: TimelinePlan,
    /// Full audio track, sample-for-sample the per-segment aligned tracks back to back.
    pub audio: PcmFile,
}

impl Timeline {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.plan.duration_secs()
    }
}

/// Joins composed scenes into one timeline.
pub struct SequenceConcatenator<'a> {
    backend: &'a dyn MediaBackend,
    tolerance_secs: f64,
}

impl<'a> SequenceConcatenator<'a> {
    /// Create a concatenator accepting up to `tolerance_secs` of duration drift.
    pub fn new(backend: &'a dyn MediaBackend, tolerance_secs: f64) -> Self {
        Self {
            backend,
            tolerance_secs,
        }
    }

    /// Join `scenes` strictly in the given order, writing intermediates into `work_dir`.
    ///
    /// Video is stream-copied; audio is rebuilt from the per-scene aligned tracks, fitted to the
    /// joined video's measured length, and attached as a final pass.
    #[tracing::instrument(level = "info", skip_all, fields(segments = scenes.len()))]
    pub fn concatenate(
        &self,
        scenes: &[ComposedScene],
        work_dir: &Path,
        deadline: Deadline,
    ) -> ComposeResult<Timeline> {
        let Some(first) = scenes.first() else {
            return Err(ComposeError::EmptySequence);
        };
        let fps = first.fps;
        let plan = TimelinePlan::from_scenes(fps, scenes)?;

        let inputs: Vec<PathBuf> = scenes.iter().map(|s| s.path.clone()).collect();
        let video_only = work_dir.join("timeline_video.mp4");
        self.backend.concat_video(&inputs, &video_only, deadline)?;

        let expected = plan.total_frames();
        let actual = self
            .backend
            .probe(&video_only, deadline)?
            .video_frames(fps)
            .unwrap_or(0);
        self.check_drift(fps, expected, actual)?;
        tracing::debug!(expected, actual, "video concatenated");

        let parts = scenes
            .iter()
            .map(|s| {
                s.audio
                    .pcm
                    .read()
                    .map_err(|e| ComposeError::for_segment(s.segment, None, None, e))
            })
            .collect::<ComposeResult<Vec<_>>>()?;
        let mut joined = concat_pcm(&parts)?;
        let target = frame_to_sample(actual, fps, joined.sample_rate);
        if joined.sample_frames() != target {
            tracing::debug!(
                have = joined.sample_frames(),
                target,
                "fitting rebuilt audio to video length"
            );
        }
        fit_to_sample_frames(&mut joined, target);
        let audio = PcmFile::write(&joined, &work_dir.join("timeline_audio.f32le"))?;

        let path = work_dir.join("timeline.mp4");
        self.backend
            .attach_audio(&video_only, &audio, &path, deadline)?;
        tracing::info!(
            frames = actual,
            secs = fps.frames_to_secs(actual),
            "timeline assembled"
        );

        Ok(Timeline { path, plan, audio })
    }

    fn check_drift(&self, fps: Fps, expected: u64, actual: u64) -> ComposeResult<()> {
        let expected_secs = fps.frames_to_secs(expected);
        let actual_secs = fps.frames_to_secs(actual);
        if (actual_secs - expected_secs).abs() > self.tolerance_secs + 1e-9 {
            return Err(ComposeError::ConcatenationDrift {
                expected_secs,
                actual_secs,
                tolerance_secs: self.tolerance_secs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/concat.rs"]
mod tests;
