//! Forces narration audio to an exact target length.
//!
//! Longer audio loses its tail, shorter audio gains trailing silence, and scenes whose narration
//! has nothing to pronounce get a fully silent track. The aligned track is always written as raw
//! `f32le` PCM in the aligner's layout.

use std::path::Path;

use crate::assets::media::AudioPcm;
use crate::assets::process::Deadline;
use crate::audio::pcm::{
    PcmFile, fit_to_sample_frames, frame_to_sample, secs_to_sample_frames, silent_pcm,
};
use crate::compose::backend::MediaBackend;
use crate::foundation::core::Fps;
use crate::foundation::error::{ComposeError, ComposeResult, MediaError};
use crate::scene::model::{AudioAsset, SegmentKind, is_unspeakable};

/// What the aligner did to reach the target length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum AlignAction {
    /// Native length already matched.
    Unchanged,
    /// Silence appended.
    Padded {
        /// Appended sample frames.
        sample_frames: u64,
    },
    /// Tail discarded.
    Trimmed {
        /// Discarded sample frames.
        sample_frames: u64,
    },
    /// No usable narration; the whole track is silence.
    Silent,
}

/// An audio track forced to an exact length.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedAudio {
    /// Owning segment.
    pub segment: SegmentKind,
    /// Aligned PCM on disk.
    pub pcm: PcmFile,
    /// Length of the source before alignment, in sample frames (0 when silent).
    pub native_sample_frames: u64,
    /// Action taken.
    pub action: AlignAction,
}

impl AlignedAudio {
    /// Aligned duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.pcm.duration_secs()
    }
}

/// Pads or trims narration to a target duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationAligner {
    sample_rate: u32,
    channels: u16,
}

impl DurationAligner {
    /// Create an aligner producing PCM at `sample_rate` with `channels` channels.
    pub fn new(sample_rate: u32, channels: u16) -> ComposeResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(ComposeError::validation(
                "aligner sample_rate and channels must be non-zero",
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Target length in sample frames for a duration in seconds.
    pub fn target_for_secs(&self, segment: SegmentKind, secs: f64) -> ComposeResult<u64> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ComposeError::InvalidDuration {
                segment,
                duration: secs,
            });
        }
        Ok(secs_to_sample_frames(secs, self.sample_rate))
    }

    /// Target length in sample frames for a visual of `frames` frames.
    pub fn target_for_frames(&self, frames: u64, fps: Fps) -> u64 {
        frame_to_sample(frames, fps, self.sample_rate)
    }

    /// Force in-memory PCM to exactly `target` sample frames. `None` or empty input yields silence.
    ///
    /// Returns the aligned PCM, the action taken, and the native length.
    pub fn align_pcm(&self, source: Option<&AudioPcm>, target: u64) -> (AudioPcm, AlignAction, u64) {
        let Some(src) = source.filter(|p| p.sample_frames() > 0) else {
            return (
                silent_pcm(self.sample_rate, self.channels, target),
                AlignAction::Silent,
                0,
            );
        };
        let native = src.sample_frames();
        let mut out = src.clone();
        let action = match native.cmp(&target) {
            std::cmp::Ordering::Equal => AlignAction::Unchanged,
            std::cmp::Ordering::Less => AlignAction::Padded {
                sample_frames: target - native,
            },
            std::cmp::Ordering::Greater => AlignAction::Trimmed {
                sample_frames: native - target,
            },
        };
        fit_to_sample_frames(&mut out, target);
        (out, action, native)
    }

    /// Decode `audio`, align it to `target_secs`, and write the result to `out_path`.
    pub fn align(
        &self,
        backend: &dyn MediaBackend,
        audio: &AudioAsset,
        narration_text: &str,
        target_secs: f64,
        out_path: &Path,
        deadline: Deadline,
    ) -> ComposeResult<AlignedAudio> {
        let target = self.target_for_secs(audio.segment, target_secs)?;
        self.align_to(backend, audio, narration_text, target, out_path, deadline)
    }

    /// Decode `audio`, align it to exactly `target` sample frames, and write the result to
    /// `out_path`.
    ///
    /// Missing, undecodable, or empty narration is an [`ComposeError::AssetDecode`] unless the
    /// narration text is unspeakable, in which case the track is silent.
    #[tracing::instrument(level = "debug", skip_all, fields(scene = %audio.segment, target))]
    pub fn align_to(
        &self,
        backend: &dyn MediaBackend,
        audio: &AudioAsset,
        narration_text: &str,
        target: u64,
        out_path: &Path,
        deadline: Deadline,
    ) -> ComposeResult<AlignedAudio> {
        let segment = audio.segment;
        if target == 0 {
            return Err(ComposeError::InvalidDuration {
                segment,
                duration: 0.0,
            });
        }
        let unspeakable = is_unspeakable(narration_text);

        let decoded = match &audio.path {
            None if unspeakable => None,
            None => {
                return Err(ComposeError::asset_decode(
                    segment,
                    None,
                    "no narration audio for speakable text",
                ));
            }
            Some(path) => match backend.decode_audio(path, self.sample_rate, deadline) {
                Ok(pcm) => Some(pcm),
                Err(err) if unspeakable && !matches!(err, MediaError::TimedOut { .. }) => {
                    tracing::debug!(scene = %segment, error = %err, "ignoring narration for unspeakable text");
                    None
                }
                Err(err) => {
                    return Err(ComposeError::for_segment(
                        segment,
                        Some(path.clone()),
                        deadline.limit(),
                        err,
                    ));
                }
            },
        };

        if let Some(pcm) = &decoded
            && pcm.sample_frames() == 0
            && !unspeakable
        {
            return Err(ComposeError::asset_decode(
                segment,
                audio.path.clone(),
                "narration decoded to no audio",
            ));
        }

        if let Some(pcm) = &decoded
            && (pcm.sample_rate != self.sample_rate || pcm.channels != self.channels)
        {
            return Err(ComposeError::asset_decode(
                segment,
                audio.path.clone(),
                format!(
                    "decoder returned {} Hz x{}, expected {} Hz x{}",
                    pcm.sample_rate, pcm.channels, self.sample_rate, self.channels
                ),
            ));
        }

        let (aligned, action, native) = self.align_pcm(decoded.as_ref(), target);
        let pcm = PcmFile::write(&aligned, out_path)
            .map_err(|e| ComposeError::for_segment(segment, Some(out_path.to_path_buf()), None, e))?;
        tracing::debug!(scene = %segment, native, target, ?action, "aligned");
        Ok(AlignedAudio {
            segment,
            pcm,
            native_sample_frames: native,
            action,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/align.rs"]
mod tests;
