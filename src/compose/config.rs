use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::assets::media::MIX_SAMPLE_RATE;
use crate::encode::filters::EncodeSettings;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ComposeError, ComposeResult};

/// What to do when a single scene cannot be composed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole composition.
    #[default]
    Abort,
    /// Substitute a blank, silent segment of the scene's declared duration and continue.
    Degrade,
}

impl std::str::FromStr for FailurePolicy {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "degrade" => Ok(Self::Degrade),
            other => Err(ComposeError::validation(format!(
                "unknown failure policy '{other}' (expected 'abort' or 'degrade')"
            ))),
        }
    }
}

/// Caption and citation overlay options.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Master switch for all burned-in text.
    pub enabled: bool,
    /// Burn `Source: <reference>` into each scene that has one.
    pub scene_captions: bool,
    /// Burn a persistent `Sources: ...` footer over the whole timeline.
    pub citation_footer: bool,
    /// Font size in pixels.
    pub font_size: u32,
    /// Distance from the bottom edge in pixels.
    pub margin_px: u32,
    /// Backing box opacity, 0..=1.
    pub box_opacity: f32,
    /// Font file; `None` uses ffmpeg's default font.
    pub font_file: Option<PathBuf>,
}

impl OverlayConfig {
    /// Whether per-scene captions are burned in.
    pub fn scene_captions_enabled(&self) -> bool {
        self.enabled && self.scene_captions
    }

    /// Whether the global citation footer is burned in.
    pub fn citation_footer_enabled(&self) -> bool {
        self.enabled && self.citation_footer
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scene_captions: true,
            citation_footer: true,
            font_size: 40,
            margin_px: 120,
            box_opacity: 0.5,
            font_file: None,
        }
    }
}

/// Composition options. Passed to the pipeline at construction and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Output frame rate.
    pub fps: Fps,
    /// Output canvas.
    pub canvas: Canvas,
    /// Sample rate of every intermediate and final audio track.
    pub sample_rate: u32,
    /// Per-scene failure handling.
    pub failure_policy: FailurePolicy,
    /// Per-scene time limit in seconds; `None` is unbounded.
    pub scene_timeout_secs: Option<f64>,
    /// Time limit in seconds for concatenation and the footer pass; `None` allows the scene
    /// limit once per segment.
    pub finalize_timeout_secs: Option<f64>,
    /// Worker threads for per-scene work; `None` uses rayon's default.
    pub concurrency: Option<usize>,
    /// Allowed duration drift in seconds; `None` means one frame interval.
    pub drift_tolerance_secs: Option<f64>,
    /// Caption and citation overlay.
    pub overlay: OverlayConfig,
    /// Encoder settings.
    pub encode: EncodeSettings,
    /// Optional opening visual.
    pub intro: Option<PathBuf>,
    /// Optional closing visual.
    pub outro: Option<PathBuf>,
    /// Duration of still-image bookends in seconds.
    pub bookend_secs: f64,
    /// Directory for intermediates; `None` creates a fresh temporary directory.
    pub work_dir: Option<PathBuf>,
    /// Keep intermediates after a successful run.
    pub keep_intermediates: bool,
    /// Replace an existing output file.
    pub overwrite: bool,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            canvas: Canvas::default(),
            sample_rate: MIX_SAMPLE_RATE,
            failure_policy: FailurePolicy::Abort,
            scene_timeout_secs: Some(300.0),
            finalize_timeout_secs: None,
            concurrency: None,
            drift_tolerance_secs: None,
            overlay: OverlayConfig::default(),
            encode: EncodeSettings::default(),
            intro: None,
            outro: None,
            bookend_secs: 3.0,
            work_dir: None,
            keep_intermediates: false,
            overwrite: true,
        }
    }
}

impl ComposeConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> ComposeResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config file '{}'", path.display()))?;
        Ok(cfg)
    }

    /// Check every option for a usable value.
    pub fn validate(&self) -> ComposeResult<()> {
        self.fps.validate()?;
        self.canvas.validate()?;
        if self.sample_rate == 0 {
            return Err(ComposeError::validation("sample_rate must be non-zero"));
        }
        for (name, limit) in [
            ("scene_timeout_secs", self.scene_timeout_secs),
            ("finalize_timeout_secs", self.finalize_timeout_secs),
        ] {
            if let Some(t) = limit
                && (t <= 0.0 || Duration::try_from_secs_f64(t).is_err())
            {
                return Err(ComposeError::validation(format!(
                    "{name} must be a positive, representable number of seconds when set"
                )));
            }
        }
        if self.concurrency == Some(0) {
            return Err(ComposeError::validation(
                "concurrency must be >= 1 when set",
            ));
        }
        if let Some(t) = self.drift_tolerance_secs
            && (!t.is_finite() || t < 0.0)
        {
            return Err(ComposeError::validation(
                "drift_tolerance_secs must be a non-negative number when set",
            ));
        }
        if !self.bookend_secs.is_finite() || self.bookend_secs <= 0.0 {
            return Err(ComposeError::validation("bookend_secs must be positive"));
        }
        if self.encode.crf > 51 {
            return Err(ComposeError::validation("encode crf must be within 0..=51"));
        }
        if self.encode.preset.trim().is_empty() || self.encode.audio_bitrate.trim().is_empty() {
            return Err(ComposeError::validation(
                "encode preset and audio_bitrate must be non-empty",
            ));
        }
        if self.overlay.font_size == 0 {
            return Err(ComposeError::validation("overlay font_size must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.overlay.box_opacity) {
            return Err(ComposeError::validation(
                "overlay box_opacity must be within 0..=1",
            ));
        }
        Ok(())
    }

    /// Allowed absolute duration error in seconds.
    pub fn tolerance_secs(&self) -> f64 {
        self.drift_tolerance_secs
            .unwrap_or_else(|| self.fps.frame_duration_secs())
    }

    /// Per-scene time limit.
    pub fn scene_timeout(&self) -> Option<Duration> {
        self.scene_timeout_secs
            .and_then(|t| Duration::try_from_secs_f64(t).ok())
    }

    /// Time limit for finalizing a timeline of `segments` segments.
    pub fn finalize_timeout(&self, segments: usize) -> Option<Duration> {
        match self.finalize_timeout_secs {
            Some(t) => Duration::try_from_secs_f64(t).ok(),
            None => {
                let n = u32::try_from(segments.max(1)).unwrap_or(u32::MAX);
                self.scene_timeout().map(|d| d.saturating_mul(n))
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/config.rs"]
mod tests;
