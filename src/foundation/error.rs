use std::path::PathBuf;
use std::time::Duration;

use crate::scene::model::SegmentKind;

/// Convenience result type used across reelsync.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Result type for low-level media tool operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Top-level error taxonomy used by the composition APIs.
///
/// Structural variants (`SceneCountMismatch`, `SceneNumberMismatch`, `EmptySequence`,
/// `ConcatenationDrift`, `FinalizeTimeout`) always abort a composition. Per-scene variants
/// (`AssetDecode`, `SceneTimeout`) are absorbed when the pipeline runs with the `degrade` failure
/// policy.
#[derive(thiserror::Error, Debug)]
pub enum ComposeError {
    /// The three input collections do not have the same length.
    #[error(
        "scene count mismatch: {scenes} scenes, {visuals} visual assets, {audios} audio assets"
    )]
    SceneCountMismatch {
        /// Number of scene records.
        scenes: usize,
        /// Number of visual asset entries.
        visuals: usize,
        /// Number of audio asset entries.
        audios: usize,
    },

    /// An asset entry declares a different scene number than the scene at the same index.
    #[error(
        "{collection} entry at index {index} belongs to scene {found}, expected scene {expected}"
    )]
    SceneNumberMismatch {
        /// Which input collection (`"visual"` or `"audio"`).
        collection: &'static str,
        /// Index into the input collections.
        index: usize,
        /// Scene number of the scene record at `index`.
        expected: u32,
        /// Scene number declared by the asset entry.
        found: u32,
    },

    /// A target duration is not a positive, finite number of seconds.
    #[error("invalid duration for {segment}: {duration} s (must be positive and finite)")]
    InvalidDuration {
        /// Segment the duration belongs to.
        segment: SegmentKind,
        /// The offending value in seconds.
        duration: f64,
    },

    /// A per-scene asset is missing, corrupt, or could not be processed.
    #[error("{segment}: cannot decode {}: {reason}", path_label(.path))]
    AssetDecode {
        /// Segment the asset belongs to.
        segment: SegmentKind,
        /// Offending file, when one is known.
        path: Option<PathBuf>,
        /// Underlying cause.
        reason: String,
    },

    /// A per-scene task exceeded its deadline.
    #[error("{segment}: timed out after {limit:?}")]
    SceneTimeout {
        /// Segment whose task timed out.
        segment: SegmentKind,
        /// The configured per-scene limit.
        limit: Duration,
    },

    /// Composition was requested for zero scenes.
    #[error("cannot compose an empty scene sequence")]
    EmptySequence,

    /// A post-hoc duration check found the timeline length drifted from the sum of its segments.
    #[error(
        "timeline duration drift: expected {expected_secs:.4} s, got {actual_secs:.4} s (tolerance {tolerance_secs:.4} s)"
    )]
    ConcatenationDrift {
        /// Sum of segment durations.
        expected_secs: f64,
        /// Measured timeline duration.
        actual_secs: f64,
        /// Allowed absolute difference.
        tolerance_secs: f64,
    },

    /// Concatenation or the footer pass exceeded the finalize time limit.
    #[error("finalizing the timeline timed out after {limit:?}")]
    FinalizeTimeout {
        /// The finalize limit in force.
        limit: Duration,
    },

    /// Composition was cancelled through a [`CancelToken`](crate::CancelToken).
    #[error("composition cancelled")]
    Cancelled,

    /// Invalid user-provided configuration or input data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Media tool failure outside a per-scene stage.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ComposeError {
    /// Build a [`ComposeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ComposeError::AssetDecode`] value.
    pub fn asset_decode(
        segment: SegmentKind,
        path: Option<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::AssetDecode {
            segment,
            path,
            reason: reason.into(),
        }
    }

    /// Attribute a media tool failure to a segment.
    ///
    /// Timeouts become [`ComposeError::SceneTimeout`] with the given limit; everything else becomes
    /// [`ComposeError::AssetDecode`].
    pub fn for_segment(
        segment: SegmentKind,
        path: Option<PathBuf>,
        limit: Option<Duration>,
        err: MediaError,
    ) -> Self {
        match err {
            MediaError::TimedOut { elapsed, .. } => Self::SceneTimeout {
                segment,
                limit: limit.unwrap_or(elapsed),
            },
            MediaError::Missing(missing) => Self::AssetDecode {
                segment,
                reason: "file does not exist".to_string(),
                path: Some(missing),
            },
            other => Self::AssetDecode {
                segment,
                path,
                reason: other.to_string(),
            },
        }
    }

    /// Whether the `degrade` failure policy may substitute a placeholder for this failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AssetDecode { .. } | Self::SceneTimeout { .. })
    }

    /// Segment named by this error, if it is a per-scene error.
    pub fn segment(&self) -> Option<SegmentKind> {
        match self {
            Self::InvalidDuration { segment, .. }
            | Self::AssetDecode { segment, .. }
            | Self::SceneTimeout { segment, .. } => Some(*segment),
            _ => None,
        }
    }
}

fn path_label(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!("'{}'", p.display()),
        None => "asset".to_string(),
    }
}

/// Failures reported by media probing, decoding and encoding tools.
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    /// Input file does not exist.
    #[error("missing media file '{}'", .0.display())]
    Missing(PathBuf),

    /// The external tool could not be started.
    #[error("failed to run {tool} (is it installed and on PATH?): {source}")]
    Spawn {
        /// Tool name (`ffmpeg` / `ffprobe`).
        tool: &'static str,
        /// Spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    Tool {
        /// Tool name.
        tool: &'static str,
        /// Exit status description.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The external tool ran past its deadline and was killed.
    #[error("{tool} timed out after {elapsed:?}")]
    TimedOut {
        /// Tool name.
        tool: &'static str,
        /// Time spent before the process was killed.
        elapsed: Duration,
    },

    /// The media could be read but its content is unusable.
    #[error("undecodable media '{}': {reason}", path.display())]
    Decode {
        /// Offending file.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Build a [`MediaError::Decode`] value.
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
