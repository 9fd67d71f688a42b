//! Compose narrated short videos from per-scene visuals and narration tracks.
//!
//! Every scene's narration is padded or trimmed to its visual's exact length on the output frame
//! grid, muxed into a normalized clip, and the clips are joined into one timeline whose audio and
//! video durations agree. Media work goes through a [`MediaBackend`]; [`FfmpegBackend`] drives the
//! system `ffmpeg`/`ffprobe`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub(crate) mod foundation;

/// Media probing, decoding and subprocess control.
pub mod assets;
/// PCM handling and narration alignment.
pub mod audio;
/// Scene muxing, timeline assembly, overlays and orchestration.
pub mod compose;
/// ffmpeg argument building and the ffmpeg backend.
pub mod encode;
/// Scene records, job input and the timing manifest.
pub mod scene;

pub use assets::media::{AudioPcm, MediaInfo, probe_media};
pub use assets::process::Deadline;
pub use audio::align::{AlignAction, AlignedAudio, DurationAligner};
pub use audio::pcm::PcmFile;
pub use compose::backend::{Caption, MediaBackend, SegmentRender, VisualSource};
pub use compose::cancel::CancelToken;
pub use compose::concat::{SequenceConcatenator, Timeline, TimelinePlan, TimelineSegment};
pub use compose::config::{ComposeConfig, FailurePolicy, OverlayConfig};
pub use compose::mux::{ComposedScene, SceneMuxer};
pub use compose::overlay::{OverlayLayer, citation_text};
pub use compose::pipeline::{CompositionOutput, CompositionPipeline, SceneReport, SceneState};
pub use encode::ffmpeg::{FfmpegBackend, is_ffmpeg_on_path};
pub use encode::filters::EncodeSettings;
pub use foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
pub use foundation::error::{ComposeError, ComposeResult, MediaError, MediaResult};
pub use scene::job::{ComposeJob, pair_assets};
pub use scene::manifest::{Manifest, SceneEntry};
pub use scene::model::{AssetPair, AssetRef, AudioAsset, Scene, SegmentKind, VisualAsset, VisualKind};
