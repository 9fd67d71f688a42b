use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::foundation::core::Fps;

/// Identity of one segment in the output timeline.
///
/// The derived ordering is the canonical timeline order: intro, scenes by ascending number, outro.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Optional opening bookend.
    Intro,
    /// A declared scene, by 1-based scene number.
    Scene(u32),
    /// Optional closing bookend.
    Outro,
}

impl SegmentKind {
    /// Scene number, for declared scenes.
    pub fn scene_number(self) -> Option<u32> {
        match self {
            Self::Scene(n) => Some(n),
            Self::Intro | Self::Outro => None,
        }
    }

    /// Stable file stem used for per-segment intermediates.
    pub fn file_stem(self) -> String {
        match self {
            Self::Intro => "intro".to_string(),
            Self::Scene(n) => format!("scene_{n:04}"),
            Self::Outro => "outro".to_string(),
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intro => f.write_str("intro"),
            Self::Scene(n) => write!(f, "scene {n}"),
            Self::Outro => f.write_str("outro"),
        }
    }
}

/// One scene of the narrated script. Immutable once produced by the script generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// 1-based, unique; defines canonical order.
    #[serde(alias = "scene")]
    pub scene_number: u32,
    /// Narration text; may be empty.
    #[serde(default, alias = "text", alias = "narration")]
    pub narration_text: String,
    /// Approximate target duration in seconds.
    #[serde(alias = "duration")]
    pub target_duration: f64,
    /// Optional page/citation label.
    #[serde(
        default,
        alias = "source_page",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_reference: Option<String>,
}

impl Scene {
    /// Create a scene with no source reference.
    pub fn new(scene_number: u32, narration_text: impl Into<String>, target_duration: f64) -> Self {
        Self {
            scene_number,
            narration_text: narration_text.into(),
            target_duration,
            source_reference: None,
        }
    }

    /// Attach a source reference.
    pub fn with_source(mut self, reference: impl Into<String>) -> Self {
        self.source_reference = Some(reference.into());
        self
    }

    /// Segment identity of this scene.
    pub fn segment(&self) -> SegmentKind {
        SegmentKind::Scene(self.scene_number)
    }

    /// `true` when the narration has nothing a narrator could pronounce.
    pub fn is_unspeakable(&self) -> bool {
        is_unspeakable(&self.narration_text)
    }

    /// Source reference with surrounding whitespace removed, if non-empty.
    pub fn source_label(&self) -> Option<&str> {
        self.source_reference
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// `true` when `text` contains no alphanumeric character.
pub fn is_unspeakable(text: &str) -> bool {
    !text.chars().any(char::is_alphanumeric)
}

fn string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(de)? {
        None => None,
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(n)) => Some(n.to_string()),
    })
}

/// Reference to one producer output in an input collection.
///
/// Either a bare path or a record naming the scene it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetRef {
    /// Path matched to the scene at the same index.
    Path(PathBuf),
    /// Path with an explicit scene number that must match the scene at the same index.
    Tagged {
        /// Scene the asset was produced for.
        scene_number: u32,
        /// Asset location.
        path: PathBuf,
    },
}

impl AssetRef {
    /// Asset location.
    pub fn path(&self) -> &Path {
        match self {
            Self::Path(p) | Self::Tagged { path: p, .. } => p,
        }
    }

    /// Declared scene number, if tagged.
    pub fn declared_scene(&self) -> Option<u32> {
        match self {
            Self::Path(_) => None,
            Self::Tagged { scene_number, .. } => Some(*scene_number),
        }
    }

    /// Resolve a relative path against `root`.
    pub fn resolved_against(&self, root: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        match self {
            Self::Path(p) => Self::Path(resolve(p)),
            Self::Tagged { scene_number, path } => Self::Tagged {
                scene_number: *scene_number,
                path: resolve(path),
            },
        }
    }
}

impl From<PathBuf> for AssetRef {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&str> for AssetRef {
    fn from(p: &str) -> Self {
        Self::Path(PathBuf::from(p))
    }
}

/// How a visual resource is turned into frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    /// Playable clip with its own duration.
    Clip,
    /// Still image held for the segment's declared duration.
    Still,
}

/// A visual resource bound to one segment, with its duration quantized to the output frame grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualAsset {
    /// Owning segment.
    pub segment: SegmentKind,
    /// Resource location.
    pub path: PathBuf,
    /// Clip or still.
    pub kind: VisualKind,
    /// Duration in output frames (always >= 1).
    pub frames: u64,
}

impl VisualAsset {
    /// Duration in seconds on the given frame grid.
    pub fn duration_secs(&self, fps: Fps) -> f64 {
        fps.frames_to_secs(self.frames)
    }
}

/// A narration audio resource bound to one segment. `path` is `None` when the narrator produced
/// nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAsset {
    /// Owning segment.
    pub segment: SegmentKind,
    /// Resource location.
    pub path: Option<PathBuf>,
}

/// One scene's metadata bound to its visual and audio inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetPair {
    /// Scene metadata.
    pub scene: Scene,
    /// Visual input location.
    pub visual: PathBuf,
    /// Narration input location.
    pub audio: AudioAsset,
}

impl AssetPair {
    /// Segment identity of the pair.
    pub fn segment(&self) -> SegmentKind {
        self.scene.segment()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
