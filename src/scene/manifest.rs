use std::path::Path;

use anyhow::Context as _;

use crate::compose::concat::TimelinePlan;
use crate::foundation::core::Fps;
use crate::foundation::error::ComposeResult;

/// Per-scene timing record for downstream citation and debug display.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneEntry {
    /// Scene number.
    pub scene_number: u32,
    /// Absolute start time in the final video, seconds.
    pub start_time: f64,
    /// Absolute end time in the final video, seconds (exclusive).
    pub end_time: f64,
    /// Source reference carried over from the scene record.
    pub source_reference: Option<String>,
    /// `true` when the scene was replaced by a placeholder.
    #[serde(default)]
    pub degraded: bool,
}

/// Timing manifest of a finished composition.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    /// Output frame rate.
    pub fps: Fps,
    /// Total video duration in seconds, bookends included.
    pub total_duration: f64,
    /// Declared scenes in timeline order. Bookends are not listed.
    pub scenes: Vec<SceneEntry>,
}

impl Manifest {
    /// Derive the manifest from a timeline plan.
    pub fn from_plan(plan: &TimelinePlan) -> Self {
        let fps = plan.fps;
        let scenes = plan
            .segments
            .iter()
            .filter_map(|seg| {
                let scene_number = seg.segment.scene_number()?;
                Some(SceneEntry {
                    scene_number,
                    start_time: fps.frames_to_secs(seg.range.start.0),
                    end_time: fps.frames_to_secs(seg.range.end.0),
                    source_reference: seg.source_reference.clone(),
                    degraded: seg.degraded,
                })
            })
            .collect();
        Self {
            fps,
            total_duration: fps.frames_to_secs(plan.total_frames()),
            scenes,
        }
    }

    /// Look up a scene entry by number.
    pub fn scene(&self, scene_number: u32) -> Option<&SceneEntry> {
        self.scenes.iter().find(|s| s.scene_number == scene_number)
    }

    /// Write pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> ComposeResult<()> {
        crate::encode::ffmpeg::ensure_parent_dir(path)?;
        let json = serde_json::to_string_pretty(self).context("serialize manifest")?;
        std::fs::write(path, json)
            .with_context(|| format!("write manifest '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/manifest.rs"]
mod tests;
