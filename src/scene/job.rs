use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::{ComposeError, ComposeResult};
use crate::scene::model::{AssetPair, AssetRef, AudioAsset, Scene};

/// Serializable composition input: three parallel collections indexed consistently by scene.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComposeJob {
    /// Scene records from the script generator.
    pub scenes: Vec<Scene>,
    /// One visual asset per scene.
    #[serde(alias = "clips")]
    pub visuals: Vec<AssetRef>,
    /// One narration asset per scene; `null` when the narrator produced nothing.
    pub audios: Vec<Option<AssetRef>>,
}

impl ComposeJob {
    /// Load a job from a JSON file. Relative asset paths resolve against the file's directory.
    pub fn from_json_file(path: &Path) -> ComposeResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read job file '{}'", path.display()))?;
        let job: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse job file '{}'", path.display()))?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(job.resolved_against(root))
    }

    /// Resolve every relative asset path against `root`.
    pub fn resolved_against(mut self, root: &Path) -> Self {
        self.visuals = self
            .visuals
            .iter()
            .map(|v| v.resolved_against(root))
            .collect();
        self.audios = self
            .audios
            .iter()
            .map(|a| a.as_ref().map(|a| a.resolved_against(root)))
            .collect();
        self
    }

    /// Validate and bind the three collections. See [`pair_assets`].
    pub fn pair_assets(&self) -> ComposeResult<Vec<AssetPair>> {
        pair_assets(&self.scenes, &self.visuals, &self.audios)
    }
}

/// Validate the cross-collection contract and bind each scene to its assets.
///
/// Checks run in a fixed order so the reported error names the most basic violation: collection
/// lengths, emptiness, scene number uniqueness, per-index scene number agreement, then declared
/// durations.
pub fn pair_assets(
    scenes: &[Scene],
    visuals: &[AssetRef],
    audios: &[Option<AssetRef>],
) -> ComposeResult<Vec<AssetPair>> {
    if scenes.len() != visuals.len() || scenes.len() != audios.len() {
        return Err(ComposeError::SceneCountMismatch {
            scenes: scenes.len(),
            visuals: visuals.len(),
            audios: audios.len(),
        });
    }
    if scenes.is_empty() {
        return Err(ComposeError::EmptySequence);
    }

    let mut seen = BTreeSet::new();
    for scene in scenes {
        if scene.scene_number == 0 {
            return Err(ComposeError::validation(
                "scene numbers are 1-based; found scene 0",
            ));
        }
        if !seen.insert(scene.scene_number) {
            return Err(ComposeError::validation(format!(
                "duplicate scene number {}",
                scene.scene_number
            )));
        }
    }

    for (index, scene) in scenes.iter().enumerate() {
        check_declared("visual", index, scene, Some(&visuals[index]))?;
        check_declared("audio", index, scene, audios[index].as_ref())?;
    }

    for scene in scenes {
        let d = scene.target_duration;
        if !d.is_finite() || d <= 0.0 {
            return Err(ComposeError::InvalidDuration {
                segment: scene.segment(),
                duration: d,
            });
        }
    }

    Ok(scenes
        .iter()
        .zip(visuals)
        .zip(audios)
        .map(|((scene, visual), audio)| AssetPair {
            scene: scene.clone(),
            visual: visual.path().to_path_buf(),
            audio: AudioAsset {
                segment: scene.segment(),
                path: audio.as_ref().map(|a| a.path().to_path_buf()),
            },
        })
        .collect())
}

fn check_declared(
    collection: &'static str,
    index: usize,
    scene: &Scene,
    asset: Option<&AssetRef>,
) -> ComposeResult<()> {
    match asset.and_then(AssetRef::declared_scene) {
        Some(found) if found != scene.scene_number => Err(ComposeError::SceneNumberMismatch {
            collection,
            index,
            expected: scene.scene_number,
            found,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/job.rs"]
mod tests;
