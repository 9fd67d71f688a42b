use std::collections::BTreeSet;
use std::path::Path;

use crate::assets::process::Deadline;
use crate::compose::backend::{Caption, MediaBackend};
use crate::compose::concat::Timeline;
use crate::compose::config::OverlayConfig;
use crate::encode::filters::wrap_caption;
use crate::foundation::core::Canvas;
use crate::foundation::error::{ComposeError, ComposeResult};
use crate::scene::model::Scene;

// drawtext box border and line spacing, see `drawtext_filter`.
const BOX_BORDER_PX: u32 = 12;
const LINE_SPACING_PX: u32 = 8;

/// Burned-in captions and citation footer.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLayer {
    style: OverlayConfig,
    canvas: Canvas,
}

impl OverlayLayer {
    /// Create an overlay layer for `canvas`.
    pub fn new(style: OverlayConfig, canvas: Canvas) -> Self {
        Self { style, canvas }
    }

    /// Styled caption for `text`, wrapped to the canvas. `None` for blank text.
    pub fn caption(&self, text: &str) -> Option<Caption> {
        let wrapped = wrap_caption(text, self.canvas.width, self.style.font_size);
        if wrapped.is_empty() {
            return None;
        }
        Some(Caption {
            text: wrapped,
            font_size: self.style.font_size,
            margin_px: self.style.margin_px,
            box_opacity: self.style.box_opacity,
            font_file: self.style.font_file.clone(),
        })
    }

    /// Per-scene caption text (`Source: <reference>`), when scene captions are enabled.
    pub fn scene_caption_text(&self, scene: &Scene) -> Option<String> {
        if !self.style.scene_captions_enabled() {
            return None;
        }
        scene.source_label().map(|r| format!("Source: {r}"))
    }

    /// Per-scene caption, raised above `footer` when one will be drawn over the timeline.
    pub fn scene_caption(&self, scene: &Scene, footer: Option<&Caption>) -> Option<Caption> {
        let mut caption = self.caption(&self.scene_caption_text(scene)?)?;
        if let Some(footer) = footer {
            caption.margin_px = footer.margin_px + caption_height(footer) + BOX_BORDER_PX * 2;
        }
        Some(caption)
    }

    /// Footer caption for the whole timeline, when the citation footer is enabled.
    pub fn footer(&self, citation_text: &str) -> Option<Caption> {
        if !self.style.citation_footer_enabled() {
            return None;
        }
        self.caption(citation_text)
    }

    /// Burn `citation_text` into the whole timeline as a persistent footer.
    ///
    /// Empty citation text or a disabled footer leaves the timeline untouched. The re-encoded
    /// timeline must keep its frame count; anything else is [`ComposeError::ConcatenationDrift`].
    #[tracing::instrument(level = "info", skip_all, fields(path = %out.display()))]
    pub fn apply_overlay(
        &self,
        backend: &dyn MediaBackend,
        timeline: &Timeline,
        citation_text: &str,
        out: &Path,
        deadline: Deadline,
    ) -> ComposeResult<Timeline> {
        let Some(caption) = self.footer(citation_text) else {
            tracing::debug!("no citation footer to apply");
            return Ok(timeline.clone());
        };

        backend.burn_caption(&timeline.path, &caption, out, deadline)?;

        let fps = timeline.plan.fps;
        let expected = timeline.plan.total_frames();
        let actual = backend.probe(out, deadline)?.video_frames(fps).unwrap_or(0);
        if actual != expected {
            return Err(ComposeError::ConcatenationDrift {
                expected_secs: fps.frames_to_secs(expected),
                actual_secs: fps.frames_to_secs(actual),
                tolerance_secs: 0.0,
            });
        }
        tracing::info!(frames = actual, "citation footer applied");

        Ok(Timeline {
            path: out.to_path_buf(),
            plan: timeline.plan.clone(),
            audio: timeline.audio.clone(),
        })
    }
}

/// `Sources: a, b, c` from the distinct source references of `scenes`.
///
/// Numeric references come first in numeric order, the rest follow lexically. Empty when no scene
/// has a reference.
pub fn citation_text(scenes: &[Scene]) -> String {
    let mut numeric = BTreeSet::new();
    let mut other = BTreeSet::new();
    for label in scenes.iter().filter_map(Scene::source_label) {
        match label.parse::<u64>() {
            Ok(n) => {
                numeric.insert(n);
            }
            Err(_) => {
                other.insert(label.to_string());
            }
        }
    }
    if numeric.is_empty() && other.is_empty() {
        return String::new();
    }
    let refs: Vec<String> = numeric
        .into_iter()
        .map(|n| n.to_string())
        .chain(other)
        .collect();
    format!("Sources: {}", refs.join(", "))
}

fn caption_height(caption: &Caption) -> u32 {
    let lines = caption.text.lines().count().max(1) as u32;
    lines * caption.font_size + (lines - 1) * LINE_SPACING_PX
}

#[cfg(test)]
#[path = "../../tests/unit/compose/overlay.rs"]
mod tests;
