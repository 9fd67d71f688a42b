use std::path::Path;

use crate::compose::backend::Caption;
use crate::foundation::core::{Canvas, Fps};

/// H.264/AAC encoder settings shared by every re-encoding step.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// `libx264` preset.
    pub preset: String,
    /// `libx264` constant rate factor, 0..=51.
    pub crf: u8,
    /// AAC bitrate, ffmpeg syntax (`128k`).
    pub audio_bitrate: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            preset: "medium".to_string(),
            crf: 23,
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// Filter chain that fits any input onto the canvas and the output frame grid.
///
/// Scales to fit, letterboxes to the exact canvas, forces square pixels, converts the frame rate,
/// and clones the last frame for `tail_secs` so short clips cover the whole segment.
pub fn normalize_chain(canvas: Canvas, fps: Fps, tail_secs: f64) -> String {
    let (w, h) = (canvas.width, canvas.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,\
         setsar=1,\
         fps={rate},\
         tpad=stop_mode=clone:stop_duration={tail_secs:.3},\
         format=yuv420p",
        rate = fps.to_ffmpeg_rate(),
    )
}

/// `drawtext` filter reading its text from `text_file`, centred at the bottom of the frame.
///
/// The text never passes through filter-argument parsing (`expansion=none`), so captions need no
/// escaping; only file paths do.
pub fn drawtext_filter(caption: &Caption, text_file: &Path) -> String {
    let mut f = format!(
        "drawtext=textfile={}:expansion=none:fontsize={}:fontcolor=white:\
         x=(w-text_w)/2:y=h-text_h-{}:box=1:boxcolor=black@{:.2}:boxborderw=12:line_spacing=8",
        escape_filter_path(text_file),
        caption.font_size,
        caption.margin_px,
        caption.box_opacity.clamp(0.0, 1.0),
    );
    if let Some(font) = &caption.font_file {
        f.push_str(":fontfile=");
        f.push_str(&escape_filter_path(font));
    }
    f
}

/// Escape a file path for use as a filter option value.
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(normalized.len() + 12);
    for ch in normalized.chars() {
        match ch {
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// One line of a concat-demuxer list file.
pub fn concat_list_line(path: &Path) -> String {
    format!("file '{}'\n", path.to_string_lossy().replace('\'', "'\\''"))
}

/// Greedy word wrap so a caption fits the canvas width.
///
/// The per-line character budget assumes an average glyph width of about 0.55 em and leaves a
/// 5% margin on each side. Words longer than a line are kept whole.
pub fn wrap_caption(text: &str, canvas_width: u32, font_size: u32) -> String {
    let usable = f64::from(canvas_width) * 0.9;
    let glyph = f64::from(font_size.max(1)) * 0.55;
    let budget = ((usable / glyph).floor() as usize).max(8);

    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > budget && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
#[path = "../../tests/unit/encode/filters.rs"]
mod tests;
