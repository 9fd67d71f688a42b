use std::path::Path;
use std::process::Command;

use crate::assets::process::{Deadline, run_tool, run_with_deadline};
use crate::foundation::core::Fps;
use crate::foundation::error::{MediaError, MediaResult};
use crate::scene::model::VisualKind;

/// Sample rate used for every intermediate PCM track.
pub const MIX_SAMPLE_RATE: u32 = 48_000;
/// Channel count used for every intermediate PCM track.
pub const MIX_CHANNELS: u16 = 2;

/// Probed properties of a media file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    /// Container duration in seconds (0 when unknown).
    pub duration_secs: f64,
    /// First video stream, if any.
    pub video: Option<VideoStreamInfo>,
    /// First audio stream, if any.
    pub audio: Option<AudioStreamInfo>,
}

/// Video stream properties.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoStreamInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame count reported by the container, when present.
    pub frame_count: Option<u64>,
    /// Stream duration in seconds, falling back to the container duration.
    pub duration_secs: f64,
}

/// Audio stream properties.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioStreamInfo {
    /// Native sample rate.
    pub sample_rate: u32,
    /// Native channel count.
    pub channels: u16,
    /// Stream duration in seconds, falling back to the container duration.
    pub duration_secs: f64,
}

impl MediaInfo {
    /// Video stream duration in seconds, when positive and finite.
    pub fn video_secs(&self) -> Option<f64> {
        self.video
            .as_ref()
            .map(|v| v.duration_secs)
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Video length in frames of `fps` for files already encoded at `fps`: the container's frame
    /// count when known, otherwise the stream duration quantized to the grid. `None` without a
    /// usable video stream.
    pub fn video_frames(&self, fps: Fps) -> Option<u64> {
        let v = self.video.as_ref()?;
        if let Some(n) = v.frame_count.filter(|n| *n > 0) {
            return Some(n);
        }
        (v.duration_secs.is_finite() && v.duration_secs > 0.0)
            .then(|| fps.secs_to_frames_round(v.duration_secs))
            .filter(|n| *n > 0)
    }
}

/// Decoded interleaved f32 PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Interleaved samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Empty PCM with the given layout.
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            interleaved_f32: Vec::new(),
        }
    }

    /// Number of sample frames (one sample per channel).
    pub fn sample_frames(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        (self.interleaved_f32.len() / usize::from(self.channels)) as u64
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_json(path: &Path, bytes: &[u8]) -> MediaResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        nb_frames: Option<String>,
        duration: Option<String>,
        sample_rate: Option<String>,
        channels: Option<u16>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(bytes)
        .map_err(|e| MediaError::decode(path, format!("ffprobe json parse failed: {e}")))?;
    let container = parsed
        .format
        .as_ref()
        .and_then(|f| parse_secs(f.duration.as_deref()))
        .unwrap_or(0.0);

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| -> MediaResult<VideoStreamInfo> {
            Ok(VideoStreamInfo {
                width: s
                    .width
                    .ok_or_else(|| MediaError::decode(path, "missing video width from ffprobe"))?,
                height: s
                    .height
                    .ok_or_else(|| MediaError::decode(path, "missing video height from ffprobe"))?,
                frame_count: s.nb_frames.as_deref().and_then(|n| n.parse().ok()),
                duration_secs: parse_secs(s.duration.as_deref()).unwrap_or(container),
            })
        })
        .transpose()?;

    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|s| AudioStreamInfo {
            sample_rate: s
                .sample_rate
                .as_deref()
                .and_then(|r| r.parse().ok())
                .unwrap_or(0),
            channels: s.channels.unwrap_or(0),
            duration_secs: parse_secs(s.duration.as_deref()).unwrap_or(container),
        });

    Ok(MediaInfo {
        duration_secs: container,
        video,
        audio,
    })
}

fn parse_secs(s: Option<&str>) -> Option<f64> {
    s.and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Probe `path` with the system `ffprobe`.
pub fn probe_media(path: &Path, deadline: Deadline) -> MediaResult<MediaInfo> {
    if !path.exists() {
        return Err(MediaError::Missing(path.to_path_buf()));
    }
    let out = run_tool(
        Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path),
        "ffprobe",
        deadline,
    )?;
    parse_probe_json(path, &out.stdout)
}

/// Decode the first audio stream of `path` to interleaved stereo f32 at `sample_rate`.
///
/// A file without an audio stream decodes to empty PCM.
pub fn decode_audio_f32_stereo(
    path: &Path,
    sample_rate: u32,
    deadline: Deadline,
) -> MediaResult<AudioPcm> {
    if !path.exists() {
        return Err(MediaError::Missing(path.to_path_buf()));
    }
    let out = run_with_deadline(
        Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args([
                "-vn",
                "-f",
                "f32le",
                "-acodec",
                "pcm_f32le",
                "-ac",
                &MIX_CHANNELS.to_string(),
                "-ar",
                &sample_rate.to_string(),
                "pipe:1",
            ]),
        "ffmpeg",
        deadline,
    )?;

    if !out.status.success() {
        let msg = out.stderr_tail();
        // ffmpeg reports a missing audio stream as an error.
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
            || msg.contains("does not contain any stream")
        {
            return Ok(AudioPcm::empty(sample_rate, MIX_CHANNELS));
        }
        return Err(MediaError::Tool {
            tool: "ffmpeg",
            status: out.status.to_string(),
            stderr: msg,
        });
    }

    let interleaved_f32 = crate::audio::pcm::f32le_bytes_to_samples(&out.stdout)
        .ok_or_else(|| MediaError::decode(path, "decoded audio is not aligned to f32 samples"))?;
    Ok(AudioPcm {
        sample_rate,
        channels: MIX_CHANNELS,
        interleaved_f32,
    })
}

/// Decide whether `path` is a still image or a playable clip.
///
/// Still images are recognised by extension and their header is read to reject corrupt files
/// early. Animated formats are treated as clips.
pub fn classify_visual(path: &Path) -> MediaResult<VisualKind> {
    if !path.exists() {
        return Err(MediaError::Missing(path.to_path_buf()));
    }
    let still = matches!(
        image::ImageFormat::from_path(path),
        Ok(image::ImageFormat::Png
            | image::ImageFormat::Jpeg
            | image::ImageFormat::WebP
            | image::ImageFormat::Bmp
            | image::ImageFormat::Tiff)
    );
    if !still {
        return Ok(VisualKind::Clip);
    }
    let (w, h) = image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| MediaError::decode(path, format!("unreadable image: {e}")))?;
    if w == 0 || h == 0 {
        return Err(MediaError::decode(path, "image has zero size"));
    }
    Ok(VisualKind::Still)
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be executed.
pub fn is_ffmpeg_on_path() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|tool| {
        Command::new(tool)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/media.rs"]
mod tests;
