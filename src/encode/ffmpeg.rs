use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;

use crate::assets::media::{self, AudioPcm, MediaInfo};
use crate::assets::process::{Deadline, run_tool};
use crate::audio::pcm::PcmFile;
use crate::compose::backend::{Caption, MediaBackend, SegmentRender, VisualSource};
use crate::encode::filters::{
    EncodeSettings, concat_list_line, drawtext_filter, normalize_chain,
};
use crate::foundation::error::{ComposeResult, MediaError, MediaResult};

/// [`MediaBackend`] driving the system `ffmpeg` and `ffprobe` binaries.
#[derive(Clone, Debug, Default)]
pub struct FfmpegBackend {
    encode: EncodeSettings,
}

impl FfmpegBackend {
    /// Create a backend that re-encodes with `encode`.
    pub fn new(encode: EncodeSettings) -> Self {
        Self { encode }
    }

    /// Encoder settings in use.
    pub fn encode_settings(&self) -> &EncodeSettings {
        &self.encode
    }

    fn video_codec_args(&self, cmd: &mut Command) {
        cmd.args([
            "-c:v",
            "libx264",
            "-preset",
            &self.encode.preset,
            "-crf",
            &self.encode.crf.to_string(),
            "-pix_fmt",
            "yuv420p",
        ]);
    }

    fn audio_codec_args(&self, cmd: &mut Command) {
        cmd.args(["-c:a", "aac", "-b:a", &self.encode.audio_bitrate]);
    }
}

fn ffmpeg() -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-nostdin", "-loglevel", "error"]);
    cmd
}

fn pcm_input(cmd: &mut Command, audio: &PcmFile) {
    cmd.args([
        "-f",
        "f32le",
        "-ar",
        &audio.sample_rate.to_string(),
        "-ac",
        &audio.channels.to_string(),
        "-i",
    ])
    .arg(&audio.path);
}

fn caption_text_path(out: &Path) -> PathBuf {
    out.with_extension("caption.txt")
}

fn write_caption_file(caption: &Caption, out: &Path) -> MediaResult<PathBuf> {
    let path = caption_text_path(out);
    std::fs::write(&path, caption.text.as_bytes())?;
    Ok(path)
}

impl MediaBackend for FfmpegBackend {
    fn probe(&self, path: &Path, deadline: Deadline) -> MediaResult<MediaInfo> {
        media::probe_media(path, deadline)
    }

    fn decode_audio(
        &self,
        path: &Path,
        sample_rate: u32,
        deadline: Deadline,
    ) -> MediaResult<AudioPcm> {
        media::decode_audio_f32_stereo(path, sample_rate, deadline)
    }

    fn render_segment(&self, job: &SegmentRender, deadline: Deadline) -> MediaResult<()> {
        let rate = job.fps.to_ffmpeg_rate();
        let duration = job.fps.frames_to_secs(job.frames);
        let mut cmd = ffmpeg();

        match &job.visual {
            VisualSource::Clip(path) => {
                if !path.exists() {
                    return Err(MediaError::Missing(path.clone()));
                }
                cmd.arg("-i").arg(path);
            }
            VisualSource::Still(path) => {
                if !path.exists() {
                    return Err(MediaError::Missing(path.clone()));
                }
                cmd.args(["-loop", "1", "-framerate", &rate, "-i"]).arg(path);
            }
            VisualSource::Blank => {
                cmd.args([
                    "-f",
                    "lavfi",
                    "-i",
                    &format!(
                        "color=c=black:s={}x{}:r={rate}",
                        job.canvas.width, job.canvas.height
                    ),
                ]);
            }
        }
        pcm_input(&mut cmd, &job.audio);

        let mut chain = normalize_chain(job.canvas, job.fps, duration);
        if let Some(caption) = &job.caption {
            let text_file = write_caption_file(caption, &job.out_path)?;
            chain.push(',');
            chain.push_str(&drawtext_filter(caption, &text_file));
        }

        cmd.args(["-map", "0:v:0", "-map", "1:a:0", "-vf", &chain])
            .args(["-frames:v", &job.frames.to_string(), "-r", &rate]);
        self.video_codec_args(&mut cmd);
        self.audio_codec_args(&mut cmd);
        cmd.args(["-movflags", "+faststart"]).arg(&job.out_path);

        run_tool(&mut cmd, "ffmpeg", deadline)?;
        Ok(())
    }

    fn concat_video(&self, inputs: &[PathBuf], out: &Path, deadline: Deadline) -> MediaResult<()> {
        // The demuxer resolves relative entries against the list file's directory.
        let mut body = String::new();
        for p in inputs {
            body.push_str(&concat_list_line(&p.canonicalize()?));
        }
        let list = out.with_extension("concat.txt");
        std::fs::write(&list, body)?;

        let mut cmd = ffmpeg();
        cmd.args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&list)
            .args(["-map", "0:v:0", "-c", "copy", "-an", "-movflags", "+faststart"])
            .arg(out);
        run_tool(&mut cmd, "ffmpeg", deadline)?;
        Ok(())
    }

    fn attach_audio(
        &self,
        video: &Path,
        audio: &PcmFile,
        out: &Path,
        deadline: Deadline,
    ) -> MediaResult<()> {
        let mut cmd = ffmpeg();
        cmd.arg("-i").arg(video);
        pcm_input(&mut cmd, audio);
        cmd.args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"]);
        self.audio_codec_args(&mut cmd);
        cmd.args(["-movflags", "+faststart"]).arg(out);
        run_tool(&mut cmd, "ffmpeg", deadline)?;
        Ok(())
    }

    fn burn_caption(
        &self,
        input: &Path,
        caption: &Caption,
        out: &Path,
        deadline: Deadline,
    ) -> MediaResult<()> {
        let text_file = write_caption_file(caption, out)?;
        let mut cmd = ffmpeg();
        cmd.arg("-i")
            .arg(input)
            .args(["-map", "0:v:0", "-map", "0:a?"])
            .args(["-vf", &drawtext_filter(caption, &text_file)]);
        self.video_codec_args(&mut cmd);
        cmd.args(["-c:a", "copy", "-movflags", "+faststart"]).arg(out);
        run_tool(&mut cmd, "ffmpeg", deadline)?;
        Ok(())
    }
}

/// Return `true` when both `ffmpeg` and `ffprobe` are runnable.
pub fn is_ffmpeg_on_path() -> bool {
    media::is_ffmpeg_on_path()
}

/// Create the parent directory of `path` if needed.
pub fn ensure_parent_dir(path: &Path) -> ComposeResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
