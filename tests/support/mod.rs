#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use reelsync::assets::media::{AudioStreamInfo, VideoStreamInfo};
use reelsync::{
    AudioPcm, CancelToken, Caption, Deadline, Fps, MediaBackend, MediaError, MediaInfo,
    MediaResult, PcmFile, SegmentRender, VisualKind,
};

/// In-process backend. Media files are JSON [`MediaInfo`]; narration files are JSON `{"secs": ..}`.
#[derive(Default)]
pub struct FakeMedia {
    pub fps: Fps,
    /// Frames added to every concatenated video.
    pub concat_skew: i64,
    /// Visuals whose render blocks until the deadline expires.
    pub hang_on: Vec<PathBuf>,
    /// Block every concatenation until the deadline expires.
    pub hang_concat: bool,
    /// Cancel this token once this many segments were rendered.
    pub cancel_after: Option<(usize, CancelToken)>,
    pub renders: Mutex<Vec<SegmentRender>>,
    pub burns: Mutex<Vec<Caption>>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Narration {
    secs: f64,
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A clip lasting `secs` at 25 fps.
    pub fn clip(&self, name: &str, secs: f64) -> PathBuf {
        let path = self.path(name);
        let fps = Fps::default();
        write_info(&path, &clip_info(fps, fps.secs_to_frames_round(secs), None));
        path
    }

    pub fn still(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, b"still").unwrap();
        path
    }

    pub fn narration(&self, name: &str, secs: f64) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, serde_json::to_vec(&Narration { secs }).unwrap()).unwrap();
        path
    }

    pub fn corrupt(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, b"\x00\x01 not media").unwrap();
        path
    }
}

pub fn read_info(path: &Path) -> MediaInfo {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

pub fn frames_of(path: &Path) -> u64 {
    read_info(path)
        .video
        .and_then(|v| v.frame_count)
        .unwrap_or(0)
}

fn write_info(path: &Path, info: &MediaInfo) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, serde_json::to_vec(info).unwrap()).unwrap();
}

fn clip_info(fps: Fps, frames: u64, audio: Option<&PcmFile>) -> MediaInfo {
    let secs = fps.frames_to_secs(frames);
    MediaInfo {
        duration_secs: secs,
        video: Some(VideoStreamInfo {
            width: 1080,
            height: 1920,
            frame_count: Some(frames),
            duration_secs: secs,
        }),
        audio: audio.map(|a| AudioStreamInfo {
            sample_rate: a.sample_rate,
            channels: a.channels,
            duration_secs: a.duration_secs(),
        }),
    }
}

fn load(path: &Path) -> MediaResult<MediaInfo> {
    if !path.exists() {
        return Err(MediaError::Missing(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| MediaError::decode(path, e.to_string()))
}

fn frames(info: &MediaInfo) -> u64 {
    info.video.as_ref().and_then(|v| v.frame_count).unwrap_or(0)
}

fn hang(deadline: Deadline) -> MediaResult<()> {
    while !deadline.is_expired() {
        std::thread::sleep(Duration::from_millis(5));
    }
    Err(MediaError::TimedOut {
        tool: "fake",
        elapsed: deadline.limit().unwrap_or_default(),
    })
}

impl FakeMedia {
    pub fn rendered_segments(&self) -> Vec<reelsync::SegmentKind> {
        let mut segs: Vec<_> = self.renders.lock().unwrap().iter().map(|r| r.segment).collect();
        segs.sort();
        segs
    }
}

impl MediaBackend for FakeMedia {
    fn probe(&self, path: &Path, _deadline: Deadline) -> MediaResult<MediaInfo> {
        load(path)
    }

    fn classify(&self, path: &Path) -> MediaResult<VisualKind> {
        if !path.exists() {
            return Err(MediaError::Missing(path.to_path_buf()));
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("png" | "jpg") => Ok(VisualKind::Still),
            _ => Ok(VisualKind::Clip),
        }
    }

    fn decode_audio(
        &self,
        path: &Path,
        sample_rate: u32,
        _deadline: Deadline,
    ) -> MediaResult<AudioPcm> {
        if !path.exists() {
            return Err(MediaError::Missing(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let secs = match serde_json::from_slice::<Narration>(&bytes) {
            Ok(n) => n.secs,
            // Visual clips used as bookends carry no narration record; treat them as silent.
            Err(_) if serde_json::from_slice::<MediaInfo>(&bytes).is_ok() => 0.0,
            Err(e) => return Err(MediaError::decode(path, e.to_string())),
        };
        let n = (secs * f64::from(sample_rate)).round() as usize;
        Ok(AudioPcm {
            sample_rate,
            channels: 2,
            interleaved_f32: (0..n * 2).map(|i| (i % 89) as f32 / 100.0 + 0.05).collect(),
        })
    }

    fn render_segment(&self, job: &SegmentRender, deadline: Deadline) -> MediaResult<()> {
        if let Some(p) = job.visual.path() {
            if self.hang_on.iter().any(|h| h == p) {
                return hang(deadline);
            }
            if job.visual != reelsync::VisualSource::Still(p.to_path_buf()) {
                load(p)?;
            }
        }
        write_info(&job.out_path, &clip_info(job.fps, job.frames, Some(&job.audio)));
        let count = {
            let mut renders = self.renders.lock().unwrap();
            renders.push(job.clone());
            renders.len()
        };
        if let Some((after, token)) = &self.cancel_after
            && count >= *after
        {
            token.cancel();
        }
        Ok(())
    }

    fn concat_video(&self, inputs: &[PathBuf], out: &Path, deadline: Deadline) -> MediaResult<()> {
        if self.hang_concat {
            return hang(deadline);
        }
        let mut total = 0;
        for p in inputs {
            total += frames(&load(p)?);
        }
        let total = total.saturating_add_signed(self.concat_skew);
        write_info(out, &clip_info(self.fps, total, None));
        Ok(())
    }

    fn attach_audio(
        &self,
        video: &Path,
        audio: &PcmFile,
        out: &Path,
        _deadline: Deadline,
    ) -> MediaResult<()> {
        let n = frames(&load(video)?);
        audio.read()?;
        write_info(out, &clip_info(self.fps, n, Some(audio)));
        Ok(())
    }

    fn burn_caption(
        &self,
        input: &Path,
        caption: &Caption,
        out: &Path,
        _deadline: Deadline,
    ) -> MediaResult<()> {
        let info = load(input)?;
        write_info(out, &info);
        self.burns.lock().unwrap().push(caption.clone());
        Ok(())
    }
}
