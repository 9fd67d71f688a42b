use std::collections::HashMap;
use std::path::PathBuf;

use super::*;
use crate::assets::media::MediaInfo;
use crate::compose::backend::{Caption, SegmentRender};
use crate::foundation::error::MediaResult;

/// Decodes from a fixed table; everything else is unsupported.
#[derive(Default)]
struct TableDecoder {
    pcm: HashMap<PathBuf, AudioPcm>,
}

fn unsupported<T>() -> MediaResult<T> {
    Err(MediaError::Io(std::io::Error::other("unsupported")))
}

impl MediaBackend for TableDecoder {
    fn probe(&self, _path: &Path, _deadline: Deadline) -> MediaResult<MediaInfo> {
        unsupported()
    }

    fn decode_audio(
        &self,
        path: &Path,
        _sample_rate: u32,
        _deadline: Deadline,
    ) -> MediaResult<AudioPcm> {
        self.pcm
            .get(path)
            .cloned()
            .ok_or_else(|| MediaError::decode(path, "corrupt"))
    }

    fn render_segment(&self, _job: &SegmentRender, _deadline: Deadline) -> MediaResult<()> {
        unsupported()
    }

    fn concat_video(&self, _inputs: &[PathBuf], _out: &Path, _deadline: Deadline) -> MediaResult<()> {
        unsupported()
    }

    fn attach_audio(
        &self,
        _video: &Path,
        _audio: &PcmFile,
        _out: &Path,
        _deadline: Deadline,
    ) -> MediaResult<()> {
        unsupported()
    }

    fn burn_caption(
        &self,
        _input: &Path,
        _caption: &Caption,
        _out: &Path,
        _deadline: Deadline,
    ) -> MediaResult<()> {
        unsupported()
    }
}

fn ramp(sample_rate: u32, secs: f64) -> AudioPcm {
    let frames = (secs * f64::from(sample_rate)).round() as usize;
    AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: (0..frames * 2).map(|i| (i % 97) as f32 / 100.0 + 0.01).collect(),
    }
}

fn aligner() -> DurationAligner {
    DurationAligner::new(1_000, 2).unwrap()
}

#[test]
fn shorter_audio_is_padded_with_exact_silence() {
    let src = ramp(1_000, 3.2);
    let (out, action, native) = aligner().align_pcm(Some(&src), 4_000);
    assert_eq!(native, 3_200);
    assert_eq!(action, AlignAction::Padded { sample_frames: 800 });
    assert_eq!(out.sample_frames(), 4_000);
    assert_eq!(&out.interleaved_f32[..6_400], &src.interleaved_f32[..]);
    assert!(out.interleaved_f32[6_400..].iter().all(|s| *s == 0.0));
}

#[test]
fn longer_audio_keeps_its_head() {
    let src = ramp(1_000, 7.1);
    let (out, action, _) = aligner().align_pcm(Some(&src), 5_000);
    assert_eq!(action, AlignAction::Trimmed { sample_frames: 2_100 });
    assert_eq!(out.duration_secs(), 5.0);
    assert_eq!(&out.interleaved_f32[..], &src.interleaved_f32[..10_000]);
}

#[test]
fn equal_length_passes_through() {
    let src = ramp(1_000, 6.0);
    let (out, action, _) = aligner().align_pcm(Some(&src), 6_000);
    assert_eq!(action, AlignAction::Unchanged);
    assert_eq!(out, src);
}

#[test]
fn align_pcm_without_samples_is_silent() {
    let (out, action, native) = aligner().align_pcm(None, 2_500);
    assert_eq!((action, native), (AlignAction::Silent, 0));
    assert_eq!(out.sample_frames(), 2_500);
    assert!(out.interleaved_f32.iter().all(|s| *s == 0.0));

    let empty = AudioPcm::empty(1_000, 2);
    let (_, action, _) = aligner().align_pcm(Some(&empty), 10);
    assert_eq!(action, AlignAction::Silent);
}

#[test]
fn non_positive_targets_are_invalid() {
    let seg = SegmentKind::Scene(4);
    for bad in [0.0, -1.0, f64::INFINITY, f64::NAN] {
        assert!(matches!(
            aligner().target_for_secs(seg, bad),
            Err(ComposeError::InvalidDuration { segment, .. }) if segment == seg
        ));
    }
    assert_eq!(aligner().target_for_secs(seg, 4.0).unwrap(), 4_000);
}

#[test]
fn align_writes_pcm_file_of_target_length() {
    let dir = tempfile::tempdir().unwrap();
    let narration = dir.path().join("n1.wav");
    let mut backend = TableDecoder::default();
    backend.pcm.insert(narration.clone(), ramp(1_000, 3.2));

    let out = dir.path().join("scene_0001.f32le");
    let aligned = aligner()
        .align(
            &backend,
            &AudioAsset {
                segment: SegmentKind::Scene(1),
                path: Some(narration),
            },
            "Hello world",
            4.0,
            &out,
            Deadline::none(),
        )
        .unwrap();
    assert_eq!(aligned.duration_secs(), 4.0);
    assert_eq!(aligned.native_sample_frames, 3_200);
    assert_eq!(std::fs::metadata(&out).unwrap().len(), 4_000 * 2 * 4);
}

#[test]
fn unspeakable_scene_tolerates_absent_or_broken_narration() {
    let dir = tempfile::tempdir().unwrap();
    let backend = TableDecoder::default();
    for path in [None, Some(dir.path().join("broken.wav"))] {
        let aligned = aligner()
            .align(
                &backend,
                &AudioAsset {
                    segment: SegmentKind::Scene(2),
                    path,
                },
                " ... ",
                1.5,
                &dir.path().join("scene_0002.f32le"),
                Deadline::none(),
            )
            .unwrap();
        assert_eq!(aligned.action, AlignAction::Silent);
        assert_eq!(aligned.pcm.sample_frames, 1_500);
    }
}

#[test]
fn speakable_scene_with_broken_narration_is_asset_decode() {
    let dir = tempfile::tempdir().unwrap();
    let err = aligner()
        .align(
            &TableDecoder::default(),
            &AudioAsset {
                segment: SegmentKind::Scene(3),
                path: Some(dir.path().join("broken.wav")),
            },
            "Some words",
            2.0,
            &dir.path().join("scene_0003.f32le"),
            Deadline::none(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::AssetDecode {
            segment: SegmentKind::Scene(3),
            ..
        }
    ));
}

#[test]
fn speakable_scene_with_empty_narration_is_asset_decode() {
    let dir = tempfile::tempdir().unwrap();
    let narration = dir.path().join("empty.wav");
    let mut backend = TableDecoder::default();
    backend.pcm.insert(narration.clone(), AudioPcm::empty(1_000, 2));
    let out = dir.path().join("scene_0004.f32le");

    let err = aligner()
        .align(
            &backend,
            &AudioAsset {
                segment: SegmentKind::Scene(4),
                path: Some(narration.clone()),
            },
            "Real narration words",
            2.0,
            &out,
            Deadline::none(),
        )
        .unwrap_err();
    match err {
        ComposeError::AssetDecode { segment, path, .. } => {
            assert_eq!(segment, SegmentKind::Scene(4));
            assert_eq!(path, Some(narration.clone()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.exists());

    let aligned = aligner()
        .align(
            &backend,
            &AudioAsset {
                segment: SegmentKind::Scene(4),
                path: Some(narration),
            },
            "",
            2.0,
            &out,
            Deadline::none(),
        )
        .unwrap();
    assert_eq!(aligned.action, AlignAction::Silent);
    assert_eq!(aligned.pcm.sample_frames, 2_000);
}
