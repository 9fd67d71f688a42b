#[path = "fake_media.rs"]
mod fake_media;

use super::*;
use crate::audio::align::DurationAligner;
use crate::scene::model::{AudioAsset, VisualKind};
use fake_media::{FakeMedia, read_info, write_clip, write_narration};

fn aligned(dir: &Path, segment: SegmentKind, narration_secs: f64, frames: u64) -> AlignedAudio {
    let backend = FakeMedia::default();
    let aligner = DurationAligner::new(48_000, 2).unwrap();
    let narration = dir.join(format!("{}.json", segment.file_stem()));
    write_narration(&narration, narration_secs);
    aligner
        .align_to(
            &backend,
            &AudioAsset {
                segment,
                path: Some(narration),
            },
            "Narrated words",
            aligner.target_for_frames(frames, Fps::default()),
            &dir.join(format!("{}.f32le", segment.file_stem())),
            Deadline::none(),
        )
        .unwrap()
}

fn clip(dir: &Path, segment: SegmentKind, frames: u64) -> VisualAsset {
    let path = dir.join(format!("{}.mp4.json", segment.file_stem()));
    write_clip(&path, Fps::default(), frames);
    VisualAsset {
        segment,
        path,
        kind: VisualKind::Clip,
        frames,
    }
}

#[test]
fn muxed_scene_keeps_visual_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeMedia::default();
    let muxer = SceneMuxer::new(&backend, Fps::default(), Canvas::default(), 0.04);
    let seg = SegmentKind::Scene(1);
    let audio = aligned(dir.path(), seg, 3.2, 100);
    let out = dir.path().join("scene_0001.mp4");

    let scene = muxer
        .mux(&clip(dir.path(), seg, 100), &audio, None, &out, Deadline::none())
        .unwrap();
    assert_eq!(scene.frames, 100);
    assert_eq!(scene.duration_secs(), 4.0);
    assert!(!scene.degraded);

    let info = read_info(&out);
    assert_eq!(info.video.unwrap().frame_count, Some(100));
    assert_eq!(info.audio.unwrap().duration_secs, 4.0);
}

#[test]
fn blank_caption_is_not_rendered() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeMedia::default();
    let muxer = SceneMuxer::new(&backend, Fps::default(), Canvas::default(), 0.04);
    let seg = SegmentKind::Scene(2);
    let audio = aligned(dir.path(), seg, 2.0, 50);
    let blank = Caption {
        text: "  ".to_string(),
        font_size: 40,
        margin_px: 120,
        box_opacity: 0.5,
        font_file: None,
    };
    muxer
        .mux(
            &clip(dir.path(), seg, 50),
            &audio,
            Some(&blank),
            &dir.path().join("scene_0002.mp4"),
            Deadline::none(),
        )
        .unwrap();
    assert_eq!(backend.renders.lock().unwrap()[0].caption, None);
}

#[test]
fn audio_that_was_not_aligned_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeMedia::default();
    let muxer = SceneMuxer::new(&backend, Fps::default(), Canvas::default(), 0.04);
    let seg = SegmentKind::Scene(3);
    let audio = aligned(dir.path(), seg, 2.0, 50);
    let err = muxer
        .mux(
            &clip(dir.path(), seg, 100),
            &audio,
            None,
            &dir.path().join("scene_0003.mp4"),
            Deadline::none(),
        )
        .unwrap_err();
    assert!(matches!(err, ComposeError::Validation(_)));
    assert!(backend.renders.lock().unwrap().is_empty());
}

#[test]
fn frame_count_mismatch_after_render_is_asset_decode() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeMedia {
        render_skew: 1,
        ..FakeMedia::default()
    };
    let muxer = SceneMuxer::new(&backend, Fps::default(), Canvas::default(), 0.04);
    let seg = SegmentKind::Scene(4);
    let audio = aligned(dir.path(), seg, 1.0, 25);
    let err = muxer
        .mux(
            &clip(dir.path(), seg, 25),
            &audio,
            None,
            &dir.path().join("scene_0004.mp4"),
            Deadline::none(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::AssetDecode { segment: SegmentKind::Scene(4), .. }
    ));
}

#[test]
fn missing_visual_is_attributed_to_scene() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeMedia::default();
    let muxer = SceneMuxer::new(&backend, Fps::default(), Canvas::default(), 0.04);
    let seg = SegmentKind::Scene(5);
    let audio = aligned(dir.path(), seg, 1.0, 25);
    let visual = VisualAsset {
        segment: seg,
        path: dir.path().join("gone.mp4"),
        kind: VisualKind::Clip,
        frames: 25,
    };
    let err = muxer
        .mux(&visual, &audio, None, &dir.path().join("scene_0005.mp4"), Deadline::none())
        .unwrap_err();
    match err {
        ComposeError::AssetDecode { segment, path, .. } => {
            assert_eq!(segment, seg);
            assert_eq!(path, Some(dir.path().join("gone.mp4")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn placeholder_is_blank_and_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeMedia::default();
    let muxer = SceneMuxer::new(&backend, Fps::default(), Canvas::default(), 0.04);
    let seg = SegmentKind::Scene(6);
    let audio = aligned(dir.path(), seg, 0.0, 75);
    let scene = muxer
        .mux_placeholder(seg, 75, &audio, &dir.path().join("p.mp4"), Deadline::none())
        .unwrap();
    assert!(scene.degraded);
    assert_eq!(scene.frames, 75);
    assert_eq!(backend.renders.lock().unwrap()[0].visual, VisualSource::Blank);
}
