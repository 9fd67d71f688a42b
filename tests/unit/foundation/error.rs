use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ComposeError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        ComposeError::EmptySequence
            .to_string()
            .contains("empty scene sequence")
    );
    let err = ComposeError::asset_decode(
        SegmentKind::Scene(3),
        Some(PathBuf::from("clips/3.mp4")),
        "no video stream",
    );
    let msg = err.to_string();
    assert!(msg.starts_with("scene 3:"), "{msg}");
    assert!(msg.contains("clips/3.mp4"), "{msg}");
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ComposeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn timeouts_map_to_scene_timeout_with_configured_limit() {
    let limit = Duration::from_secs(5);
    let err = ComposeError::for_segment(
        SegmentKind::Scene(2),
        None,
        Some(limit),
        MediaError::TimedOut {
            tool: "ffmpeg",
            elapsed: Duration::from_millis(5012),
        },
    );
    match err {
        ComposeError::SceneTimeout { segment, limit: l } => {
            assert_eq!(segment, SegmentKind::Scene(2));
            assert_eq!(l, limit);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn tool_failures_map_to_asset_decode() {
    let err = ComposeError::for_segment(
        SegmentKind::Intro,
        Some(PathBuf::from("intro.mp4")),
        None,
        MediaError::Tool {
            tool: "ffprobe",
            status: "exit status: 1".to_string(),
            stderr: "Invalid data found".to_string(),
        },
    );
    assert!(err.is_recoverable());
    assert_eq!(err.segment(), Some(SegmentKind::Intro));
    assert!(err.to_string().contains("Invalid data found"));

    let missing = ComposeError::for_segment(
        SegmentKind::Scene(1),
        None,
        None,
        MediaError::Missing(PathBuf::from("gone.wav")),
    );
    assert!(matches!(
        missing,
        ComposeError::AssetDecode { path: Some(ref p), .. } if p == &PathBuf::from("gone.wav")
    ));
}

#[test]
fn structural_errors_are_not_recoverable() {
    assert!(!ComposeError::EmptySequence.is_recoverable());
    assert!(
        !ComposeError::SceneCountMismatch {
            scenes: 3,
            visuals: 2,
            audios: 3
        }
        .is_recoverable()
    );
    assert!(
        !ComposeError::ConcatenationDrift {
            expected_secs: 10.0,
            actual_secs: 10.2,
            tolerance_secs: 0.04
        }
        .is_recoverable()
    );
    assert!(!ComposeError::Cancelled.is_recoverable());
}
