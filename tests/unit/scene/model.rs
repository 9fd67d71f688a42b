use super::*;

#[test]
fn segment_order_puts_bookends_around_scenes() {
    let mut segs = vec![
        SegmentKind::Outro,
        SegmentKind::Scene(10),
        SegmentKind::Scene(2),
        SegmentKind::Intro,
    ];
    segs.sort();
    assert_eq!(
        segs,
        vec![
            SegmentKind::Intro,
            SegmentKind::Scene(2),
            SegmentKind::Scene(10),
            SegmentKind::Outro
        ]
    );
    assert_eq!(SegmentKind::Scene(3).file_stem(), "scene_0003");
    assert_eq!(SegmentKind::Scene(3).to_string(), "scene 3");
}

#[test]
fn unspeakable_means_no_alphanumeric_content() {
    assert!(is_unspeakable(""));
    assert!(is_unspeakable("  ... -- !? "));
    assert!(!is_unspeakable("Chapter 1"));
    assert!(!is_unspeakable("é"));
    assert!(!is_unspeakable("42"));
}

#[test]
fn scene_accepts_original_field_names() {
    let s: Scene = serde_json::from_str(
        r#"{"scene": 4, "text": "Hello there", "duration": 5.5, "source_page": 12}"#,
    )
    .unwrap();
    assert_eq!(s.scene_number, 4);
    assert_eq!(s.narration_text, "Hello there");
    assert_eq!(s.target_duration, 5.5);
    assert_eq!(s.source_reference.as_deref(), Some("12"));

    let s: Scene = serde_json::from_str(
        r#"{"scene_number": 1, "target_duration": 2.0, "source_reference": "p. 3"}"#,
    )
    .unwrap();
    assert_eq!(s.narration_text, "");
    assert_eq!(s.source_label(), Some("p. 3"));

    let s: Scene =
        serde_json::from_str(r#"{"scene_number": 1, "target_duration": 2.0, "source_reference": null}"#)
            .unwrap();
    assert_eq!(s.source_reference, None);
}

#[test]
fn blank_source_reference_has_no_label() {
    let s = Scene::new(1, "x", 1.0).with_source("   ");
    assert_eq!(s.source_label(), None);
}

#[test]
fn asset_ref_parses_bare_and_tagged_forms() {
    let refs: Vec<AssetRef> =
        serde_json::from_str(r#"["a.mp4", {"scene_number": 2, "path": "b.png"}]"#).unwrap();
    assert_eq!(refs[0], AssetRef::from("a.mp4"));
    assert_eq!(refs[0].declared_scene(), None);
    assert_eq!(refs[1].declared_scene(), Some(2));
    assert_eq!(refs[1].path(), Path::new("b.png"));
}

#[test]
fn asset_ref_resolves_only_relative_paths() {
    let root = Path::new("/jobs/run1");
    assert_eq!(
        AssetRef::from("clips/a.mp4").resolved_against(root).path(),
        Path::new("/jobs/run1/clips/a.mp4")
    );
    assert_eq!(
        AssetRef::from("/abs/a.mp4").resolved_against(root).path(),
        Path::new("/abs/a.mp4")
    );
}

#[test]
fn visual_duration_derives_from_frames() {
    let v = VisualAsset {
        segment: SegmentKind::Scene(1),
        path: PathBuf::from("a.png"),
        kind: VisualKind::Still,
        frames: 100,
    };
    assert_eq!(v.duration_secs(Fps::default()), 4.0);
}
