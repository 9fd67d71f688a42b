use std::path::PathBuf;

use super::*;

fn caption(text: &str) -> Caption {
    Caption {
        text: text.to_string(),
        font_size: 40,
        margin_px: 120,
        box_opacity: 0.5,
        font_file: None,
    }
}

#[test]
fn normalize_chain_targets_canvas_and_rate() {
    let chain = normalize_chain(Canvas::default(), Fps::default(), 4.0);
    assert!(chain.starts_with("scale=1080:1920:force_original_aspect_ratio=decrease,"));
    assert!(chain.contains("pad=1080:1920:(ow-iw)/2:(oh-ih)/2:color=black"));
    assert!(chain.contains("fps=25/1"));
    assert!(chain.contains("tpad=stop_mode=clone:stop_duration=4.000"));
    assert!(chain.ends_with("format=yuv420p"));
    assert!(!chain.contains(char::is_whitespace));
}

#[test]
fn drawtext_reads_text_from_file_without_expansion() {
    let f = drawtext_filter(&caption("ignored"), Path::new("/tmp/work dir/scene_0001.caption.txt"));
    assert!(f.starts_with("drawtext=textfile=/tmp/work dir/scene_0001.caption.txt:expansion=none"));
    assert!(f.contains("y=h-text_h-120"));
    assert!(f.contains("boxcolor=black@0.50"));
    assert!(!f.contains("fontfile"));

    let mut c = caption("x");
    c.font_file = Some(PathBuf::from("C:\\Fonts\\a,b.ttf"));
    let f = drawtext_filter(&c, Path::new("t.txt"));
    assert!(f.ends_with(":fontfile=C\\:/Fonts/a\\,b.ttf"));
}

#[test]
fn filter_paths_escape_separators() {
    assert_eq!(
        escape_filter_path(Path::new("/a:b/c'd/[e];f,g")),
        "/a\\:b/c\\'d/\\[e\\]\\;f\\,g"
    );
}

#[test]
fn concat_list_quotes_single_quotes() {
    assert_eq!(
        concat_list_line(Path::new("/w/it's.mp4")),
        "file '/w/it'\\''s.mp4'\n"
    );
}

#[test]
fn wrap_caption_respects_width_budget() {
    let text = "Sources: 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20";
    let wrapped = wrap_caption(text, 1080, 40);
    let budget = ((1080.0 * 0.9) / (40.0 * 0.55)) as usize;
    assert!(wrapped.lines().count() > 1);
    for line in wrapped.lines() {
        assert!(line.chars().count() <= budget, "{line:?}");
    }
    assert_eq!(
        wrapped.split_whitespace().collect::<Vec<_>>(),
        text.split_whitespace().collect::<Vec<_>>()
    );
}

#[test]
fn wrap_caption_keeps_short_text_on_one_line() {
    assert_eq!(wrap_caption("Source:  12 ", 1080, 40), "Source: 12");
    assert_eq!(wrap_caption("   ", 1080, 40), "");
}

#[test]
fn encode_settings_default_matches_delivery_profile() {
    let s = EncodeSettings::default();
    assert_eq!((s.preset.as_str(), s.crf, s.audio_bitrate.as_str()), ("medium", 23, "128k"));
    let partial: EncodeSettings = serde_json::from_str(r#"{"crf": 18}"#).unwrap();
    assert_eq!(partial.crf, 18);
    assert_eq!(partial.preset, "medium");
}
