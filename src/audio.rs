/// Duration alignment of narration tracks.
pub mod align;
/// Interleaved f32 PCM helpers.
pub mod pcm;
