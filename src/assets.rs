/// ffprobe/ffmpeg probing and audio decoding.
pub mod media;
/// Deadline-bounded subprocess execution.
pub mod process;
