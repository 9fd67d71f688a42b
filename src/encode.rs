/// ffmpeg-backed [`MediaBackend`](crate::MediaBackend).
pub mod ffmpeg;
/// Filter-graph and argument builders.
pub mod filters;
