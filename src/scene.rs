/// Composition job input: scene records plus the asset collections produced for them.
pub mod job;
/// Output manifest describing the final timeline.
pub mod manifest;
/// Scene, segment and asset types.
pub mod model;
