/// Media operations the pipeline depends on.
pub mod backend;
/// Cooperative cancellation.
pub mod cancel;
/// Timeline assembly.
pub mod concat;
/// Composition options.
pub mod config;
/// Per-scene muxing.
pub mod mux;
/// Burned-in captions and the citation footer.
pub mod overlay;
/// End-to-end orchestration.
pub mod pipeline;
