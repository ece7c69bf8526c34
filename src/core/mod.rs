// LogTrail - core/mod.rs
//
// Core decoding logic: pattern compilation, segmentation, field mapping,
// classification and rendering.
// Dependencies: util layer and pure-logic crates (regex, chrono, serde, csv).
// Must NOT depend on: app or platform. No file or thread management here.

pub mod classifier;
pub mod datetime;
pub mod decoder;
pub mod export;
pub mod mapper;
pub mod model;
pub mod pattern;
pub mod reader;
pub mod segmenter;
