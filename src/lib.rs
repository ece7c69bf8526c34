// LogTrail - lib.rs
//
// Library entry point. The command-line runner in `main.rs` is a thin layer
// over these modules; integration tests drive them directly.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
