// LogTrail - platform/mod.rs
//
// Platform abstraction layer: configuration directories and config.toml.
// Dependencies: directories crate, core types for validating config values.
// Must NOT depend on: app.

pub mod config;
