// LogTrail - app/mod.rs
//
// Application layer: providers, worker threads, the pending queue and sinks.
// Dependencies: core layer.
// Must NOT depend on: platform specifics.

pub mod dispatch;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod tail;
pub mod worker;
