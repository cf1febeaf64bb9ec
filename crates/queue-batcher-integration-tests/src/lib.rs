//! End-to-end tests for queue-batcher.
//!
//! The tests live under `tests/` and drive complete consumers against the
//! in-memory provider on Tokio's paused clock.
