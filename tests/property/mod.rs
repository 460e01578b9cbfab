//! Property-based tests for snapshot determinism and round trips

mod determinism;
