//! Property-based tests entry point

mod property;
