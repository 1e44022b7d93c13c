//! A linearizability testing library for concurrent Rust objects.
//!
//! This crate stress-tests a concurrent object against a sequential model
//! of it. Random scenarios of operation calls are executed over real
//! threads many times each, and every recorded history is checked for a
//! legal linearization. Failing scenarios are minimized before being
//! reported. See the [`testing`] module for the full engine and
//! [`models`] for ready-made sequential models.

pub mod models;
pub mod testing;
