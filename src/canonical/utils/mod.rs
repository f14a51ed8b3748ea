//! Shared helpers for the canonicalization pipeline.

pub mod fs;
