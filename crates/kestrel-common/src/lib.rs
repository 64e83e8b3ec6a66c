//! Common types and utilities for the kestrel runtime.
//!
//! This crate provides foundational types used across all kestrel crates:
//! - String interning (`Atom`, `Interner`)
//! - Runtime limits and thresholds

// String interning for class and member names
pub mod interner;
pub use interner::{Atom, Interner};

// Centralized limits and thresholds
pub mod limits;
