//! Centralized limits and thresholds for the runtime.
//!
//! Shared constants for recursion depths, operation counts and batch sizes.
//! Keeping them in one place lets the configuration layer use them as
//! defaults and keeps the type engine and the scheduler consistent.
//!
//! # Categories
//!
//! - **Recursion Depths**: Limits that stop runaway recursion over type graphs
//! - **Operation Counts**: Work budgets for iterative algorithms
//! - **Scheduling**: Batch sizes for cooperative delivery

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum nesting depth for a single subtype query.
///
/// Interned type graphs are finite, but generic-function bounds may refer
/// back to their own parameters. When the depth is exceeded the checker
/// answers `false` and flags the query as overflowed.
///
/// ```text
/// // Self-referential bound: T extends Comparable<T>
/// 0^(0^)<Comparable<0^>>
/// ```
pub const MAX_SUBTYPE_DEPTH: u32 = 100;

/// Maximum depth for generic substitution.
///
/// Substitution walks the type structure once per nesting level; recipes
/// emitted by a compiler never come close, so hitting this limit indicates a
/// malformed environment.
pub const MAX_INSTANTIATION_DEPTH: u32 = 50;

/// Maximum number of supertype hops followed when resolving the path from a
/// class to one of its ancestors.
pub const MAX_SUPERTYPE_PATH_DEPTH: usize = 64;

/// Maximum nesting depth of a structural message crossing the worker bridge.
///
/// Lists are mutable and may contain themselves; the encoder gives up past
/// this depth instead of recursing forever.
pub const MAX_MESSAGE_DEPTH: usize = 256;

// =============================================================================
// Operation Count Limits
// =============================================================================

/// Total number of recursive steps one subtype query may take.
pub const MAX_SUBTYPE_ITERATIONS: u32 = 100_000;

/// Maximum number of distinct (source, target) pairs the cycle guard tracks.
pub const MAX_VISITING_PAIRS: u32 = 10_000;

// =============================================================================
// Scheduling
// =============================================================================

/// Number of buffered stream events delivered per microtask when a paused
/// subscription resumes.
///
/// One event per turn keeps a long buffer from monopolising the queue.
pub const DEFAULT_STREAM_FLUSH_BATCH: usize = 1;
