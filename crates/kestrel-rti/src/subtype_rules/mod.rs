//! Subtype rule families, each an `impl SubtypeChecker` block.
//!
//! - `nullability`: `Null`, `Object`, `T*`, `T?` and `FutureOr<T>` on either side
//! - `functions`: function and generic-function signatures
//! - `interfaces`: class types through the supertype path table
//! - `records`: record shapes

mod functions;
mod interfaces;
mod nullability;
mod records;
