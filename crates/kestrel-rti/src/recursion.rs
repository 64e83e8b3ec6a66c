//! Termination budgets for the recursive type walks.
//!
//! Bounds on generic-function parameters may mention those same parameters,
//! so a subtype query can revisit a pair it is already deciding. The
//! [`PairGuard`] answers such a revisit with [`Admission::Assumed`] and
//! refuses any step past the configured [`SubtypeLimits`]. Either way the
//! guard records that it was tripped, so the caller can report the query
//! as overflowed instead of overflowing the stack.
//!
//! Substitution never needs cycle detection (a type is a finite tree of
//! interned nodes), only a nesting ceiling: see [`NestingCounter`].

use crate::subtype::SubtypeLimits;
use kestrel_common::limits;
use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Why the guard refused a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Too many comparisons nested inside each other.
    Depth,
    /// Too many comparisons attempted by this query overall.
    Steps,
    /// Too many distinct pairs in progress at once.
    Pending,
}

/// Outcome of [`PairGuard::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The pair is now in progress; release it when done.
    Admitted,
    /// The pair is already being decided further up.
    Assumed,
    /// A budget ran out.
    Refused(Exhaustion),
}

impl Admission {
    #[cfg(test)]
    pub fn is_admitted(self) -> bool {
        self == Self::Admitted
    }
}

/// In-progress set plus the depth and step budgets of one subtype query.
pub struct PairGuard<K: Hash + Eq + Copy> {
    pending: FxHashSet<K>,
    nesting: u32,
    steps: u32,
    limits: SubtypeLimits,
    max_pending: usize,
    tripped: bool,
}

impl<K: Hash + Eq + Copy> PairGuard<K> {
    pub fn new(limits: SubtypeLimits) -> Self {
        Self {
            pending: FxHashSet::default(),
            nesting: 0,
            steps: 0,
            limits,
            max_pending: limits::MAX_VISITING_PAIRS as usize,
            tripped: false,
        }
    }

    #[cfg(test)]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Count one step and try to mark `key` as in progress.
    ///
    /// Budgets are checked before the revisit test: a query that has run
    /// out of steps is refused even for a pair it has seen.
    pub fn admit(&mut self, key: K) -> Admission {
        self.steps = self.steps.saturating_add(1);
        let refusal = if self.steps > self.limits.max_iterations {
            Some(Exhaustion::Steps)
        } else if self.nesting >= self.limits.max_depth {
            Some(Exhaustion::Depth)
        } else if self.pending.contains(&key) {
            self.tripped = true;
            return Admission::Assumed;
        } else if self.pending.len() >= self.max_pending {
            Some(Exhaustion::Pending)
        } else {
            None
        };

        if let Some(reason) = refusal {
            self.tripped = true;
            return Admission::Refused(reason);
        }
        self.pending.insert(key);
        self.nesting += 1;
        Admission::Admitted
    }

    /// Finish a pair previously admitted.
    pub fn release(&mut self, key: K) {
        let removed = self.pending.remove(&key);
        debug_assert!(removed, "released a pair that was never admitted");
        self.nesting = self.nesting.saturating_sub(1);
    }

    /// Run `f` with `key` in progress, or report why it was not admitted.
    #[cfg(test)]
    pub fn within<T>(&mut self, key: K, f: impl FnOnce(&mut Self) -> T) -> Result<T, Admission> {
        match self.admit(key) {
            Admission::Admitted => {
                let out = f(self);
                self.release(key);
                Ok(out)
            }
            other => Err(other),
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    #[cfg(test)]
    pub fn nesting(&self) -> u32 {
        self.nesting
    }

    #[cfg(test)]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Sticky: set by any revisit or refusal since construction.
    #[inline]
    pub fn tripped(&self) -> bool {
        self.tripped
    }
}

/// Nesting ceiling for substitution.
pub struct NestingCounter {
    level: u32,
    ceiling: u32,
}

impl NestingCounter {
    pub fn new(ceiling: u32) -> Self {
        Self { level: 0, ceiling }
    }

    pub fn for_substitution() -> Self {
        Self::new(limits::MAX_INSTANTIATION_DEPTH)
    }

    /// Go one level deeper. `false` means the ceiling was hit and the
    /// caller must not call [`ascend`](Self::ascend).
    #[inline]
    pub fn descend(&mut self) -> bool {
        if self.level >= self.ceiling {
            return false;
        }
        self.level += 1;
        true
    }

    #[inline]
    pub fn ascend(&mut self) {
        debug_assert!(self.level > 0, "ascend without descend");
        self.level = self.level.saturating_sub(1);
    }

    #[cfg(test)]
    pub fn level(&self) -> u32 {
        self.level
    }
}

#[cfg(test)]
#[path = "tests/recursion_tests.rs"]
mod tests;
