//! Interface subtyping.
//!
//! `C<S1..Sn> <: D<T1..Tm>` when `D` is `C` or one of its ancestors. The
//! arguments of `C` are carried up the supertype path to `D` and compared
//! pairwise under `D`'s declared variance. Missing arguments of a raw type
//! read as `dynamic`.

use crate::subtype::SubtypeChecker;
use crate::types::{TypeId, TypeListId, Variance};
use tracing::trace;

impl SubtypeChecker<'_> {
    pub(crate) fn check_interface(
        &mut self,
        s: TypeId,
        s_env: TypeListId,
        t: TypeId,
        t_env: TypeListId,
    ) -> bool {
        let universe = self.universe;
        let Some(t_name) = universe.interface_name(t) else {
            return false;
        };
        let Some(s_args) = universe.supertype_args(s, t_name) else {
            trace!(s = s.0, t = t.0, "no supertype path");
            return false;
        };
        let t_args = universe.interface_args(universe.complete_interface(t));
        let variances = universe.class_variances(t_name);

        for (i, (&s_arg, &t_arg)) in s_args.iter().zip(t_args.iter()).enumerate() {
            let variance = variances.get(i).copied().unwrap_or(Variance::COVARIANT);
            if variance.is_covariant() && !self.check(s_arg, s_env, t_arg, t_env) {
                return false;
            }
            if variance.is_contravariant() && !self.check(t_arg, t_env, s_arg, s_env) {
                return false;
            }
        }
        true
    }
}
