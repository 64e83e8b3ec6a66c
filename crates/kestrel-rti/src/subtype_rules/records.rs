//! Record subtyping: same shape tag, same arity, covariant fields.

use crate::subtype::SubtypeChecker;
use crate::types::TypeListId;
use kestrel_common::interner::Atom;

impl SubtypeChecker<'_> {
    pub(crate) fn check_record(
        &mut self,
        s_shape: Atom,
        s_fields: TypeListId,
        s_env: TypeListId,
        t_shape: Atom,
        t_fields: TypeListId,
        t_env: TypeListId,
    ) -> bool {
        let universe = self.universe;
        let s_fields = universe.type_list(s_fields);
        let t_fields = universe.type_list(t_fields);
        if s_fields.len() != t_fields.len() || s_shape != t_shape {
            return false;
        }
        s_fields
            .iter()
            .zip(t_fields.iter())
            .all(|(&s_field, &t_field)| self.check(s_field, s_env, t_field, t_env))
    }
}
