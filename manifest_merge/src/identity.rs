//! Identity and satisfaction checks between declarations.
//!
//! Identity is the pair (routing key, normalized name). The exported flag is
//! not part of identity: a declaration with the right identity but the wrong
//! flag is present but does not *satisfy* the desired one, so it has to be
//! rewritten.

use crate::component::{DeclaredComponent, RootNamespace};

/// Returns `true` when `a` and `b` declare the same component.
#[must_use]
pub fn same_component(
    a: &DeclaredComponent,
    b: &DeclaredComponent,
    namespace: &RootNamespace,
) -> bool {
    a.routing_key() == b.routing_key()
        && names_are_equal(a.qualified_name(), b.qualified_name(), namespace)
}

/// Returns `true` when `a` and `b` agree on identity and exported flag.
#[must_use]
pub fn satisfies(
    a: &DeclaredComponent,
    b: &DeclaredComponent,
    namespace: &RootNamespace,
) -> bool {
    a.exported() == b.exported() && same_component(a, b, namespace)
}

/// Compares two qualified names after resolving relative spellings.
#[must_use]
pub fn names_are_equal(left: &str, right: &str, namespace: &RootNamespace) -> bool {
    namespace.normalize(left) == namespace.normalize(right)
}
