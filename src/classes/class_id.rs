/*!

`ClassId` is a small interned handle standing in for a "class" in the dispatch engine's
open, runtime-extensible type system. It plays the role `Symbol` plays for operator names
in a term-rewriting engine: a cheap, `Copy`, totally-ordered handle backed by a process-wide
registry, rather than a name compared by value on every lookup.

*/

use std::fmt::{Display, Formatter};
use crate::abstractions::IString;
use super::registry::CLASS_REGISTRY;

/// An interned handle to a registered class or classic-style "protocol-providing" type.
///
/// Two `ClassId`s compare equal iff they were registered under the same name. Ordering is
/// by registration order and carries no semantic meaning beyond giving `ClassId` a stable
/// sort key for use in `BTreeMap`/deterministic iteration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
  /// The universal root class every registered class's MRO eventually reaches, the
  /// classic-instance shim mentioned in the specification's class-criterion edge cases.
  pub fn root() -> ClassId {
    CLASS_REGISTRY.root()
  }

  /// The interned name this class was registered under.
  pub fn name(self) -> IString {
    CLASS_REGISTRY.name_of(self)
  }

  /// The method resolution order of this class, nearest ancestor first, root last.
  pub fn mro(self) -> Vec<ClassId> {
    CLASS_REGISTRY.mro(self)
  }

  /// True iff `self` is `other` or a registered descendant of `other`.
  pub fn is_subclass_of(self, other: ClassId) -> bool {
    CLASS_REGISTRY.is_subclass(self, other)
  }
}

impl Display for ClassId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.name())
  }
}
