/*!

`ClassRegistry` is the process-wide, open registry of classes: a simplified cousin of the
term-rewriting engine's `Sort`/`Kind` lattice (see `core::sort` in the rewriting-engine this
crate's infrastructure is drawn from). That lattice exists to answer subsort queries fast
enough for the inner loop of unification, which requires precomputed subsort-closure bit
matrices. We don't need that: class registration here is rare (it happens when a module
loads, not per dispatch call), and MRO containment checks are satisfied by a linearized
ancestor list walked linearly. So we keep the "register once, look up often" shape of the
original design and drop the lattice-closure optimization.

Registration is idempotent and DFS-linearizes a class's bases the way the classic-instance
MRO model in the specification's glossary describes: left-to-right over bases, first
occurrence wins, with the universal root appended last if it isn't already present.

*/

use std::collections::HashMap;
use parking_lot::RwLock;
use once_cell::sync::Lazy;
use crate::abstractions::IString;
use super::class_id::ClassId;

struct ClassEntry {
  name: IString,
  bases: Vec<ClassId>,
  /// Memoized linearization, nearest ancestor first, root last.
  mro: Vec<ClassId>,
}

struct RegistryInner {
  by_name: HashMap<IString, ClassId>,
  entries: Vec<ClassEntry>,
}

pub struct ClassRegistry {
  inner: RwLock<RegistryInner>,
}

const ROOT_NAME: &str = "object";

impl ClassRegistry {
  fn new() -> Self {
    let root_name: IString = IString::from(ROOT_NAME);
    let root_entry = ClassEntry {
      name: root_name.clone(),
      bases: Vec::new(),
      mro: vec![ClassId(0)],
    };
    let mut by_name = HashMap::new();
    by_name.insert(root_name, ClassId(0));

    ClassRegistry {
      inner: RwLock::new(RegistryInner {
        by_name,
        entries: vec![root_entry],
      }),
    }
  }

  pub fn root(&self) -> ClassId {
    ClassId(0)
  }

  /// Registers a class under `name` with the given `bases`, or returns the existing
  /// `ClassId` if `name` is already registered. Re-registering an existing name with
  /// different bases is a bug in the caller and is ignored; classes are expected to be
  /// declared once, at module-load time.
  pub fn register(&self, name: impl Into<IString>, bases: &[ClassId]) -> ClassId {
    let name = name.into();
    {
      let read = self.inner.read();
      if let Some(&id) = read.by_name.get(&name) {
        return id;
      }
    }

    let mut write = self.inner.write();
    // Someone may have raced us between the read and write locks.
    if let Some(&id) = write.by_name.get(&name) {
      return id;
    }

    let id = ClassId(write.entries.len() as u32);
    let mro = linearize(&write.entries, bases);
    write.entries.push(ClassEntry {
      name: name.clone(),
      bases: bases.to_vec(),
      mro,
    });
    write.by_name.insert(name, id);
    id
  }

  pub fn lookup(&self, name: &str) -> Option<ClassId> {
    let read = self.inner.read();
    read.by_name.get(name).copied()
  }

  pub fn name_of(&self, id: ClassId) -> IString {
    let read = self.inner.read();
    read.entries[id.0 as usize].name.clone()
  }

  pub fn bases_of(&self, id: ClassId) -> Vec<ClassId> {
    let read = self.inner.read();
    read.entries[id.0 as usize].bases.clone()
  }

  pub fn mro(&self, id: ClassId) -> Vec<ClassId> {
    let read = self.inner.read();
    read.entries[id.0 as usize].mro.clone()
  }

  pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
    if sub == sup {
      return true;
    }
    let read = self.inner.read();
    read.entries[sub.0 as usize].mro.contains(&sup)
  }
}

/// DFS left-to-right over `bases`' own linearizations, first occurrence wins, with the
/// universal root appended last, after every base's chain — never mid-list, so a method
/// registered on the root can never outrank one registered on a more derived base. `self`
/// always leads.
fn linearize(entries: &[ClassEntry], bases: &[ClassId]) -> Vec<ClassId> {
  let self_id = ClassId(entries.len() as u32);
  let mut mro = vec![self_id];
  for &base in bases {
    for &ancestor in &entries[base.0 as usize].mro {
      if ancestor != ClassId(0) && !mro.contains(&ancestor) {
        mro.push(ancestor);
      }
    }
  }
  mro.push(ClassId(0));
  mro
}

pub static CLASS_REGISTRY: Lazy<ClassRegistry> = Lazy::new(ClassRegistry::new);

/// Well-known classes backing the built-in `Value` variants, registered once at first use
/// so that `ClassCriterion`/`SubclassCriterion` work uniformly over native values and
/// user-defined `Instance` objects alike.
pub mod builtin {
  use super::*;

  pub fn int() -> ClassId {
    static ID: Lazy<ClassId> = Lazy::new(|| CLASS_REGISTRY.register("int", &[]));
    *ID
  }

  pub fn float() -> ClassId {
    static ID: Lazy<ClassId> = Lazy::new(|| CLASS_REGISTRY.register("float", &[]));
    *ID
  }

  pub fn bool_() -> ClassId {
    static ID: Lazy<ClassId> = Lazy::new(|| CLASS_REGISTRY.register("bool", &[int()]));
    *ID
  }

  pub fn str_() -> ClassId {
    static ID: Lazy<ClassId> = Lazy::new(|| CLASS_REGISTRY.register("str", &[]));
    *ID
  }

  pub fn tuple() -> ClassId {
    static ID: Lazy<ClassId> = Lazy::new(|| CLASS_REGISTRY.register("tuple", &[]));
    *ID
  }

  pub fn none_type() -> ClassId {
    static ID: Lazy<ClassId> = Lazy::new(|| CLASS_REGISTRY.register("NoneType", &[]));
    *ID
  }

  /// The metaclass a `Value::Class` value itself belongs to, so `ClassCriterion`
  /// (isinstance) dispatch over "is this argument a class at all" has somewhere to land.
  pub fn type_() -> ClassId {
    static ID: Lazy<ClassId> = Lazy::new(|| CLASS_REGISTRY.register("type", &[]));
    *ID
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn root_is_its_own_mro() {
    let reg = ClassRegistry::new();
    assert_eq!(reg.mro(reg.root()), vec![reg.root()]);
  }

  #[test]
  fn single_inheritance_mro_ends_at_root() {
    let reg = ClassRegistry::new();
    let animal = reg.register("Animal", &[]);
    let dog = reg.register("Dog", &[animal]);
    assert_eq!(reg.mro(dog), vec![dog, animal, reg.root()]);
    assert!(reg.is_subclass(dog, animal));
    assert!(reg.is_subclass(dog, reg.root()));
    assert!(!reg.is_subclass(animal, dog));
  }

  #[test]
  fn multiple_inheritance_first_occurrence_wins() {
    let reg = ClassRegistry::new();
    let a = reg.register("A", &[]);
    let b = reg.register("B", &[a]);
    let c = reg.register("C", &[a]);
    let d = reg.register("D", &[b, c]);
    // b's chain (b, a) is laid down first; c's repeat of a is deduped; root is held back
    // until every base has contributed, so it lands strictly last regardless of which
    // base's chain reaches it first.
    assert_eq!(reg.mro(d), vec![d, b, a, c, reg.root()]);
  }

  #[test]
  fn registering_twice_is_idempotent() {
    let reg = ClassRegistry::new();
    let a1 = reg.register("Thing", &[]);
    let a2 = reg.register("Thing", &[]);
    assert_eq!(a1, a2);
  }
}
