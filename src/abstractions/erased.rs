/*!

Implements the [erased trait](https://quinedot.github.io/rust-learning/dyn-trait-erased.html) pattern
from [Learning Rust: Hashable Box<dyn Trait>](https://quinedot.github.io/rust-learning/dyn-trait-hash.html).

While this code is very generic, it isn't needed for users of the library. It only exists to support internal code.

So far we just do this to implement `Hash`.

To use `DynHash`, just implement `Hash` for your trait.

```rust
# use predicate_dispatch::abstractions::DynHash;
use core::hash::{Hash, Hasher};

pub trait Trait: DynHash{}

impl Hash for dyn Trait {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dyn_hash(state)
    }
}
```

*/
use core::hash::{Hash, Hasher};
use std::any::Any;
use std::fmt::Debug;

pub trait DynHash {
  fn dyn_hash(&self, state: &mut dyn Hasher);
}

// impl<T: ?Sized + Hash> DynHash for T {
impl<T: Hash> DynHash for T {
  fn dyn_hash(&self, mut state: &mut dyn Hasher) {
    self.hash(&mut state)
  }
}

impl Hash for dyn DynHash + '_ {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.dyn_hash(state)
  }
}

/// An arbitrary, hashable, comparable, displayable value erased behind a trait object.
/// This is how `Expression::Constant` stores "an arbitrary hashable value" (spec §3)
/// without the crate committing to a single concrete constant type. Methods are defined
/// directly on the trait (rather than split into a separate `DynEq` supertrait) so that
/// `dyn ErasedValue` never needs trait-object upcasting to call them.
pub trait ErasedValue: DynHash + Debug + Send + Sync {
  fn as_any(&self) -> &dyn Any;
  fn dyn_eq(&self, other: &dyn ErasedValue) -> bool;
}

impl<T: Hash + PartialEq + Any + Debug + Send + Sync> ErasedValue for T {
  fn as_any(&self) -> &dyn Any {
    self
  }

  fn dyn_eq(&self, other: &dyn ErasedValue) -> bool {
    other.as_any().downcast_ref::<T>().is_some_and(|o| o == self)
  }
}

impl Hash for dyn ErasedValue {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.dyn_hash(state)
  }
}

impl PartialEq for dyn ErasedValue {
  fn eq(&self, other: &Self) -> bool {
    self.dyn_eq(other)
  }
}

impl Eq for dyn ErasedValue {}
