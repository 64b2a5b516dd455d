/*!

`NatSet` is a set of (small) natural numbers, backed by `bit_set::BitSet`. It is used
wherever the engine needs a dense, cheaply-unioned/intersected set of small integer
handles: expression ids in the constraint graph's "pending" frontier, sort/seed indices,
and similar index-shaped data.

*/

use std::fmt::{Debug, Formatter};
use bit_set::BitSet;

#[derive(Clone, Default, Eq, PartialEq)]
pub struct NatSet(BitSet);

impl NatSet {
  pub fn new() -> Self {
    NatSet(BitSet::new())
  }

  #[inline(always)]
  pub fn insert(&mut self, value: usize) -> bool {
    self.0.insert(value)
  }

  #[inline(always)]
  pub fn remove(&mut self, value: usize) -> bool {
    self.0.remove(value)
  }

  #[inline(always)]
  pub fn contains(&self, value: usize) -> bool {
    self.0.contains(value)
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn union_in_place(&mut self, other: &NatSet) {
    self.0.union_with(&other.0);
  }

  pub fn intersect_in_place(&mut self, other: &NatSet) {
    self.0.intersect_with(&other.0);
  }

  pub fn iter(&self) -> impl Iterator<Item=usize> + '_ {
    self.0.iter()
  }
}

impl Debug for NatSet {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "NatSet{:?}", self.0.iter().collect::<Vec<_>>())
  }
}

impl FromIterator<usize> for NatSet {
  fn from_iter<T: IntoIterator<Item=usize>>(iter: T) -> Self {
    let mut set = NatSet::new();
    for i in iter {
      set.insert(i);
    }
    set
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn union_and_contains() {
    let mut a: NatSet = [1, 2, 3].into_iter().collect();
    let b: NatSet = [3, 4].into_iter().collect();
    a.union_in_place(&b);
    assert!(a.contains(4));
    assert_eq!(a.len(), 4);
  }
}
