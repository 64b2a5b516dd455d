/*!

Per-expression inverted index from [`Seed`] to the cases whose criterion is true for that
seed, maintained incrementally as rules are added. Grounded on `functions.py`'s
`CriterionIndex`/`addSeed`. Used by the DAG compiler's `best_split` to score candidate
expression ids; it is a performance heuristic, not a correctness gate — the dispatch walk
always re-verifies a leaf's surviving candidates against their full signature before
combining methods (see `dispatch::walk`), so an imprecise seed never yields a wrong method.

*/

use std::collections::HashMap;

use crate::adapt::ProtocolId;
use crate::classes::ClassId;
use super::criterion::{Bound, Criterion, DispatchFamily};

/// A canonical key placed into an index so a dispatch function can find the right branch.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Seed {
  Class(ClassId),
  /// A half-open sub-range `[low_key, high_key)` in the monotonic key space `bound_key`
  /// maps `Bound`s into.
  Range(u64, u64),
  Truth(bool),
  Identity(usize),
  Protocol(ProtocolId),
  /// `NullCriterion`'s seed: matches everything, contributes nothing to partitioning.
  Always,
}

/// Maps a `Bound` into the `u64` key space `Seed::Range` partitions, preserving the
/// numeric order of the underlying value (`Bound::Min`/`Max` sort below/above everything).
pub fn bound_key(bound: &Bound) -> u64 {
  match bound {
    Bound::Min => 0,
    Bound::Max => u64::MAX,
    Bound::Value(value) => {
      let numeric = match value {
        crate::classes::Value::Int(i) => *i as f64,
        crate::classes::Value::Float(f) => *f,
        crate::classes::Value::Bool(b) => if *b { 1.0 } else { 0.0 },
        _ => 0.0,
      };
      monotonic_key(numeric).clamp(1, u64::MAX - 1)
    }
  }
}

/// The standard IEEE-754 total-order trick: flip all bits for negative numbers, set the
/// sign bit for non-negative ones, giving a `u64` whose ordering matches `f64`'s.
fn monotonic_key(value: f64) -> u64 {
  let bits = value.to_bits();
  if bits & (1u64 << 63) != 0 {
    !bits
  } else {
    bits | (1u64 << 63)
  }
}

#[derive(Default)]
pub struct CriterionIndex {
  all_seeds: Vec<Seed>,
  criteria: Vec<(usize, Criterion)>,
}

impl CriterionIndex {
  pub fn new(family: DispatchFamily) -> Self {
    let all_seeds = match family {
      DispatchFamily::Truth => vec![Seed::Truth(true), Seed::Truth(false)],
      DispatchFamily::Range => vec![Seed::Range(0, u64::MAX)],
      _ => Vec::new(),
    };
    CriterionIndex { all_seeds, criteria: Vec::new() }
  }

  /// Registers `case_id`'s criterion, growing `all_seeds` with whatever new seeds its
  /// criterion introduces (a new class, a new range split point, a new protocol, ...).
  pub fn insert(&mut self, case_id: usize, criterion: Criterion) {
    self.add_seeds_from(&criterion);
    self.criteria.push((case_id, criterion));
  }

  fn add_seeds_from(&mut self, criterion: &Criterion) {
    match criterion {
      Criterion::Class(c) | Criterion::Subclass(c) => {
        self.add_seed(Seed::Class(*c));
        self.add_seed(Seed::Class(ClassId::root()));
      }
      Criterion::Protocol(p) => self.add_seed(Seed::Protocol(*p)),
      Criterion::Identity(id) => self.add_seed(Seed::Identity(*id)),
      Criterion::Range(lo, hi) => {
        self.split_around(bound_key(lo));
        self.split_around(bound_key(hi));
      }
      Criterion::Equal(v) => {
        // Carves out a boundary at the point's key and immediately after it, so the
        // partition gains a bucket narrow enough to isolate this value from its
        // neighbors. The bucket this produces is still an approximation used only to
        // pick a branch to descend into; `Criterion::contains` is what actually decides
        // membership once a leaf's candidates are re-checked (see module docs).
        let key = bound_key(&Bound::Value(v.clone()));
        self.split_around(key);
        self.split_around(key.saturating_add(1));
      }
      Criterion::Truth(_) | Criterion::Null => {}
      Criterion::And(a, b) | Criterion::Or(a, b) => {
        self.add_seeds_from(a);
        self.add_seeds_from(b);
      }
      Criterion::Not(inner) => self.add_seeds_from(inner),
    }
  }

  fn add_seed(&mut self, seed: Seed) {
    if !self.all_seeds.contains(&seed) {
      self.all_seeds.push(seed);
    }
  }

  /// Splits whichever existing range seed straddles `point` into two, so `point` becomes
  /// a boundary. A no-op if `point` is already a boundary or out of range.
  fn split_around(&mut self, point: u64) {
    if let Some(position) = self.all_seeds.iter().position(|seed| {
      matches!(seed, Seed::Range(low, high) if *low < point && point < *high)
    }) {
      if let Seed::Range(low, high) = self.all_seeds.remove(position) {
        self.all_seeds.push(Seed::Range(low, point));
        self.all_seeds.push(Seed::Range(point, high));
      }
    }
  }

  pub fn all_seeds(&self) -> &[Seed] {
    &self.all_seeds
  }

  pub fn len(&self) -> usize {
    self.all_seeds.len()
  }

  /// The seeds in `all_seeds` that `case_id`'s criterion is true for, used both as the
  /// `best_split` scoring input and to decide which branch(es) a case is reachable from.
  pub fn matching_seeds(&self, case_id: usize) -> Vec<Seed> {
    match self.criteria.iter().find(|(id, _)| *id == case_id) {
      Some((_, criterion)) => self.all_seeds.iter().copied().filter(|seed| seed_satisfies(criterion, seed)).collect(),
      // A case with no criterion on this expression at all is unconstrained here: it
      // matches every seed, the same as an explicit `NullCriterion` would.
      None => self.all_seeds.clone(),
    }
  }

  /// True iff `case_id` carries no criterion on this expression — distinct from a
  /// criterion that merely happens to match every current seed. Used to find the cases
  /// that belong in a branch's `fallback`.
  pub fn is_unconstrained(&self, case_id: usize) -> bool {
    !self.criteria.iter().any(|(id, _)| *id == case_id)
  }

  /// The `bound_key` position of a runtime value, for locating which `Seed::Range`
  /// bucket it falls in during the dispatch walk.
  pub fn value_key(value: &crate::classes::Value) -> Option<u64> {
    match value {
      crate::classes::Value::Int(_) | crate::classes::Value::Float(_) | crate::classes::Value::Bool(_) => {
        Some(bound_key(&Bound::Value(value.clone())))
      }
      _ => None,
    }
  }

  pub fn count_for(&self, cases: &[usize]) -> usize {
    cases.iter().map(|&case_id| self.matching_seeds(case_id).len()).sum()
  }

  pub fn casemap_for(&self, cases: &[usize]) -> HashMap<Seed, Vec<usize>> {
    let mut map: HashMap<Seed, Vec<usize>> = HashMap::new();
    for &case_id in cases {
      for seed in self.matching_seeds(case_id) {
        map.entry(seed).or_default().push(case_id);
      }
    }
    map
  }
}

fn seed_satisfies(criterion: &Criterion, seed: &Seed) -> bool {
  match (criterion, seed) {
    (Criterion::Class(c), Seed::Class(s)) => s.is_subclass_of(*c),
    (Criterion::Subclass(c), Seed::Class(s)) => s.is_subclass_of(*c),
    (Criterion::Protocol(p), Seed::Protocol(s)) => p == s,
    (Criterion::Truth(expected), Seed::Truth(actual)) => expected == actual,
    (Criterion::Identity(id), Seed::Identity(s)) => id == s,
    (Criterion::Range(lo, hi), Seed::Range(low, high)) => {
      bound_key(lo) <= *low && *high <= bound_key(hi)
    }
    (Criterion::Equal(v), Seed::Range(low, high)) => {
      let key = bound_key(&Bound::Value(v.clone()));
      *low <= key && key < *high
    }
    (Criterion::Null, _) => true,
    (Criterion::And(a, b), _) => seed_satisfies(a, seed) && seed_satisfies(b, seed),
    (Criterion::Or(a, b), _) => seed_satisfies(a, seed) || seed_satisfies(b, seed),
    (Criterion::Not(inner), _) => !seed_satisfies(inner, seed),
    _ => false,
  }
}
