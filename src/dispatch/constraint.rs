/*!

Tracks "expression X must be checked before expression Y" edges, so the DAG compiler never
picks a sub-expression to branch on before the criteria that make evaluating it safe have
already fired — e.g. don't evaluate `args[0].wheel_count` before checking `args[0]` is a
`Vehicle`. Grounded on `strategy.py`'s `TGraph`.

*/

use std::collections::{HashMap, HashSet};

use crate::abstractions::NatSet;
use super::expr::ExprId;

#[derive(Default)]
pub struct ConstraintGraph {
  /// For each expression id, the set of ids that must already be resolved before this
  /// one may be tested. A `NatSet` rather than a `HashSet`: these are dense small-integer
  /// expression ids, exactly what the bit-set-backed set is for.
  predecessors: HashMap<ExprId, NatSet>,
}

impl ConstraintGraph {
  pub fn new() -> Self {
    ConstraintGraph::default()
  }

  /// Declares that, within one rule, every expression id seen before `ids[i]` in
  /// iteration order is a prerequisite of `ids[i]` — but only for `ids[i]` beyond an
  /// argument position (`id >= arity`). An argument (`args[k]`) is always safe to test
  /// first; it never needs a predecessor, though it still serves as one for whatever
  /// attribute/call expression comes after it in the same rule.
  pub fn add_rule(&mut self, ids: &[ExprId], arity: usize) {
    for (position, &id) in ids.iter().enumerate() {
      if id < arity {
        continue;
      }
      let preds = self.predecessors.entry(id).or_default();
      for &predecessor in &ids[..position] {
        preds.insert(predecessor);
      }
    }
  }

  /// True iff every prerequisite of `id` is already in `resolved`.
  pub fn is_ready(&self, id: ExprId, resolved: &HashSet<ExprId>) -> bool {
    match self.predecessors.get(&id) {
      Some(preds) => preds.iter().all(|p| resolved.contains(&p)),
      None => true,
    }
  }

  /// The subset of `candidates` whose prerequisites are all satisfied by `resolved`.
  pub fn successors(&self, candidates: &[ExprId], resolved: &HashSet<ExprId>) -> Vec<ExprId> {
    candidates.iter().copied().filter(|&id| self.is_ready(id, resolved)).collect()
  }

  /// Which of `ids` are blocked *relative to this same list*: an id is disabled if one of
  /// its own prerequisites is also present in `ids` (meaning it hasn't been chosen — as a
  /// branch point or dropped for non-discrimination — yet). Computed fresh from whatever
  /// candidate list `best_split` is currently working over; there is no externally
  /// threaded "resolved" set; readiness falls out naturally as ids leave the list.
  pub fn disabled(&self, ids: &[ExprId]) -> NatSet {
    let present: NatSet = ids.iter().copied().collect();
    ids
      .iter()
      .copied()
      .filter(|id| {
        self
          .predecessors
          .get(id)
          .is_some_and(|preds| preds.iter().any(|p| present.contains(p)))
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn later_expression_waits_on_earlier_ones() {
    let mut graph = ConstraintGraph::new();
    // ids 0..2 are arguments (arity 2); id 3 is e.g. args[0].wheel_count.
    graph.add_rule(&[0, 1, 3], 2);
    let resolved = HashSet::new();
    assert!(graph.is_ready(0, &resolved));
    assert!(!graph.is_ready(3, &resolved));

    let mut resolved_with_prereqs = HashSet::new();
    resolved_with_prereqs.insert(0);
    resolved_with_prereqs.insert(1);
    assert!(graph.is_ready(3, &resolved_with_prereqs));
  }

  #[test]
  fn argument_ids_never_gain_predecessors() {
    let mut graph = ConstraintGraph::new();
    // A rule that mentions only arguments adds no constraints at all.
    graph.add_rule(&[0, 1], 2);
    assert!(graph.disabled(&[0, 1]).is_empty());
  }

  #[test]
  fn disabled_is_relative_to_the_current_candidate_list() {
    let mut graph = ConstraintGraph::new();
    graph.add_rule(&[0, 2], 1); // id 0 is args[0]; id 2 is args[0].attr, arity 1.
    // While id 0 is still a candidate, id 2 is blocked.
    assert_eq!(graph.disabled(&[0, 2]), [2].into_iter().collect());
    // Once id 0 has left the candidate list (chosen or dropped), id 2 is free.
    assert!(graph.disabled(&[2]).is_empty());
  }
}
