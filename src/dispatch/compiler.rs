/*!

Compiles a generic function's registered cases into a [`DispatchNode`] tree: the decision
DAG the dispatch walk follows to narrow a call down to a small set of surviving candidates.
Grounded on `functions.py`'s `_build_dispatcher`/`_best_split`.

This is the one place the original's laziness is deliberately not carried over: `functions.py`
builds nodes on demand as a call first visits them, and reseeds a node's seed set the first
time a runtime value misses every existing branch. Here the whole tree is built eagerly,
in one pass, whenever the compiled root is (re)published — cheaper to reason about and to
hold correct under a lock, at the cost of doing the work for branches a call pattern never
actually visits. `Branches::Range` and `Branches::Mro` are built from seed partitions that
already tile their value spaces in full (see `index::CriterionIndex`), so no runtime value
ever needs a seed that wasn't known at compile time; `Branches::Protocol` is checked live
against the adaptation registry on every traversal instead (see `dispatch::node`), which is
what makes dynamic protocol registration visible without rebuilding anything.

*/

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::classes::ClassId;
use super::constraint::ConstraintGraph;
use super::criterion::DispatchFamily;
use super::expr::ExprId;
use super::index::{CriterionIndex, Seed};
use super::node::{Branches, DispatchNode};

pub(crate) type IndexKey = (ExprId, DispatchFamily);
type MemoKey = (Vec<usize>, Vec<IndexKey>);

/// Builds the root of the compiled DAG from every currently-registered case and index.
pub(crate) fn compile_root(
  all_cases: usize,
  indexes: &HashMap<IndexKey, CriterionIndex>,
  constraints: &ConstraintGraph,
) -> Arc<DispatchNode> {
  let cases: Vec<usize> = (0..all_cases).collect();
  let remaining: Vec<IndexKey> = indexes.keys().copied().collect();
  let mut memo: HashMap<MemoKey, Arc<DispatchNode>> = HashMap::new();
  let mut in_progress: HashSet<MemoKey> = HashSet::new();
  compile(cases, remaining, indexes, constraints, &mut memo, &mut in_progress)
}

fn compile(
  cases: Vec<usize>,
  remaining: Vec<IndexKey>,
  indexes: &HashMap<IndexKey, CriterionIndex>,
  constraints: &ConstraintGraph,
  memo: &mut HashMap<MemoKey, Arc<DispatchNode>>,
  in_progress: &mut HashSet<MemoKey>,
) -> Arc<DispatchNode> {
  if cases.is_empty() {
    return DispatchNode::empty_leaf();
  }

  let memo_key: MemoKey = (cases.clone(), remaining.clone());
  if let Some(node) = memo.get(&memo_key) {
    return node.clone();
  }
  if !in_progress.insert(memo_key.clone()) {
    // Every remaining id is blocked by a prerequisite that's also still remaining, and
    // nothing was dropped to break the tie — only possible if the registered rules
    // describe a genuine dependency cycle across expressions. Rather than recurse
    // forever, resolve the leaf from whatever candidates are left; a well-formed set of
    // rules never reaches this branch.
    return Arc::new(DispatchNode::Leaf { candidates: cases });
  }

  let node = if remaining.is_empty() {
    Arc::new(DispatchNode::Leaf { candidates: cases.clone() })
  } else {
    let (best, new_remaining) = best_split(&cases, &remaining, indexes, constraints);
    match best {
      None => compile(cases.clone(), new_remaining, indexes, constraints, memo, in_progress),
      Some(key) => build_branch(key, &cases, new_remaining, indexes, constraints, memo, in_progress),
    }
  };

  in_progress.remove(&memo_key);
  memo.insert(memo_key, node.clone());
  node
}

/// Picks the remaining index key that best discriminates `cases`: the one minimizing
/// average branch spread (`total matches / seed count`), among keys not currently
/// blocked by the constraint graph. Drops (without choosing) any key every case matches
/// identically across every one of its seeds — it can never discriminate this group, no
/// matter how the compiler recurses. Mirrors `strategy.py`'s `_best_split`: a single pass
/// over `disp_ids`, not a loop that recomputes "disabled" after each drop.
fn best_split(
  cases: &[usize],
  disp_ids: &[IndexKey],
  indexes: &HashMap<IndexKey, CriterionIndex>,
  constraints: &ConstraintGraph,
) -> (Option<IndexKey>, Vec<IndexKey>) {
  let mut remaining: Vec<IndexKey> = disp_ids.to_vec();
  let expr_ids: Vec<ExprId> = disp_ids.iter().map(|(expr_id, _)| *expr_id).collect();
  let disabled = constraints.disabled(&expr_ids);
  let active = cases.len();
  let mut best: Option<(IndexKey, f64)> = None;

  for &key in disp_ids {
    let (expr_id, _) = key;
    if disabled.contains(expr_id) {
      continue;
    }
    let index = match indexes.get(&key) {
      Some(index) => index,
      None => continue,
    };
    let len = index.len();
    if len == 0 {
      continue;
    }
    let total = index.count_for(cases);
    if total == active * len {
      // Every case matches every seed: this expression can't split the group further.
      remaining.retain(|&candidate| candidate != key);
      continue;
    }
    let spread = total as f64 / len as f64;
    if best.map_or(true, |(_, current)| spread < current) {
      best = Some((key, spread));
    }
  }

  if let Some((key, _)) = best {
    remaining.retain(|&candidate| candidate != key);
  }

  (best.map(|(key, _)| key), remaining)
}

/// Builds the internal node for the winning key: one sub-tree per seed the index
/// currently knows about, plus a `fallback` sub-tree for cases carrying no criterion on
/// this expression at all.
fn build_branch(
  key: IndexKey,
  cases: &[usize],
  remaining: Vec<IndexKey>,
  indexes: &HashMap<IndexKey, CriterionIndex>,
  constraints: &ConstraintGraph,
  memo: &mut HashMap<MemoKey, Arc<DispatchNode>>,
  in_progress: &mut HashSet<MemoKey>,
) -> Arc<DispatchNode> {
  let (expr_id, family) = key;
  let index = indexes.get(&key).expect("index must exist for every key still under consideration");
  let casemap = index.casemap_for(cases);
  let fallback_cases: Vec<usize> =
    cases.iter().copied().filter(|&case_id| index.is_unconstrained(case_id)).collect();
  let fallback = compile(fallback_cases, remaining.clone(), indexes, constraints, memo, in_progress);

  let branches = match family {
    DispatchFamily::Mro => {
      let mut entries: Vec<(ClassId, Arc<DispatchNode>)> = Vec::new();
      for (seed, seed_cases) in &casemap {
        if let Seed::Class(class) = seed {
          let child = compile(seed_cases.clone(), remaining.clone(), indexes, constraints, memo, in_progress);
          entries.push((*class, child));
        }
      }
      Branches::Mro(entries)
    }
    DispatchFamily::Range => {
      let mut entries: Vec<((u64, u64), Arc<DispatchNode>)> = casemap
        .iter()
        .filter_map(|(seed, seed_cases)| match seed {
          Seed::Range(low, high) => {
            let child = compile(seed_cases.clone(), remaining.clone(), indexes, constraints, memo, in_progress);
            Some(((*low, *high), child))
          }
          _ => None,
        })
        .collect();
      entries.sort_by_key(|(range, _)| *range);
      Branches::Range(entries)
    }
    DispatchFamily::Truth => {
      let true_cases = casemap.get(&Seed::Truth(true)).cloned().unwrap_or_default();
      let false_cases = casemap.get(&Seed::Truth(false)).cloned().unwrap_or_default();
      Branches::Truth([
        compile(false_cases, remaining.clone(), indexes, constraints, memo, in_progress),
        compile(true_cases, remaining.clone(), indexes, constraints, memo, in_progress),
      ])
    }
    DispatchFamily::Identity => {
      let mut map = HashMap::new();
      for (seed, seed_cases) in &casemap {
        if let Seed::Identity(identity) = seed {
          let child = compile(seed_cases.clone(), remaining.clone(), indexes, constraints, memo, in_progress);
          map.insert(*identity, child);
        }
      }
      Branches::Identity(map)
    }
    DispatchFamily::Protocol => {
      let mut entries = Vec::new();
      for (seed, seed_cases) in &casemap {
        if let Seed::Protocol(protocol_id) = seed {
          let child = compile(seed_cases.clone(), remaining.clone(), indexes, constraints, memo, in_progress);
          entries.push((*protocol_id, child));
        }
      }
      Branches::Protocol(entries)
    }
    DispatchFamily::Null | DispatchFamily::Combinator => {
      unreachable!("Null/Combinator criteria are never indexed, so best_split never picks one")
    }
  };

  Arc::new(DispatchNode::Branch { expr_id, branches, fallback })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dispatch::criterion::Criterion;
  use crate::classes::CLASS_REGISTRY;

  #[test]
  fn compiling_with_no_indexes_yields_a_single_leaf_with_every_case() {
    let indexes = HashMap::new();
    let constraints = ConstraintGraph::new();
    let root = compile_root(3, &indexes, &constraints);
    match root.as_ref() {
      DispatchNode::Leaf { candidates } => assert_eq!(candidates, &vec![0, 1, 2]),
      DispatchNode::Branch { .. } => panic!("expected a leaf"),
    }
  }

  #[test]
  fn mro_branch_separates_cases_by_class() {
    let dog = CLASS_REGISTRY.register("CompilerDog", &[]);
    let cat = CLASS_REGISTRY.register("CompilerCat", &[]);
    let mut index = CriterionIndex::new(DispatchFamily::Mro);
    index.insert(0, Criterion::Class(dog));
    index.insert(1, Criterion::Class(cat));

    let mut indexes = HashMap::new();
    indexes.insert((0usize, DispatchFamily::Mro), index);
    let constraints = ConstraintGraph::new();

    let root = compile_root(2, &indexes, &constraints);
    match root.as_ref() {
      DispatchNode::Branch { branches: Branches::Mro(entries), .. } => {
        assert_eq!(entries.len(), 2);
      }
      _ => panic!("expected an Mro branch"),
    }
  }
}
