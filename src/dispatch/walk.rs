/*!

The runtime half of dispatch: walking a compiled [`DispatchNode`] tree for one call's
arguments down to a leaf, re-verifying the leaf's surviving candidates against their full
signatures, and combining what's left into a single callable. Grounded on `functions.py`'s
`GenericFunction.__getitem__` and `AbstractGeneric.combine`.

A seed-based branch is a heuristic, not a correctness gate: an `And`/`Or` criterion, for
instance, is indexed under whichever family its operands agree on, but a branch's seed only
approximates "some case here might match" — so every candidate reaching a leaf is checked
against its complete `Signature` before any method runs. This is also where `before`/
`primary`/`after`/`around` get combined into one call, per `functions.py`'s `combine()`:
`around` wraps the entire `before → primary → after` chain, not `primary` alone.

*/

use std::collections::HashMap;
use std::sync::Arc;

use crate::abstractions::IString;
use crate::adapt::protocol;
use crate::classes::Value;
use super::combine::{
  all_methods, ordered_signatures, safe_methods, separate_qualifiers, AroundFn, Case, MethodBody,
  NextMethod, Qualifier, SideEffectFn,
};
use super::error::DispatchError;
use super::expr::Interner;
use super::index::CriterionIndex;
use super::node::{Branches, DispatchNode};

/// Walks from `root` to the leaf `args` resolves to, re-verifies its candidates, and
/// returns the assembled callable — but does not call it. Separating "find the method"
/// from "run the method" lets the caller drop its lock before invoking anything, so a
/// method body that dispatches again on the same (or another) generic function doesn't
/// deadlock against itself.
pub(crate) fn locate_method(
  root: &Arc<DispatchNode>,
  args: &[Value],
  interner: &Interner,
  cases: &[Case],
  generic_name: &IString,
) -> NextMethod {
  let mut cache: Vec<Option<Value>> = Vec::new();
  let mut current: &Arc<DispatchNode> = root;

  loop {
    match current.as_ref() {
      DispatchNode::Leaf { candidates } => {
        return combine(candidates, cases, args, interner, &mut cache, generic_name);
      }
      DispatchNode::Branch { expr_id, branches, fallback } => {
        // Always go through the interner: an expression id `< arity` is not guaranteed to
        // be an `Argument` node (`Interner::intern` assigns ids in whatever order nodes are
        // first interned, not id-per-argument-slot), so reading `args[*expr_id]` directly
        // could silently evaluate the wrong expression.
        let value = interner.evaluate(*expr_id, args, &mut cache);
        current = value.as_ref().and_then(|v| select_branch(branches, v)).unwrap_or(fallback);
      }
    }
  }
}

fn select_branch<'a>(branches: &'a Branches, value: &Value) -> Option<&'a Arc<DispatchNode>> {
  match branches {
    Branches::Mro(entries) => {
      // A class passed as a value is walked by its own MRO first, so `SubclassCriterion`
      // (the argument *is* a class) finds its branch; `ClassCriterion` (isinstance) is
      // then tried via the value's actual class (`type`, for a class value), so the two
      // families can share one branch node without either shadowing the other —
      // `combine`'s signature re-check is what actually disambiguates a node whose
      // candidates mix both kinds.
      if let Some(class_value) = value.as_class() {
        if let Some(node) = class_value.mro().iter().find_map(|ancestor| {
          entries.iter().find(|(class, _)| class == ancestor).map(|(_, node)| node)
        }) {
          return Some(node);
        }
      }
      value.class().mro().iter().find_map(|ancestor| {
        entries.iter().find(|(class, _)| class == ancestor).map(|(_, node)| node)
      })
    }
    Branches::Range(entries) => {
      let key = CriterionIndex::value_key(value)?;
      entries
        .binary_search_by(|((low, high), _)| {
          if key < *low {
            std::cmp::Ordering::Greater
          } else if key >= *high {
            std::cmp::Ordering::Less
          } else {
            std::cmp::Ordering::Equal
          }
        })
        .ok()
        .map(|i| &entries[i].1)
    }
    Branches::Truth(arms) => Some(&arms[usize::from(value.is_truthy())]),
    Branches::Identity(map) => value.identity().and_then(|id| map.get(&id)),
    Branches::Protocol(entries) => entries
      .iter()
      .find(|(protocol_id, _)| value.conform(*protocol_id).is_some() || protocol(*protocol_id).provides(value.class()))
      .map(|(_, node)| node),
  }
}

/// Filters `candidate_ids` down to cases whose full signature actually matches this
/// call's argument values, then combines what survives into one callable per
/// `functions.py`'s `combine()`: `before` bodies run (in specificity order) for effect,
/// then the winning `primary` body runs, then `after` bodies run (in reverse specificity
/// order) for effect — and the whole chain is wrapped by `around` bodies outermost-first,
/// each threading `next_method` to the layer inside it.
fn combine(
  candidate_ids: &[usize],
  cases: &[Case],
  args: &[Value],
  interner: &Interner,
  cache: &mut Vec<Option<Value>>,
  generic_name: &IString,
) -> NextMethod {
  let surviving: Vec<usize> = candidate_ids
    .iter()
    .copied()
    .filter(|&id| {
      cases[id].signature.items().all(|(expr_id, criterion)| {
        match interner.evaluate(expr_id, args, cache) {
          Some(value) => criterion.contains(&value),
          None => false,
        }
      })
    })
    .collect();

  if surviving.is_empty() {
    let generic_name = generic_name.clone();
    return Arc::new(move |_args: &[Value]| {
      Err(DispatchError::NoApplicableMethod { generic: generic_name.clone() })
    });
  }

  let tagged: Vec<(usize, Case)> = surviving.iter().map(|&id| (id, cases[id].clone())).collect();
  let groups = separate_qualifiers(&tagged);

  let primary_sigs = groups.get(&Qualifier::Primary).cloned().unwrap_or_default();
  let primary_layers = ordered_signatures(&primary_sigs);
  let primary_fn: NextMethod = match safe_methods(&primary_layers, generic_name.clone()) {
    Ok(winner) => match &cases[winner].body {
      MethodBody::Primary(f) => f.clone(),
      _ => unreachable!("the primary qualifier group can only hold Primary bodies"),
    },
    Err(error) => Arc::new(move |_args: &[Value]| Err(error.clone())),
  };

  let before_ids = all_methods(&ordered_signatures(&groups.get(&Qualifier::Before).cloned().unwrap_or_default()));
  let mut after_ids = all_methods(&ordered_signatures(&groups.get(&Qualifier::After).cloned().unwrap_or_default()));
  after_ids.reverse();

  let chain: NextMethod = if before_ids.is_empty() && after_ids.is_empty() {
    primary_fn
  } else {
    let before_fns: Vec<SideEffectFn> = before_ids
      .iter()
      .map(|&id| match &cases[id].body {
        MethodBody::Before(f) => f.clone(),
        _ => unreachable!("the before qualifier group can only hold Before bodies"),
      })
      .collect();
    let after_fns: Vec<SideEffectFn> = after_ids
      .iter()
      .map(|&id| match &cases[id].body {
        MethodBody::After(f) => f.clone(),
        _ => unreachable!("the after qualifier group can only hold After bodies"),
      })
      .collect();
    Arc::new(move |call_args: &[Value]| {
      for before in &before_fns {
        before(call_args);
      }
      let result = primary_fn(call_args);
      for after in &after_fns {
        after(call_args);
      }
      result
    })
  };

  let around_sigs = groups.get(&Qualifier::Around).cloned().unwrap_or_default();
  let around_layers = ordered_signatures(&around_sigs);
  let around_bodies: HashMap<usize, AroundFn> = around_sigs
    .iter()
    .filter_map(|(id, _)| match &cases[*id].body {
      MethodBody::Around(f) => Some((*id, f.clone())),
      _ => None,
    })
    .collect();

  super::combine::method_chain(&around_layers, &around_bodies, chain)
}
