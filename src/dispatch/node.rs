/*!

The compiled decision DAG. Grounded on `functions.py`'s `DispatchNode`. Branches are keyed
per dispatch family; a `Protocol` branch is checked live against the adaptation registry on
every traversal rather than baked from a seed captured at compile time, which is what lets
scenario 4 in the specification's test matrix ("register a type, dispatch succeeds without
`clear()`") hold without any cache-invalidation plumbing for that family specifically.

*/

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapt::ProtocolId;
use crate::classes::ClassId;
use super::expr::ExprId;

pub enum Branches {
  Mro(Vec<(ClassId, Arc<DispatchNode>)>),
  /// Sorted, non-overlapping half-open `[low, high)` key ranges (see `index::bound_key`).
  Range(Vec<((u64, u64), Arc<DispatchNode>)>),
  /// `[false-branch, true-branch]`.
  Truth([Arc<DispatchNode>; 2]),
  Identity(HashMap<usize, Arc<DispatchNode>>),
  Protocol(Vec<(ProtocolId, Arc<DispatchNode>)>),
}

pub enum DispatchNode {
  /// Case ids reaching this point, in registration order. The walk re-verifies each
  /// against its full signature before combining methods; see `dispatch::walk`.
  Leaf { candidates: Vec<usize> },
  Branch {
    expr_id: ExprId,
    branches: Branches,
    /// Where cases with no constraint on `expr_id` (or whose value doesn't land in any
    /// branch) are checked.
    fallback: Arc<DispatchNode>,
  },
}

impl DispatchNode {
  pub fn empty_leaf() -> Arc<DispatchNode> {
    Arc::new(DispatchNode::Leaf { candidates: Vec::new() })
  }
}
