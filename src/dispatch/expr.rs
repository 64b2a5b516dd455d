/*!

The expression graph a signature's criteria are attached to. Grounded on
`dispatch/predicates.py`'s `Var`/`Getattr`/`Call`/`Tuple`/`AndExpr`/`OrExpr` hierarchy:
every expression a rule mentions (`args[0]`, `args[0].age`, `len(args[1])`, ...) is
interned into a small, structurally-deduplicated graph, so two rules that both guard on
`args[0].age` share one node and one cached per-call value.

*/

use std::collections::HashMap;
use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::abstractions::{ErasedValue, IString};
use crate::classes::Value;

pub type ExprId = usize;

/// A registered named function usable in `Call` expressions, e.g. `len(args[0])`. Returns
/// `None` to mean "doesn't apply to this value," which the walk treats the same as an
/// attribute lookup miss: the guarding criterion simply doesn't match.
pub type ExprFn = Arc<dyn Fn(&[Value]) -> Option<Value> + Send + Sync>;

struct FunctionRegistry {
  functions: Mutex<HashMap<IString, ExprFn>>,
}

impl FunctionRegistry {
  fn new() -> Self {
    FunctionRegistry { functions: Mutex::new(HashMap::new()) }
  }

  fn register(&self, name: impl Into<IString>, f: ExprFn) {
    self.functions.lock().insert(name.into(), f);
  }

  fn get(&self, name: &IString) -> Option<ExprFn> {
    self.functions.lock().get(name).cloned()
  }
}

static FUNCTION_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// Registers `f` under `name` for use in `Expression::Call`. Re-registering a name
/// replaces the previous function.
pub fn register_function(name: impl Into<IString>, f: ExprFn) {
  FUNCTION_REGISTRY.register(name, f);
}

/// The expression-authoring surface: the caller-facing tree a signature's guard is built
/// from, mirroring spec §3's Expression sum type (Argument / Constant / Attribute-lookup /
/// Function-call / Tuple-build / Short-circuit-and / Short-circuit-or) one-to-one.
/// `Interner::intern_expression` hash-conses one of these into the owning generic's graph,
/// folding constant subtrees away as it goes.
#[derive(Clone, Debug)]
pub enum Expression {
  Argument(usize),
  Constant(Arc<dyn ErasedValue>),
  Attribute(Box<Expression>, IString),
  Call(IString, Vec<Expression>),
  Tuple(Vec<Expression>),
  And(Box<Expression>, Box<Expression>),
  Or(Box<Expression>, Box<Expression>),
}

/// The canonical shape of an interned expression node. Two calls to `Interner::intern`
/// that produce an equal `ExprNode` return the same `ExprId`.
#[derive(Clone, Hash, PartialEq, Eq)]
enum ExprNode {
  Argument(usize),
  Constant(Arc<dyn ErasedValue>),
  Getattr(ExprId, IString),
  Call(IString, Vec<ExprId>),
  Tuple(Vec<ExprId>),
  And(ExprId, ExprId),
  Or(ExprId, ExprId),
}

/// Interns expression nodes for one generic function, assigning each a stable `ExprId`
/// and giving every signature that mentions the same sub-expression a shared node to
/// cache against during a call.
#[derive(Default, Clone)]
pub struct Interner {
  nodes: Vec<ExprNode>,
  index: HashMap<ExprNode, ExprId>,
}

impl Interner {
  pub fn new() -> Self {
    Interner::default()
  }

  fn intern(&mut self, node: ExprNode) -> ExprId {
    if let Some(&id) = self.index.get(&node) {
      return id;
    }
    let id = self.nodes.len();
    self.index.insert(node.clone(), id);
    self.nodes.push(node);
    id
  }

  pub fn argument(&mut self, position: usize) -> ExprId {
    self.intern(ExprNode::Argument(position))
  }

  pub fn constant(&mut self, value: Arc<dyn ErasedValue>) -> ExprId {
    self.intern(ExprNode::Constant(value))
  }

  pub fn getattr(&mut self, base: ExprId, name: impl Into<IString>) -> ExprId {
    self.intern(ExprNode::Getattr(base, name.into()))
  }

  /// Interns a function call, folding it eagerly to a `Constant` when every argument is
  /// itself already a constant and the named function is registered and doesn't decline
  /// on those particular values (spec §4.4: "constant folding is performed eagerly when
  /// the children of `Call`... are all constants"). Declines (an unknown function name, or
  /// one that returns `None` on these constants) fall back to an ordinary `Call` node,
  /// re-evaluated the same way on every call — harmless, just not folded away.
  pub fn call(&mut self, name: impl Into<IString>, args: Vec<ExprId>) -> ExprId {
    let name = name.into();
    if let Some(values) = self.as_constants(&args) {
      if let Some(function) = FUNCTION_REGISTRY.get(&name) {
        if let Some(result) = function(&values).and_then(|v| value_to_erased(&v)) {
          return self.constant(result);
        }
      }
    }
    self.intern(ExprNode::Call(name, args))
  }

  /// Interns a tuple-build, folding it to a `Constant` tuple when every child is already
  /// constant and the built tuple has a faithful erased representation (see
  /// `value_to_erased`).
  pub fn tuple(&mut self, items: Vec<ExprId>) -> ExprId {
    if let Some(values) = self.as_constants(&items) {
      if let Some(erased) = value_to_erased(&crate::classes::Value::tuple(values)) {
        return self.constant(erased);
      }
    }
    self.intern(ExprNode::Tuple(items))
  }

  /// Interns a short-circuit `and`, folding it when both children are constant (the
  /// left's truthiness alone decides the result, exactly as `evaluate` would compute it).
  pub fn and(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
    if let (Some(l), Some(r)) = (self.constant_value(lhs), self.constant_value(rhs)) {
      if let Some(erased) = value_to_erased(&if !l.is_truthy() { l } else { r }) {
        return self.constant(erased);
      }
    }
    self.intern(ExprNode::And(lhs, rhs))
  }

  /// Interns a short-circuit `or`, folded the same way `and` is.
  pub fn or(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
    if let (Some(l), Some(r)) = (self.constant_value(lhs), self.constant_value(rhs)) {
      if let Some(erased) = value_to_erased(&if l.is_truthy() { l } else { r }) {
        return self.constant(erased);
      }
    }
    self.intern(ExprNode::Or(lhs, rhs))
  }

  /// Interns one node of the public [`Expression`] builder tree, recursively interning
  /// its children first so folding (see `call`/`tuple`/`and`/`or` above) sees constants
  /// wherever the author's tree is already fully literal. Backs
  /// `GenericFunction::intern_expression`, spec §6's external `intern_expression` entry
  /// point.
  pub fn intern_expression(&mut self, expr: &Expression) -> ExprId {
    match expr {
      Expression::Argument(position) => self.argument(*position),
      Expression::Constant(value) => self.constant(value.clone()),
      Expression::Attribute(base, name) => {
        let base_id = self.intern_expression(base);
        self.getattr(base_id, name.clone())
      }
      Expression::Call(name, args) => {
        let arg_ids: Vec<ExprId> = args.iter().map(|a| self.intern_expression(a)).collect();
        self.call(name.clone(), arg_ids)
      }
      Expression::Tuple(items) => {
        let ids: Vec<ExprId> = items.iter().map(|i| self.intern_expression(i)).collect();
        self.tuple(ids)
      }
      Expression::And(lhs, rhs) => {
        let l = self.intern_expression(lhs);
        let r = self.intern_expression(rhs);
        self.and(l, r)
      }
      Expression::Or(lhs, rhs) => {
        let l = self.intern_expression(lhs);
        let r = self.intern_expression(rhs);
        self.or(l, r)
      }
    }
  }

  /// If `expr` is already interned as a `Constant` node, its runtime value; used only by
  /// the folding helpers above, which never need to consult the call's argument tuple
  /// since a constant's value doesn't depend on it.
  fn constant_value(&self, expr: ExprId) -> Option<Value> {
    match &self.nodes[expr] {
      ExprNode::Constant(value) => Some(erased_to_value(value)),
      _ => None,
    }
  }

  fn as_constants(&self, ids: &[ExprId]) -> Option<Vec<Value>> {
    ids.iter().map(|&id| self.constant_value(id)).collect()
  }

  /// The sub-expression ids `expr` directly depends on; empty for `Argument`/`Constant`.
  pub fn children(&self, expr: ExprId) -> Vec<ExprId> {
    match &self.nodes[expr] {
      ExprNode::Argument(_) | ExprNode::Constant(_) => Vec::new(),
      ExprNode::Getattr(base, _) => vec![*base],
      ExprNode::Call(_, args) => args.clone(),
      ExprNode::Tuple(items) => items.clone(),
      ExprNode::And(a, b) | ExprNode::Or(a, b) => vec![*a, *b],
    }
  }

  /// Evaluates `expr` against the call's argument values, using `cache` to avoid
  /// recomputing any shared sub-expression more than once per call. Returns `None` if
  /// an attribute lookup missed, a registered function declined, or `Or`/`And`
  /// short-circuiting never reached a value.
  pub fn evaluate(&self, expr: ExprId, args: &[Value], cache: &mut Vec<Option<Value>>) -> Option<Value> {
    if cache.len() <= expr {
      cache.resize(expr + 1, None);
    }
    if let Some(value) = &cache[expr] {
      return Some(value.clone());
    }

    let result = match &self.nodes[expr] {
      ExprNode::Argument(position) => args.get(*position).cloned(),
      ExprNode::Constant(value) => Some(erased_to_value(value)),
      ExprNode::Getattr(base, name) => {
        let base_value = self.evaluate(*base, args, cache)?;
        base_value.get_attr(name)
      }
      ExprNode::Call(name, arg_ids) => {
        let function = FUNCTION_REGISTRY.get(name)?;
        let mut values = Vec::with_capacity(arg_ids.len());
        for &id in arg_ids {
          values.push(self.evaluate(id, args, cache)?);
        }
        function(&values)
      }
      ExprNode::Tuple(item_ids) => {
        let mut values = Vec::with_capacity(item_ids.len());
        for &id in item_ids {
          values.push(self.evaluate(id, args, cache)?);
        }
        Some(Value::tuple(values))
      }
      ExprNode::And(lhs, rhs) => {
        let lhs_value = self.evaluate(*lhs, args, cache)?;
        if !lhs_value.is_truthy() {
          Some(lhs_value)
        } else {
          self.evaluate(*rhs, args, cache)
        }
      }
      ExprNode::Or(lhs, rhs) => {
        let lhs_value = self.evaluate(*lhs, args, cache)?;
        if lhs_value.is_truthy() {
          Some(lhs_value)
        } else {
          self.evaluate(*rhs, args, cache)
        }
      }
    };

    if let Some(value) = &result {
      cache[expr] = Some(value.clone());
    }
    result
  }
}

/// `Expression::Constant` stores an arbitrary hashable authoring-time value (an interned
/// literal written into a rule's signature); this converts it into the runtime `Value`
/// domain so it can be compared against an argument's computed value.
fn erased_to_value(value: &Arc<dyn ErasedValue>) -> Value {
  use std::any::Any;
  let any: &dyn Any = value.as_any();
  if let Some(i) = any.downcast_ref::<i64>() {
    Value::Int(*i)
  } else if let Some(f) = any.downcast_ref::<ordered_float_bits::F64Bits>() {
    Value::Float(f.0)
  } else if let Some(b) = any.downcast_ref::<bool>() {
    Value::Bool(*b)
  } else if let Some(s) = any.downcast_ref::<String>() {
    Value::str(s.as_str())
  } else {
    Value::None
  }
}

/// The inverse of `erased_to_value`, used by constant folding (`call`/`tuple`/`and`/`or`)
/// to turn a folded-away computation's result back into an interning key. Only the scalar
/// kinds `erased_to_value` itself knows how to read back (`Int`/`Float`/`Bool`/`Str`) round
/// trip losslessly; anything else (a folded `Tuple`, an `Object`, `None`) has no faithful
/// erased representation, so folding is simply skipped for those and the node stays a
/// live `Call`/`Tuple`/`And`/`Or`, re-evaluated per call instead — correct either way, just
/// not collapsed to a constant.
fn value_to_erased(value: &Value) -> Option<Arc<dyn ErasedValue>> {
  match value {
    Value::Int(i) => Some(Arc::new(*i)),
    Value::Float(f) => Some(Arc::new(ordered_float_bits::F64Bits(*f))),
    Value::Bool(b) => Some(Arc::new(*b)),
    Value::Str(s) => Some(Arc::new(s.to_string())),
    Value::Tuple(_) | Value::Object(_) | Value::Class(_) | Value::None => None,
  }
}

/// `f64` isn't `Hash`/`Eq`, so `Expression::Constant` can't hold a bare `f64` and stay
/// usable as an interning key. Authors who need a floating-point constant in a signature
/// go through this newtype, which compares and hashes on the value's bit pattern — fine
/// for the constants that appear in rule literals, since they're written once and never
/// computed, so `NaN`/`-0.0` bit-pattern quirks never arise in practice.
pub mod ordered_float_bits {
  use std::hash::{Hash, Hasher};

  #[derive(Clone, Copy, Debug)]
  pub struct F64Bits(pub f64);

  impl PartialEq for F64Bits {
    fn eq(&self, other: &Self) -> bool {
      self.0.to_bits() == other.0.to_bits()
    }
  }
  impl Eq for F64Bits {}
  impl Hash for F64Bits {
    fn hash<H: Hasher>(&self, state: &mut H) {
      self.0.to_bits().hash(state)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn structurally_equal_nodes_share_an_id() {
    let mut interner = Interner::new();
    let a0 = interner.argument(0);
    let first = interner.getattr(a0, "age");
    let second = interner.getattr(a0, "age");
    assert_eq!(first, second);
  }

  #[test]
  fn evaluate_caches_shared_subexpressions() {
    let mut interner = Interner::new();
    let a0 = interner.argument(0);
    let age = interner.getattr(a0, "age");
    let mut cache = Vec::new();
    let subject = Value::object(Arc::new(crate::classes::testing::FixedAttrs::new("age", Value::Int(30))));
    let first = interner.evaluate(age, &[subject], &mut cache);
    assert_eq!(first, Some(Value::Int(30)));
  }

  #[test]
  fn call_over_constant_arguments_folds_to_a_constant_node() {
    register_function(
      "inc",
      Arc::new(|values: &[Value]| match values {
        [Value::Int(i)] => Some(Value::Int(i + 1)),
        _ => None,
      }),
    );
    let mut interner = Interner::new();
    let one = interner.constant(Arc::new(1i64));
    let folded = interner.call("inc", vec![one]);
    let mut cache = Vec::new();
    // No arguments were supplied at evaluation time; a folded `Call` node doesn't need any.
    assert_eq!(interner.evaluate(folded, &[], &mut cache), Some(Value::Int(2)));
  }

  #[test]
  fn intern_expression_builds_the_same_graph_as_the_direct_methods() {
    let mut interner = Interner::new();
    let direct = {
      let a0 = interner.argument(0);
      interner.getattr(a0, "age")
    };
    let via_expression = interner.intern_expression(&Expression::Attribute(
      Box::new(Expression::Argument(0)),
      IString::from("age"),
    ));
    assert_eq!(direct, via_expression);
  }
}
