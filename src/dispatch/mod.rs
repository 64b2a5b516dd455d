/*!

Predicate-dispatch generic functions: callables whose body is chosen, per invocation, from
a set of methods guarded by signatures over arbitrary expressions of the arguments.
[`GenericFunction`] is the aggregate the rest of this module's pieces serve — the
"generic function state" of spec §3 — wiring together the expression interner (`expr`),
criterion algebra (`criterion`), signature/predicate algebra (`signature`), per-expression
indexes (`index`), the must-precede constraint graph (`constraint`), the DAG compiler
(`compiler`), the compiled decision tree (`node`), the runtime walk (`walk`), and method
combination (`combine`). Grounded on `functions.py`'s `GenericFunction`/`Dispatch` classes.

*/

pub mod combine;
pub mod constraint;
pub mod criterion;
pub mod error;
pub mod expr;
pub mod index;
pub mod node;
pub mod signature;

mod compiler;
mod walk;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::abstractions::IString;
use crate::adapt::{protocol, ChangeListener, ProtocolId};
use crate::classes::Value;

pub use combine::{AroundFn, MethodBody, NextMethod, PrimaryFn, Qualifier, SideEffectFn};
pub use criterion::{Bound, Criterion, DispatchFamily};
pub use error::DispatchError;
pub use expr::{register_function, Expression, ExprFn, ExprId};
pub use node::DispatchNode;
pub use signature::{Predicate, Signature};

use combine::Case;
use compiler::{compile_root, IndexKey};
use constraint::ConstraintGraph;
use expr::Interner;
use index::CriterionIndex;

/// Everything that changes when a rule is added or the generic is cleared — the mutable
/// aggregate the specification's §3 "generic function state" describes, guarded by
/// [`GenericFunction`]'s single mutex.
struct State {
  cases: Vec<Case>,
  interner: Interner,
  indexes: HashMap<IndexKey, CriterionIndex>,
  constraints: ConstraintGraph,
  /// Protocols this generic has subscribed to via some `ProtocolCriterion`, so `clear()`
  /// can unsubscribe from exactly these and no others (spec §3 invariant 2).
  subscribed_protocols: Vec<ProtocolId>,
}

impl State {
  fn new() -> Self {
    State {
      cases: Vec::new(),
      interner: Interner::new(),
      indexes: HashMap::new(),
      constraints: ConstraintGraph::new(),
      subscribed_protocols: Vec::new(),
    }
  }
}

/// A snapshot of everything a dispatch walk needs, published atomically together so a call
/// in flight never sees a DAG compiled against one case list walked with another's
/// interner. `cases`/`interner` are append-only as of the moment they're cloned out of
/// `State` to build this snapshot, so sharing them read-only across concurrent calls needs
/// no further synchronization once published (spec §5: "the compiled DAG is shared
/// read-mostly and published atomically").
struct Compiled {
  root: Arc<DispatchNode>,
  interner: Interner,
  cases: Vec<Case>,
}

/// A callable whose body is chosen, per invocation, from a set of methods guarded by
/// signatures over arbitrary expressions of the arguments. Grounded on `functions.py`'s
/// `GenericFunction`.
///
/// Constructed behind an `Arc` ([`GenericFunction::new`]) because a generic function that
/// guards on `ProtocolCriterion` subscribes itself, by weak reference, to the protocols it
/// depends on — the adaptation registry's `criterion_changed` notification needs somewhere
/// to deliver to that doesn't keep the generic alive on its own (spec §3: "Nodes inside the
/// DAG ... may hold weak back-references to the owning generic function").
pub struct GenericFunction {
  name: IString,
  arity: usize,
  arg_names: Vec<Option<IString>>,
  state: Mutex<State>,
  /// The compiled DAG root, or absent, meaning "rebuild on next call" (spec §3). Also
  /// cleared — without touching `state`'s lock — by `protocol_changed`, per §5's
  /// requirement that a change-bus delivery "must only mark the generic dirty."
  compiled: ArcSwapOption<Compiled>,
  weak_self: Mutex<Weak<GenericFunction>>,
}

impl GenericFunction {
  /// Creates a new, empty generic function over `arity` positional arguments, optionally
  /// naming some or all of them (spec §3: "Argument — a positional index, a name, or
  /// both"). `arg_names[i]` is the name of position `i`, or `None` for a purely positional
  /// argument.
  pub fn new(name: impl Into<IString>, arg_names: Vec<Option<IString>>) -> Arc<GenericFunction> {
    let arity = arg_names.len();
    let generic = Arc::new(GenericFunction {
      name: name.into(),
      arity,
      arg_names,
      state: Mutex::new(State::new()),
      compiled: ArcSwapOption::from(None),
      weak_self: Mutex::new(Weak::new()),
    });
    *generic.weak_self.lock() = Arc::downgrade(&generic);
    generic
  }

  pub fn name(&self) -> &IString {
    &self.name
  }

  pub fn arity(&self) -> usize {
    self.arity
  }

  /// Resolves a named argument to its positional index, for callers building a `Signature`
  /// from a parsed rule's argument names rather than raw positions. Spec §7:
  /// `NameNotFound` "raised when expression resolution refers to an unknown argument."
  pub fn argument_position(&self, name: &str) -> Result<usize, DispatchError> {
    self
      .arg_names
      .iter()
      .position(|candidate| candidate.as_deref() == Some(name))
      .ok_or_else(|| DispatchError::NameNotFound { name: IString::from(name) })
  }

  /// Interns `expr` into this generic's expression graph, returning the stable `ExprId`
  /// other signatures guarding the same sub-expression will share. Spec §6:
  /// `GenericFunction.intern_expression(expr) -> id`.
  pub fn intern_expression(&self, expr: &Expression) -> ExprId {
    self.state.lock().interner.intern_expression(expr)
  }

  /// Registers one method under `predicate`, disjoining over every signature `predicate`
  /// contains (so an `a | b` predicate installs two cases, one per signature). Invalidates
  /// the compiled DAG; the next `call` rebuilds it. Spec §6: `add_rule(predicate, method,
  /// qualifier?)` — qualifier is folded into `body`'s `MethodBody` variant here rather than
  /// threaded as a separate parameter, since a `MethodBody` already states its own role.
  pub fn add_rule(&self, predicate: Predicate, body: MethodBody) {
    {
      let mut state = self.state.lock();
      for signature in predicate.signatures() {
        self.insert_case(&mut state, signature.clone(), body.clone());
      }
    }
    crate::log::debug!(0, "add_rule: generic `{}` now has a case added; DAG invalidated", self.name);
    self.compiled.store(None);
  }

  fn insert_case(&self, state: &mut State, signature: Signature, body: MethodBody) {
    let case_id = state.cases.len();

    let ids: Vec<ExprId> = signature.expr_ids().collect();
    state.constraints.add_rule(&ids, self.arity);

    for (expr_id, criterion) in signature.items() {
      if matches!(criterion, Criterion::Null) {
        continue;
      }
      let family = criterion.dispatch_family();
      let key: IndexKey = (expr_id, family);
      state
        .indexes
        .entry(key)
        .or_insert_with(|| CriterionIndex::new(family))
        .insert(case_id, criterion.clone());

      let mut protocol_ids = Vec::new();
      collect_protocol_ids(criterion, &mut protocol_ids);
      for protocol_id in protocol_ids {
        if !state.subscribed_protocols.contains(&protocol_id) {
          let listener: Weak<dyn ChangeListener> = self.weak_self.lock().clone();
          protocol(protocol_id).add_listener(listener);
          state.subscribed_protocols.push(protocol_id);
        }
      }
    }

    state.cases.push(Case { signature, body });
  }

  /// Drops every case, index, interned expression and protocol subscription, returning the
  /// generic to its freshly-constructed state. Spec §3 invariant 2: every subscription
  /// installed while building an index is released here.
  pub fn clear(&self) {
    let mut state = self.state.lock();
    let listener: Weak<dyn ChangeListener> = self.weak_self.lock().clone();
    for protocol_id in state.subscribed_protocols.drain(..) {
      protocol(protocol_id).remove_listener(&listener);
    }
    *state = State::new();
    drop(state);
    self.compiled.store(None);
  }

  /// Dispatches on `args`, walking the compiled DAG down to a leaf, combining its
  /// surviving candidates into one callable (spec §4.8), and invoking it. Lazily
  /// (re)builds the compiled DAG first if a prior `add_rule`/`clear`/protocol change
  /// invalidated it (spec §4.6 step 1).
  pub fn call(&self, args: &[Value]) -> Result<Value, DispatchError> {
    let compiled = self.ensure_compiled();
    let next = walk::locate_method(&compiled.root, args, &compiled.interner, &compiled.cases, &self.name);
    // The lock is not held here: `ensure_compiled` released it once the snapshot was
    // published, so a method body that dispatches again (on this generic or another)
    // can't deadlock against itself (spec §5: "releasing the generic's lock before
    // invoking the leaf method").
    next(args)
  }

  fn ensure_compiled(&self) -> Arc<Compiled> {
    if let Some(compiled) = self.compiled.load_full() {
      return compiled;
    }
    let state = self.state.lock();
    let root = compile_root(state.cases.len(), &state.indexes, &state.constraints);
    let compiled = Arc::new(Compiled {
      root,
      interner: state.interner.clone(),
      cases: state.cases.clone(),
    });
    drop(state);
    self.compiled.store(Some(compiled.clone()));
    compiled
  }
}

impl ChangeListener for GenericFunction {
  /// Delivered while the protocol registry's own lock is held, but never this generic's
  /// (spec §5). Must only mark the generic dirty, never rebuild — rebuilding here could
  /// deadlock against a concurrent `add_rule`, and would do wasted work if several
  /// protocols this generic depends on change in a burst.
  fn protocol_changed(&self, _protocol: ProtocolId) {
    self.compiled.store(None);
  }
}

/// Walks a criterion's `And`/`Or`/`Not` structure (the only combinators a `Protocol`
/// criterion can appear under — `&`/`|` require matching dispatch families, and a
/// `Protocol` criterion only combines with other `Protocol` criteria) to find every
/// `ProtocolId` it depends on, so `insert_case` can subscribe to each at most once.
fn collect_protocol_ids(criterion: &Criterion, out: &mut Vec<ProtocolId>) {
  match criterion {
    Criterion::Protocol(id) => out.push(*id),
    Criterion::And(a, b) | Criterion::Or(a, b) => {
      collect_protocol_ids(a, out);
      collect_protocol_ids(b, out);
    }
    Criterion::Not(inner) => collect_protocol_ids(inner, out),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapt::Adapter;
  use crate::classes::{testing, ClassId, CLASS_REGISTRY};

  fn primary(f: impl Fn(&[Value]) -> Result<Value, DispatchError> + Send + Sync + 'static) -> MethodBody {
    MethodBody::Primary(Arc::new(f))
  }

  /// Scenario 1 of the specification's test matrix: class dispatch between two sibling
  /// classes, with a third, unrelated class producing `NoApplicableMethod`.
  #[test]
  fn class_dispatch_picks_the_matching_rule() {
    let land_vehicle = CLASS_REGISTRY.register("ModLandVehicle", &[]);
    let water_vehicle = CLASS_REGISTRY.register("ModWaterVehicle", &[]);
    let hummer = CLASS_REGISTRY.register("ModHummer", &[land_vehicle]);
    let speedboat = CLASS_REGISTRY.register("ModSpeedboat", &[water_vehicle]);
    let plain = CLASS_REGISTRY.register("ModPlainObject", &[]);

    let generic = GenericFunction::new("terrain", vec![Some(IString::from("v"))]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));

    generic.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Class(land_vehicle))),
      primary(|_| Ok(Value::str("land"))),
    );
    generic.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Class(water_vehicle))),
      primary(|_| Ok(Value::str("water"))),
    );

    let hummer_value = testing::object_of_class(hummer, vec![]);
    let speedboat_value = testing::object_of_class(speedboat, vec![]);
    let plain_value = testing::object_of_class(plain, vec![]);

    assert_eq!(generic.call(&[hummer_value]).unwrap(), Value::str("land"));
    assert_eq!(generic.call(&[speedboat_value]).unwrap(), Value::str("water"));
    assert!(matches!(generic.call(&[plain_value]), Err(DispatchError::NoApplicableMethod { .. })));
  }

  /// Scenario 2: two equally-specific, unrelated signatures over two arguments raise
  /// `AmbiguousMethod` rather than picking one arbitrarily.
  #[test]
  fn unrelated_signatures_over_different_arguments_are_ambiguous() {
    let object = CLASS_REGISTRY.root();
    let int_class = crate::classes::builtin::int();

    let generic = GenericFunction::new("combine_ints", vec![None, None]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));
    let arg1 = generic.intern_expression(&Expression::Argument(1));

    generic.add_rule(
      Predicate::new(
        Signature::new().with(arg0, Criterion::Class(object)).with(arg1, Criterion::Class(int_class)),
      ),
      primary(|args: &[Value]| match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        _ => Ok(Value::None),
      }),
    );
    generic.add_rule(
      Predicate::new(
        Signature::new().with(arg0, Criterion::Class(int_class)).with(arg1, Criterion::Class(object)),
      ),
      primary(|args: &[Value]| match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
        _ => Ok(Value::None),
      }),
    );

    let result = generic.call(&[Value::Int(1), Value::Int(2)]);
    assert!(matches!(result, Err(DispatchError::AmbiguousMethod { .. })));
  }

  /// Scenario 3: a cascade of `Inequality` (range) rules partitions a single numeric
  /// argument into age brackets, including an exact-match rule for 16 that outranks the
  /// surrounding `< 20` bracket.
  #[test]
  fn inequality_cascade_partitions_by_age() {
    let generic = GenericFunction::new("bracket", vec![Some(IString::from("age"))]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));

    let rule = |bound: Criterion, _label: &'static str| Predicate::new(Signature::new().with(arg0, bound));
    generic.add_rule(rule(Criterion::less_than(Value::Int(2)), "infant"), primary(|_| Ok(Value::str("infant"))));
    generic.add_rule(
      rule(Criterion::less_than(Value::Int(5)), "preschooler"),
      primary(|_| Ok(Value::str("preschooler"))),
    );
    generic.add_rule(rule(Criterion::less_than(Value::Int(13)), "preteen"), primary(|_| Ok(Value::str("preteen"))));
    generic.add_rule(rule(Criterion::less_than(Value::Int(20)), "teenager"), primary(|_| Ok(Value::str("teenager"))));
    generic.add_rule(
      rule(Criterion::greater_or_equal(Value::Int(20)), "adult"),
      primary(|_| Ok(Value::str("adult"))),
    );
    generic.add_rule(
      rule(Criterion::greater_or_equal(Value::Int(55)), "senior"),
      primary(|_| Ok(Value::str("senior"))),
    );
    generic.add_rule(
      rule(Criterion::equal_to(Value::Int(16)), "sweet sixteen"),
      primary(|_| Ok(Value::str("sweet sixteen"))),
    );

    let check = |age: Value, expected: &str| {
      assert_eq!(generic.call(&[age]).unwrap(), Value::str(expected));
    };
    check(Value::Int(0), "infant");
    check(Value::Int(4), "preschooler");
    check(Value::Float(12.99), "preteen");
    check(Value::Int(16), "sweet sixteen");
    check(Value::Float(16.5), "teenager");
    check(Value::Int(25), "adult");
    check(Value::Float(54.9), "adult");
    check(Value::Int(55), "senior");
  }

  /// Scenario 4: dynamic protocol registration becomes visible to a generic function
  /// without calling `clear()` — the protocol's `register_type` fires `protocol_changed`,
  /// which invalidates the compiled DAG so the next call recompiles against the new
  /// adapter.
  #[test]
  fn registering_a_protocol_adapter_is_visible_without_clearing() {
    let wheeled = crate::adapt::ProtocolId::new("ModWheeled");
    let tricycle = CLASS_REGISTRY.register("ModTricycle", &[]);

    let generic = GenericFunction::new("rolls", vec![None]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));
    generic.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Protocol(wheeled))),
      primary(|_| Ok(Value::str("roll"))),
    );

    let tricycle_value = testing::object_of_class(tricycle, vec![]);
    assert!(matches!(
      generic.call(&[tricycle_value.clone()]),
      Err(DispatchError::NoApplicableMethod { .. })
    ));

    crate::adapt::declare_adapter_for_type(tricycle, wheeled, Adapter::no_adapter_needed()).unwrap();

    assert_eq!(generic.call(&[tricycle_value]).unwrap(), Value::str("roll"));
  }

  /// Scenario 6: composing a protocol's own adapter with an implied protocol's adapter
  /// goes through the generic function layer the same way `adapt()` does directly —
  /// exercised here via a `ProtocolCriterion` so the dispatch-level wiring (not just
  /// `adapt()` itself) is covered.
  #[test]
  fn protocol_dispatch_sees_implied_protocol_composition() {
    let ia = crate::adapt::ProtocolId::new("ModIA");
    let ic = crate::adapt::ProtocolId::new("ModIC");
    let impl_class = CLASS_REGISTRY.register("ModImpl", &[]);

    crate::adapt::declare_adapter_for_type(
      impl_class,
      ia,
      Adapter::new(|v| crate::adapt::AdapterResult::Adapted(v.clone())),
    )
    .unwrap();
    crate::adapt::protocol_implies(ia, ic, Adapter::new(|v| crate::adapt::AdapterResult::Adapted(v.clone())));

    let generic = GenericFunction::new("as_ic", vec![None]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));
    generic.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Protocol(ic))),
      primary(|_| Ok(Value::str("is-ic"))),
    );

    let instance = testing::object_of_class(impl_class, vec![]);
    assert_eq!(generic.call(&[instance]).unwrap(), Value::str("is-ic"));
  }

  /// `around` wraps the entire `before -> primary -> after` chain, threading
  /// `next_method`, per spec §4.8/§4.9's `around`-is-the-true-entry-point resolution.
  #[test]
  fn around_wraps_the_full_before_primary_after_chain() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let generic = GenericFunction::new("logged", vec![None]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));
    let matches_anything = Signature::always();

    let before_log = log.clone();
    generic.add_rule(
      Predicate::new(matches_anything.clone()),
      MethodBody::Before(Arc::new(move |_| before_log.lock().push("before"))),
    );
    let after_log = log.clone();
    generic.add_rule(
      Predicate::new(matches_anything.clone()),
      MethodBody::After(Arc::new(move |_| after_log.lock().push("after"))),
    );
    let primary_log = log.clone();
    generic.add_rule(
      Predicate::new(matches_anything.clone()),
      primary(move |_| {
        primary_log.lock().push("primary");
        Ok(Value::None)
      }),
    );
    let around_entries = Arc::new(AtomicUsize::new(0));
    let around_log = log.clone();
    let around_entries_clone = around_entries.clone();
    generic.add_rule(
      Predicate::new(matches_anything),
      MethodBody::Around(Arc::new(move |args, next| {
        around_entries_clone.fetch_add(1, Ordering::SeqCst);
        around_log.lock().push("around-enter");
        let result = next(args);
        around_log.lock().push("around-exit");
        result
      })),
    );

    let _ = arg0; // the signature guards nothing; every rule matches unconditionally.
    generic.call(&[Value::Int(1)]).unwrap();
    assert_eq!(around_entries.load(Ordering::SeqCst), 1);
    assert_eq!(
      log.lock().clone(),
      vec!["around-enter", "before", "primary", "after", "around-exit"]
    );
  }

  /// Scenario 5: four `around` methods over two vehicle arguments, layered by
  /// specificity, each calling `next_method` to reach the next-most-general applicable
  /// rule. The most specific layer fires first and composes its text with whatever its
  /// `next_method` call returns, so the final string reads outer-specific-text-last.
  #[test]
  fn chained_around_methods_compose_by_specificity() {
    let vehicle = CLASS_REGISTRY.register("ModVehicle5", &[]);
    let land = CLASS_REGISTRY.register("ModLandVehicle5", &[vehicle]);
    let water = CLASS_REGISTRY.register("ModWaterVehicle5", &[vehicle]);
    let bicycle = CLASS_REGISTRY.register("ModBicycle5", &[land]);
    let speedboat = CLASS_REGISTRY.register("ModSpeedboat5", &[water]);

    let generic = GenericFunction::new("vehicle_chat", vec![None, None]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));
    let arg1 = generic.intern_expression(&Expression::Argument(1));

    let sig = |a: ClassId, b: ClassId| {
      Predicate::new(Signature::new().with(arg0, Criterion::Class(a)).with(arg1, Criterion::Class(b)))
    };
    fn text_of(v: Value) -> String {
      match v {
        Value::Str(s) => s.to_string(),
        _ => String::new(),
      }
    }

    generic.add_rule(sig(vehicle, vehicle), primary(|_| Ok(Value::str(""))));
    generic.add_rule(
      sig(vehicle, vehicle),
      MethodBody::Around(Arc::new(|args, next| {
        Ok(Value::str(format!("They're both vehicles.  {}", text_of(next(args)?))))
      })),
    );
    generic.add_rule(
      sig(land, land),
      MethodBody::Around(Arc::new(|args, next| {
        Ok(Value::str(format!("{}They are both land vehicles.", text_of(next(args)?))))
      })),
    );
    generic.add_rule(
      sig(water, water),
      MethodBody::Around(Arc::new(|args, next| {
        Ok(Value::str(format!("{}They are both sea vehicles.", text_of(next(args)?))))
      })),
    );
    generic.add_rule(
      sig(land, water),
      MethodBody::Around(Arc::new(|args, next| {
        Ok(Value::str(format!("{}They are a land vehicle and a sea vehicle.", text_of(next(args)?))))
      })),
    );

    let bike = || testing::object_of_class(bicycle, vec![]);
    let boat = || testing::object_of_class(speedboat, vec![]);

    assert_eq!(
      generic.call(&[bike(), bike()]).unwrap(),
      Value::str("They're both vehicles.  They are both land vehicles.")
    );
    assert_eq!(
      generic.call(&[boat(), boat()]).unwrap(),
      Value::str("They're both vehicles.  They are both sea vehicles.")
    );
    assert_eq!(
      generic.call(&[bike(), boat()]).unwrap(),
      Value::str("They're both vehicles.  They are a land vehicle and a sea vehicle.")
    );
  }

  /// `clear()` drops every subscription; re-registering the same protocol criterion after
  /// a clear doesn't double-subscribe (spec §8: "after clear(), no subscription remains
  /// on any criterion previously installed").
  #[test]
  fn clear_releases_protocol_subscriptions() {
    let protocol_id = crate::adapt::ProtocolId::new("ModClearable");
    let generic = GenericFunction::new("clears", vec![None]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));
    generic.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Protocol(protocol_id))),
      primary(|_| Ok(Value::None)),
    );
    assert_eq!(generic.state.lock().subscribed_protocols.len(), 1);

    generic.clear();
    assert!(generic.state.lock().subscribed_protocols.is_empty());
    assert!(generic.state.lock().cases.is_empty());
  }

  /// Incremental equivalence (spec §8): the same two rules added in either order dispatch
  /// the same way.
  #[test]
  fn rule_insertion_order_does_not_affect_dispatch() {
    let dog = CLASS_REGISTRY.register("ModOrderDog", &[]);
    let cat = CLASS_REGISTRY.register("ModOrderCat", &[]);

    let forward = GenericFunction::new("order_a", vec![None]);
    let arg0 = forward.intern_expression(&Expression::Argument(0));
    forward.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Class(dog))),
      primary(|_| Ok(Value::str("dog"))),
    );
    forward.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Class(cat))),
      primary(|_| Ok(Value::str("cat"))),
    );

    let backward = GenericFunction::new("order_b", vec![None]);
    let arg0b = backward.intern_expression(&Expression::Argument(0));
    backward.add_rule(
      Predicate::new(Signature::new().with(arg0b, Criterion::Class(cat))),
      primary(|_| Ok(Value::str("cat"))),
    );
    backward.add_rule(
      Predicate::new(Signature::new().with(arg0b, Criterion::Class(dog))),
      primary(|_| Ok(Value::str("dog"))),
    );

    let dog_value = testing::object_of_class(dog, vec![]);
    assert_eq!(forward.call(&[dog_value.clone()]).unwrap(), backward.call(&[dog_value]).unwrap());
  }

  /// `SubclassCriterion` dispatches on the argument *being* a class (as a `Value::Class`),
  /// not on an ordinary instance of one — distinct from `ClassCriterion`'s isinstance test.
  /// Registering a subtype with a factory is a typical use: callers pass the class itself.
  #[test]
  fn subclass_criterion_matches_a_class_passed_as_a_value() {
    let shape = CLASS_REGISTRY.register("ModShape", &[]);
    let circle = CLASS_REGISTRY.register("ModCircle", &[shape]);
    let square = CLASS_REGISTRY.register("ModSquare", &[shape]);
    let unrelated = CLASS_REGISTRY.register("ModUnrelatedToShape", &[]);

    let generic = GenericFunction::new("register_factory", vec![None]);
    let arg0 = generic.intern_expression(&Expression::Argument(0));
    generic.add_rule(
      Predicate::new(Signature::new().with(arg0, Criterion::Subclass(shape))),
      primary(|_| Ok(Value::str("shape factory"))),
    );

    assert_eq!(generic.call(&[Value::class_value(circle)]).unwrap(), Value::str("shape factory"));
    assert_eq!(generic.call(&[Value::class_value(square)]).unwrap(), Value::str("shape factory"));
    assert_eq!(generic.call(&[Value::class_value(shape)]).unwrap(), Value::str("shape factory"));
    assert!(matches!(
      generic.call(&[Value::class_value(unrelated)]),
      Err(DispatchError::NoApplicableMethod { .. })
    ));
    // An ordinary instance of `shape` is not itself a class, so `SubclassCriterion` must
    // not match it, unlike `ClassCriterion`.
    let shape_instance = testing::object_of_class(shape, vec![]);
    assert!(matches!(generic.call(&[shape_instance]), Err(DispatchError::NoApplicableMethod { .. })));
  }
}
