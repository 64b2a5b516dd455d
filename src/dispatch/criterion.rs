/*!

Criteria are the atoms a [`crate::dispatch::signature::Signature`] conjoins: "the value of
this expression is an instance of `Dog`," "...is in `(18, 65]`," "...is truthy," and so on.
Grounded on `dispatch/strategy.py`'s `ClassTest`/`SubclassTest`/`Inequality`/`TruthTest`/
`ProtocolTest` family plus `predicates.py`'s `MultiTest`/`AndTest`/`OrTest`/`NotTest`
combinators.

Every criterion belongs to a [`DispatchFamily`]: the compiler only ever partitions cases on
one family at an expression at a time (mixing, say, a `Range` test and a `Protocol` test on
the same expression id just means the compiler has to consider that id's cases under both
families in turn; it isn't a modeling error, just not collapsible into one dispatch step).

*/

use std::cmp::Ordering;

use crate::adapt::{protocol, ProtocolId};
use crate::classes::{ClassId, Value};

/// Which concrete dispatch algorithm a criterion's family is resolved by.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum DispatchFamily {
  /// Walked via the class's MRO: `Class`, `Subclass`.
  Mro,
  /// Resolved via the adaptation registry: `Protocol`.
  Protocol,
  /// Binary-searched over an ordered partition: `Range`.
  Range,
  /// A two-way branch: `Truth`.
  Truth,
  /// An exact pointer-identity match: `Identity`.
  Identity,
  /// Matches unconditionally, contributes nothing to partitioning: `Null`.
  Null,
  /// A boolean combination of other criteria; see `dispatch_family` for how combinators
  /// report a family (they report their operand's, when both operands agree).
  Combinator,
}

/// One endpoint of a `Range` criterion. `Min`/`Max` are the sentinels the specification's
/// inequality algebra uses so that `x < 5` and `x > 5` describe half-open ranges without
/// a special case at either end of the value domain.
#[derive(Clone, Debug)]
pub enum Bound {
  Min,
  Max,
  Value(Value),
}


/// A guard on the value of one expression. `Signature` pairs these with expression ids;
/// `Criterion` itself knows nothing about which expression it's guarding.
#[derive(Clone, Debug)]
pub enum Criterion {
  /// isinstance-style: the value's class's MRO contains `ClassId` (so `ClassId` itself or
  /// any of its registered descendants' instances all satisfy this).
  Class(ClassId),
  /// issubclass-style: the *value itself* is a class (see `Value::Class`), and that class
  /// is `ClassId` or one of its registered descendants. Distinct from `Class`: this never
  /// matches an ordinary instance, only a class passed as a value.
  Subclass(ClassId),
  /// The value's class (or an instance-level `conform` override) provides `ProtocolId`.
  Protocol(ProtocolId),
  /// `low <= value < high` (either end may be a sentinel `Bound`, giving `<`, `<=`,
  /// `>`, `>=`, or an unbounded range).
  Range(Bound, Bound),
  /// The value compares equal to this exact point (spec §4.2: "singleton `(v,v)`...
  /// equals equal-valued singletons"). Deliberately not a `Range`: a value one integer
  /// successor away from `v` (or a float strictly between `v` and `v`'s successor) must
  /// not satisfy this criterion, which a half-open `[v, bump(v))` interval would wrongly
  /// admit. `!=` is this criterion's `Not`.
  Equal(Value),
  /// The value's truthiness is exactly this.
  Truth(bool),
  /// The value's identity (see `Value::identity`) is exactly this pointer-sized key.
  Identity(usize),
  And(Box<Criterion>, Box<Criterion>),
  Or(Box<Criterion>, Box<Criterion>),
  Not(Box<Criterion>),
  /// Matches every value. The identity element for `Signature`'s implicit conjunction;
  /// an expression id with a `Null` criterion contributes nothing to partitioning.
  Null,
}

impl Criterion {
  pub fn equal_to(value: Value) -> Criterion {
    Criterion::Equal(value)
  }

  pub fn not_equal_to(value: Value) -> Criterion {
    Criterion::Not(Box::new(Criterion::Equal(value)))
  }

  pub fn less_than(value: Value) -> Criterion {
    Criterion::Range(Bound::Min, Bound::Value(value))
  }

  pub fn less_or_equal(value: Value) -> Criterion {
    Criterion::Range(Bound::Min, Bound::Value(bump(value)))
  }

  pub fn greater_than(value: Value) -> Criterion {
    Criterion::Range(Bound::Value(bump(value)), Bound::Max)
  }

  pub fn greater_or_equal(value: Value) -> Criterion {
    Criterion::Range(Bound::Value(value), Bound::Max)
  }

  pub fn dispatch_family(&self) -> DispatchFamily {
    match self {
      Criterion::Class(_) | Criterion::Subclass(_) => DispatchFamily::Mro,
      Criterion::Protocol(_) => DispatchFamily::Protocol,
      Criterion::Range(_, _) | Criterion::Equal(_) => DispatchFamily::Range,
      Criterion::Truth(_) => DispatchFamily::Truth,
      Criterion::Identity(_) => DispatchFamily::Identity,
      Criterion::Null => DispatchFamily::Null,
      Criterion::And(a, b) | Criterion::Or(a, b) => {
        let (fa, fb) = (a.dispatch_family(), b.dispatch_family());
        if fa == fb { fa } else { DispatchFamily::Combinator }
      }
      Criterion::Not(inner) => inner.dispatch_family(),
    }
  }

  /// Does `value` satisfy this criterion?
  pub fn contains(&self, value: &Value) -> bool {
    match self {
      Criterion::Class(class) => value.class().is_subclass_of(*class),
      Criterion::Subclass(class) => value.as_class().is_some_and(|value_class| value_class.is_subclass_of(*class)),
      Criterion::Protocol(protocol_id) => {
        value.conform(*protocol_id).is_some() || protocol(*protocol_id).provides(value.class())
      }
      Criterion::Range(low, high) => {
        let above_low = match low {
          Bound::Min => true,
          Bound::Max => false,
          Bound::Value(bound) => {
            matches!(value.partial_compare(bound), Some(Ordering::Greater) | Some(Ordering::Equal))
          }
        };
        let below_high = match high {
          Bound::Max => true,
          Bound::Min => false,
          Bound::Value(bound) => matches!(value.partial_compare(bound), Some(Ordering::Less)),
        };
        above_low && below_high
      }
      Criterion::Equal(v) => matches!(value.partial_compare(v), Some(Ordering::Equal)),
      Criterion::Truth(expected) => value.is_truthy() == *expected,
      Criterion::Identity(identity) => value.identity() == Some(*identity),
      Criterion::And(a, b) => a.contains(value) && b.contains(value),
      Criterion::Or(a, b) => a.contains(value) || b.contains(value),
      Criterion::Not(inner) => !inner.contains(value),
      Criterion::Null => true,
    }
  }

  /// True iff every value satisfying `self` also satisfies `other`. Drives method
  /// specificity ordering (`Signature::implies`): the engine picks the applicable method
  /// whose signature is implied by no other applicable method's.
  pub fn implies(&self, other: &Criterion) -> bool {
    match (self, other) {
      (_, Criterion::Null) => true,
      // `Class`/`Subclass` test different domains (an ordinary instance's class vs. a
      // class-as-value's own ancestry), so only like implies like; each is narrower than
      // a wider target in its own domain exactly when the target classes are in an
      // ancestor relationship.
      (Criterion::Class(a), Criterion::Class(b)) => a.is_subclass_of(*b),
      (Criterion::Subclass(a), Criterion::Subclass(b)) => a.is_subclass_of(*b),
      (Criterion::Protocol(a), Criterion::Protocol(b)) => a == b,
      (Criterion::Truth(a), Criterion::Truth(b)) => a == b,
      (Criterion::Identity(a), Criterion::Identity(b)) => a == b,
      (Criterion::Range(low_a, high_a), Criterion::Range(low_b, high_b)) => {
        bound_le(low_b, low_a) && bound_le(high_a, high_b)
      }
      (Criterion::Equal(a), Criterion::Equal(b)) => matches!(a.partial_compare(b), Some(Ordering::Equal)),
      // A point implies whichever range it falls inside; a range never implies an exact
      // point back (the default `_ => false` arm below handles that direction).
      (Criterion::Equal(point), Criterion::Range(low, high)) => {
        Criterion::Range(low.clone(), high.clone()).contains(point)
      }
      (Criterion::And(a1, a2), _) => a1.implies(other) || a2.implies(other),
      (_, Criterion::Or(b1, b2)) => self.implies(b1) || self.implies(b2),
      (Criterion::Or(a1, a2), _) => a1.implies(other) && a2.implies(other),
      (_, Criterion::And(b1, b2)) => self.implies(b1) && self.implies(b2),
      _ => false,
    }
  }
}

fn bump(value: Value) -> Value {
  match value {
    Value::Int(i) => Value::Int(i + 1),
    Value::Float(f) => Value::Float(f64::from_bits(f.to_bits() + 1)),
    other => other,
  }
}

fn bound_le(a: &Bound, b: &Bound) -> bool {
  match (a, b) {
    (Bound::Min, _) => true,
    (_, Bound::Max) => true,
    (Bound::Max, _) | (_, Bound::Min) => false,
    (Bound::Value(va), Bound::Value(vb)) => {
      matches!(va.partial_compare(vb), Some(Ordering::Less) | Some(Ordering::Equal))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn range_contains_half_open_interval() {
    let adult = Criterion::greater_or_equal(Value::Int(18));
    assert!(adult.contains(&Value::Int(18)));
    assert!(adult.contains(&Value::Int(65)));
    assert!(!adult.contains(&Value::Int(17)));
  }

  #[test]
  fn range_implies_wider_range() {
    let narrow = Criterion::Range(Bound::Value(Value::Int(10)), Bound::Value(Value::Int(20)));
    let wide = Criterion::Range(Bound::Value(Value::Int(0)), Bound::Value(Value::Int(30)));
    assert!(narrow.implies(&wide));
    assert!(!wide.implies(&narrow));
  }

  #[test]
  fn class_implies_a_wider_ancestor_class() {
    let base = ClassId::root();
    let derived = crate::classes::CLASS_REGISTRY.register("CriterionChild", &[base]);
    assert!(Criterion::Class(derived).implies(&Criterion::Class(base)));
    assert!(!Criterion::Class(base).implies(&Criterion::Class(derived)));
  }

  #[test]
  fn class_is_isinstance_like_and_subclass_is_issubclass_like() {
    let base = crate::classes::CLASS_REGISTRY.register("CriterionBase", &[]);
    let derived = crate::classes::CLASS_REGISTRY.register("CriterionChild2", &[base]);
    let instance = Value::object(std::sync::Arc::new(crate::classes::testing::FixedAttrs::with_class(derived, vec![])));
    // `Class` matches ordinary instances of the class (or a descendant) via `value.class()`.
    assert!(Criterion::Class(base).contains(&instance));
    // `Subclass` matches only a class passed as a value, never an ordinary instance.
    assert!(!Criterion::Subclass(base).contains(&instance));
    assert!(Criterion::Subclass(base).contains(&Value::class_value(derived)));
    // A class-as-value's own class is the builtin metaclass, not `derived`'s own
    // ancestry, so `Class(derived)` (isinstance) does not match the class value itself.
    assert!(!Criterion::Class(derived).contains(&Value::class_value(derived)));
  }

  #[test]
  fn not_negates_contains() {
    let not_adult = Criterion::not_equal_to(Value::Int(18));
    assert!(!not_adult.contains(&Value::Int(18)));
    assert!(not_adult.contains(&Value::Int(19)));
  }

  /// `equal_to` is an exact point, not a width-1 interval: a value strictly between `v`
  /// and `v`'s integer successor (e.g. a float) must not satisfy it, only values that
  /// actually compare equal to `v`.
  #[test]
  fn equal_to_is_an_exact_point_not_an_interval() {
    let sixteen = Criterion::equal_to(Value::Int(16));
    assert!(sixteen.contains(&Value::Int(16)));
    assert!(sixteen.contains(&Value::Float(16.0)));
    assert!(!sixteen.contains(&Value::Float(16.5)));
    assert!(!sixteen.contains(&Value::Int(17)));
  }

  #[test]
  fn equal_to_implies_a_range_containing_the_point() {
    let sixteen = Criterion::equal_to(Value::Int(16));
    let under_twenty = Criterion::less_than(Value::Int(20));
    assert!(sixteen.implies(&under_twenty));
    assert!(!under_twenty.implies(&sixteen));
  }
}
