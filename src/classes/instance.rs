/*!

`Instance` and `Value` bridge Rust's closed, compile-time type system to the dispatch
engine's open one. Rust can't give us runtime `isinstance`/MRO walks over `i64` and a
user's `struct Hummer` alike, so `Value` is a small closed enum of "the kinds of thing a
dispatch argument or expression result can be," with `Value::Object` as the escape hatch
for caller-defined types that implement `Instance`.

This mirrors how the term-rewriting engine this crate's scaffolding comes from represents
runtime terms as a closed `DagNode` enum keyed by `Symbol`, rather than trying to give Rust
itself an open class hierarchy.

*/

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use super::class_id::ClassId;
use super::registry::builtin;
use crate::abstractions::IString;
use crate::adapt::ProtocolId;

/// A caller-defined object participating in dispatch and adaptation. Implement this for
/// any Rust type you want class-criteria, attribute-lookup expressions, and the
/// adaptation registry's `__conform__` hook to see.
pub trait Instance: Debug + Send + Sync {
  /// The registered class this instance belongs to.
  fn class(&self) -> ClassId;

  /// Attribute lookup backing `Expression::Attribute`. Returns `None` for unknown
  /// attributes; the dispatch engine treats that the same as a raised `AttributeError`
  /// would be treated upstream: the owning signature simply doesn't match.
  fn get_attr(&self, _name: &str) -> Option<Value> {
    None
  }

  /// Truthiness backing `Expression::And`/`Or` short-circuiting and `TruthCriterion`.
  /// Defaults to `true`, matching the "everything is truthy unless it says otherwise"
  /// convention the specification's glossary describes.
  fn is_truthy(&self) -> bool {
    true
  }

  /// The `__conform__`-style hook: the object itself offers a value satisfying
  /// `protocol`, without consulting the adaptation registry. Consulted first by
  /// [`crate::adapt::adapt`], ahead of any registered adapter.
  fn conform(&self, _protocol: ProtocolId) -> Option<Value> {
    None
  }
}

/// A dispatch-engine value: either one of a handful of built-in primitive kinds, or an
/// opaque caller-defined [`Instance`].
#[derive(Clone, Debug)]
pub enum Value {
  Int(i64),
  Float(f64),
  Bool(bool),
  Str(Arc<str>),
  Tuple(Arc<Vec<Value>>),
  Object(Arc<dyn Instance>),
  /// A class itself, passed as an ordinary value (e.g. `Dog` rather than a `Dog`
  /// instance). `SubclassCriterion` dispatches on this: "the argument is `C` or one of
  /// `C`'s registered descendants, as a class object" (spec's classic-instance
  /// `SubclassTest`), as distinct from `ClassCriterion`'s isinstance test on ordinary
  /// instances.
  Class(ClassId),
  None,
}

impl Value {
  pub fn str(s: impl Into<Arc<str>>) -> Value {
    Value::Str(s.into())
  }

  pub fn tuple(items: Vec<Value>) -> Value {
    Value::Tuple(Arc::new(items))
  }

  pub fn object(instance: Arc<dyn Instance>) -> Value {
    Value::Object(instance)
  }

  /// Builds the value representing `class` itself, e.g. for passing a class as an
  /// ordinary call argument to be matched by a `SubclassCriterion`.
  pub fn class_value(class: ClassId) -> Value {
    Value::Class(class)
  }

  /// `Some(class)` iff this value is a class passed as a value; used by
  /// `SubclassCriterion` dispatch, which walks the class's own MRO rather than the
  /// value's.
  pub fn as_class(&self) -> Option<ClassId> {
    match self {
      Value::Class(class) => Some(*class),
      _ => None,
    }
  }

  /// The class this value's criteria are matched against.
  pub fn class(&self) -> ClassId {
    match self {
      Value::Int(_) => builtin::int(),
      Value::Float(_) => builtin::float(),
      Value::Bool(_) => builtin::bool_(),
      Value::Str(_) => builtin::str_(),
      Value::Tuple(_) => builtin::tuple(),
      Value::Object(obj) => obj.class(),
      Value::Class(_) => builtin::type_(),
      Value::None => builtin::none_type(),
    }
  }

  pub fn get_attr(&self, name: &str) -> Option<Value> {
    match self {
      Value::Object(obj) => obj.get_attr(name),
      _ => None,
    }
  }

  pub fn is_truthy(&self) -> bool {
    match self {
      Value::Int(i) => *i != 0,
      Value::Float(f) => *f != 0.0,
      Value::Bool(b) => *b,
      Value::Str(s) => !s.is_empty(),
      Value::Tuple(t) => !t.is_empty(),
      Value::Object(obj) => obj.is_truthy(),
      Value::Class(_) => true,
      Value::None => false,
    }
  }

  pub fn conform(&self, protocol: ProtocolId) -> Option<Value> {
    match self {
      Value::Object(obj) => obj.conform(protocol),
      _ => None,
    }
  }

  /// Ordering used by `Inequality` criteria. Numeric variants compare across `Int`/`Float`/
  /// `Bool`; `Str` compares lexically; everything else is incomparable, matching the
  /// specification's stance that an inequality criterion over a non-orderable expression
  /// value simply never matches rather than panicking.
  pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
    use Value::*;
    match (self, other) {
      (Int(a), Int(b)) => a.partial_cmp(b),
      (Float(a), Float(b)) => a.partial_cmp(b),
      (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
      (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
      (Bool(a), Bool(b)) => a.partial_cmp(b),
      (Bool(a), Int(b)) => (*a as i64).partial_cmp(b),
      (Int(a), Bool(b)) => a.partial_cmp(&(*b as i64)),
      (Str(a), Str(b)) => a.partial_cmp(b),
      (Class(a), Class(b)) => (a == b).then_some(Ordering::Equal),
      _ => None,
    }
  }

  /// A stable identity for `IdentityCriterion`/`is`-style comparisons. Reference-typed
  /// variants compare by pointer; value-typed variants (`Int`, `Float`, `Bool`) have no
  /// stable address, so callers comparing identity on those are better served by an
  /// equality-based criterion instead.
  pub fn identity(&self) -> Option<usize> {
    match self {
      Value::Str(s) => Some(Arc::as_ptr(s) as *const () as usize),
      Value::Tuple(t) => Some(Arc::as_ptr(t) as *const () as usize),
      Value::Object(o) => Some(Arc::as_ptr(o) as *const () as usize),
      Value::Class(c) => Some(usize::MAX - c.0 as usize),
      Value::None => Some(0),
      _ => None,
    }
  }

  pub fn attr_name(name: impl Into<IString>) -> IString {
    name.into()
  }
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::None, Value::None) => true,
      (Value::Object(_), Value::Object(_)) | (Value::Tuple(_), Value::Tuple(_)) => {
        self.identity() == other.identity()
      }
      _ => self.partial_compare(other) == Some(Ordering::Equal),
    }
  }
}
