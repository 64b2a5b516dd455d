/*!

A `Signature` is a conjunction of criteria over named expressions: the guard on one method
of a generic function. A `Predicate` is a disjunction of signatures, used when a rule is
declared with an `or` of conditions. Grounded on `predicates.py`'s `Signature`/
`PositionalSignature`/`Predicate`, with `&`/`|` reimplemented as the `BitAnd`/`BitOr`
operators instead of Python's `__and__`/`__or__`.

*/

use std::collections::BTreeMap;
use std::ops::{BitAnd, BitOr};

use super::criterion::Criterion;
use super::error::DispatchError;
use super::expr::ExprId;

/// Conjoins two criteria attached to the same expression id. `Null` is the identity
/// element for `&`, so an unconstrained side never forces a family check. Otherwise the
/// two must agree on `dispatch_family`, or the combination is a registration error —
/// see `DispatchError::CriterionFamilyMismatch`. Panics rather than threading a `Result`
/// through the `BitAnd` operator; a mismatch here is a rule-authoring bug, caught the
/// first time the offending signature is built.
fn combine_and(expr_id: ExprId, a: Criterion, b: Criterion) -> Criterion {
  if matches!(a, Criterion::Null) {
    return b;
  }
  if matches!(b, Criterion::Null) {
    return a;
  }
  if a.dispatch_family() != b.dispatch_family() {
    panic!("{}", DispatchError::CriterionFamilyMismatch { expr_id });
  }
  Criterion::And(Box::new(a), Box::new(b))
}

/// Disjoins two criteria attached to the same expression id, for `Signature::bitor`'s
/// single-shared-key case. `Null` absorbs: "matches everything, or this" still matches
/// everything.
fn combine_or(expr_id: ExprId, a: Criterion, b: Criterion) -> Criterion {
  if matches!(a, Criterion::Null) || matches!(b, Criterion::Null) {
    return Criterion::Null;
  }
  if a.dispatch_family() != b.dispatch_family() {
    panic!("{}", DispatchError::CriterionFamilyMismatch { expr_id });
  }
  Criterion::Or(Box::new(a), Box::new(b))
}

/// A conjunction of criteria, each attached to the expression id it guards. Stored as a
/// sorted map so two structurally-equal signatures compare and iterate the same way
/// regardless of the order their criteria were declared in.
#[derive(Clone, Debug, Default)]
pub struct Signature {
  criteria: BTreeMap<ExprId, Criterion>,
}

impl Signature {
  pub fn new() -> Self {
    Signature::default()
  }

  pub fn with(mut self, expr: ExprId, criterion: Criterion) -> Self {
    self.criteria.insert(expr, criterion);
    self
  }

  /// The empty signature: no criteria, matches any call. This is `default()`'s role in
  /// the upstream `Signature()` constructor used for the catch-all primary method.
  pub fn always() -> Self {
    Signature::default()
  }

  pub fn get(&self, expr: ExprId) -> Option<&Criterion> {
    self.criteria.get(&expr)
  }

  pub fn items(&self) -> impl Iterator<Item = (ExprId, &Criterion)> {
    self.criteria.iter().map(|(&id, criterion)| (id, criterion))
  }

  pub fn expr_ids(&self) -> impl Iterator<Item = ExprId> + '_ {
    self.criteria.keys().copied()
  }

  pub fn is_empty(&self) -> bool {
    self.criteria.is_empty()
  }

  pub fn matches(&self, values: &BTreeMap<ExprId, crate::classes::Value>) -> bool {
    self.criteria.iter().all(|(expr, criterion)| {
      values.get(expr).is_some_and(|value| criterion.contains(value))
    })
  }

  /// True iff every call matching `self` also matches `other`: `self` conjoins at least
  /// the same expression ids, and on each shared id, `self`'s criterion implies `other`'s
  /// (a criterion absent from `other` imposes no constraint, equivalent to `Null`).
  pub fn implies(&self, other: &Signature) -> bool {
    other.criteria.iter().all(|(expr, other_criterion)| {
      match self.criteria.get(expr) {
        Some(self_criterion) => self_criterion.implies(other_criterion),
        None => matches!(other_criterion, Criterion::Null),
      }
    })
  }
}

impl BitAnd for Signature {
  type Output = Signature;

  /// Conjunction: criteria on expression ids unique to either side carry over; criteria
  /// shared by both sides combine via `Criterion::And`.
  fn bitand(mut self, rhs: Signature) -> Signature {
    for (expr, criterion) in rhs.criteria {
      self.criteria
        .entry(expr)
        .and_modify(|existing| {
          *existing = combine_and(expr, existing.clone(), criterion.clone());
        })
        .or_insert(criterion);
    }
    self
  }
}

impl BitOr for Signature {
  type Output = Predicate;

  /// If both sides constrain exactly the same single expression id, `Or`s the two
  /// criteria together and stays a `Signature`. Otherwise there's no single conjunction
  /// that captures "either of these," so the result lifts to a two-signature `Predicate`.
  fn bitor(self, rhs: Signature) -> Predicate {
    let mut self_keys = self.criteria.keys().copied();
    let mut rhs_keys = rhs.criteria.keys().copied();
    let shared_single_key = match (self_keys.next(), self_keys.next(), rhs_keys.next(), rhs_keys.next()) {
      (Some(a), None, Some(b), None) if a == b => Some(a),
      _ => None,
    };

    match shared_single_key {
      Some(expr) => {
        let a = self.criteria.into_iter().next().unwrap().1;
        let b = rhs.criteria.into_iter().next().unwrap().1;
        Predicate::new(Signature::new().with(expr, combine_or(expr, a, b)))
      }
      None => Predicate::new(self) | Predicate::new(rhs),
    }
  }
}

/// A disjunction of signatures: "this method applies if any of these alternative
/// conjunctions of criteria hold." Most rules declare a single signature, so `Predicate`
/// is usually a one-element `Or`.
#[derive(Clone, Debug)]
pub struct Predicate {
  pub(crate) signatures: Vec<Signature>,
}

impl Predicate {
  pub fn new(signature: Signature) -> Self {
    Predicate { signatures: vec![signature] }
  }

  pub fn signatures(&self) -> &[Signature] {
    &self.signatures
  }
}

impl From<Signature> for Predicate {
  fn from(signature: Signature) -> Self {
    Predicate::new(signature)
  }
}

impl BitOr for Predicate {
  type Output = Predicate;

  fn bitor(mut self, rhs: Predicate) -> Predicate {
    self.signatures.extend(rhs.signatures);
    self
  }
}

impl BitAnd for Predicate {
  type Output = Predicate;

  /// Distributes conjunction over disjunction: every signature on the left is conjoined
  /// with every signature on the right.
  fn bitand(self, rhs: Predicate) -> Predicate {
    let mut signatures = Vec::with_capacity(self.signatures.len() * rhs.signatures.len());
    for left in &self.signatures {
      for right in &rhs.signatures {
        signatures.push(left.clone() & right.clone());
      }
    }
    Predicate { signatures }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classes::{ClassId, Value};

  #[test]
  fn empty_signature_matches_anything() {
    let signature = Signature::always();
    let values = BTreeMap::new();
    assert!(signature.matches(&values));
  }

  #[test]
  fn conjunction_requires_both_criteria() {
    let signature = Signature::new()
      .with(0, Criterion::greater_or_equal(Value::Int(18)))
      .with(1, Criterion::Truth(true));

    let mut values = BTreeMap::new();
    values.insert(0, Value::Int(20));
    values.insert(1, Value::Bool(false));
    assert!(!signature.matches(&values));

    values.insert(1, Value::Bool(true));
    assert!(signature.matches(&values));
  }

  #[test]
  fn narrower_signature_implies_wider_one() {
    let narrow = Signature::new().with(0, Criterion::greater_or_equal(Value::Int(65)));
    let wide = Signature::new().with(0, Criterion::greater_or_equal(Value::Int(18)));
    assert!(narrow.implies(&wide));
    assert!(!wide.implies(&narrow));
  }

  #[test]
  fn or_on_the_same_single_key_stays_a_signature() {
    let a = Signature::new().with(0, Criterion::equal_to(Value::Int(1)));
    let b = Signature::new().with(0, Criterion::equal_to(Value::Int(2)));
    let predicate = a | b;
    assert_eq!(predicate.signatures().len(), 1);
    assert!(matches!(predicate.signatures()[0].get(0), Some(Criterion::Or(_, _))));
  }

  #[test]
  fn or_on_different_keys_lifts_to_a_two_signature_predicate() {
    let a = Signature::new().with(0, Criterion::equal_to(Value::Int(1)));
    let b = Signature::new().with(1, Criterion::equal_to(Value::Int(2)));
    let predicate = a | b;
    assert_eq!(predicate.signatures().len(), 2);
  }

  #[test]
  #[should_panic]
  fn conjoining_mismatched_families_on_one_key_panics() {
    let a = Signature::new().with(0, Criterion::Class(ClassId::root()));
    let b = Signature::new().with(0, Criterion::Truth(true));
    let _ = a & b;
  }
}
