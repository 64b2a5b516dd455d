/*!

Method combination: reducing a leaf's competing cases to a single callable. Grounded on
`functions.py`'s `AbstractGeneric.combine`/`ordered_signatures`/`safe_methods`/
`all_methods`/`method_chain`/`separate_qualifiers`.

*/

use std::collections::HashMap;
use std::sync::Arc;

use crate::abstractions::IString;
use crate::classes::Value;
use super::error::DispatchError;
use super::signature::Signature;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Qualifier {
  Primary,
  Before,
  After,
  Around,
}

/// The next applicable method in an `around` chain, passed as the first argument to an
/// `around` body so it can decide whether (and with what arguments) to continue.
pub type NextMethod = Arc<dyn Fn(&[Value]) -> Result<Value, DispatchError> + Send + Sync>;

pub type PrimaryFn = Arc<dyn Fn(&[Value]) -> Result<Value, DispatchError> + Send + Sync>;
pub type AroundFn = Arc<dyn Fn(&[Value], NextMethod) -> Result<Value, DispatchError> + Send + Sync>;
pub type SideEffectFn = Arc<dyn Fn(&[Value]) + Send + Sync>;

#[derive(Clone)]
pub enum MethodBody {
  Primary(PrimaryFn),
  Around(AroundFn),
  Before(SideEffectFn),
  After(SideEffectFn),
}

impl MethodBody {
  pub fn qualifier(&self) -> Qualifier {
    match self {
      MethodBody::Primary(_) => Qualifier::Primary,
      MethodBody::Around(_) => Qualifier::Around,
      MethodBody::Before(_) => Qualifier::Before,
      MethodBody::After(_) => Qualifier::After,
    }
  }
}

/// One registered rule: a signature and the body to run when it's the chosen method.
#[derive(Clone)]
pub struct Case {
  pub signature: Signature,
  pub body: MethodBody,
}

/// Splits a leaf's candidate cases by qualifier, preserving each group's relative order.
pub fn separate_qualifiers(cases: &[(usize, Case)]) -> HashMap<Qualifier, Vec<(usize, Signature)>> {
  let mut groups: HashMap<Qualifier, Vec<(usize, Signature)>> = HashMap::new();
  for (id, case) in cases {
    groups.entry(case.body.qualifier()).or_default().push((*id, case.signature.clone()));
  }
  groups
}

/// Successive layers of "most specific, unbeaten" cases: layer 0 holds every case not
/// strictly implied by some other case still under consideration; each later layer is
/// computed the same way over what's left. A case `D` strictly beats `C` when `D`'s
/// signature implies `C`'s but not conversely (`D` is narrower).
pub fn ordered_signatures(cases: &[(usize, Signature)]) -> Vec<Vec<usize>> {
  let mut remaining: Vec<usize> = cases.iter().map(|(id, _)| *id).collect();
  let signature_of = |id: usize| -> &Signature {
    &cases.iter().find(|(candidate, _)| *candidate == id).unwrap().1
  };

  let mut layers = Vec::new();
  while !remaining.is_empty() {
    let layer: Vec<usize> = remaining
      .iter()
      .copied()
      .filter(|&c| {
        let sig_c = signature_of(c);
        !remaining.iter().any(|&d| {
          d != c && {
            let sig_d = signature_of(d);
            sig_d.implies(sig_c) && !sig_c.implies(sig_d)
          }
        })
      })
      .collect();

    if layer.is_empty() {
      // Every remaining case beats (or ties) some other; nothing strictly dominates.
      // Surface the rest as one final, mutually-ambiguous layer rather than loop forever.
      layers.push(remaining.clone());
      break;
    }
    remaining.retain(|c| !layer.contains(c));
    layers.push(layer);
  }
  layers
}

/// The primary-method combination rule: the first non-empty layer must hold exactly one
/// case, or dispatch is ambiguous.
pub fn safe_methods(layers: &[Vec<usize>], generic: IString) -> Result<usize, DispatchError> {
  match layers.first() {
    None => Err(DispatchError::NoApplicableMethod { generic }),
    Some(layer) if layer.len() == 1 => Ok(layer[0]),
    Some(_) => Err(DispatchError::AmbiguousMethod { generic }),
  }
}

/// `before`/`after` combination: every case across every layer runs, in specificity
/// order (reverse it for `after`); returns are discarded.
pub fn all_methods(layers: &[Vec<usize>]) -> Vec<usize> {
  layers.iter().flatten().copied().collect()
}

/// Builds the `around` chain: each layer's case (if ambiguous within a layer, the first
/// is used — `around` methods are expected to be written cooperatively) wraps the next
/// layer's chain as its `next_method`, terminating in the primary combination.
pub fn method_chain(
  around_layers: &[Vec<usize>],
  around_bodies: &HashMap<usize, AroundFn>,
  primary: NextMethod,
) -> NextMethod {
  let mut next = primary;
  for layer in around_layers.iter().rev() {
    if let Some(&case_id) = layer.first() {
      if let Some(body) = around_bodies.get(&case_id) {
        let body = body.clone();
        let inner_next = next.clone();
        next = Arc::new(move |args: &[Value]| body(args, inner_next.clone()));
      }
    }
  }
  next
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dispatch::criterion::Criterion;
  use crate::classes::ClassId;

  #[test]
  fn more_specific_signature_appears_in_earlier_layer() {
    let root = ClassId::root();
    let derived = crate::classes::CLASS_REGISTRY.register("CombineChild", &[root]);
    let general = Signature::new().with(0, Criterion::Subclass(root));
    let specific = Signature::new().with(0, Criterion::Subclass(derived));
    let cases = vec![(0, general), (1, specific)];
    let layers = ordered_signatures(&cases);
    assert_eq!(layers[0], vec![1]);
    assert_eq!(layers[1], vec![0]);
  }

  #[test]
  fn unrelated_signatures_are_ambiguous() {
    let a = Signature::new().with(0, Criterion::Class(ClassId::root()));
    let b = Signature::new().with(1, Criterion::Class(ClassId::root()));
    let cases = vec![(0, a), (1, b)];
    let layers = ordered_signatures(&cases);
    let result = safe_methods(&layers, IString::from("test"));
    assert!(matches!(result, Err(DispatchError::AmbiguousMethod { .. })));
  }
}
