/*!

Adapter "arithmetic": comparing and composing the functions that convert an object of one
class into a value satisfying some protocol. Grounded on `protocols/adapters.py`'s
`minimumAdapter`/`composeAdapters`, translated from "adapters are functions, and some
functions are magic sentinels" into a small closed `AdapterKind` tag so composition and
comparison don't need to inspect function identity.

*/

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use crate::classes::Value;
use super::error::AdaptError;
use super::protocol::ProtocolId;
use crate::classes::ClassId;

/// What calling an adapter produced.
#[derive(Clone, Debug)]
pub enum AdapterResult {
  /// The adapter produced a value satisfying the protocol.
  Adapted(Value),
  /// The object already satisfies the protocol as-is; use it unchanged.
  NoAdapterNeeded,
  /// This class is known to never satisfy the protocol; don't try any weaker adapter.
  DoesNotSupport,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum AdapterKind {
  NoAdapterNeeded,
  DoesNotSupport,
  Custom,
}

type AdapterFn = dyn Fn(&Value) -> AdapterResult + Send + Sync;

/// A registered or composed conversion from one class to a protocol, carrying the
/// bookkeeping `minimum_adapter` needs to pick the more specific of two candidates: a
/// composition hop count, and (for the two sentinel adapters) a kind tag standing in for
/// the upstream `NO_ADAPTER_NEEDED is NO_ADAPTER_NEEDED` identity check.
#[derive(Clone)]
pub struct Adapter {
  pub(crate) kind: AdapterKind,
  hops: u32,
  func: Arc<AdapterFn>,
}

impl Debug for Adapter {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Adapter")
      .field("kind", &self.kind)
      .field("hops", &self.hops)
      .finish()
  }
}

impl Adapter {
  pub fn new(func: impl Fn(&Value) -> AdapterResult + Send + Sync + 'static) -> Adapter {
    Adapter { kind: AdapterKind::Custom, hops: 1, func: Arc::new(func) }
  }

  /// An adapter declaring that instances of a class already satisfy the protocol
  /// unchanged; register this for "this class directly implements that protocol."
  pub fn no_adapter_needed() -> Adapter {
    Adapter { kind: AdapterKind::NoAdapterNeeded, hops: 0, func: Arc::new(|_| AdapterResult::NoAdapterNeeded) }
  }

  /// An adapter declaring that instances of a class can never satisfy the protocol;
  /// register this to veto an inherited or implied adapter for a specific subclass.
  pub fn does_not_support() -> Adapter {
    Adapter { kind: AdapterKind::DoesNotSupport, hops: 0, func: Arc::new(|_| AdapterResult::DoesNotSupport) }
  }

  pub fn call(&self, value: &Value) -> AdapterResult {
    (self.func)(value)
  }

  pub fn hop_count(&self) -> u32 {
    self.hops
  }
}

/// Composes `outer` after `inner`: `inner` runs first, and unless it short-circuits with
/// `DoesNotSupport`, its result (or the original value, for `NoAdapterNeeded`) feeds
/// `outer`. The hop count is the sum of both, so a two-step composed route is preferred
/// over a three-step one when `minimum_adapter` has to choose.
pub fn compose_adapters(outer: &Adapter, inner: &Adapter) -> Adapter {
  let outer = outer.clone();
  let inner = inner.clone();
  let hops = outer.hops + inner.hops;
  Adapter {
    kind: AdapterKind::Custom,
    hops,
    func: Arc::new(move |value: &Value| match inner.call(value) {
      AdapterResult::DoesNotSupport => AdapterResult::DoesNotSupport,
      AdapterResult::NoAdapterNeeded => outer.call(value),
      AdapterResult::Adapted(intermediate) => outer.call(&intermediate),
    }),
  }
}

/// Picks the more specific of two adapters found for the same protocol at MRO depths
/// `depth_a`/`depth_b` (0 = the class itself; a registration on the class's own entry
/// beats one inherited from a base). Ties on depth break on hop count, then on sentinel
/// precedence (an explicit `NoAdapterNeeded` beats an explicit `DoesNotSupport`); any
/// remaining tie is a genuine ambiguity.
pub fn minimum_adapter(
  class: ClassId,
  protocol: ProtocolId,
  a: (usize, &Adapter),
  b: (usize, &Adapter),
) -> Result<Adapter, AdaptError> {
  let (depth_a, adapter_a) = a;
  let (depth_b, adapter_b) = b;

  if depth_a != depth_b {
    return Ok(if depth_a < depth_b { adapter_a.clone() } else { adapter_b.clone() });
  }
  if adapter_a.hops != adapter_b.hops {
    return Ok(if adapter_a.hops < adapter_b.hops { adapter_a.clone() } else { adapter_b.clone() });
  }
  use AdapterKind::*;
  match (adapter_a.kind, adapter_b.kind) {
    (NoAdapterNeeded, NoAdapterNeeded) | (DoesNotSupport, DoesNotSupport) => Ok(adapter_a.clone()),
    (NoAdapterNeeded, DoesNotSupport) => Ok(adapter_a.clone()),
    (DoesNotSupport, NoAdapterNeeded) => Ok(adapter_b.clone()),
    _ => Err(AdaptError::AmbiguousAdapter { class, protocol }),
  }
}
