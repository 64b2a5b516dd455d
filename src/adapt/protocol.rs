/*!

`Protocol` is the registry of "ways to become this protocol": a map from registered class
to adapter, plus a set of other protocols this one implies (so that adapting to a strong
protocol also satisfies any weaker protocol it implies, by composing through the
implication's own adapter). Grounded on `protocols/api.py`'s `declareAdapterForType` family
and `protocols/adapters.py`'s composition arithmetic, with the global `WeakKeyDictionary`
of subscribers translated into an explicit weak-listener list the dispatch engine's
`ProtocolCriterion` subscribes to for cache invalidation.

*/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::abstractions::IString;
use crate::classes::{ClassId, Value};
use super::error::AdaptError;
use super::sentinel::{compose_adapters, minimum_adapter, Adapter, AdapterResult};

/// An interned protocol name. Protocols live in their own namespace from classes: nothing
/// stops a module from declaring a protocol and a class with the same name.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ProtocolId(IString);

impl ProtocolId {
  pub fn new(name: impl Into<IString>) -> ProtocolId {
    ProtocolId(name.into())
  }

  pub fn name(&self) -> IString {
    self.0.clone()
  }
}

impl Display for ProtocolId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Notified when a protocol gains or loses a class-level adapter, so a compiled dispatch
/// DAG whose `ProtocolCriterion` depends on that protocol can mark itself stale instead of
/// answering from cached seed data. Implementors are held weakly: a generic function that
/// goes out of scope stops being notified without the protocol registry needing to know.
pub trait ChangeListener: Send + Sync {
  fn protocol_changed(&self, protocol: ProtocolId);
}

struct ProtocolInner {
  /// Each entry's `usize` is the registration's declared depth: 0 for a direct
  /// `register_type` call. Kept alongside the adapter so a second registration for the
  /// same class can be arbitrated by `minimum_adapter` instead of silently overwriting.
  class_adapters: HashMap<ClassId, (Adapter, usize)>,
  /// Other, stronger protocols `self` can also be reached through, each paired with the
  /// adapter that converts a value already known to satisfy that stronger protocol into
  /// one satisfying `self`. Populated on the weaker side of a `protocol_implies` pair, so
  /// `resolve` finds it while walking its own `self`'s list.
  implies: Vec<(ProtocolId, Adapter)>,
  listeners: Vec<Weak<dyn ChangeListener>>,
}

pub struct Protocol {
  id: ProtocolId,
  inner: Mutex<ProtocolInner>,
}

impl Protocol {
  fn new(id: ProtocolId) -> Protocol {
    Protocol {
      id,
      inner: Mutex::new(ProtocolInner {
        class_adapters: HashMap::new(),
        implies: Vec::new(),
        listeners: Vec::new(),
      }),
    }
  }

  pub fn id(&self) -> ProtocolId {
    self.id
  }

  /// Stores `adapter` as the route from `class` to this protocol, at the given
  /// propagation `depth` (0 = declared directly on `class`). If `class` already has a
  /// registered adapter, the new one replaces it only if it dominates per
  /// `minimum_adapter`'s depth/hop/sentinel arithmetic (spec §4.1); a genuine tie between
  /// two distinct custom adapters is an `AmbiguousAdapter` error raised synchronously,
  /// leaving the prior registration in place.
  pub fn register_type(&self, class: ClassId, adapter: Adapter, depth: usize) -> Result<(), AdaptError> {
    {
      let mut inner = self.inner.lock();
      match inner.class_adapters.get(&class) {
        Some((existing, existing_depth)) => {
          let winner = minimum_adapter(class, self.id, (*existing_depth, existing), (depth, &adapter))?;
          inner.class_adapters.insert(class, (winner, (*existing_depth).min(depth)));
        }
        None => {
          inner.class_adapters.insert(class, (adapter, depth));
        }
      }
    }
    self.notify();
    Ok(())
  }

  pub fn register_implied(&self, other: ProtocolId, adapter: Adapter) {
    self.inner.lock().implies.push((other, adapter));
    self.notify();
  }

  pub fn add_listener(&self, listener: Weak<dyn ChangeListener>) {
    self.inner.lock().listeners.push(listener);
  }

  /// Unsubscribes `listener`, identified by pointer rather than by value (`ChangeListener`
  /// has no `PartialEq`). A generic function calls this for every protocol it subscribed
  /// to when it's cleared, so a long-lived protocol never accumulates dead subscriptions
  /// from generics that come and go.
  pub fn remove_listener(&self, listener: &Weak<dyn ChangeListener>) {
    self.inner.lock().listeners.retain(|existing| !existing.ptr_eq(listener));
  }

  fn notify(&self) {
    let mut inner = self.inner.lock();
    inner.listeners.retain(|listener| {
      if let Some(listener) = listener.upgrade() {
        listener.protocol_changed(self.id);
        true
      } else {
        false
      }
    });
  }

  /// True iff some class in `class`'s MRO has a direct adapter registered, or this
  /// protocol is reachable by composing through an implied protocol. Backs
  /// `ProtocolCriterion::contains` without actually running any adapter.
  pub fn provides(&self, class: ClassId) -> bool {
    self.resolve(class).is_ok()
  }

  /// Finds the most specific adapter from `class` to this protocol, preferring a
  /// direct registration over one reached by composing through an implied protocol.
  /// Among direct registrations the nearest ancestor in the MRO wins outright, since
  /// the linearization already orders candidates by specificity; `minimum_adapter` is
  /// reserved for the rarer case of two routes tying on MRO depth (exposed for callers
  /// combining adapters found through more than one implied protocol).
  pub fn resolve(&self, class: ClassId) -> Result<Adapter, AdaptError> {
    let inner = self.inner.lock();
    let mro = class.mro();

    for ancestor in &mro {
      if let Some((adapter, _depth)) = inner.class_adapters.get(ancestor) {
        return Ok(adapter.clone());
      }
    }

    // No direct registration anywhere in the MRO; try reaching this protocol by way of
    // a stronger protocol that implies it: resolve the stronger protocol for `class`,
    // then convert that result into `self` with the registered implication adapter.
    for (stronger, implication_adapter) in &inner.implies {
      if let Ok(base) = PROTOCOL_REGISTRY.get_or_create(*stronger).resolve(class) {
        return Ok(compose_adapters(implication_adapter, &base));
      }
    }

    Err(AdaptError::NoAdapter { class, protocol: self.id })
  }

  pub fn adapt(&self, class: ClassId, value: &Value) -> Result<AdapterResult, AdaptError> {
    let adapter = self.resolve(class)?;
    Ok(adapter.call(value))
  }
}

struct ProtocolRegistry {
  protocols: Mutex<HashMap<ProtocolId, Arc<Protocol>>>,
}

impl ProtocolRegistry {
  fn new() -> Self {
    ProtocolRegistry { protocols: Mutex::new(HashMap::new()) }
  }

  pub fn get_or_create(&self, id: ProtocolId) -> Arc<Protocol> {
    self.protocols.lock().entry(id).or_insert_with(|| Arc::new(Protocol::new(id))).clone()
  }

  pub fn get(&self, id: ProtocolId) -> Option<Arc<Protocol>> {
    self.protocols.lock().get(&id).cloned()
  }
}

pub static PROTOCOL_REGISTRY: Lazy<ProtocolRegistry> = Lazy::new(ProtocolRegistry::new);

pub fn protocol(id: ProtocolId) -> Arc<Protocol> {
  PROTOCOL_REGISTRY.get_or_create(id)
}

pub fn lookup_protocol(id: ProtocolId) -> Option<Arc<Protocol>> {
  PROTOCOL_REGISTRY.get(id)
}
