/*!

The public adaptation entry point, translated from `protocols/api.py`'s `adapt()`: try the
object's own `__conform__`-style hook first, then the protocol registry, then a
caller-supplied default, then a caller-supplied factory, and only then give up.

*/

use crate::classes::Value;
use super::error::AdaptError;
use super::protocol::{protocol, ProtocolId};
use super::sentinel::{Adapter, AdapterResult};

/// Adapts `value` to `protocol`.
///
/// Resolution order, matching the upstream PEP 246-alike algorithm:
///
/// 1. If `value` is an `Object` whose `Instance::conform` hook returns `Some`, use that.
/// 2. Otherwise consult the protocol registry for a class-level adapter.
/// 3. Otherwise fall back to `default`, if supplied.
/// 4. Otherwise call `factory`, if supplied, and use its result.
/// 5. Otherwise fail with [`AdaptError::NoAdapter`].
pub fn adapt(
  value: &Value,
  protocol_id: ProtocolId,
  default: Option<&Value>,
  factory: Option<&dyn Fn(&Value) -> Option<Value>>,
) -> Result<Value, AdaptError> {
  if let Some(conformed) = value.conform(protocol_id) {
    return Ok(conformed);
  }

  let class = value.class();
  match protocol(protocol_id).resolve(class) {
    Ok(adapter) => match adapter.call(value) {
      AdapterResult::Adapted(adapted) => Ok(adapted),
      AdapterResult::NoAdapterNeeded => Ok(value.clone()),
      AdapterResult::DoesNotSupport => fall_back(protocol_id, value, default, factory),
    },
    Err(_) => fall_back(protocol_id, value, default, factory),
  }
}

fn fall_back(
  protocol_id: ProtocolId,
  value: &Value,
  default: Option<&Value>,
  factory: Option<&dyn Fn(&Value) -> Option<Value>>,
) -> Result<Value, AdaptError> {
  if let Some(default) = default {
    return Ok(default.clone());
  }
  if let Some(factory) = factory {
    if let Some(produced) = factory(value) {
      return Ok(produced);
    }
  }
  Err(AdaptError::NoAdapter { class: value.class(), protocol: protocol_id })
}

/// Declares that every instance of `class` already satisfies `protocol_id` unchanged.
/// Convenience wrapper over `Protocol::register_type` with the `NoAdapterNeeded` sentinel,
/// mirroring `protocols.api.instancesProvide`. A sentinel registration can't lose to, or
/// tie with, anything but another sentinel at the same depth, so this can't fail in
/// practice; callers who need the error path (re-declaring a class twice with
/// conflicting custom adapters) should call `declare_adapter_for_type` directly.
pub fn instances_provide(class: crate::classes::ClassId, protocol_id: ProtocolId) {
  protocol(protocol_id).register_type(class, Adapter::no_adapter_needed(), 0).expect(
    "registering a NO_ADAPTER_NEEDED sentinel can only be ambiguous against another sentinel",
  );
}

/// Declares that instances of `class` can never satisfy `protocol_id`, vetoing any
/// otherwise-inherited or implied adapter. Mirrors `instancesDoNotProvide`.
pub fn instances_do_not_provide(class: crate::classes::ClassId, protocol_id: ProtocolId) {
  protocol(protocol_id).register_type(class, Adapter::does_not_support(), 0).expect(
    "registering a DOES_NOT_SUPPORT sentinel can only be ambiguous against another sentinel",
  );
}

/// Registers `adapter` as the way to convert an instance of `class` into a value
/// satisfying `protocol_id`, at depth 0 (declared directly on `class`). Mirrors
/// `declareAdapterForType`. Fails with `AmbiguousAdapter` if `class` already has a
/// differently-specific adapter registered and neither dominates (spec §4.1/§4.9:
/// registration errors "raise synchronously and leave the generic unchanged").
pub fn declare_adapter_for_type(
  class: crate::classes::ClassId,
  protocol_id: ProtocolId,
  adapter: Adapter,
) -> Result<(), AdaptError> {
  protocol(protocol_id).register_type(class, adapter, 0)
}

/// Declares that satisfying `stronger` implies satisfying `weaker`, via `adapter`
/// converting a `stronger`-satisfying value into a `weaker`-satisfying one. Mirrors
/// `protocolImplies`.
///
/// Registered on `weaker`'s own implication list, not `stronger`'s: `Protocol::resolve`
/// only ever walks its own `self`'s list, so `weaker` has to be the one holding "I can
/// also be reached via `stronger`" for a class that only has a direct adapter to
/// `stronger` to resolve against `weaker` at all.
pub fn protocol_implies(stronger: ProtocolId, weaker: ProtocolId, adapter: Adapter) {
  protocol(weaker).register_implied(stronger, adapter);
}
