/*!

Open adaptation: an extensible registry answering "given object `x` and protocol `p`,
produce a value satisfying `p`, or report that none exists." Translated from the upstream
`protocols` package's `adapt()`/adapter-registration API.

*/

mod error;
mod sentinel;
mod protocol;
mod api;

pub use error::AdaptError;
pub use sentinel::{Adapter, AdapterResult, compose_adapters, minimum_adapter};
pub use protocol::{ChangeListener, Protocol, ProtocolId, protocol, lookup_protocol};
pub use api::{
  adapt,
  instances_provide,
  instances_do_not_provide,
  declare_adapter_for_type,
  protocol_implies,
};

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classes::{Value, CLASS_REGISTRY};

  #[test]
  fn adapt_falls_back_to_default() {
    let class = CLASS_REGISTRY.register("Unadapted", &[]);
    let protocol_id = ProtocolId::new("Serializable");
    let _ = class; // class has no registered adapter
    let default = Value::Str("fallback".into());
    let result = adapt(&Value::Int(1), protocol_id, Some(&default), None);
    assert_eq!(result.unwrap(), Value::Str("fallback".into()));
  }

  #[test]
  fn adapt_uses_registered_adapter() {
    let protocol_id = ProtocolId::new("Lengthy");
    declare_adapter_for_type(
      crate::classes::builtin::int(),
      protocol_id,
      Adapter::new(|v| match v {
        Value::Int(i) => AdapterResult::Adapted(Value::Str(format!("{i}m").into())),
        _ => AdapterResult::DoesNotSupport,
      }),
    )
    .unwrap();
    let result = adapt(&Value::Int(3), protocol_id, None, None);
    assert_eq!(result.unwrap(), Value::Str("3m".into()));
  }

  #[test]
  fn adapt_without_any_route_fails() {
    let protocol_id = ProtocolId::new("NeverImplemented");
    let result = adapt(&Value::Int(1), protocol_id, None, None);
    assert!(result.is_err());
  }
}
