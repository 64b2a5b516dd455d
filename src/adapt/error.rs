/*!

Errors raised by the adaptation registry. Kept separate from [`crate::dispatch::error`]'s
`DispatchError` because the two subsystems fail for disjoint reasons with disjoint
recovery semantics: a dispatch failure means "no method matched this call," while an
adaptation failure means "no (or too many) ways exist to view this object as that
protocol." Mirrors the upstream split between the `protocols` and `dispatch` packages this
crate's adaptation and dispatch modules are drawn from.

*/

use thiserror::Error;
use crate::classes::ClassId;
use super::protocol::ProtocolId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdaptError {
  /// The object's class provides no registered route to `protocol`, it has no
  /// `__conform__`-style hook for it, and no default or factory was supplied.
  #[error("no adapter from class `{class}` to protocol `{protocol}`")]
  NoAdapter { class: ClassId, protocol: ProtocolId },

  /// Two or more equally-specific adapters exist and neither is preferred over the
  /// other by depth, hop count, or sentinel precedence.
  #[error("ambiguous adapter to protocol `{protocol}` for class `{class}`")]
  AmbiguousAdapter { class: ClassId, protocol: ProtocolId },

  /// An instance's `conform` hook declined by returning `None`, which the caller
  /// re-raised instead of falling through to registry-based adaptation. This variant
  /// exists for callers of `declare_*` functions that want `__conform__`'s "decline vs.
  /// fail" distinction surfaced rather than silently falling through.
  #[error("`conform` hook declined to adapt to protocol `{protocol}`")]
  ConformDeclined { protocol: ProtocolId },
}
