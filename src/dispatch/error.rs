/*!

Errors raised while building or calling a generic function. Kept separate from
[`crate::adapt::AdaptError`]; see that module's doc comment for the rationale.

*/

use thiserror::Error;
use crate::abstractions::IString;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
  /// No registered method's signature matched the call's arguments.
  #[error("no applicable method for generic function `{generic}`")]
  NoApplicableMethod { generic: IString },

  /// Two or more primary methods matched and neither's signature implies the other's,
  /// so their relative specificity is undefined.
  #[error("ambiguous method for generic function `{generic}`: no single most-specific primary method")]
  AmbiguousMethod { generic: IString },

  /// A criterion was combined with another from a different dispatch family (for
  /// example, anding a `Class` criterion with a `Range` criterion on the same
  /// expression) in a context that requires them to agree.
  #[error("criterion family mismatch on expression {expr_id}")]
  CriterionFamilyMismatch { expr_id: usize },

  /// An `Inequality` criterion was built with an operator other than
  /// `<`, `<=`, `=`, `!=`, `>`, `>=`.
  #[error("invalid inequality operator `{operator}`")]
  InvalidInequalityOperator { operator: String },

  /// `next_method` was called from the last method in an `around`/`before`/`primary`
  /// chain; there is nothing left to call.
  #[error("no next method in chain for generic function `{generic}`")]
  NoNextMethod { generic: IString },

  /// An argument name used in a signature doesn't correspond to any of the generic
  /// function's declared argument positions.
  #[error("unknown argument name `{name}`")]
  NameNotFound { name: IString },
}
