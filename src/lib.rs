#![allow(dead_code)]
/*!

Two intertwined runtime services:

  - **open adaptation** ([`adapt`]): an extensible registry that answers "given object `x`
    and protocol `p`, produce a value satisfying `p`, or report that none exists."
  - **predicate-dispatch generic functions** ([`dispatch`]): callables whose body is chosen,
    per invocation, from a set of methods guarded by signatures over arbitrary expressions
    of the arguments.

The [`classes`] module is the type-system bridge the dispatch engine and the adaptation
registry both build on: an open, runtime-extensible notion of "class" and "protocol"
membership, since Rust's own type system is closed at compile time.

*/

pub mod abstractions;
pub mod classes;
pub mod adapt;
pub mod dispatch;

// We re-export abstractions that are meant to be used publicly.
pub use abstractions::{
  log,
  IString
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn crate_links() {
    // Smoke test that the three subsystems are wired together correctly.
    let _ = classes::ClassId::root();
  }
}
