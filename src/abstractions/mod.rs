#![allow(unused)]
/*!

Types/type aliases that abstract over the implementing backing type.

# Background and Motivation

A motivating example is the `IString` type, an interned string type. A number of external crates could provide this
functionality. This module redirects to whatever chosen implementation we want. To use the
[`string_cache` crate](https://crates.io/crates/string_cache), we just define `IString` as an alias for
`string_cache::DefaultAtom`:

```ignore
pub use string_cache::DefaultAtom as IString;
```

If we want to later change to the [`ustr` crate](https://crates.io/crates/ustr), we just define `IString` to be an
alias for `ustr::Ustr` instead:

```ignore
pub use ustr::Ustr as IString;
```

For types or infrastructure with very different backing implementations, we define an abstraction layer over the
implementation. For example, the `log` module could use any of a number of logging frameworks or even a bespoke
solution for its implementation. However, its (crate) public interface consists only of
`set_global_logging_threshold()`/`get_global_logging_threshold()` and the macros `critical!`, `error!`, `warning!`,
`info!`, `debug!`, and `trace!`. The (private) backing implementation is encapsulated in the `log` module.

*/

mod nat_set;
mod string_join;
pub(crate) mod erased;

use std::collections::HashSet as StdHashSet;

// Logging
pub mod log;

// Interned string. Used for argument/attribute names and interned class/protocol names.
pub use string_cache::DefaultAtom as IString;

// Used by `Expression::Constant` to hold an arbitrary hashable authoring-time value.
pub(crate) use erased::ErasedValue;

// region Items meant to be used only internally

// A set of (small) natural numbers
pub(crate) use nat_set::NatSet;

// Join sequences with a separator
pub(crate) use string_join::{join_string, join_iter};

/// A `Set` is a hash set. This replaces Maude's `PointerSet` in most situations.
pub type Set<T> = StdHashSet<T>;

// endregion
