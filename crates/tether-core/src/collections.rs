//! Map types used for per-commit bookkeeping.
//!
//! Defaults to `hashbrown`; the `std-hash` feature switches to the standard
//! library maps.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

/// Keys rendered so far in one list commit.
pub type SeenKeys<K> = map::HashSet<K>;
