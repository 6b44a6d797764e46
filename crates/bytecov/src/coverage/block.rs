//! Type-safe identifiers.
//!
//! Blocks, probes and segments are all dense `u32` indices. Wrapping each
//! in its own type keeps a probe index from being used as a block index.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            #[inline]
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

index_type!(
    /// Basic block within one method's control-flow graph
    BlockId,
    "B"
);

index_type!(
    /// Probe within one class, dense from 0
    ProbeId,
    "P"
);

index_type!(
    /// Slot of a counter segment in the counter store
    SegmentId,
    "S"
);
