#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod map;
mod raw;

#[cfg(feature = "serde")]
mod serde_impls;

pub use map::{Keys, SlotRef, StashTable, NOT_IN_STASH};
