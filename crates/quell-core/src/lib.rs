#![forbid(unsafe_code)]

//! Core: time sources, array coercion, and stable flat-object keys.

pub mod array;
pub mod clock;
pub mod flat;

pub use array::{MaybeArray, to_array};
pub use clock::{Clock, LabClock};
pub use flat::{FlatInput, FlatObject, FlatValue, stringify_flat_object};
