//! Pure character/string transforms used by the optimizer.
//!
//! Every function here is deterministic and side-effect free; the
//! optimizer composes them and re-runs detection to judge the result.

pub mod fancy;
pub mod interspacing;
pub mod leet;
pub mod shorthand;
