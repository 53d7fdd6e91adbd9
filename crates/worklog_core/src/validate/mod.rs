//! Validation of property values and of whole stores.
//!
//! # Responsibility
//! - Reject invalid values before they reach the graph (`rules`).
//! - Detect structural corruption after load and, optionally, after every
//!   mutation (`integrity`).
//!
//! # Invariants
//! - Value rules are pure functions of kind, property and value.
//! - Integrity failures are reported, never repaired.

pub(crate) mod integrity;
pub mod rules;

pub use rules::{check_object, check_value};
